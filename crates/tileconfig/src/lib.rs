use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Order in which a renderer walks the image's buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketOrder {
    /// Left to right, then top to bottom.
    #[default]
    Rows,
    /// Top to bottom, then left to right.
    Columns,
    /// Seeded random permutation.
    Shuffle,
}

impl BucketOrder {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rows" | "row" | "horizontal" => Ok(Self::Rows),
            "columns" | "column" | "vertical" => Ok(Self::Columns),
            "shuffle" | "random" => Ok(Self::Shuffle),
            other => Err(format!(
                "unknown bucket order '{other}'; expected rows, columns, or shuffle"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RenderConfig {
    pub version: u32,
    #[serde(default)]
    pub image: ImageSection,
    #[serde(default)]
    pub tiles: TileSection,
    #[serde(default)]
    pub render: RenderSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageSection {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub channels: String,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            name: "bucketview".into(),
            width: 640,
            height: 480,
            channels: "rgba".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TileSection {
    pub size: u32,
    pub order: BucketOrder,
    pub seed: u64,
}

impl Default for TileSection {
    fn default() -> Self {
        Self {
            size: 32,
            order: BucketOrder::Rows,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RenderSection {
    /// Artificial pause after each rendered tile.
    #[serde(
        default = "default_tile_delay",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub tile_delay: Duration,
    /// Ask the renderer to stop after this many progress reports.
    #[serde(default)]
    pub abort_after: Option<usize>,
}

fn default_tile_delay() -> Duration {
    Duration::ZERO
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            version: 1,
            image: ImageSection::default(),
            tiles: TileSection::default(),
            render: RenderSection::default(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

impl RenderConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RenderConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.image.width == 0 || self.image.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "image must be at least 1x1 (got {}x{})",
                self.image.width, self.image.height
            )));
        }

        if self.image.channels.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "image.channels may not be empty".into(),
            ));
        }

        if self.tiles.size == 0 {
            return Err(ConfigError::Invalid(
                "tiles.size must be greater than zero".into(),
            ));
        }

        if self.render.abort_after == Some(0) {
            return Err(ConfigError::Invalid(
                "render.abort_after must be at least 1 when set".into(),
            ));
        }

        Ok(())
    }
}
