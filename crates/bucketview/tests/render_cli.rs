use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn bucketview() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bucketview"));
    command.env_remove("BUCKETVIEW_CONFIG").env("RUST_LOG", "warn");
    command
}

#[test]
fn renders_and_exports_png() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("sphere.png");

    let result = bucketview()
        .args(["--size", "64x48", "--tile-size", "16", "--order", "shuffle"])
        .arg("--output")
        .arg(&output)
        .output()
        .expect("failed to run bucketview");

    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.starts_with("completed: 12 buckets displayed, 12 freed"), "{stdout}");
    assert!(output.exists());
}

#[test]
fn abort_after_first_report_ends_early() {
    let result = bucketview()
        .args([
            "--size",
            "64x64",
            "--tile-size",
            "8",
            "--tile-delay-ms",
            "2",
            "--abort-after",
            "1",
        ])
        .output()
        .expect("failed to run bucketview");

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.starts_with("aborted:"), "{stdout}");
}

#[test]
fn config_file_is_honoured_and_printed() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("render.toml");
    fs::write(
        &config,
        "version = 1\n[image]\nwidth = 40\nheight = 20\n[tiles]\nsize = 10\norder = \"columns\"\n",
    )
    .unwrap();

    let printed = bucketview()
        .arg("config")
        .arg("--config")
        .arg(&config)
        .output()
        .expect("failed to run bucketview config");
    assert!(printed.status.success());
    let stdout = String::from_utf8_lossy(&printed.stdout);
    assert!(stdout.contains("width = 40"), "{stdout}");
    assert!(stdout.contains("order = \"columns\""), "{stdout}");

    let rendered = bucketview()
        .env("BUCKETVIEW_CONFIG", &config)
        .output()
        .expect("failed to run bucketview");
    assert!(rendered.status.success());
    let stdout = String::from_utf8_lossy(&rendered.stdout);
    assert!(stdout.starts_with("completed: 8 buckets displayed"), "{stdout}");
}

#[test]
fn unsupported_channel_layout_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("rgb.toml");
    fs::write(&config, "version = 1\n[image]\nchannels = \"rgb\"\n").unwrap();

    let result = bucketview()
        .arg("--config")
        .arg(&config)
        .output()
        .expect("failed to run bucketview");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("unsupported pixel format"), "{stderr}");
}
