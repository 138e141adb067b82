use rand::prelude::*;
use tileconfig::BucketOrder;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TilerError {
    #[error("image must be at least 1x1 (got {0}x{1})")]
    EmptyImage(u32, u32),
    #[error("tile size must be greater than zero")]
    ZeroTileSize,
}

/// One bucket-sized region of the image. Edge tiles are clipped to the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// The set of tiles covering an image, in the order a renderer should produce them.
#[derive(Debug, Clone)]
pub struct TilePlan {
    width: u32,
    height: u32,
    tile_size: u32,
    tiles: Vec<TileRect>,
}

impl TilePlan {
    pub fn new(
        width: u32,
        height: u32,
        tile_size: u32,
        order: BucketOrder,
        seed: u64,
    ) -> Result<Self, TilerError> {
        if width == 0 || height == 0 {
            return Err(TilerError::EmptyImage(width, height));
        }
        if tile_size == 0 {
            return Err(TilerError::ZeroTileSize);
        }

        let columns = width.div_ceil(tile_size);
        let rows = height.div_ceil(tile_size);
        let cells = build_order(columns, rows, order, seed);
        let tiles = cells
            .into_iter()
            .map(|(column, row)| {
                let x = column * tile_size;
                let y = row * tile_size;
                TileRect {
                    x,
                    y,
                    width: tile_size.min(width - x),
                    height: tile_size.min(height - y),
                }
            })
            .collect();

        Ok(Self {
            width,
            height,
            tile_size,
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[TileRect] {
        &self.tiles
    }
}

fn build_order(columns: u32, rows: u32, order: BucketOrder, seed: u64) -> Vec<(u32, u32)> {
    let mut cells: Vec<(u32, u32)> = match order {
        BucketOrder::Rows | BucketOrder::Shuffle => (0..rows)
            .flat_map(|row| (0..columns).map(move |column| (column, row)))
            .collect(),
        BucketOrder::Columns => (0..columns)
            .flat_map(|column| (0..rows).map(move |row| (column, row)))
            .collect(),
    };
    if order == BucketOrder::Shuffle {
        let mut rng = StdRng::seed_from_u64(seed);
        cells.shuffle(&mut rng);
    }
    cells
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn covered_pixels(plan: &TilePlan) -> u64 {
        plan.tiles().iter().map(TileRect::area).sum()
    }

    #[test]
    fn rows_walk_left_to_right_then_down() {
        let plan = TilePlan::new(4, 4, 2, BucketOrder::Rows, 0).unwrap();
        let origins: Vec<_> = plan.tiles().iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(origins, vec![(0, 0), (2, 0), (0, 2), (2, 2)]);
    }

    #[test]
    fn columns_walk_top_to_bottom_then_right() {
        let plan = TilePlan::new(4, 4, 2, BucketOrder::Columns, 0).unwrap();
        let origins: Vec<_> = plan.tiles().iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(origins, vec![(0, 0), (0, 2), (2, 0), (2, 2)]);
    }

    #[test]
    fn edge_tiles_are_clipped() {
        let plan = TilePlan::new(5, 3, 2, BucketOrder::Rows, 0).unwrap();
        assert_eq!(plan.len(), 6);
        let last = plan.tiles().last().unwrap();
        assert_eq!((last.x, last.y, last.width, last.height), (4, 2, 1, 1));
        assert_eq!(covered_pixels(&plan), 15);
    }

    #[test]
    fn shuffle_is_a_seeded_permutation() {
        let rows = TilePlan::new(64, 64, 8, BucketOrder::Rows, 0).unwrap();
        let first = TilePlan::new(64, 64, 8, BucketOrder::Shuffle, 9).unwrap();
        let second = TilePlan::new(64, 64, 8, BucketOrder::Shuffle, 9).unwrap();

        assert_eq!(first.tiles(), second.tiles());
        assert_ne!(first.tiles(), rows.tiles());
        let expected: HashSet<_> = rows.tiles().iter().copied().collect();
        let shuffled: HashSet<_> = first.tiles().iter().copied().collect();
        assert_eq!(expected, shuffled);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert_eq!(
            TilePlan::new(0, 4, 2, BucketOrder::Rows, 0).unwrap_err(),
            TilerError::EmptyImage(0, 4)
        );
        assert_eq!(
            TilePlan::new(4, 4, 0, BucketOrder::Rows, 0).unwrap_err(),
            TilerError::ZeroTileSize
        );
    }
}
