//! Court occupancy grids.
//!
//! The grid covers the doubles court plus run-off: 2 m either side and 4 m
//! behind each baseline. Positions outside it are dropped.

use tennis_models::{court, Heatmap, Point2};

const SIDE_RUNOFF_M: f64 = 2.0;
const BACK_RUNOFF_M: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapGrid {
    pub columns: usize,
    pub rows: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl HeatmapGrid {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
            x_min: -SIDE_RUNOFF_M,
            x_max: court::WIDTH + SIDE_RUNOFF_M,
            y_min: -BACK_RUNOFF_M,
            y_max: court::LENGTH + BACK_RUNOFF_M,
        }
    }

    /// Cell of a court position, or `None` outside the grid.
    pub fn cell(&self, p: &Point2) -> Option<(usize, usize)> {
        if !p.is_finite()
            || p.x < self.x_min
            || p.x > self.x_max
            || p.y < self.y_min
            || p.y > self.y_max
        {
            return None;
        }
        let fx = (p.x - self.x_min) / (self.x_max - self.x_min);
        let fy = (p.y - self.y_min) / (self.y_max - self.y_min);
        let col = ((fx * self.columns as f64) as usize).min(self.columns - 1);
        let row = ((fy * self.rows as f64) as usize).min(self.rows - 1);
        Some((row, col))
    }

    pub fn accumulate<'a>(&self, positions: impl IntoIterator<Item = &'a Point2>) -> Heatmap {
        let mut bins = vec![vec![0u32; self.columns]; self.rows];
        for p in positions {
            if let Some((row, col)) = self.cell(p) {
                bins[row][col] += 1;
            }
        }
        Heatmap {
            columns: self.columns,
            rows: self.rows,
            x_min: self.x_min,
            x_max: self.x_max,
            y_min: self.y_min,
            y_max: self.y_max,
            bins,
        }
    }
}

/// Percentage of cells visited at least once.
///
/// Only cells on the player's own half count.
pub fn coverage_pct(heatmap: &Heatmap) -> f64 {
    let net_row = {
        let f = (court::NET_Y - heatmap.y_min) / (heatmap.y_max - heatmap.y_min);
        (f * heatmap.rows as f64).round() as usize
    };
    let halves = [&heatmap.bins[..net_row.min(heatmap.rows)], &heatmap.bins[net_row.min(heatmap.rows)..]];

    // The half with more visits is the player's half.
    let Some(own) = halves
        .iter()
        .max_by_key(|rows| rows.iter().flatten().map(|&c| c as u64).sum::<u64>())
    else {
        return 0.0;
    };
    let cells = own.iter().map(|r| r.len()).sum::<usize>();
    if cells == 0 {
        return 0.0;
    }
    let visited = own.iter().flatten().filter(|&&c| c > 0).count();
    100.0 * visited as f64 / cells as f64
}
