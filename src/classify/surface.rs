use ndarray::Array2;

use crate::classify::{Classifier, ClassifyError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub x_min: f64,
    pub y_min: f64,
    pub step: f64,
    pub nx: usize,
    pub ny: usize,
}

impl GridSpec {
    /// Grid covering the first two columns of `plane`, padded by `margin`.
    /// The step grows until neither side exceeds `max_cells`.
    pub fn covering(plane: &Array2<f64>, margin: f64, step: f64, max_cells: usize) -> Self {
        let (x_lo, x_hi) = column_range(plane, 0);
        let (y_lo, y_hi) = column_range(plane, 1);
        let x_min = x_lo - margin;
        let y_min = y_lo - margin;
        let x_span = (x_hi + margin) - x_min;
        let y_span = (y_hi + margin) - y_min;
        let max_cells = max_cells.max(1);

        let mut step = if step > 0.0 { step } else { 0.02 };
        let widest = x_span.max(y_span);
        if cells(widest, step) > max_cells {
            step = widest / max_cells as f64;
        }
        Self {
            x_min,
            y_min,
            step,
            nx: cells(x_span, step).min(max_cells),
            ny: cells(y_span, step).min(max_cells),
        }
    }

    pub fn x_at(&self, ix: usize) -> f64 {
        self.x_min + ix as f64 * self.step
    }

    pub fn y_at(&self, iy: usize) -> f64 {
        self.y_min + iy as f64 * self.step
    }

    pub fn x_max(&self) -> f64 {
        self.x_at(self.nx.saturating_sub(1))
    }

    pub fn y_max(&self) -> f64 {
        self.y_at(self.ny.saturating_sub(1))
    }
}

fn cells(span: f64, step: f64) -> usize {
    ((span / step).ceil() as usize).max(1)
}

fn column_range(plane: &Array2<f64>, col: usize) -> (f64, f64) {
    if col >= plane.ncols() || plane.nrows() == 0 {
        return (0.0, 0.0);
    }
    plane
        .column(col)
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Predicted class per grid cell, row-major with `y` as the slow axis.
#[derive(Debug, Clone)]
pub struct DecisionSurface {
    pub grid: GridSpec,
    pub classes: Vec<u8>,
}

impl DecisionSurface {
    pub fn class_at(&self, x: f64, y: f64) -> u8 {
        let g = &self.grid;
        let ix = ((x - g.x_min) / g.step).round().clamp(0.0, (g.nx - 1) as f64) as usize;
        let iy = ((y - g.y_min) / g.step).round().clamp(0.0, (g.ny - 1) as f64) as usize;
        self.classes[iy * g.nx + ix]
    }

    /// Fraction of cells predicted as `class`.
    pub fn share(&self, class: u8) -> f64 {
        if self.classes.is_empty() {
            return 0.0;
        }
        self.classes.iter().filter(|&&c| c == class).count() as f64 / self.classes.len() as f64
    }
}

pub fn decision_surface(
    model: &dyn Classifier,
    grid: GridSpec,
) -> Result<DecisionSurface, ClassifyError> {
    let mut classes = Vec::with_capacity(grid.nx * grid.ny);
    let mut line = Array2::<f64>::zeros((grid.nx, 2));
    for ix in 0..grid.nx {
        line[[ix, 0]] = grid.x_at(ix);
    }
    for iy in 0..grid.ny {
        line.column_mut(1).fill(grid.y_at(iy));
        classes.extend(model.predict(&line)?.into_iter().map(|c| c as u8));
    }
    Ok(DecisionSurface { grid, classes })
}
