use std::sync::atomic::{AtomicBool, Ordering};

use crate::coords::{Axis, CoordinateMapper};
use crate::{Bindings, Equation};

use bitvec::prelude::*;
use num_traits::ToPrimitive;
use thiserror::Error;

#[cfg(feature = "rayon")]
use rayon::prelude::{IndexedParallelIterator, ParallelIterator, ParallelSliceMut};

/// Newton iterations allowed for the block-level probe.
pub const COARSE_ITERATIONS: usize = 10;
/// Newton iterations allowed for each per-pixel probe.
pub const FINE_ITERATIONS: usize = 5;
/// The block-level probe accepts residuals this many times larger.
const COARSE_TOLERANCE_FACTOR: f64 = 10.0;
/// Base tolerance is this fraction of a squared pixel step.
const BASE_TOLERANCE_FACTOR: f64 = 0.1;
/// Central difference step, relative to the probe box size.
const DERIVATIVE_STEP: f64 = 1e-5;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("curve location was cancelled")]
    Cancelled,
}

/// Output of a locate pass: one intensity per pixel, row-major, `0` meaning
/// "no curve here".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurveRaster {
    width: usize,
    height: usize,
    grid_step: usize,
    intensity: Vec<u8>,
    /// One bit per coarse block, row-major; set when the block probe found
    /// the curve nearby.
    active_blocks: BitVec,
}

impl CurveRaster {
    fn empty(width: usize, height: usize, grid_step: usize) -> Self {
        Self {
            width,
            height,
            grid_step,
            intensity: vec![0; width * height],
            active_blocks: BitVec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn grid_step(&self) -> usize {
        self.grid_step
    }

    pub fn intensity(&self) -> &[u8] {
        &self.intensity
    }

    /// Intensity at a pixel relative to the graph rectangle.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        (x < self.width && y < self.height).then(|| self.intensity[y * self.width + x])
    }

    pub fn active_blocks(&self) -> &BitSlice {
        &self.active_blocks
    }

    /// `(x, y, intensity)` for every pixel the curve passes through.
    pub fn lit_pixels(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        self.intensity
            .iter()
            .enumerate()
            .filter(|(_, value)| **value > 0)
            .map(|(i, value)| (i % self.width, i / self.width, *value))
    }
}

/// Rasterize the zero set of `equation` over the mapper's viewport.
///
/// The rectangle is tiled into `grid_step × grid_step` blocks. Each block is
/// first probed once from its center; only blocks where that probe converges
/// are refined pixel by pixel.
pub fn locate(
    equation: &Equation,
    mapper: &CoordinateMapper,
    grid_step: usize,
    bindings: &Bindings,
) -> CurveRaster {
    let locator = Locator::new(equation, mapper, grid_step, bindings, None);
    match locator.run() {
        Ok(raster) => raster,
        Err(_) => locator.empty_raster(),
    }
}

/// Like [`locate`], but gives up as soon as `cancel` is set. The flag is
/// checked once per coarse block.
pub fn locate_with_cancel(
    equation: &Equation,
    mapper: &CoordinateMapper,
    grid_step: usize,
    bindings: &Bindings,
    cancel: &AtomicBool,
) -> Result<CurveRaster, LocateError> {
    Locator::new(equation, mapper, grid_step, bindings, Some(cancel)).run()
}

struct Locator<'a> {
    equation: &'a Equation,
    mapper: &'a CoordinateMapper,
    bindings: Bindings,
    grid_step: usize,
    width: usize,
    height: usize,
    base_tolerance: f64,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Locator<'a> {
    fn new(
        equation: &'a Equation,
        mapper: &'a CoordinateMapper,
        grid_step: usize,
        bindings: &Bindings,
        cancel: Option<&'a AtomicBool>,
    ) -> Self {
        let rect = mapper.rect();
        let pixel_step = mapper.scale(Axis::X);
        let (width, height) = (rect.width as usize, rect.height as usize);
        Self {
            equation,
            mapper,
            bindings: *bindings,
            // A block never needs to be larger than the whole rectangle.
            grid_step: grid_step.clamp(1, width.max(height).max(1)),
            width,
            height,
            base_tolerance: pixel_step * pixel_step * BASE_TOLERANCE_FACTOR,
            cancel,
        }
    }

    fn empty_raster(&self) -> CurveRaster {
        CurveRaster::empty(self.width, self.height, self.grid_step)
    }

    fn run(&self) -> Result<CurveRaster, LocateError> {
        let mut raster = self.empty_raster();
        if self.width == 0 || self.height == 0 {
            return Ok(raster);
        }
        let band_len = self.width * self.grid_step;

        #[cfg(feature = "rayon")]
        let bands: Vec<_> = raster
            .intensity
            .par_chunks_mut(band_len)
            .enumerate()
            .map(|(band, rows)| self.locate_band(band, rows))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let bands: Vec<_> = raster
            .intensity
            .chunks_mut(band_len)
            .enumerate()
            .map(|(band, rows)| self.locate_band(band, rows))
            .collect();

        for band in bands {
            raster.active_blocks.extend(band?);
        }
        tracing::debug!(
            width = self.width,
            height = self.height,
            grid_step = self.grid_step,
            active_blocks = raster.active_blocks.count_ones(),
            lit_pixels = raster.lit_pixels().count(),
            "located implicit curve"
        );
        Ok(raster)
    }

    /// Processes one band of `grid_step` pixel rows. `rows` is exactly the
    /// band's slice of the intensity buffer.
    fn locate_band(&self, band: usize, rows: &mut [u8]) -> Result<Vec<bool>, LocateError> {
        let top = band * self.grid_step;
        let band_height = rows.len() / self.width;
        let blocks = self.width.div_ceil(self.grid_step);
        let mut active = Vec::with_capacity(blocks);
        for block in 0..blocks {
            if self.cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(LocateError::Cancelled);
            }
            let left = block * self.grid_step;
            let block_width = self.grid_step.min(self.width - left);
            let hit = self.coarse_probe(left, top, block_width, band_height);
            if hit {
                for row in 0..band_height {
                    for col in left..left + block_width {
                        if let Some(score) = self.fine_probe(col, top + row) {
                            rows[row * self.width + col] = to_intensity(score);
                        }
                    }
                }
            }
            active.push(hit);
        }
        Ok(active)
    }

    fn coarse_probe(&self, left: usize, top: usize, width: usize, height: usize) -> bool {
        let cell = self.cell(
            left as f64 - 1.0,
            top as f64 - 1.0,
            (left + width) as f64 + 1.0,
            (top + height) as f64 + 1.0,
        );
        let tolerance = self.base_tolerance * COARSE_TOLERANCE_FACTOR;
        newton_probe(|x, y| self.value(x, y), &cell, COARSE_ITERATIONS, tolerance).is_some()
    }

    fn fine_probe(&self, col: usize, row: usize) -> Option<f64> {
        let (col, row) = (col as f64, row as f64);
        let cell = self.cell(col, row, col + 1.0, row + 1.0);
        newton_probe(|x, y| self.value(x, y), &cell, FINE_ITERATIONS, self.base_tolerance)
    }

    /// Data-space box covering the pixel rectangle `(px0, py0)-(px1, py1)`.
    fn cell(&self, px0: f64, py0: f64, px1: f64, py1: f64) -> ProbeCell {
        ProbeCell::new(
            self.mapper.pixel_to_data(Axis::X, px0, false),
            self.mapper.pixel_to_data(Axis::Y, py0, false),
            self.mapper.pixel_to_data(Axis::X, px1, false),
            self.mapper.pixel_to_data(Axis::Y, py1, false),
        )
    }

    fn value(&self, x: f64, y: f64) -> f64 {
        self.equation.implicit_value(x, y, &self.bindings)
    }
}

fn to_intensity(score: f64) -> u8 {
    (score.clamp(0.0, 1.0) * 255.0).round().to_u8().unwrap_or(0)
}

/// Axis-aligned data-space box a Newton probe must stay inside.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ProbeCell {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl ProbeCell {
    fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x_min: x0.min(x1),
            x_max: x0.max(x1),
            y_min: y0.min(y1),
            y_max: y0.max(y1),
        }
    }

    fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }

    /// 1 at the center of the box, falling linearly to 0 at the corners.
    fn score(&self, x: f64, y: f64) -> f64 {
        let half_diagonal = (self.x_max - self.x_min).hypot(self.y_max - self.y_min) / 2.0;
        if half_diagonal <= 0.0 {
            return 1.0;
        }
        let (cx, cy) = self.center();
        let distance = (x - cx).hypot(y - cy);
        ((half_diagonal - distance) / half_diagonal).clamp(0.0, 1.0)
    }
}

/// Newton's method on `f(x, y) = 0` from the center of `cell`, stepping
/// along the gradient. Returns the confidence score of the converged point,
/// or `None` if the iterate hits a NaN, a flat gradient, leaves the cell, or
/// runs out of iterations.
fn newton_probe(
    f: impl Fn(f64, f64) -> f64,
    cell: &ProbeCell,
    iterations: usize,
    tolerance: f64,
) -> Option<f64> {
    let (mut x, mut y) = cell.center();
    let hx = (cell.x_max - cell.x_min).abs() * DERIVATIVE_STEP;
    let hy = (cell.y_max - cell.y_min).abs() * DERIVATIVE_STEP;
    for _ in 0..iterations {
        let z = f(x, y);
        if z.is_nan() {
            return None;
        }
        if z.abs() < tolerance {
            return Some(cell.score(x, y));
        }
        let fx = (f(x + hx, y) - f(x - hx, y)) / (2.0 * hx);
        let fy = (f(x, y + hy) - f(x, y - hy)) / (2.0 * hy);
        if fx.is_nan() || fy.is_nan() {
            return None;
        }
        let gradient = fx * fx + fy * fy;
        if gradient < tolerance {
            return None;
        }
        x -= z * fx / gradient;
        y -= z * fy / gradient;
        if !cell.contains(x, y) {
            return None;
        }
    }
    None
}
