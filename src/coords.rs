//! Mapping between data space and the pixel rectangle of a graph, plus axis
//! tick generation.

/// Largest number of ticks [`get_ticks`] will return.
pub const MAX_TICKS: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Pixel rectangle the viewport is drawn into. `y` grows downward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    fn origin(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => f64::from(self.left),
            Axis::Y => f64::from(self.top),
        }
    }

    /// Extent along `axis`, at least one pixel.
    pub fn extent(&self, axis: Axis) -> f64 {
        let extent = match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
        };
        f64::from(extent.max(1))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The visible region of data space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x_start: f64,
    pub x_end: f64,
    pub y_start: f64,
    pub y_end: f64,
    pub x_log: bool,
    pub y_log: bool,
    /// Keep one data unit the same number of pixels on both axes.
    pub uniform_scale: bool,
}

impl Viewport {
    pub fn start(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x_start,
            Axis::Y => self.y_start,
        }
    }

    pub fn end(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x_end,
            Axis::Y => self.y_end,
        }
    }

    pub fn is_log(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.x_log,
            Axis::Y => self.y_log,
        }
    }

    pub fn span(&self, axis: Axis) -> f64 {
        self.end(axis) - self.start(axis)
    }

    pub fn center(&self, axis: Axis) -> f64 {
        (self.start(axis) + self.end(axis)) / 2.0
    }

    fn set_bounds(&mut self, axis: Axis, start: f64, end: f64) {
        match axis {
            Axis::X => {
                self.x_start = start;
                self.x_end = end;
            }
            Axis::Y => {
                self.y_start = start;
                self.y_end = end;
            }
        }
    }
}

/// Owns a [`Viewport`] and converts between its data coordinates and pixels.
///
/// Every mutating method restores the viewport invariants before returning:
/// `start <= end` on both axes, strictly positive bounds on log axes, and
/// scale factors that match the current bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateMapper {
    viewport: Viewport,
    rect: PixelRect,
    x_scale: f64,
    y_scale: f64,
    x_log_scale: f64,
    y_log_scale: f64,
}

impl CoordinateMapper {
    pub fn new(
        rect: PixelRect,
        (x_start, x_end): (f64, f64),
        (y_start, y_end): (f64, f64),
        uniform_scale: bool,
    ) -> Self {
        let mut mapper = Self {
            viewport: Viewport {
                x_start,
                x_end,
                y_start,
                y_end,
                x_log: false,
                y_log: false,
                uniform_scale,
            },
            rect,
            x_scale: 1.0,
            y_scale: 1.0,
            x_log_scale: 1.0,
            y_log_scale: 1.0,
        };
        mapper.recalculate();
        mapper
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn rect(&self) -> &PixelRect {
        &self.rect
    }

    /// Data units per pixel along `axis` (linear mapping).
    pub fn scale(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x_scale,
            Axis::Y => self.y_scale,
        }
    }

    /// Zoom around the middle of the viewport. Factors above one zoom out.
    pub fn zoom(&mut self, factor: f64) {
        let center_x = self.viewport.center(Axis::X);
        let center_y = self.viewport.center(Axis::Y);
        self.zoom_about(factor, center_x, center_y);
    }

    /// Zoom around a data-space point, which stays fixed on screen.
    pub fn zoom_about(&mut self, factor: f64, center_x: f64, center_y: f64) {
        for (axis, center) in [(Axis::X, center_x), (Axis::Y, center_y)] {
            let start = center - (center - self.viewport.start(axis)) * factor;
            let end = center + (self.viewport.end(axis) - center) * factor;
            self.viewport.set_bounds(axis, start, end);
        }
        self.recalculate();
    }

    /// Shift the viewport by a pixel offset.
    pub fn pan(&mut self, dx_pixels: f64, dy_pixels: f64) {
        for (axis, delta) in [(Axis::X, dx_pixels), (Axis::Y, dy_pixels)] {
            let shift = delta * self.scale(axis);
            let start = self.viewport.start(axis) + shift;
            let end = self.viewport.end(axis) + shift;
            self.viewport.set_bounds(axis, start, end);
        }
        self.recalculate();
    }

    /// Move the viewport so the data point under a pixel (relative to the
    /// rectangle) becomes its center. Spans are unchanged.
    pub fn recenter(&mut self, pixel_x: f64, pixel_y: f64) {
        for (axis, pixel) in [(Axis::X, pixel_x), (Axis::Y, pixel_y)] {
            let center = self.pixel_to_data(axis, pixel, false);
            let half_span = self.viewport.span(axis) / 2.0;
            self.viewport.set_bounds(axis, center - half_span, center + half_span);
        }
        self.recalculate();
    }

    /// Fit the viewport around `points`, scaling the bounding box by
    /// `border_factor` about its middle (`1.1` leaves a 5% margin per side).
    /// Non-finite points are ignored; with nothing left this is a no-op.
    pub fn fit_to_points(&mut self, points: &[Point], border_factor: f64) {
        let mut finite = points.iter().filter(|p| p.x.is_finite() && p.y.is_finite());
        let Some(first) = finite.next() else {
            tracing::debug!("fit_to_points called without finite points");
            return;
        };
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (first.x, first.x, first.y, first.y);
        for p in finite {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }
        for (axis, min, max) in [(Axis::X, x_min, x_max), (Axis::Y, y_min, y_max)] {
            let mid = (min + max) / 2.0;
            let half_span = border_factor * (max - min) / 2.0;
            self.viewport.set_bounds(axis, mid - half_span, mid + half_span);
        }
        self.recalculate();
    }

    /// Turn logarithmic mapping on or off for one axis.
    pub fn set_log(&mut self, axis: Axis, log: bool) {
        match axis {
            Axis::X => self.viewport.x_log = log,
            Axis::Y => self.viewport.y_log = log,
        }
        self.recalculate();
    }

    pub fn set_uniform_scale(&mut self, uniform_scale: bool) {
        self.viewport.uniform_scale = uniform_scale;
        self.recalculate();
    }

    /// Absolute pixel coordinate of a data value.
    pub fn data_to_pixel(&self, axis: Axis, value: f64) -> f64 {
        let origin = self.rect.origin(axis);
        let vp = &self.viewport;
        match (axis, vp.is_log(axis)) {
            (Axis::X, false) => origin + (value - vp.x_start) / self.x_scale,
            (Axis::X, true) => origin + (value.ln() - vp.x_start.ln()) / self.x_log_scale,
            (Axis::Y, false) => origin + (vp.y_end - value) / self.y_scale,
            (Axis::Y, true) => origin + (vp.y_end.ln() - value.ln()) / self.y_log_scale,
        }
    }

    /// Data value under a pixel. With `use_corner` the pixel is an absolute
    /// coordinate; otherwise it is relative to the rectangle's corner.
    pub fn pixel_to_data(&self, axis: Axis, pixel: f64, use_corner: bool) -> f64 {
        let offset = if use_corner {
            pixel - self.rect.origin(axis)
        } else {
            pixel
        };
        let vp = &self.viewport;
        match (axis, vp.is_log(axis)) {
            (Axis::X, false) => vp.x_start + offset * self.x_scale,
            (Axis::X, true) => (vp.x_start.ln() + offset * self.x_log_scale).exp(),
            (Axis::Y, false) => vp.y_end - offset * self.y_scale,
            (Axis::Y, true) => (vp.y_end.ln() - offset * self.y_log_scale).exp(),
        }
    }

    pub fn pixel_to_point(&self, pixel_x: f64, pixel_y: f64, use_corner: bool) -> Point {
        Point::new(
            self.pixel_to_data(Axis::X, pixel_x, use_corner),
            self.pixel_to_data(Axis::Y, pixel_y, use_corner),
        )
    }

    /// Gridline ticks for one axis, aiming at a major division roughly every
    /// 200 pixels.
    pub fn ticks(&self, axis: Axis) -> Vec<Tick> {
        get_ticks(
            self.viewport.start(axis),
            self.viewport.span(axis),
            self.rect.extent(axis) / 200.0,
        )
    }

    fn recalculate(&mut self) {
        let vp = &mut self.viewport;
        if vp.x_log {
            vp.x_start = positive_or_one(vp.x_start);
            vp.x_end = positive_or_one(vp.x_end);
        }
        if vp.y_log {
            vp.y_start = positive_or_one(vp.y_start);
            vp.y_end = positive_or_one(vp.y_end);
        }
        if vp.x_start > vp.x_end {
            std::mem::swap(&mut vp.x_start, &mut vp.x_end);
        }
        if vp.y_start > vp.y_end {
            std::mem::swap(&mut vp.y_start, &mut vp.y_end);
        }

        let width = self.rect.extent(Axis::X);
        let height = self.rect.extent(Axis::Y);
        self.x_scale = non_degenerate(vp.x_end - vp.x_start) / width;
        self.y_scale = non_degenerate(vp.y_end - vp.y_start) / height;

        if vp.uniform_scale && !vp.x_log && !vp.y_log {
            let scale = self.x_scale.max(self.y_scale);
            self.x_scale = scale;
            self.y_scale = scale;
            let x_mid = vp.center(Axis::X);
            let x_half = scale * width / 2.0;
            vp.set_bounds(Axis::X, x_mid - x_half, x_mid + x_half);
            let y_mid = vp.center(Axis::Y);
            let y_half = scale * height / 2.0;
            vp.set_bounds(Axis::Y, y_mid - y_half, y_mid + y_half);
        }

        self.x_log_scale = non_degenerate(vp.x_end.ln() - vp.x_start.ln()) / width;
        self.y_log_scale = non_degenerate(vp.y_end.ln() - vp.y_start.ln()) / height;

        tracing::trace!(
            x_start = vp.x_start,
            x_end = vp.x_end,
            y_start = vp.y_start,
            y_end = vp.y_end,
            x_scale = self.x_scale,
            y_scale = self.y_scale,
            "viewport updated"
        );
    }
}

fn positive_or_one(value: f64) -> f64 {
    if value <= 0.0 {
        1.0
    } else {
        value
    }
}

/// Zero (or NaN) spans would make the scale factors useless.
fn non_degenerate(span: f64) -> f64 {
    if span > 0.0 {
        span
    } else {
        1e-9
    }
}

/// One gridline position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub is_major: bool,
}

/// Ticks covering `[start, start + span]`.
///
/// `span / pixel_ratio` is the raw spacing; it is rounded to a "nice" minor
/// interval, and ticks falling on a multiple of the matching major interval
/// are flagged as major.
pub fn get_ticks(start: f64, span: f64, pixel_ratio: f64) -> Vec<Tick> {
    let raw = span / pixel_ratio;
    if !start.is_finite() || !(raw.is_finite() && raw > 0.0) {
        return Vec::new();
    }
    let minor = tick_interval(raw, false);
    let major = tick_interval(raw, true);
    let end = start + span;
    let first = (start / minor).ceil() * minor;

    let mut ticks = Vec::new();
    for i in 0..MAX_TICKS {
        let value = round_to_8(first + i as f64 * minor);
        if value > end {
            break;
        }
        let ratio = value / major;
        ticks.push(Tick {
            value,
            is_major: (ratio.round() - ratio).abs() < 0.001,
        });
    }
    ticks
}

fn round_to_8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

fn tick_interval(raw: f64, major: bool) -> f64 {
    let pow10 = 10f64.powf(raw.log10().floor());
    let mantissa = raw / pow10;
    let (minor_step, major_step) = if mantissa >= 5.0 {
        (1.0, 5.0)
    } else if mantissa >= 3.0 {
        (0.2, 2.0)
    } else if mantissa >= 1.4 {
        (0.2, 0.5)
    } else if mantissa >= 0.8 {
        (0.1, 0.5)
    } else {
        (0.1, 0.2)
    };
    if major {
        major_step * pow10
    } else {
        minor_step * pow10
    }
}
