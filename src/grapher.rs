//! A stateful front end tying the parser, the coordinate mapper and the
//! curve locator together, the way an interactive graphing window drives
//! them.

use std::sync::atomic::AtomicBool;

use crate::coords::{Axis, CoordinateMapper, PixelRect, Point, Tick};
use crate::locate::{locate, locate_with_cancel, CurveRaster, LocateError};
use crate::parse::ParseError;
use crate::{AngleMode, Bindings, Equation, EquationForm};

/// Initial view and evaluation settings for a [`Grapher`].
#[derive(Clone, Debug, PartialEq)]
pub struct GrapherConfig {
    pub rect: PixelRect,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub uniform_scale: bool,
    pub angle_mode: AngleMode,
    /// Side of a coarse locator block, in pixels.
    pub grid_step: usize,
    /// Variable bindings in effect before any [`Grapher::set_variable`].
    pub variables: Vec<(char, f64)>,
}

impl Default for GrapherConfig {
    fn default() -> Self {
        Self {
            rect: PixelRect::new(0, 0, 880, 660),
            x_range: (-5.0, 5.0),
            y_range: (-3.0, 3.0),
            uniform_scale: true,
            angle_mode: AngleMode::Radians,
            grid_step: 4,
            variables: vec![('a', 1.0)],
        }
    }
}

/// Graph state of one equation window: the equation, its variable bindings
/// and the current view.
#[derive(Clone, Debug)]
pub struct Grapher {
    config: GrapherConfig,
    mapper: CoordinateMapper,
    bindings: Bindings,
    text: String,
    equation: Equation,
    diagnostics: Vec<ParseError>,
    /// Accumulated zoom of the current slider gesture.
    slider_zoom: f64,
}

impl Grapher {
    pub fn new(config: GrapherConfig) -> Self {
        let mapper = default_mapper(&config);
        let bindings = config.variables.iter().copied().collect();
        let parsed = Equation::parse("", config.angle_mode);
        Self {
            config,
            mapper,
            bindings,
            text: String::new(),
            equation: parsed.tree,
            diagnostics: parsed.diagnostics,
            slider_zoom: 1.0,
        }
    }

    pub fn config(&self) -> &GrapherConfig {
        &self.config
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn equation(&self) -> &Equation {
        &self.equation
    }

    pub fn equation_text(&self) -> &str {
        &self.text
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn diagnostics(&self) -> &[ParseError] {
        &self.diagnostics
    }

    /// Replace the equation. The text is reparsed from scratch; whatever could
    /// not be parsed is returned, and the rest is still graphed.
    pub fn set_equation_text(&mut self, raw: &str) -> &[ParseError] {
        let parsed = Equation::parse(raw, self.config.angle_mode);
        if !parsed.is_clean() {
            tracing::debug!(raw, diagnostics = ?parsed.diagnostics, "equation has problems");
        }
        self.text = raw.to_owned();
        self.equation = parsed.tree;
        self.diagnostics = parsed.diagnostics;
        &self.diagnostics
    }

    /// Bind a single-letter variable such as `a`. Other names are ignored.
    pub fn set_variable(&mut self, name: char, value: f64) {
        if !name.is_ascii_lowercase() {
            tracing::warn!(%name, "only variables a-z can be bound");
            return;
        }
        self.bindings.set(name, value);
    }

    pub fn pan(&mut self, dx_pixels: f64, dy_pixels: f64) {
        self.mapper.pan(dx_pixels, dy_pixels);
    }

    pub fn zoom(&mut self, factor: f64) {
        self.mapper.zoom(factor);
    }

    pub fn zoom_about(&mut self, factor: f64, center_x: f64, center_y: f64) {
        self.mapper.zoom_about(factor, center_x, center_y);
    }

    pub fn recenter(&mut self, pixel_x: f64, pixel_y: f64) {
        self.mapper.recenter(pixel_x, pixel_y);
    }

    pub fn fit_to_points(&mut self, points: &[Point], border_factor: f64) {
        self.mapper.fit_to_points(points, border_factor);
    }

    pub fn set_log(&mut self, axis: Axis, log: bool) {
        self.mapper.set_log(axis, log);
    }

    /// Apply a zoom slider position. `value` is the slider position in
    /// `[0, 1]`; the slider sits at `0.5` when the view is untouched, and
    /// moving it zooms relative to where the current gesture started.
    pub fn set_zoom_slider(&mut self, value: f64) {
        let factor = (value * 2.0 + 0.01) / self.slider_zoom;
        if !factor.is_finite() || factor <= 0.0 {
            tracing::warn!(value, factor, "ignoring zoom slider position");
            return;
        }
        self.slider_zoom *= factor;
        self.mapper.zoom(factor);
    }

    /// End a slider gesture; the next one starts from the current view.
    pub fn reset_zoom_slider(&mut self) {
        self.slider_zoom = 1.0;
    }

    /// Back to the configured view. Log modes are switched off.
    pub fn reset_view(&mut self) {
        self.mapper = default_mapper(&self.config);
        self.slider_zoom = 1.0;
        tracing::debug!(viewport = ?self.mapper.viewport(), "view reset");
    }

    pub fn x_ticks(&self) -> Vec<Tick> {
        self.mapper.ticks(Axis::X)
    }

    pub fn y_ticks(&self) -> Vec<Tick> {
        self.mapper.ticks(Axis::Y)
    }

    pub fn locate_curve(&self) -> CurveRaster {
        locate(
            &self.equation,
            &self.mapper,
            self.config.grid_step,
            &self.bindings,
        )
    }

    pub fn locate_curve_with_cancel(
        &self,
        cancel: &AtomicBool,
    ) -> Result<CurveRaster, LocateError> {
        locate_with_cancel(
            &self.equation,
            &self.mapper,
            self.config.grid_step,
            &self.bindings,
            cancel,
        )
    }

    /// `y` at `x` for an explicit equation, `None` for an implicit one.
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        match self.equation.form {
            EquationForm::Explicit => {
                let bindings = self.bindings.with('x', x);
                Some(self.equation.expression.evaluate(&bindings))
            }
            EquationForm::Implicit => None,
        }
    }
}

impl Default for Grapher {
    fn default() -> Self {
        Self::new(GrapherConfig::default())
    }
}

fn default_mapper(config: &GrapherConfig) -> CoordinateMapper {
    CoordinateMapper::new(
        config.rect,
        config.x_range,
        config.y_range,
        config.uniform_scale,
    )
}
