//! View state and the fractal <-> pixel coordinate mapping.
//!
//! Pixel space is the fixed raster the histograms are indexed by, with its
//! origin at the bottom-left corner. The view maps the raster center to
//! `center` in the fractal plane, rotated by `theta`, with half-extents
//! `scale_x` / `scale_y`.

use crate::{ConfigError, ConsistencyError, Point};
use serde::Serialize;

const TRIG_TOLERANCE: f64 = 1e-9;

/// Rejects view parameters no raster mapping can be built from.
pub fn check_view(scale: f64, center: Point, theta: f64) -> Result<(), ConfigError> {
    if !(scale > 0.0 && scale.is_finite()) {
        return Err(ConfigError::Scale(scale));
    }
    if !(center.x.is_finite() && center.y.is_finite()) {
        return Err(ConfigError::Center {
            x: center.x,
            y: center.y,
        });
    }
    if !theta.is_finite() {
        return Err(ConfigError::Theta(theta));
    }
    Ok(())
}

/// A complete view of the fractal plane. `sin_theta` and `cos_theta` are
/// derived from `theta` on every mutation and cannot be set directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewState {
    scale_x: f64,
    scale_y: f64,
    center_x: f64,
    center_y: f64,
    theta: f64,
    sin_theta: f64,
    cos_theta: f64,
    raster_width: u32,
    raster_height: u32,
}

impl ViewState {
    /// `scale` is the vertical half-extent; the horizontal one follows the
    /// raster aspect ratio.
    pub fn new(
        scale: f64,
        center: Point,
        theta: f64,
        raster_width: u32,
        raster_height: u32,
    ) -> Self {
        let mut view = Self {
            scale_x: 0.0,
            scale_y: 0.0,
            center_x: center.x,
            center_y: center.y,
            theta: 0.0,
            sin_theta: 0.0,
            cos_theta: 1.0,
            raster_width,
            raster_height,
        };
        view.set_scale(scale);
        view.set_theta(theta);
        view
    }

    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    /// Vertical half-extent, the value `set_view` takes.
    pub fn scale(&self) -> f64 {
        self.scale_y
    }

    pub fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn sin_theta(&self) -> f64 {
        self.sin_theta
    }

    pub fn cos_theta(&self) -> f64 {
        self.cos_theta
    }

    pub fn raster_width(&self) -> u32 {
        self.raster_width
    }

    pub fn raster_height(&self) -> u32 {
        self.raster_height
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.raster_width as f64 / self.raster_height as f64
    }

    fn set_scale(&mut self, scale: f64) {
        self.scale_y = scale;
        self.scale_x = scale * self.aspect_ratio();
    }

    fn set_center(&mut self, center: Point) {
        self.center_x = center.x;
        self.center_y = center.y;
    }

    fn set_theta(&mut self, theta: f64) {
        self.theta = theta;
        let (sin_theta, cos_theta) = theta.sin_cos();
        self.sin_theta = sin_theta;
        self.cos_theta = cos_theta;
    }

    /// Checks that every field is finite and the cached rotation matches
    /// `theta`.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        let fields = [
            self.scale_x,
            self.scale_y,
            self.center_x,
            self.center_y,
            self.theta,
        ];
        if fields.iter().any(|v| !v.is_finite()) || self.scale_x <= 0.0 || self.scale_y <= 0.0 {
            return Err(ConsistencyError::DegenerateView {
                scale_x: self.scale_x,
                scale_y: self.scale_y,
                center_x: self.center_x,
                center_y: self.center_y,
                theta: self.theta,
            });
        }
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        if (sin_theta - self.sin_theta).abs() > TRIG_TOLERANCE
            || (cos_theta - self.cos_theta).abs() > TRIG_TOLERANCE
        {
            return Err(ConsistencyError::RotationDesync {
                theta: self.theta,
                sin_theta: self.sin_theta,
                cos_theta: self.cos_theta,
            });
        }
        Ok(())
    }
}

/// Standard 2D rotation of `point` about the origin.
pub fn rotate(point: Point, sin_theta: f64, cos_theta: f64) -> Point {
    Point::new(
        point.x * cos_theta - point.y * sin_theta,
        point.x * sin_theta + point.y * cos_theta,
    )
}

/// Fractal plane -> continuous raster coordinates.
pub fn fractal_to_pixel(point: Point, view: &ViewState) -> Point {
    let local = rotate(point - view.center(), -view.sin_theta, view.cos_theta);
    let unit = Point::new(local.x / view.scale_x, local.y / view.scale_y);
    Point::new(
        (unit.x + 1.0) * 0.5 * view.raster_width as f64,
        (unit.y + 1.0) * 0.5 * view.raster_height as f64,
    )
}

/// Continuous raster coordinates -> fractal plane. Exact inverse of
/// [`fractal_to_pixel`].
pub fn pixel_to_fractal(point: Point, view: &ViewState) -> Point {
    let unit = Point::new(
        point.x / view.raster_width as f64 * 2.0 - 1.0,
        point.y / view.raster_height as f64 * 2.0 - 1.0,
    );
    let local = Point::new(unit.x * view.scale_x, unit.y * view.scale_y);
    rotate(local, view.sin_theta, view.cos_theta) + view.center()
}

/// The current view plus an undo stack of earlier views.
///
/// Every mutation pushes the previous state and bumps `generation`, which
/// the renderer compares against the generation last written to its kernels.
#[derive(Debug, Clone)]
pub struct ViewHistory {
    current: ViewState,
    stack: Vec<ViewState>,
    generation: u64,
}

impl ViewHistory {
    pub fn new(initial: ViewState) -> Self {
        Self {
            current: initial,
            stack: Vec::new(),
            generation: 0,
        }
    }

    pub fn current(&self) -> &ViewState {
        &self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Saves the current view on the undo stack.
    pub fn push_view(&mut self) {
        self.stack.push(self.current);
    }

    /// Restores the most recently pushed view. Returns false when there is
    /// nothing to undo.
    pub fn pop_view(&mut self) -> bool {
        match self.stack.pop() {
            Some(previous) => {
                self.current = previous;
                self.generation += 1;
                true
            }
            None => false,
        }
    }

    fn replace(&mut self, next: ViewState) {
        self.push_view();
        self.current = next;
        self.generation += 1;
    }

    /// Replaces scale, center and rotation. An identical view is not pushed
    /// again but still counts as a change so the caller resets. Invalid
    /// parameters leave the history untouched.
    pub fn set_view(&mut self, scale: f64, center: Point, theta: f64) -> Result<(), ConfigError> {
        check_view(scale, center, theta)?;
        let next = ViewState::new(
            scale,
            center,
            theta,
            self.current.raster_width,
            self.current.raster_height,
        );
        if next == self.current {
            self.generation += 1;
        } else {
            self.replace(next);
        }
        Ok(())
    }

    /// Turns a drag between two raster points into a new view: the drag start
    /// becomes the center, the drag length in the fractal plane becomes the
    /// scale and the drag direction becomes the rotation. A zero-length drag
    /// is ignored and returns false.
    pub fn select_region(&mut self, drag_start: Point, drag_end: Point) -> bool {
        let start = pixel_to_fractal(drag_start, &self.current);
        let end = pixel_to_fractal(drag_end, &self.current);
        let drag = end - start;
        let scale = drag.length();
        if scale == 0.0 || !scale.is_finite() {
            log::warn!("Ignoring degenerate region selection at {drag_start:?}");
            return false;
        }

        let mut next = self.current;
        next.set_scale(scale);
        next.set_center(start);
        next.set_theta(drag.angle());
        self.replace(next);
        true
    }

    /// Moves the view so the content at `delta` pixels from the raster center
    /// ends up there.
    pub fn pan(&mut self, delta: Point) -> Result<(), ConfigError> {
        if !(delta.x.is_finite() && delta.y.is_finite()) {
            return Err(ConfigError::PanDelta {
                x: delta.x,
                y: delta.y,
            });
        }
        let origin = Point::new(
            self.current.raster_width as f64 * 0.5,
            self.current.raster_height as f64 * 0.5,
        );
        let center = pixel_to_fractal(origin + delta, &self.current);
        check_view(self.current.scale_y, center, self.current.theta)?;
        let mut next = self.current;
        next.set_center(center);
        self.replace(next);
        Ok(())
    }

    /// Multiplies the magnification; `factor > 1` zooms in.
    pub fn zoom(&mut self, factor: f64) -> Result<(), ConfigError> {
        if !(factor > 0.0 && factor.is_finite()) {
            return Err(ConfigError::ZoomFactor(factor));
        }
        let scale = self.current.scale_y / factor;
        check_view(scale, self.current.center(), self.current.theta)?;
        let mut next = self.current;
        next.set_scale(scale);
        self.replace(next);
        Ok(())
    }

    /// Adds `delta` radians to the rotation.
    pub fn rotate_by(&mut self, delta: f64) -> Result<(), ConfigError> {
        let theta = self.current.theta + delta;
        check_view(self.current.scale_y, self.current.center(), theta)?;
        let mut next = self.current;
        next.set_theta(theta);
        self.replace(next);
        Ok(())
    }
}
