//! Screen-space presentation of the fixed raster.
//!
//! The window can be resized, zoomed and panned independently of the view;
//! none of that changes what is computed, only where raster pixels land on
//! screen. Screen origin is top-left, raster origin is bottom-left.

use crate::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    pub raster_width: u32,
    pub raster_height: u32,
    pub window_width: u32,
    pub window_height: u32,
    /// Display magnification; 1.0 shows the whole raster across the window.
    pub zoom: f64,
    /// Raster position (in raster-size units) shown at the window's
    /// bottom-left corner.
    pub pan_x: f64,
    pub pan_y: f64,
}

impl WindowSettings {
    /// A window showing the raster one-to-one.
    pub fn new(raster_width: u32, raster_height: u32) -> Self {
        Self {
            raster_width,
            raster_height,
            window_width: raster_width,
            window_height: raster_height,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }

    pub fn resize(&mut self, window_width: u32, window_height: u32) {
        self.window_width = window_width;
        self.window_height = window_height;
    }

    pub fn pixel_to_screen(&self, pixel: Point) -> Point {
        let u = pixel.x / self.raster_width as f64 - self.pan_x;
        let v = pixel.y / self.raster_height as f64 - self.pan_y;
        Point::new(
            u * self.zoom * self.window_width as f64,
            self.window_height as f64 - v * self.zoom * self.window_height as f64,
        )
    }

    pub fn screen_to_pixel(&self, screen: Point) -> Point {
        let u = screen.x / (self.window_width as f64 * self.zoom);
        let v = (self.window_height as f64 - screen.y) / (self.window_height as f64 * self.zoom);
        Point::new(
            (u + self.pan_x) * self.raster_width as f64,
            (v + self.pan_y) * self.raster_height as f64,
        )
    }

    /// Zooms the display by `factor`, keeping the raster point under
    /// `anchor` (screen coordinates) fixed.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        let fixed = self.screen_to_pixel(anchor);
        self.zoom *= factor;
        let drifted = self.screen_to_pixel(anchor);
        self.pan_x += (fixed.x - drifted.x) / self.raster_width as f64;
        self.pan_y += (fixed.y - drifted.y) / self.raster_height as f64;
    }

    /// Drags the displayed raster by a screen-space delta.
    pub fn pan_by(&mut self, delta: Point) {
        self.pan_x -= delta.x / (self.window_width as f64 * self.zoom);
        self.pan_y += delta.y / (self.window_height as f64 * self.zoom);
    }

    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }
}
