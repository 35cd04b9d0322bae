//! Map viewport
//!
//! The configuration store keeps whatever zoom and center it is given; the
//! viewport is where they get clamped to `min_zoom..=max_zoom` and to the
//! max bounds before anything is drawn.

use crate::config::MapConfig;
use crate::geometry::{Bounds, Point};

/// Center and zoom of the visible part of the image.
///
/// Screen coordinates are relative to the middle of the map area, x to the
/// right and y down, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Point,
    pub zoom: f64,
}

/// Clamp `zoom` into the configured range (tolerating swapped bounds).
pub fn clamp_zoom(zoom: f64, config: &MapConfig) -> f64 {
    let lo = config.min_zoom.min(config.max_zoom);
    let hi = config.min_zoom.max(config.max_zoom);
    zoom.clamp(lo, hi)
}

/// Pull `value` back towards `[lo, hi]`. Viscosity 1 is a hard wall, 0 lets
/// it go anywhere.
fn resist(value: f64, lo: f64, hi: f64, viscosity: f64) -> f64 {
    let keep = 1.0 - viscosity.clamp(0.0, 1.0);
    if value < lo {
        lo + (value - lo) * keep
    } else if value > hi {
        hi + (value - hi) * keep
    } else {
        value
    }
}

impl Viewport {
    /// Viewport at the configured center and zoom, already constrained.
    pub fn from_config(config: &MapConfig, image_bounds: Option<Bounds>) -> Self {
        let mut viewport = Self {
            center: config.center,
            zoom: config.zoom,
        };
        viewport.constrain(config, image_bounds);
        viewport
    }

    /// Pixels on screen per image pixel
    pub fn scale(&self) -> f64 {
        self.zoom.exp2()
    }

    /// Clamp zoom, and the center to `max_bounds` (or `fallback` when the
    /// config has none).
    pub fn constrain(&mut self, config: &MapConfig, fallback: Option<Bounds>) {
        self.zoom = clamp_zoom(self.zoom, config);
        if let Some(bounds) = config.max_bounds.or(fallback) {
            let viscosity = config.max_bounds_viscosity;
            self.center = Point::new(
                resist(self.center.x, bounds.min.x, bounds.max.x, viscosity),
                resist(self.center.y, bounds.min.y, bounds.max.y, viscosity),
            );
        }
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        let s = self.scale();
        Point::new((p.x - self.center.x) * s, (p.y - self.center.y) * s)
    }

    pub fn screen_to_world(&self, p: Point) -> Point {
        let s = self.scale();
        Point::new(p.x / s + self.center.x, p.y / s + self.center.y)
    }

    /// Move by a screen-space delta (dragging the map right moves the center left).
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let s = self.scale();
        self.center = Point::new(self.center.x - dx / s, self.center.y - dy / s);
    }

    /// Zoom by `delta` levels keeping the world point under `anchor` in place.
    pub fn zoom_at(&mut self, delta: f64, anchor: Point, config: &MapConfig) {
        let world = self.screen_to_world(anchor);
        self.zoom = clamp_zoom(self.zoom + delta, config);
        let s = self.scale();
        self.center = Point::new(world.x - anchor.x / s, world.y - anchor.y / s);
    }

    /// Largest zoom at which `bounds` fits a `width` x `height` area, clamped.
    pub fn fit_zoom(bounds: Bounds, width: f64, height: f64, config: &MapConfig) -> f64 {
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 || width <= 0.0 || height <= 0.0 {
            return clamp_zoom(config.zoom, config);
        }
        let ratio = (width / bounds.width()).min(height / bounds.height());
        clamp_zoom(ratio.log2(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_zoom_is_clamped_by_consumer() {
        let mut config = MapConfig::full_defaults();
        config.zoom = 10.0;
        let viewport = Viewport::from_config(&config, None);
        assert_eq!(viewport.zoom, config.max_zoom);
        // The config itself is untouched
        assert_eq!(config.zoom, 10.0);

        config.min_zoom = 2.0;
        config.max_zoom = -2.0;
        assert_eq!(clamp_zoom(5.0, &config), 2.0);
    }

    #[test]
    fn test_center_viscosity() {
        let mut config = MapConfig::full_defaults();
        config.max_bounds = Some(Bounds::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0)));
        config.center = Point::new(150.0, -20.0);

        let hard = Viewport::from_config(&config, None);
        assert_eq!(hard.center, Point::new(100.0, 0.0));

        config.max_bounds_viscosity = 0.5;
        let soft = Viewport::from_config(&config, None);
        assert_eq!(soft.center, Point::new(125.0, -10.0));
    }

    #[test]
    fn test_fallback_bounds_used_without_max_bounds() {
        let mut config = MapConfig::full_defaults();
        config.center = Point::new(5000.0, 5000.0);
        let image = Bounds::new(Point::new(0.0, 0.0), Point::new(800.0, 600.0));
        let viewport = Viewport::from_config(&config, Some(image));
        assert_eq!(viewport.center, Point::new(800.0, 600.0));
    }

    #[test]
    fn test_screen_world_conversion() {
        let viewport = Viewport {
            center: Point::new(100.0, 100.0),
            zoom: 1.0,
        };
        let screen = viewport.world_to_screen(Point::new(110.0, 90.0));
        assert_eq!(screen, Point::new(20.0, -20.0));
        assert_eq!(viewport.screen_to_world(screen), Point::new(110.0, 90.0));
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let config = MapConfig::full_defaults();
        let mut viewport = Viewport {
            center: Point::new(0.0, 0.0),
            zoom: 0.0,
        };
        let anchor = Point::new(40.0, -30.0);
        let before = viewport.screen_to_world(anchor);
        viewport.zoom_at(1.0, anchor, &config);
        let after = viewport.screen_to_world(anchor);
        assert!(close(before.x, after.x) && close(before.y, after.y));
        assert_eq!(viewport.zoom, 1.0);
    }

    #[test]
    fn test_fit_zoom() {
        let config = MapConfig::full_defaults();
        let bounds = Bounds::new(Point::new(0.0, 0.0), Point::new(1000.0, 500.0));
        assert!(close(Viewport::fit_zoom(bounds, 500.0, 500.0, &config), -1.0));
    }
}
