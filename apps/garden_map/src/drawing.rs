//! Drawing module for the garden map
//!
//! Renders the base image, region polygons, plant markers, labels and the
//! polygon being drawn, in the order the layer composition dictates.

use map_core::layers::ComposedLayer;
use map_core::plant::cluster_positions;
use map_core::viewport::Viewport;
use map_core::{ImageBounds, InteractionMode, Point};
use nannou::prelude::*;
use nannou::wgpu;

use crate::overlays::{MapLabel, Overlay, PlantMarker};
use crate::surface::ShapeCanvas;
use crate::Toast;

/// Screen cell size used to group markers
pub const CLUSTER_CELL_PX: f64 = 48.0;
const MARKER_RADIUS: f32 = 6.0;

/// Color palette
#[allow(dead_code)]
pub mod colors {
    use nannou::prelude::*;

    /// Area outside the image
    pub const BACKGROUND: Srgb<u8> = Srgb {
        red: 232,
        green: 236,
        blue: 228,
        standard: std::marker::PhantomData,
    };

    /// Frame shown before the image arrives
    pub const IMAGE_PLACEHOLDER: Srgb<u8> = Srgb {
        red: 205,
        green: 214,
        blue: 198,
        standard: std::marker::PhantomData,
    };

    /// Default region stroke and fill (#3388ff)
    pub const REGION_DEFAULT: Srgb<u8> = Srgb {
        red: 51,
        green: 136,
        blue: 255,
        standard: std::marker::PhantomData,
    };

    /// Selected region outline
    pub const SELECTION: Srgb<u8> = Srgb {
        red: 255,
        green: 170,
        blue: 0,
        standard: std::marker::PhantomData,
    };

    /// Polygon being drawn
    pub const DRAFT_LINE: Srgb<u8> = Srgb {
        red: 220,
        green: 60,
        blue: 60,
        standard: std::marker::PhantomData,
    };

    /// Plant marker fill
    pub const PLANT: Srgb<u8> = Srgb {
        red: 46,
        green: 125,
        blue: 50,
        standard: std::marker::PhantomData,
    };

    /// Cluster bubble fill
    pub const CLUSTER: Srgb<u8> = Srgb {
        red: 110,
        green: 170,
        blue: 60,
        standard: std::marker::PhantomData,
    };

    pub const LABEL_TEXT: Srgb<u8> = Srgb {
        red: 25,
        green: 35,
        blue: 25,
        standard: std::marker::PhantomData,
    };

    pub const WHITE: Srgb<u8> = Srgb {
        red: 255,
        green: 255,
        blue: 255,
        standard: std::marker::PhantomData,
    };

    /// Parse `#rrggbb`; anything else yields `None`.
    pub fn parse_hex(value: &str) -> Option<Srgb<u8>> {
        let hex = value.trim().strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Srgb::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn with_alpha(color: Srgb<u8>, alpha: f32) -> Srgba<u8> {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        srgba(color.red, color.green, color.blue, a)
    }
}

/// Maps image coordinates into the map rect and back
#[derive(Debug, Clone, Copy)]
pub struct MapProjection {
    pub rect: Rect,
    pub viewport: Viewport,
}

impl MapProjection {
    pub fn new(rect: Rect, viewport: Viewport) -> Self {
        Self { rect, viewport }
    }

    pub fn to_screen(&self, p: Point) -> Point2 {
        let s = self.viewport.world_to_screen(p);
        pt2(self.rect.x() + s.x as f32, self.rect.y() - s.y as f32)
    }

    pub fn to_world(&self, pos: Point2) -> Point {
        let local = Point::new(
            (pos.x - self.rect.x()) as f64,
            (self.rect.y() - pos.y) as f64,
        );
        self.viewport.screen_to_world(local)
    }

    /// Screen pixels converted to image units at the current zoom
    pub fn world_len(&self, pixels: f64) -> f64 {
        pixels / self.viewport.scale()
    }
}

/// Everything the map view reads
pub struct MapScene<'a> {
    pub projection: MapProjection,
    pub layers: &'a [ComposedLayer<Overlay>],
    pub image: Option<ImageBounds>,
    pub texture: Option<&'a wgpu::Texture>,
    pub canvas: &'a ShapeCanvas,
    pub mode: InteractionMode,
    pub hover: Option<Point>,
}

pub fn draw_map(draw: &Draw, scene: &MapScene<'_>) {
    for layer in scene.layers {
        match layer {
            ComposedLayer::Imagery => draw_imagery(draw, scene),
            ComposedLayer::Regions => draw_regions(draw, scene),
            ComposedLayer::Plugin { layer, .. } => match layer {
                Overlay::Markers { markers, clustered } => {
                    draw_markers(draw, &scene.projection, markers, *clustered)
                }
                Overlay::Labels(labels) => draw_labels(draw, &scene.projection, labels),
            },
        }
    }
    // The polygon under construction is drawn whatever layers are visible
    draw_in_progress(draw, scene);
}

fn draw_imagery(draw: &Draw, scene: &MapScene<'_>) {
    let Some(image) = scene.image else {
        return;
    };
    let bounds = image.bounds();
    let center = scene.projection.to_screen(bounds.center());
    let scale = scene.projection.viewport.scale() as f32;
    let (w, h) = (bounds.width() as f32 * scale, bounds.height() as f32 * scale);

    match scene.texture {
        Some(texture) => {
            draw.texture(texture).xy(center).w_h(w, h);
        }
        None => {
            draw.rect().xy(center).w_h(w, h).color(colors::IMAGE_PLACEHOLDER);
        }
    }
}

fn draw_regions(draw: &Draw, scene: &MapScene<'_>) {
    let projection = &scene.projection;
    for shape in scene.canvas.shapes() {
        let points: Vec<Point2> = shape.points.iter().map(|p| projection.to_screen(*p)).collect();
        if points.len() < 2 {
            continue;
        }
        let fill = shape
            .fill_color
            .as_deref()
            .and_then(colors::parse_hex)
            .unwrap_or(colors::REGION_DEFAULT);
        let stroke = shape
            .stroke_color
            .as_deref()
            .and_then(colors::parse_hex)
            .unwrap_or(colors::REGION_DEFAULT);
        let opacity = shape
            .fill_opacity
            .unwrap_or(map_core::api::DEFAULT_FILL_OPACITY);

        draw.polygon()
            .points(points.iter().copied())
            .color(colors::with_alpha(fill, opacity));

        let selected = scene.canvas.is_selected(shape.handle);
        let (outline, weight) = if selected {
            (colors::SELECTION, 3.0)
        } else {
            (stroke, 2.0)
        };
        draw.polyline()
            .weight(weight)
            .points_closed(points.iter().copied())
            .color(outline);

        // Vertex handles in edit mode
        if scene.mode == InteractionMode::Edit && shape.id.is_some() {
            for p in &points {
                draw.rect()
                    .xy(*p)
                    .w_h(7.0, 7.0)
                    .color(colors::WHITE)
                    .stroke(outline)
                    .stroke_weight(1.5);
            }
        }
    }
}

fn draw_in_progress(draw: &Draw, scene: &MapScene<'_>) {
    let vertices = scene.canvas.in_progress();
    if vertices.is_empty() {
        return;
    }
    let projection = &scene.projection;
    let mut points: Vec<Point2> = vertices.iter().map(|p| projection.to_screen(*p)).collect();
    if let Some(hover) = scene.hover {
        points.push(projection.to_screen(hover));
    }
    draw.polyline()
        .weight(2.0)
        .points(points.iter().copied())
        .color(colors::DRAFT_LINE);
    for (i, p) in points.iter().take(vertices.len()).enumerate() {
        // First vertex is bigger: clicking it closes the polygon
        let radius = if i == 0 { 6.0 } else { 4.0 };
        draw.ellipse()
            .xy(*p)
            .radius(radius)
            .color(colors::WHITE)
            .stroke(colors::DRAFT_LINE)
            .stroke_weight(2.0);
    }
}

fn draw_markers(draw: &Draw, projection: &MapProjection, markers: &[PlantMarker], clustered: bool) {
    if !clustered {
        for marker in markers {
            draw_marker(draw, projection.to_screen(marker.position));
        }
        return;
    }

    let screen: Vec<Point> = markers
        .iter()
        .map(|m| projection.viewport.world_to_screen(m.position))
        .collect();
    for cluster in cluster_positions(&screen, CLUSTER_CELL_PX) {
        if cluster.len() == 1 {
            draw_marker(draw, projection.to_screen(markers[cluster.members[0]].position));
            continue;
        }
        let pos = pt2(
            projection.rect.x() + cluster.position.x as f32,
            projection.rect.y() - cluster.position.y as f32,
        );
        let radius = 12.0 + (cluster.len() as f32).log2() * 3.0;
        draw.ellipse()
            .xy(pos)
            .radius(radius)
            .color(colors::with_alpha(colors::CLUSTER, 0.85))
            .stroke(colors::WHITE)
            .stroke_weight(2.0);
        draw.text(&cluster.len().to_string())
            .xy(pos)
            .color(colors::WHITE)
            .font_size(12);
    }
}

fn draw_marker(draw: &Draw, pos: Point2) {
    draw.ellipse()
        .xy(pos)
        .radius(MARKER_RADIUS)
        .color(colors::PLANT)
        .stroke(colors::WHITE)
        .stroke_weight(1.5);
}

fn draw_labels(draw: &Draw, projection: &MapProjection, labels: &[MapLabel]) {
    for label in labels {
        let pos = projection.to_screen(label.position);
        if label.is_region {
            draw.text(&label.text)
                .xy(pos)
                .color(colors::LABEL_TEXT)
                .font_size(14)
                .w(200.0);
        } else {
            draw.text(&label.text)
                .xy(pos + vec2(0.0, MARKER_RADIUS + 9.0))
                .color(colors::LABEL_TEXT)
                .font_size(10)
                .w(160.0);
        }
    }
}

/// Small box next to the cursor
pub fn draw_tooltip(draw: &Draw, at: Point2, text: &str) {
    let width = (text.chars().count() as f32 * 7.5).clamp(60.0, 320.0) + 16.0;
    let pos = at + vec2(width / 2.0 + 12.0, 16.0);
    draw.rect()
        .xy(pos)
        .w_h(width, 24.0)
        .color(srgba(30u8, 35u8, 30u8, 220u8));
    draw.text(text)
        .xy(pos)
        .color(colors::WHITE)
        .font_size(12)
        .w(width - 10.0);
}

/// Banner across the top of the map area
pub fn draw_banner(draw: &Draw, rect: &Rect, message: &str) {
    let banner_height = 36.0;
    let banner_y = rect.top() - banner_height / 2.0;

    draw.rect()
        .x_y(rect.x(), banner_y)
        .w_h(rect.w(), banner_height)
        .color(srgba(120u8, 40u8, 40u8, 220u8));

    draw.text(message)
        .x_y(rect.x(), banner_y)
        .color(colors::WHITE)
        .font_size(13)
        .w(rect.w() - 40.0);
}

pub fn draw_toasts(draw: &Draw, rect: &Rect, toasts: &[Toast]) {
    let toast_width = 380.0;
    let toast_height = 40.0;
    let padding = 10.0;
    let start_y = rect.bottom() + 40.0;

    for (i, toast) in toasts.iter().enumerate() {
        let y = start_y + (i as f32) * (toast_height + padding);
        let alpha = toast.alpha();

        draw.rect()
            .x_y(rect.x(), y)
            .w_h(toast_width, toast_height)
            .color(srgba(30u8, 35u8, 30u8, (alpha * 220.0) as u8));

        draw.text(&toast.message)
            .x_y(rect.x(), y)
            .color(colors::with_alpha(colors::WHITE, alpha))
            .font_size(12)
            .w(toast_width - 20.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        let color = colors::parse_hex("#3388ff").unwrap();
        assert_eq!((color.red, color.green, color.blue), (0x33, 0x88, 0xff));
        assert!(colors::parse_hex("3388ff").is_none());
        assert!(colors::parse_hex("#38f").is_none());
        assert!(colors::parse_hex("#zzzzzz").is_none());
    }

    #[test]
    fn test_projection_round_trip() {
        let rect = Rect::from_x_y_w_h(-140.0, 0.0, 1000.0, 800.0);
        let viewport = Viewport {
            center: Point::new(500.0, 400.0),
            zoom: 1.0,
        };
        let projection = MapProjection::new(rect, viewport);
        let screen = projection.to_screen(Point::new(510.0, 390.0));
        // Image y grows downwards, screen y upwards
        assert_eq!(screen, pt2(-120.0, 20.0));
        let back = projection.to_world(screen);
        assert!((back.x - 510.0).abs() < 1e-6 && (back.y - 390.0).abs() < 1e-6);
        assert_eq!(projection.world_len(10.0), 5.0);
    }
}
