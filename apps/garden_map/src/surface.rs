//! Drawing surface
//!
//! The shapes currently on screen and the pointer interaction that edits
//! them. Click to place vertices and click near the first one (or press
//! Enter) to close the polygon. In edit mode vertices can be dragged and
//! shapes selected for deletion. Every gesture is reported as
//! [`DrawEvent`]s for the drawing engine.

use map_core::drawing::{DrawEvent, DrawingSurface, EditedShape, ShapeHandle};
use map_core::geometry::{polygon_contains, MIN_POLYGON_POINTS};
use map_core::{Area, AreaId, InteractionMode, Point};

/// Screen distance for closing a polygon or grabbing a vertex
pub const HIT_RADIUS_PX: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasShape {
    pub handle: ShapeHandle,
    /// `None` until the engine tags a freshly drawn shape
    pub id: Option<AreaId>,
    pub points: Vec<Point>,
    pub fill_color: Option<String>,
    pub stroke_color: Option<String>,
    pub fill_opacity: Option<f32>,
}

#[derive(Debug, Clone)]
struct VertexDrag {
    handle: ShapeHandle,
    index: usize,
    moved: bool,
}

#[derive(Debug, Default)]
pub struct ShapeCanvas {
    edit_control: bool,
    next_handle: u64,
    shapes: Vec<CanvasShape>,
    /// Vertices of the polygon being drawn
    in_progress: Vec<Point>,
    selected: Vec<ShapeHandle>,
    drag: Option<VertexDrag>,
}

impl ShapeCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shapes(&self) -> &[CanvasShape] {
        &self.shapes
    }

    pub fn in_progress(&self) -> &[Point] {
        &self.in_progress
    }

    pub fn is_drawing(&self) -> bool {
        !self.in_progress.is_empty()
    }

    pub fn is_selected(&self, handle: ShapeHandle) -> bool {
        self.selected.contains(&handle)
    }

    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    fn alloc_handle(&mut self) -> ShapeHandle {
        self.next_handle += 1;
        ShapeHandle(self.next_handle)
    }

    /// Pointer pressed at `at` (image coordinates). `tolerance` is the hit
    /// radius converted to image units.
    pub fn press(
        &mut self,
        at: Point,
        mode: InteractionMode,
        tolerance: f64,
        additive: bool,
    ) -> Vec<DrawEvent> {
        if !self.edit_control {
            return Vec::new();
        }
        match mode {
            InteractionMode::Draw => self.press_draw(at, tolerance),
            InteractionMode::Edit => {
                self.press_edit(at, tolerance, additive);
                Vec::new()
            }
            InteractionMode::View => Vec::new(),
        }
    }

    fn press_draw(&mut self, at: Point, tolerance: f64) -> Vec<DrawEvent> {
        let mut events = Vec::new();
        if let Some(first) = self.in_progress.first().copied() {
            if self.in_progress.len() >= MIN_POLYGON_POINTS && first.distance(at) <= tolerance {
                return self.finish_polygon();
            }
        } else {
            events.push(DrawEvent::DrawStarted);
        }
        self.in_progress.push(at);
        events.push(DrawEvent::VertexAdded(at));
        events
    }

    fn press_edit(&mut self, at: Point, tolerance: f64, additive: bool) {
        // Grabbing a vertex wins over selecting a shape
        let grab = self
            .shapes
            .iter()
            .rev()
            .filter(|s| s.id.is_some())
            .find_map(|s| {
                s.points
                    .iter()
                    .position(|p| p.distance(at) <= tolerance)
                    .map(|index| (s.handle, index))
            });
        if let Some((handle, index)) = grab {
            self.drag = Some(VertexDrag {
                handle,
                index,
                moved: false,
            });
            return;
        }

        let hit = self
            .shapes
            .iter()
            .rev()
            .filter(|s| s.id.is_some())
            .find(|s| polygon_contains(&s.points, at))
            .map(|s| s.handle);
        match (hit, additive) {
            (Some(handle), true) => {
                if let Some(pos) = self.selected.iter().position(|h| *h == handle) {
                    self.selected.remove(pos);
                } else {
                    self.selected.push(handle);
                }
            }
            (Some(handle), false) => self.selected = vec![handle],
            (None, false) => self.selected.clear(),
            (None, true) => {}
        }
    }

    /// Pointer moved with the button held.
    pub fn drag_to(&mut self, at: Point) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        if let Some(shape) = self.shapes.iter_mut().find(|s| s.handle == drag.handle) {
            if let Some(vertex) = shape.points.get_mut(drag.index) {
                *vertex = at;
                drag.moved = true;
            }
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Pointer released; reports the edit if a vertex moved.
    pub fn release(&mut self) -> Vec<DrawEvent> {
        let Some(drag) = self.drag.take() else {
            return Vec::new();
        };
        if !drag.moved {
            return Vec::new();
        }
        self.shapes
            .iter()
            .find(|s| s.handle == drag.handle)
            .and_then(|s| {
                s.id.map(|id| EditedShape {
                    id,
                    points: s.points.clone(),
                })
            })
            .map(|edited| vec![DrawEvent::Edited(vec![edited])])
            .unwrap_or_default()
    }

    /// Close the polygon being drawn, whatever its vertex count.
    pub fn finish_polygon(&mut self) -> Vec<DrawEvent> {
        if self.in_progress.is_empty() {
            return Vec::new();
        }
        let points = std::mem::take(&mut self.in_progress);
        let handle = self.alloc_handle();
        self.shapes.push(CanvasShape {
            handle,
            id: None,
            points: points.clone(),
            fill_color: None,
            stroke_color: None,
            fill_opacity: None,
        });
        vec![DrawEvent::ShapeCreated { handle, points }]
    }

    /// Abandon the polygon being drawn.
    pub fn cancel(&mut self) -> Vec<DrawEvent> {
        self.drag = None;
        if self.in_progress.is_empty() {
            self.selected.clear();
            return Vec::new();
        }
        self.in_progress.clear();
        vec![DrawEvent::DrawCancelled]
    }

    /// Remove the selected shapes and report their ids in one event.
    pub fn delete_selected(&mut self) -> Vec<DrawEvent> {
        if !self.edit_control || self.selected.is_empty() {
            return Vec::new();
        }
        let selected = std::mem::take(&mut self.selected);
        let mut ids = Vec::new();
        self.shapes.retain(|s| {
            if selected.contains(&s.handle) {
                ids.extend(s.id);
                false
            } else {
                true
            }
        });
        if ids.is_empty() {
            Vec::new()
        } else {
            vec![DrawEvent::Deleted(ids)]
        }
    }
}

impl DrawingSurface for ShapeCanvas {
    fn attach_edit_control(&mut self) {
        self.edit_control = true;
    }

    fn detach_edit_control(&mut self) {
        self.edit_control = false;
        self.in_progress.clear();
        self.selected.clear();
        self.drag = None;
    }

    fn edit_control_attached(&self) -> bool {
        self.edit_control
    }

    fn tag_shape(&mut self, handle: ShapeHandle, id: AreaId) {
        if let Some(shape) = self.shapes.iter_mut().find(|s| s.handle == handle) {
            shape.id = Some(id);
        }
    }

    fn retag_shape(&mut self, from: AreaId, to: AreaId) -> bool {
        match self.shapes.iter_mut().find(|s| s.id == Some(from)) {
            Some(shape) => {
                shape.id = Some(to);
                true
            }
            None => false,
        }
    }

    fn remove_shape(&mut self, handle: ShapeHandle) {
        self.shapes.retain(|s| s.handle != handle);
        self.selected.retain(|h| *h != handle);
    }

    fn remove_tagged(&mut self, id: AreaId) {
        let removed: Vec<ShapeHandle> = self
            .shapes
            .iter()
            .filter(|s| s.id == Some(id))
            .map(|s| s.handle)
            .collect();
        self.shapes.retain(|s| s.id != Some(id));
        self.selected.retain(|h| !removed.contains(h));
    }

    fn rendered_ids(&self) -> Vec<AreaId> {
        self.shapes.iter().filter_map(|s| s.id).collect()
    }

    fn add_area(&mut self, area: &Area) {
        let handle = self.alloc_handle();
        self.shapes.push(CanvasShape {
            handle,
            id: Some(area.id),
            points: area.points.clone(),
            fill_color: area.fill_color.clone(),
            stroke_color: area.stroke_color.clone(),
            fill_opacity: area.fill_opacity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached() -> ShapeCanvas {
        let mut canvas = ShapeCanvas::new();
        canvas.attach_edit_control();
        canvas
    }

    fn square(x: f64) -> Vec<Point> {
        vec![
            Point::new(x, 0.0),
            Point::new(x + 10.0, 0.0),
            Point::new(x + 10.0, 10.0),
            Point::new(x, 10.0),
        ]
    }

    #[test]
    fn test_detached_canvas_ignores_input() {
        let mut canvas = ShapeCanvas::new();
        let events = canvas.press(Point::new(1.0, 1.0), InteractionMode::Draw, 5.0, false);
        assert!(events.is_empty());
        assert!(!canvas.is_drawing());
    }

    #[test]
    fn test_click_near_first_vertex_closes_polygon() {
        let mut canvas = attached();
        let mode = InteractionMode::Draw;
        let first = canvas.press(Point::new(0.0, 0.0), mode, 5.0, false);
        assert_eq!(first[0], DrawEvent::DrawStarted);
        canvas.press(Point::new(100.0, 0.0), mode, 5.0, false);
        canvas.press(Point::new(100.0, 100.0), mode, 5.0, false);

        let events = canvas.press(Point::new(2.0, 1.0), mode, 5.0, false);
        match &events[..] {
            [DrawEvent::ShapeCreated { points, .. }] => assert_eq!(points.len(), 3),
            other => panic!("unexpected events {:?}", other),
        }
        assert!(!canvas.is_drawing());
        assert_eq!(canvas.shapes().len(), 1);
        assert!(canvas.shapes()[0].id.is_none());
    }

    #[test]
    fn test_short_path_does_not_close_on_first_vertex() {
        let mut canvas = attached();
        let mode = InteractionMode::Draw;
        canvas.press(Point::new(0.0, 0.0), mode, 5.0, false);
        canvas.press(Point::new(100.0, 0.0), mode, 5.0, false);
        let events = canvas.press(Point::new(1.0, 0.0), mode, 5.0, false);
        assert_eq!(events, vec![DrawEvent::VertexAdded(Point::new(1.0, 0.0))]);
        assert_eq!(canvas.in_progress().len(), 3);
    }

    #[test]
    fn test_vertex_drag_reports_edit() {
        let mut canvas = attached();
        let mut area = Area::new(AreaId::Persisted(4), "Розарий", square(0.0));
        area.fill_color = Some("#c2185b".into());
        canvas.add_area(&area);

        canvas.press(Point::new(10.5, 10.5), InteractionMode::Edit, 2.0, false);
        assert!(canvas.is_dragging());
        canvas.drag_to(Point::new(20.0, 20.0));
        let events = canvas.release();
        match &events[..] {
            [DrawEvent::Edited(shapes)] => {
                assert_eq!(shapes[0].id, AreaId::Persisted(4));
                assert_eq!(shapes[0].points[2], Point::new(20.0, 20.0));
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_delete_selected_reports_all_ids_at_once() {
        let mut canvas = attached();
        canvas.add_area(&Area::new(AreaId::Persisted(1), "a", square(0.0)));
        canvas.add_area(&Area::new(AreaId::Persisted(2), "b", square(50.0)));

        canvas.press(Point::new(5.0, 5.0), InteractionMode::Edit, 1.0, false);
        canvas.press(Point::new(55.0, 5.0), InteractionMode::Edit, 1.0, true);
        let events = canvas.delete_selected();
        assert_eq!(
            events,
            vec![DrawEvent::Deleted(vec![
                AreaId::Persisted(1),
                AreaId::Persisted(2)
            ])]
        );
        assert!(canvas.shapes().is_empty());
    }

    #[test]
    fn test_retag_keeps_shape() {
        let mut canvas = attached();
        canvas.add_area(&Area::new(AreaId::Draft(7), "a", square(0.0)));
        assert!(canvas.retag_shape(AreaId::Draft(7), AreaId::Persisted(3)));
        assert_eq!(canvas.rendered_ids(), vec![AreaId::Persisted(3)]);
        assert!(!canvas.retag_shape(AreaId::Draft(7), AreaId::Persisted(9)));
    }
}
