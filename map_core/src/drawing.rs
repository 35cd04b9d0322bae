//! Polygon drawing and editing
//!
//! The drawing toolkit reports what the user did as [`DrawEvent`]s. Each
//! event goes through [`transition`], a pure function from the current
//! [`DrawState`] and area list to the next state, an optional replacement
//! area list and a list of [`Effect`]s. [`DrawingEngine`] owns the state and
//! applies the outcome to a [`DrawingSurface`], the [`MapDataStore`] and a
//! [`RegionSink`].
//!
//! ```text
//! Idle ──DrawStarted──▶ Drawing ──ShapeCreated──▶ PendingName ──NameConfirmed──▶ Idle (+ draft Area)
//!   ▲                      │                           │
//!   └────DrawCancelled─────┘                           └──NameCancelled──▶ Idle (shape removed)
//! ```
//!
//! Edits and deletions are accepted in every state. A confirmed area is
//! inserted at once under its draft id and submitted in the background; when
//! the backend answers, the draft id is swapped for the persisted one both in
//! the store and on the surface shape that is already on screen.

use tracing::{debug, error, info, warn};

use crate::api::CreateRegionRequest;
use crate::area::{Area, AreaId, MapDataStore};
use crate::config::InteractionMode;
use crate::geometry::{Point, MIN_POLYGON_POINTS};

/// Toolkit-side handle of a shape on the drawing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeHandle(pub u64);

/// A finished shape waiting for its name
#[derive(Debug, Clone, PartialEq)]
pub struct DraftShape {
    pub id: AreaId,
    pub handle: ShapeHandle,
    pub points: Vec<Point>,
    /// Suggested name shown in the prompt
    pub default_name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DrawState {
    #[default]
    Idle,
    /// The user is placing vertices
    Drawing { vertices: Vec<Point> },
    /// The shape is on the surface; the name prompt is open
    PendingName(DraftShape),
}

/// Shape whose vertices the user moved
#[derive(Debug, Clone, PartialEq)]
pub struct EditedShape {
    pub id: AreaId,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawEvent {
    DrawStarted,
    VertexAdded(Point),
    DrawCancelled,
    /// The toolkit closed a polygon; `handle` identifies it on the surface
    ShapeCreated {
        handle: ShapeHandle,
        points: Vec<Point>,
    },
    NameConfirmed {
        name: String,
        description: Option<String>,
    },
    NameCancelled,
    Edited(Vec<EditedShape>),
    Deleted(Vec<AreaId>),
    RegionCreated {
        draft: AreaId,
        server_id: i64,
    },
    RegionCreateFailed {
        draft: AreaId,
        error: String,
    },
    /// Resubmit an area that is still under its draft id
    RetrySync(AreaId),
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    TagShape { handle: ShapeHandle, id: AreaId },
    RemoveShape(ShapeHandle),
    /// Re-identify a rendered shape without removing it
    RetagShape { from: AreaId, to: AreaId },
    /// Drop every shape carrying `id`
    RemoveTagged(AreaId),
    SubmitRegion {
        draft: AreaId,
        request: CreateRegionRequest,
    },
    SyncFailed { draft: AreaId, error: String },
    SyncSucceeded { draft: AreaId, persisted: AreaId },
}

/// Inputs a transition needs from outside
#[derive(Debug, Clone, Copy)]
pub struct DrawContext {
    /// Current time, epoch milliseconds
    pub now_ms: i64,
    /// Sector type sent with new regions
    pub sector_type: i32,
}

/// Result of [`transition`]
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: DrawState,
    /// Replacement area list, if the areas changed
    pub areas: Option<Vec<Area>>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: &DrawState) -> Self {
        Self {
            state: state.clone(),
            areas: None,
            effects: Vec::new(),
        }
    }
}

/// Name suggested for the next area.
pub fn default_area_name(area_count: usize) -> String {
    format!("Новая область {}", area_count + 1)
}

/// `area-<now>`, bumped until it does not collide with an existing area.
fn next_draft_id(areas: &[Area], now_ms: i64) -> AreaId {
    let mut ts = now_ms;
    while areas.iter().any(|a| a.id == AreaId::Draft(ts)) {
        ts += 1;
    }
    AreaId::Draft(ts)
}

/// Compute the outcome of `event` in `state`.
pub fn transition(
    state: &DrawState,
    areas: &[Area],
    event: DrawEvent,
    ctx: &DrawContext,
) -> Transition {
    match event {
        DrawEvent::DrawStarted => match state {
            DrawState::PendingName(_) => {
                warn!("Ignoring new drawing while an area is waiting for its name");
                Transition::stay(state)
            }
            _ => Transition {
                state: DrawState::Drawing {
                    vertices: Vec::new(),
                },
                areas: None,
                effects: Vec::new(),
            },
        },

        DrawEvent::VertexAdded(point) => match state {
            DrawState::Drawing { vertices } => {
                let mut vertices = vertices.clone();
                vertices.push(point);
                Transition {
                    state: DrawState::Drawing { vertices },
                    areas: None,
                    effects: Vec::new(),
                }
            }
            _ => Transition::stay(state),
        },

        DrawEvent::DrawCancelled => match state {
            DrawState::Drawing { .. } => Transition {
                state: DrawState::Idle,
                areas: None,
                effects: Vec::new(),
            },
            _ => Transition::stay(state),
        },

        DrawEvent::ShapeCreated { handle, points } => match state {
            DrawState::PendingName(_) => {
                warn!("Shape finished while another waits for its name, discarding it");
                Transition {
                    state: state.clone(),
                    areas: None,
                    effects: vec![Effect::RemoveShape(handle)],
                }
            }
            _ if points.len() < MIN_POLYGON_POINTS => {
                warn!(
                    "Discarding polygon with {} points (need {})",
                    points.len(),
                    MIN_POLYGON_POINTS
                );
                Transition {
                    state: DrawState::Idle,
                    areas: None,
                    effects: vec![Effect::RemoveShape(handle)],
                }
            }
            _ => {
                let id = next_draft_id(areas, ctx.now_ms);
                debug!("Shape {:?} finished as draft {}", handle, id);
                Transition {
                    state: DrawState::PendingName(DraftShape {
                        id,
                        handle,
                        points,
                        default_name: default_area_name(areas.len()),
                    }),
                    areas: None,
                    effects: vec![Effect::TagShape { handle, id }],
                }
            }
        },

        DrawEvent::NameConfirmed { name, description } => {
            let DrawState::PendingName(draft) = state else {
                return Transition::stay(state);
            };
            let name = match name.trim() {
                "" => draft.default_name.clone(),
                trimmed => trimmed.to_string(),
            };
            let mut area = Area::new(draft.id, name, draft.points.clone());
            area.description = description.filter(|d| !d.trim().is_empty());

            let request = CreateRegionRequest::from_area(&area, ctx.sector_type);
            info!("Area '{}' created as {}", area.name, area.id);

            let mut next = areas.to_vec();
            next.push(area);
            Transition {
                state: DrawState::Idle,
                areas: Some(next),
                effects: vec![Effect::SubmitRegion {
                    draft: draft.id,
                    request,
                }],
            }
        }

        DrawEvent::NameCancelled => match state {
            DrawState::PendingName(draft) => Transition {
                state: DrawState::Idle,
                areas: None,
                effects: vec![Effect::RemoveShape(draft.handle)],
            },
            _ => Transition::stay(state),
        },

        DrawEvent::Edited(shapes) => {
            let mut next = areas.to_vec();
            let mut changed = false;
            for shape in shapes {
                if shape.points.len() < MIN_POLYGON_POINTS {
                    warn!("Ignoring edit of {} down to {} points", shape.id, shape.points.len());
                    continue;
                }
                match next.iter_mut().find(|a| a.id == shape.id) {
                    Some(area) => {
                        area.points = shape.points;
                        changed = true;
                    }
                    None => debug!("Edited shape {} has no area, ignoring", shape.id),
                }
            }
            Transition {
                state: state.clone(),
                areas: changed.then_some(next),
                effects: Vec::new(),
            }
        }

        DrawEvent::Deleted(ids) => {
            let next: Vec<Area> = areas
                .iter()
                .filter(|a| !ids.contains(&a.id))
                .cloned()
                .collect();
            let changed = next.len() != areas.len();
            if changed {
                info!("Deleted {} area(s)", areas.len() - next.len());
            }
            let state = match state {
                DrawState::PendingName(draft) if ids.contains(&draft.id) => DrawState::Idle,
                other => other.clone(),
            };
            Transition {
                state,
                areas: changed.then_some(next),
                effects: Vec::new(),
            }
        }

        DrawEvent::RegionCreated { draft, server_id } => {
            match draft {
                AreaId::Persisted(_) => {
                    warn!("Region creation answered for {}, which is not a draft", draft);
                    return Transition::stay(state);
                }
                AreaId::Draft(_) => {}
            }
            let persisted = AreaId::Persisted(server_id);
            let Some(index) = areas.iter().position(|a| a.id == draft) else {
                debug!("Draft {} is gone, dropping server id {}", draft, server_id);
                return Transition::stay(state);
            };
            if areas.iter().any(|a| a.id == persisted) {
                // The loaded region list already carries this record
                let next: Vec<Area> = areas.iter().filter(|a| a.id != draft).cloned().collect();
                info!("Draft {} saved as {}, already loaded", draft, persisted);
                return Transition {
                    state: state.clone(),
                    areas: Some(next),
                    effects: vec![
                        Effect::RemoveTagged(draft),
                        Effect::SyncSucceeded { draft, persisted },
                    ],
                };
            }
            let mut next = areas.to_vec();
            next[index].id = persisted;
            info!("Draft {} saved as {}", draft, persisted);
            Transition {
                state: state.clone(),
                areas: Some(next),
                effects: vec![
                    Effect::RetagShape {
                        from: draft,
                        to: persisted,
                    },
                    Effect::SyncSucceeded { draft, persisted },
                ],
            }
        }

        DrawEvent::RegionCreateFailed { draft, error } => {
            if !areas.iter().any(|a| a.id == draft) {
                debug!("Draft {} is gone, ignoring failed save: {}", draft, error);
                return Transition::stay(state);
            }
            Transition {
                state: state.clone(),
                areas: None,
                effects: vec![Effect::SyncFailed { draft, error }],
            }
        }

        DrawEvent::RetrySync(id) => {
            let area = match id {
                AreaId::Draft(_) => areas.iter().find(|a| a.id == id),
                AreaId::Persisted(_) => None,
            };
            match area {
                Some(area) => Transition {
                    state: state.clone(),
                    areas: None,
                    effects: vec![Effect::SubmitRegion {
                        draft: id,
                        request: CreateRegionRequest::from_area(area, ctx.sector_type),
                    }],
                },
                None => {
                    debug!("Nothing to retry for {}", id);
                    Transition::stay(state)
                }
            }
        }
    }
}

/// The rendering side of the drawing toolkit
pub trait DrawingSurface {
    fn attach_edit_control(&mut self);
    fn detach_edit_control(&mut self);
    fn edit_control_attached(&self) -> bool;
    /// Tag a freshly drawn shape with an area id
    fn tag_shape(&mut self, handle: ShapeHandle, id: AreaId);
    /// Change a shape's tag in place. Returns `false` if no shape has `from`.
    fn retag_shape(&mut self, from: AreaId, to: AreaId) -> bool;
    fn remove_shape(&mut self, handle: ShapeHandle);
    fn remove_tagged(&mut self, id: AreaId);
    /// Ids of every tagged shape
    fn rendered_ids(&self) -> Vec<AreaId>;
    /// Add a polygon for an area that is not rendered yet
    fn add_area(&mut self, area: &Area);
}

/// Where new regions are sent. Implementations report the outcome later as
/// [`DrawEvent::RegionCreated`] or [`DrawEvent::RegionCreateFailed`].
pub trait RegionSink {
    fn submit(&mut self, draft: AreaId, request: CreateRegionRequest);
}

/// A draft the backend refused
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub area: AreaId,
    pub error: String,
}

/// Current time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Owns the drawing state and applies transitions
#[derive(Debug)]
pub struct DrawingEngine<S, R> {
    state: DrawState,
    surface: S,
    sink: R,
    sector_type: i32,
    failures: Vec<SyncFailure>,
}

impl<S: DrawingSurface, R: RegionSink> DrawingEngine<S, R> {
    pub fn new(surface: S, sink: R, sector_type: i32) -> Self {
        Self {
            state: DrawState::Idle,
            surface,
            sink,
            sector_type,
            failures: Vec::new(),
        }
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    pub fn pending_draft(&self) -> Option<&DraftShape> {
        match &self.state {
            DrawState::PendingName(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    /// Drafts whose last save attempt failed
    pub fn failures(&self) -> &[SyncFailure] {
        &self.failures
    }

    /// Attach the edit control in draw/edit mode, detach it otherwise.
    ///
    /// Safe to call every frame. Leaving the drawing modes abandons a
    /// half-drawn polygon but keeps a pending name prompt.
    pub fn apply_interaction_mode(&mut self, mode: InteractionMode) {
        let wanted = mode.uses_drawing_tools();
        let attached = self.surface.edit_control_attached();
        if wanted && !attached {
            self.surface.attach_edit_control();
            debug!("Edit control attached ({})", mode.label());
        } else if !wanted && attached {
            self.surface.detach_edit_control();
            debug!("Edit control detached");
        }
        if !wanted && matches!(self.state, DrawState::Drawing { .. }) {
            self.state = DrawState::Idle;
        }
    }

    /// Apply `event` at the current time.
    pub fn handle(&mut self, event: DrawEvent, store: &mut MapDataStore) {
        self.handle_at(event, store, now_ms());
    }

    /// Apply `event` as if it happened at `now_ms`.
    pub fn handle_at(&mut self, event: DrawEvent, store: &mut MapDataStore, now_ms: i64) {
        let ctx = DrawContext {
            now_ms,
            sector_type: self.sector_type,
        };
        let outcome = transition(&self.state, store.areas(), event, &ctx);
        self.state = outcome.state;
        if let Some(areas) = outcome.areas {
            store.set_areas(areas);
        }
        for effect in outcome.effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::TagShape { handle, id } => self.surface.tag_shape(handle, id),
            Effect::RemoveShape(handle) => self.surface.remove_shape(handle),
            Effect::RetagShape { from, to } => {
                if !self.surface.retag_shape(from, to) {
                    debug!("No rendered shape for {}, nothing to retag", from);
                }
            }
            Effect::RemoveTagged(id) => self.surface.remove_tagged(id),
            Effect::SubmitRegion { draft, request } => {
                self.failures.retain(|f| f.area != draft);
                self.sink.submit(draft, request);
            }
            Effect::SyncFailed { draft, error } => {
                error!("Saving area {} failed: {}", draft, error);
                self.failures.retain(|f| f.area != draft);
                self.failures.push(SyncFailure {
                    area: draft,
                    error,
                });
            }
            Effect::SyncSucceeded { draft, .. } => {
                self.failures.retain(|f| f.area != draft);
            }
        }
    }

    /// Bring the surface in line with `areas`: add polygons for areas it does
    /// not show and drop shapes whose area is gone. Already rendered shapes
    /// are left alone.
    pub fn sync_surface(&mut self, areas: &[Area]) {
        let pending = self.pending_draft().map(|d| d.id);
        let rendered = self.surface.rendered_ids();

        for id in &rendered {
            if Some(*id) != pending && !areas.iter().any(|a| a.id == *id) {
                self.surface.remove_tagged(*id);
            }
        }
        for area in areas {
            if !rendered.contains(&area.id) {
                self.surface.add_area(area);
            }
        }
        self.failures
            .retain(|f| areas.iter().any(|a| a.id == f.area));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Surface double recording tagged shapes and calls
    #[derive(Debug, Default)]
    struct RecordingSurface {
        attached: bool,
        attach_calls: usize,
        detach_calls: usize,
        next_handle: u64,
        shapes: Vec<(ShapeHandle, Option<AreaId>, Vec<Point>)>,
        removed: Vec<ShapeHandle>,
    }

    impl RecordingSurface {
        fn draw(&mut self, points: Vec<Point>) -> ShapeHandle {
            self.next_handle += 1;
            let handle = ShapeHandle(self.next_handle);
            self.shapes.push((handle, None, points));
            handle
        }

        fn tag_of(&self, handle: ShapeHandle) -> Option<AreaId> {
            self.shapes
                .iter()
                .find(|(h, _, _)| *h == handle)
                .and_then(|(_, tag, _)| *tag)
        }
    }

    impl DrawingSurface for RecordingSurface {
        fn attach_edit_control(&mut self) {
            self.attached = true;
            self.attach_calls += 1;
        }

        fn detach_edit_control(&mut self) {
            self.attached = false;
            self.detach_calls += 1;
        }

        fn edit_control_attached(&self) -> bool {
            self.attached
        }

        fn tag_shape(&mut self, handle: ShapeHandle, id: AreaId) {
            if let Some(shape) = self.shapes.iter_mut().find(|(h, _, _)| *h == handle) {
                shape.1 = Some(id);
            }
        }

        fn retag_shape(&mut self, from: AreaId, to: AreaId) -> bool {
            match self.shapes.iter_mut().find(|(_, tag, _)| *tag == Some(from)) {
                Some(shape) => {
                    shape.1 = Some(to);
                    true
                }
                None => false,
            }
        }

        fn remove_shape(&mut self, handle: ShapeHandle) {
            self.shapes.retain(|(h, _, _)| *h != handle);
            self.removed.push(handle);
        }

        fn remove_tagged(&mut self, id: AreaId) {
            let handles: Vec<ShapeHandle> = self
                .shapes
                .iter()
                .filter(|(_, tag, _)| *tag == Some(id))
                .map(|(h, _, _)| *h)
                .collect();
            for handle in handles {
                self.remove_shape(handle);
            }
        }

        fn rendered_ids(&self) -> Vec<AreaId> {
            self.shapes.iter().filter_map(|(_, tag, _)| *tag).collect()
        }

        fn add_area(&mut self, area: &Area) {
            let handle = self.draw(area.points.clone());
            self.tag_shape(handle, area.id);
        }
    }

    #[derive(Debug, Default)]
    struct RecordingSink {
        submitted: Vec<(AreaId, CreateRegionRequest)>,
    }

    impl RegionSink for RecordingSink {
        fn submit(&mut self, draft: AreaId, request: CreateRegionRequest) {
            self.submitted.push((draft, request));
        }
    }

    const NOW: i64 = 1_700_000_000_000;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
        ]
    }

    fn engine() -> DrawingEngine<RecordingSurface, RecordingSink> {
        DrawingEngine::new(RecordingSurface::default(), RecordingSink::default(), 1)
    }

    /// Draw `points` and finish the shape, leaving the engine in PendingName.
    fn draw_shape(
        engine: &mut DrawingEngine<RecordingSurface, RecordingSink>,
        store: &mut MapDataStore,
        points: Vec<Point>,
    ) -> ShapeHandle {
        engine.handle_at(DrawEvent::DrawStarted, store, NOW);
        for p in &points {
            engine.handle_at(DrawEvent::VertexAdded(*p), store, NOW);
        }
        let handle = engine.surface_mut().draw(points.clone());
        engine.handle_at(DrawEvent::ShapeCreated { handle, points }, store, NOW);
        handle
    }

    fn confirm(
        engine: &mut DrawingEngine<RecordingSurface, RecordingSink>,
        store: &mut MapDataStore,
        name: &str,
    ) {
        engine.handle_at(
            DrawEvent::NameConfirmed {
                name: name.to_string(),
                description: None,
            },
            store,
            NOW,
        );
    }

    #[test]
    fn test_shape_created_enters_pending_name() {
        let mut store = MapDataStore::new();
        store.set_areas(vec![
            Area::new(AreaId::Persisted(1), "a", square()),
            Area::new(AreaId::Persisted(2), "b", square()),
        ]);
        let mut engine = engine();

        let handle = draw_shape(&mut engine, &mut store, square());

        let draft = engine.pending_draft().expect("pending draft");
        assert_eq!(draft.id, AreaId::Draft(NOW));
        assert_eq!(draft.default_name, "Новая область 3");
        assert_eq!(engine.surface().tag_of(handle), Some(AreaId::Draft(NOW)));
        // No record yet
        assert_eq!(store.areas().len(), 2);
    }

    #[test]
    fn test_vertices_are_tracked_while_drawing() {
        let outcome = transition(
            &DrawState::Drawing {
                vertices: vec![Point::new(1.0, 1.0)],
            },
            &[],
            DrawEvent::VertexAdded(Point::new(2.0, 2.0)),
            &DrawContext {
                now_ms: NOW,
                sector_type: 0,
            },
        );
        assert_eq!(
            outcome.state,
            DrawState::Drawing {
                vertices: vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)]
            }
        );
    }

    #[test]
    fn test_too_few_points_discards_shape() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        let handle = draw_shape(
            &mut engine,
            &mut store,
            vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
        );
        assert_eq!(*engine.state(), DrawState::Idle);
        assert_eq!(engine.surface().removed, vec![handle]);
    }

    #[test]
    fn test_confirm_is_optimistic_then_reconciled() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        let handle = draw_shape(&mut engine, &mut store, square());

        confirm(&mut engine, &mut store, "X");

        // Before the backend answers: one record under the draft id
        let named: Vec<&Area> = store.areas().iter().filter(|a| a.name == "X").collect();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].id, AreaId::Draft(NOW));
        assert_eq!(*engine.state(), DrawState::Idle);

        let (draft, request) = engine.sink().submitted[0].clone();
        assert_eq!(draft, AreaId::Draft(NOW));
        assert_eq!(request.id, 0);
        assert_eq!((request.latitude, request.longitude), (5.0, 5.0));
        assert_eq!(request.sector_type, 1);

        engine.handle_at(
            DrawEvent::RegionCreated {
                draft,
                server_id: 77,
            },
            &mut store,
            NOW,
        );

        assert_eq!(store.areas().len(), 1);
        let area = &store.areas()[0];
        assert_eq!(area.id.to_string(), "region-77");
        assert_eq!(area.name, "X");
        assert_eq!(area.points, square());
        // Same shape, new tag; never removed
        assert_eq!(engine.surface().tag_of(handle), Some(AreaId::Persisted(77)));
        assert!(engine.surface().removed.is_empty());
    }

    #[test]
    fn test_reconciled_id_already_loaded_keeps_one_record() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        draw_shape(&mut engine, &mut store, square());
        confirm(&mut engine, &mut store, "X");

        // The region list arrived with the new region before the create answer
        let mut areas = vec![Area::new(AreaId::Persisted(77), "X", square())];
        areas.extend(store.areas().iter().cloned());
        store.set_areas(areas);
        engine.sync_surface(store.areas());

        engine.handle_at(
            DrawEvent::RegionCreated {
                draft: AreaId::Draft(NOW),
                server_id: 77,
            },
            &mut store,
            NOW,
        );

        let ids: Vec<AreaId> = store.areas().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![AreaId::Persisted(77)]);
        assert_eq!(store.areas()[0].points, square());
        assert_eq!(engine.surface().rendered_ids(), vec![AreaId::Persisted(77)]);
        assert!(engine.failures().is_empty());
    }

    #[test]
    fn test_blank_name_uses_default() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        draw_shape(&mut engine, &mut store, square());
        confirm(&mut engine, &mut store, "   ");
        assert_eq!(store.areas()[0].name, "Новая область 1");
    }

    #[test]
    fn test_cancel_removes_shape_without_record() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        let handle = draw_shape(&mut engine, &mut store, square());

        engine.handle_at(DrawEvent::NameCancelled, &mut store, NOW);

        assert_eq!(*engine.state(), DrawState::Idle);
        assert!(store.areas().is_empty());
        assert_eq!(engine.surface().removed, vec![handle]);
        assert!(engine.sink().submitted.is_empty());
    }

    #[test]
    fn test_second_shape_while_pending_is_discarded() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        draw_shape(&mut engine, &mut store, square());
        let first = engine.pending_draft().cloned();

        let extra = engine.surface_mut().draw(square());
        engine.handle_at(
            DrawEvent::ShapeCreated {
                handle: extra,
                points: square(),
            },
            &mut store,
            NOW + 5,
        );

        assert_eq!(engine.pending_draft().cloned(), first);
        assert_eq!(engine.surface().removed, vec![extra]);
    }

    #[test]
    fn test_edit_replaces_points_only() {
        let mut store = MapDataStore::new();
        let mut area = Area::new(AreaId::Persisted(5), "Пруд", square());
        area.fill_color = Some("#00f".into());
        store.set_areas(vec![area]);
        let mut engine = engine();

        let moved = vec![
            Point::new(1.0, 1.0),
            Point::new(1.0, 20.0),
            Point::new(20.0, 20.0),
        ];
        engine.handle_at(
            DrawEvent::Edited(vec![
                EditedShape {
                    id: AreaId::Persisted(5),
                    points: moved.clone(),
                },
                EditedShape {
                    id: AreaId::Persisted(404),
                    points: square(),
                },
            ]),
            &mut store,
            NOW,
        );

        let area = &store.areas()[0];
        assert_eq!(area.id, AreaId::Persisted(5));
        assert_eq!(area.points, moved);
        assert_eq!(area.fill_color.as_deref(), Some("#00f"));
        assert_eq!(store.areas().len(), 1);
    }

    #[test]
    fn test_delete_many_is_one_update() {
        let mut store = MapDataStore::new();
        store.set_areas(vec![
            Area::new(AreaId::Persisted(1), "a", square()),
            Area::new(AreaId::Persisted(2), "b", square()),
            Area::new(AreaId::Draft(3), "c", square()),
        ]);
        let updates = Rc::new(RefCell::new(Vec::new()));
        let sink = updates.clone();
        store.subscribe(move |areas| sink.borrow_mut().push(areas.len()));
        let mut engine = engine();

        engine.handle_at(
            DrawEvent::Deleted(vec![AreaId::Persisted(1), AreaId::Draft(3)]),
            &mut store,
            NOW,
        );

        assert_eq!(*updates.borrow(), vec![1]);
        assert_eq!(store.areas()[0].id, AreaId::Persisted(2));
    }

    #[test]
    fn test_reconciliation_after_delete_is_dropped() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        draw_shape(&mut engine, &mut store, square());
        confirm(&mut engine, &mut store, "X");
        let draft = AreaId::Draft(NOW);

        engine.handle_at(DrawEvent::Deleted(vec![draft]), &mut store, NOW);
        let revision = store.revision();
        engine.handle_at(
            DrawEvent::RegionCreated {
                draft,
                server_id: 9,
            },
            &mut store,
            NOW,
        );

        assert!(store.areas().is_empty());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_failed_save_is_visible_and_retryable() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        draw_shape(&mut engine, &mut store, square());
        confirm(&mut engine, &mut store, "X");
        let draft = AreaId::Draft(NOW);

        engine.handle_at(
            DrawEvent::RegionCreateFailed {
                draft,
                error: "HTTP 500".into(),
            },
            &mut store,
            NOW,
        );
        assert_eq!(store.areas()[0].id, draft);
        assert_eq!(engine.failures().len(), 1);
        assert_eq!(engine.failures()[0].area, draft);

        engine.handle_at(DrawEvent::RetrySync(draft), &mut store, NOW);
        assert_eq!(engine.sink().submitted.len(), 2);
        assert!(engine.failures().is_empty());

        engine.handle_at(
            DrawEvent::RegionCreated {
                draft,
                server_id: 12,
            },
            &mut store,
            NOW,
        );
        assert_eq!(store.areas()[0].id, AreaId::Persisted(12));

        // Persisted areas are never resubmitted
        engine.handle_at(DrawEvent::RetrySync(AreaId::Persisted(12)), &mut store, NOW);
        assert_eq!(engine.sink().submitted.len(), 2);
    }

    #[test]
    fn test_draft_ids_do_not_collide() {
        let areas = vec![Area::new(AreaId::Draft(NOW), "a", square())];
        let outcome = transition(
            &DrawState::Idle,
            &areas,
            DrawEvent::ShapeCreated {
                handle: ShapeHandle(1),
                points: square(),
            },
            &DrawContext {
                now_ms: NOW,
                sector_type: 0,
            },
        );
        match outcome.state {
            DrawState::PendingName(draft) => assert_eq!(draft.id, AreaId::Draft(NOW + 1)),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_mode_gating_is_idempotent() {
        let mut engine = engine();
        engine.apply_interaction_mode(InteractionMode::View);
        assert_eq!(engine.surface().detach_calls, 0);

        engine.apply_interaction_mode(InteractionMode::Draw);
        engine.apply_interaction_mode(InteractionMode::Edit);
        engine.apply_interaction_mode(InteractionMode::Draw);
        assert!(engine.surface().edit_control_attached());
        assert_eq!(engine.surface().attach_calls, 1);

        engine.apply_interaction_mode(InteractionMode::View);
        engine.apply_interaction_mode(InteractionMode::View);
        assert!(!engine.surface().edit_control_attached());
        assert_eq!(engine.surface().detach_calls, 1);
    }

    #[test]
    fn test_leaving_draw_mode_abandons_drawing() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        engine.apply_interaction_mode(InteractionMode::Draw);
        engine.handle_at(DrawEvent::DrawStarted, &mut store, NOW);
        engine.apply_interaction_mode(InteractionMode::View);
        assert_eq!(*engine.state(), DrawState::Idle);
    }

    #[test]
    fn test_sync_surface_adds_missing_and_drops_stale() {
        let mut store = MapDataStore::new();
        let mut engine = engine();
        store.set_areas(vec![
            Area::new(AreaId::Persisted(1), "a", square()),
            Area::new(AreaId::Persisted(2), "b", square()),
        ]);
        engine.sync_surface(store.areas());
        assert_eq!(
            engine.surface().rendered_ids(),
            vec![AreaId::Persisted(1), AreaId::Persisted(2)]
        );

        // A pending draft is on the surface but not in the store
        draw_shape(&mut engine, &mut store, square());

        store.set_areas(vec![
            Area::new(AreaId::Persisted(2), "b", square()),
            Area::new(AreaId::Persisted(3), "c", square()),
        ]);
        engine.sync_surface(store.areas());

        let mut ids = engine.surface().rendered_ids();
        ids.sort();
        assert_eq!(
            ids,
            vec![
                AreaId::Draft(NOW),
                AreaId::Persisted(2),
                AreaId::Persisted(3)
            ]
        );
        assert!(engine.pending_draft().is_some());
    }
}
