//! Garden Map
//!
//! Interactive map of the botanical garden: the base image with region
//! polygons, plant markers and labels on top. Regions can be drawn, reshaped
//! and deleted; new regions are saved to the backend in the background.

mod background;
mod drawing;
mod overlays;
mod surface;
mod ui;

use std::sync::mpsc::{self, Receiver};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use map_core::api::HttpRegionApi;
use map_core::control::{self, PanelAction, PanelOutcome};
use map_core::drawing::{DrawEvent, DrawingEngine, SyncFailure};
use map_core::geometry::polygon_contains;
use map_core::layers::{CompositionInput, LayerManager};
use map_core::modal::ModalRegistry;
use map_core::viewport::Viewport;
use map_core::{
    AppSettings, Area, AreaId, FileStorage, ImageBounds, InteractionMode, LayerId, MapConfigStore,
    MapDataStore, MemoryStorage, Plant, Point,
};
use nannou::prelude::*;
use nannou::wgpu;
use nannou_egui::{self, Egui};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::background::{HttpRegionSink, LoadEvent};
use crate::drawing::{MapProjection, MapScene};
use crate::overlays::Overlay;
use crate::surface::{ShapeCanvas, HIT_RADIUS_PX};
use crate::ui::{NameDecision, NamePromptState, SidebarView};

const SIDEBAR_WIDTH: f32 = 300.0;
/// Zoom levels per wheel notch
const ZOOM_STEP: f64 = 0.25;
const DEFAULT_LOG_FILTER: &str = "garden_map=info,map_core=info";

fn main() {
    init_tracing();
    nannou::app(model).update(update).run();
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Failed to install log subscriber: {}", e);
    }
}

/// Toast notification for errors and notices
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub created: Instant,
    pub duration_secs: f32,
}

impl Toast {
    pub fn new(message: String, duration_secs: f32) -> Self {
        Self {
            message,
            created: Instant::now(),
            duration_secs,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created.elapsed().as_secs_f32() > self.duration_secs
    }

    pub fn alpha(&self) -> f32 {
        let elapsed = self.created.elapsed().as_secs_f32();
        if elapsed > self.duration_secs - 0.5 {
            // Fade out in last 0.5s
            ((self.duration_secs - elapsed) / 0.5).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Application state
pub struct Model {
    /// Persisted map configuration (source of truth for visibility)
    config: MapConfigStore,
    /// Regions and plants of this session
    data: MapDataStore,
    modals: ModalRegistry,
    layers: LayerManager<Overlay>,
    engine: DrawingEngine<ShapeCanvas, HttpRegionSink>,

    /// Reconciliation answers from region uploads
    draw_events: Receiver<DrawEvent>,
    /// Startup loader results
    loads: Receiver<LoadEvent>,
    /// Area revision last pushed to the drawing surface
    synced_revision: Option<u64>,

    /// Base image, once loaded
    texture: Option<wgpu::Texture>,
    image: Option<ImageBounds>,
    map_name: Option<String>,
    load_error: Option<String>,

    viewport: Viewport,
    /// Zoom and center of the config the viewport was last built from
    config_view: (f64, Point),

    name_prompt: NamePromptState,
    /// Cursor position (window coordinates)
    hover: Option<Point2>,
    /// Last cursor position while panning
    panning: Option<Point2>,

    toasts: Vec<Toast>,

    /// egui integration
    egui: Egui,
}

impl Model {
    /// Show a toast notification
    pub fn show_toast(&mut self, message: impl Into<String>) {
        self.toasts.push(Toast::new(message.into(), 4.0));
    }

    /// Prune expired toasts
    pub fn prune_toasts(&mut self) {
        self.toasts.retain(|t| !t.is_expired());
    }

    fn image_bounds(&self) -> Option<map_core::Bounds> {
        self.image.map(|i| i.bounds())
    }

    fn projection(&self, window_rect: Rect) -> MapProjection {
        MapProjection::new(map_rect(window_rect), self.viewport)
    }

    fn mode(&self) -> InteractionMode {
        self.config.config().interaction_mode
    }

    /// Feed drawing events to the engine, in order.
    fn dispatch(&mut self, events: Vec<DrawEvent>) {
        for event in events {
            let failed = match &event {
                DrawEvent::RegionCreateFailed { draft, error } => Some((*draft, error.clone())),
                _ => None,
            };
            self.engine.handle(event, &mut self.data);
            if let Some(message) = failed
                .and_then(|(draft, error)| failure_toast(self.engine.failures(), draft, &error))
            {
                self.show_toast(message);
            }
        }
    }

    fn apply_panel_action(&mut self, action: PanelAction) {
        debug!("Panel action {:?}", action);
        match control::apply_action(&mut self.config, action) {
            PanelOutcome::RefusedLastLayer => {
                self.show_toast("At least one layer has to stay visible")
            }
            PanelOutcome::Applied | PanelOutcome::Unchanged => {}
        }
    }

    /// Rebuild the viewport when the config's zoom or center changed, then
    /// keep it inside the configured limits.
    fn sync_viewport(&mut self) {
        let bounds = self.image_bounds();
        let config = self.config.config();
        let wanted = (config.zoom, config.center);
        if wanted != self.config_view {
            self.viewport = Viewport::from_config(config, bounds);
            self.config_view = wanted;
        }
        self.viewport.constrain(config, bounds);
    }

    /// Plant marker under a window position, if markers are shown.
    fn plant_at(&self, pos: Point2, projection: &MapProjection) -> Option<&Plant> {
        let config = self.config.config();
        if !config.show_markers || !config.is_layer_visible(&LayerId::PLANTS) {
            return None;
        }
        self.data.plants().iter().rev().find(|plant| {
            projection.to_screen(plant.position).distance(pos) <= HIT_RADIUS_PX as f32
        })
    }

    fn area_at(&self, world: Point) -> Option<&Area> {
        if !self.config.is_layer_visible(&LayerId::REGIONS) {
            return None;
        }
        self.data
            .areas()
            .iter()
            .rev()
            .find(|area| polygon_contains(&area.points, world))
    }
}

/// The part of the window left of the control panel
fn map_rect(window_rect: Rect) -> Rect {
    let w = (window_rect.w() - SIDEBAR_WIDTH).max(1.0);
    Rect::from_x_y_w_h(window_rect.left() + w / 2.0, window_rect.y(), w, window_rect.h())
}

/// Toast text for a failed save, only when the engine kept the failure.
fn failure_toast(failures: &[SyncFailure], draft: AreaId, error: &str) -> Option<String> {
    failures
        .iter()
        .any(|f| f.area == draft)
        .then(|| format!("Area not saved: {}", error))
}

/// Loaded regions plus every area the list does not know yet: drafts still
/// waiting for their server id and regions saved after the list was taken.
fn merge_loaded_regions(loaded: Vec<Area>, current: &[Area]) -> Vec<Area> {
    let mut areas = loaded;
    for area in current {
        if !areas.iter().any(|a| a.id == area.id) {
            areas.push(area.clone());
        }
    }
    areas
}

fn model(app: &App) -> Model {
    match build_model(app) {
        Ok(model) => model,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn build_model(app: &App) -> Result<Model> {
    // Disable default escape-to-exit behavior
    app.set_exit_on_escape(false);

    let mut settings = AppSettings::load();
    settings.apply_env_overrides(|key| std::env::var(key).ok());
    info!("Backend at {}", settings.api_base_url);

    let window_id = app
        .new_window()
        .title("Garden Map")
        .size(settings.window_width, settings.window_height)
        .min_size(800, 600)
        .view(view)
        .key_pressed(key_pressed)
        .mouse_pressed(mouse_pressed)
        .mouse_released(mouse_released)
        .mouse_moved(mouse_moved)
        .mouse_wheel(mouse_wheel)
        .raw_event(raw_window_event)
        .build()
        .map_err(|e| anyhow!("could not open the window: {:?}", e))?;
    let window = app.window(window_id).context("window closed during startup")?;
    let egui = Egui::from_window(&window);

    let mut config = match FileStorage::default_location() {
        Ok(storage) => {
            info!("Map config stored in {}", storage.dir().display());
            MapConfigStore::new(storage)
        }
        Err(e) => {
            warn!("No config directory ({}), map config will not outlive this run", e);
            MapConfigStore::new(MemoryStorage::new())
        }
    };
    config.subscribe(|c| {
        debug!(
            "Map config now {} mode, layers [{}]",
            if c.light_mode { "light" } else { "full" },
            c.visible_layers
                .iter()
                .map(|l| l.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    });

    let api = HttpRegionApi::new(settings.api_base_url.clone(), settings.image_base_url.clone())
        .context("building the HTTP client")?;

    let (load_tx, loads) = mpsc::channel();
    background::spawn_initial_load(&api, &load_tx);

    let (draw_tx, draw_events) = mpsc::channel();
    let engine = DrawingEngine::new(
        ShapeCanvas::new(),
        HttpRegionSink::new(api, draw_tx),
        settings.sector_type,
    );

    let mut layers = LayerManager::new(overlays::registry());
    for plugin in overlays::default_plugins() {
        layers.add_plugin(plugin);
    }

    let viewport = Viewport::from_config(config.config(), None);
    let config_view = (config.config().zoom, config.config().center);

    Ok(Model {
        config,
        data: MapDataStore::new(),
        modals: ModalRegistry::new(),
        layers,
        engine,
        draw_events,
        loads,
        synced_revision: None,
        texture: None,
        image: None,
        map_name: None,
        load_error: None,
        viewport,
        config_view,
        name_prompt: NamePromptState::default(),
        hover: None,
        panning: None,
        toasts: Vec::new(),
        egui,
    })
}

fn drain_loads(app: &App, model: &mut Model) {
    while let Ok(event) = model.loads.try_recv() {
        match event {
            LoadEvent::MapImage {
                name,
                image,
                bounds,
            } => {
                info!("Map '{}' is {}x{}", name, bounds.width, bounds.height);
                model.texture = Some(wgpu::Texture::from_image(app, &image));
                model.image = Some(bounds);
                model.map_name = Some(name);
                model.load_error = None;
                model.viewport = Viewport::from_config(model.config.config(), model.image_bounds());
            }
            LoadEvent::MapImageFailed(error) => {
                model.show_toast("The map image could not be loaded");
                model.load_error = Some(error);
            }
            LoadEvent::Regions(loaded) => {
                info!("{} regions loaded", loaded.len());
                let areas = merge_loaded_regions(loaded, model.data.areas());
                model.data.set_areas(areas);
            }
            LoadEvent::Plants(plants) => {
                info!("{} plants loaded", plants.len());
                model.data.set_plants(plants);
            }
            LoadEvent::PlantsFailed(_) => {
                model.show_toast("Plants could not be loaded");
            }
        }
    }
}

fn update(app: &App, model: &mut Model, update: Update) {
    model.prune_toasts();

    drain_loads(app, model);
    let answers: Vec<DrawEvent> = model.draw_events.try_iter().collect();
    model.dispatch(answers);

    let mode = model.mode();
    model.engine.apply_interaction_mode(mode);

    // Begin egui frame
    model.egui.set_elapsed_time(update.since_start);
    let ctx = model.egui.begin_frame();

    let known_layers = model.layers.known_layers();
    let pending = model.engine.pending_draft().cloned();
    let sidebar = ui::draw_sidebar(
        &ctx,
        &SidebarView {
            config: &model.config,
            known_layers: &known_layers,
            data: &model.data,
            failures: model.engine.failures(),
            map_name: model.map_name.as_deref(),
            is_drawing: model.engine.surface().is_drawing(),
            has_selection: model.engine.surface().has_selection(),
            blocked: pending.is_some(),
        },
        SIDEBAR_WIDTH,
    );
    let decision = pending
        .as_ref()
        .and_then(|draft| ui::draw_name_prompt(&ctx, &mut model.name_prompt, draft));
    let closed_modals = ui::draw_plant_modals(&ctx, &model.modals, &model.data);

    drop(ctx);

    // Apply UI results
    for action in sidebar.actions {
        model.apply_panel_action(action);
    }
    if let Some(id) = sidebar.retry {
        model.dispatch(vec![DrawEvent::RetrySync(id)]);
    }
    if let Some(plant_id) = sidebar.open_plant {
        model.modals.open_modal(&plant_id);
    }
    if sidebar.finish_polygon {
        let events = model.engine.surface_mut().finish_polygon();
        model.dispatch(events);
    }
    if sidebar.cancel_drawing {
        let events = model.engine.surface_mut().cancel();
        model.dispatch(events);
    }
    if sidebar.delete_selected {
        let events = model.engine.surface_mut().delete_selected();
        model.dispatch(events);
    }
    match decision {
        Some(NameDecision::Confirm { name, description }) => {
            model.dispatch(vec![DrawEvent::NameConfirmed { name, description }]);
        }
        Some(NameDecision::Cancel) => model.dispatch(vec![DrawEvent::NameCancelled]),
        None => {}
    }
    for id in closed_modals {
        model.modals.close_modal(id);
    }

    // Keep the surface in step with the area list
    let revision = model.data.revision();
    if model.synced_revision != Some(revision) {
        model.engine.sync_surface(model.data.areas());
        model.synced_revision = Some(revision);
    }

    model.sync_viewport();
}

fn view(app: &App, model: &Model, frame: Frame) {
    let draw = app.draw();
    let window_rect = app.window_rect();
    let rect = map_rect(window_rect);

    // Draw background
    draw.background().color(drawing::colors::BACKGROUND);

    let config = model.config.config();
    let layers = model.layers.compose(CompositionInput {
        config,
        image: model.image,
        areas: model.data.areas(),
        plants: model.data.plants(),
    });
    let projection = model.projection(window_rect);
    let hover_world = model.hover.map(|pos| projection.to_world(pos));

    drawing::draw_map(
        &draw,
        &MapScene {
            projection,
            layers: &layers,
            image: model.image,
            texture: model.texture.as_ref(),
            canvas: model.engine.surface(),
            mode: config.interaction_mode,
            hover: hover_world,
        },
    );

    if layers.is_empty() {
        let message = match &model.load_error {
            Some(error) => format!("Map image unavailable: {}", error),
            None => "Loading map…".to_string(),
        };
        drawing::draw_banner(&draw, &rect, &message);
    }

    // Tooltips
    if config.show_tooltips && model.engine.pending_draft().is_none() {
        if let (Some(pos), Some(world)) = (model.hover, hover_world) {
            if rect.contains(pos) && model.panning.is_none() {
                let text = match model.plant_at(pos, &projection) {
                    Some(plant) => Some(match &plant.latin_name {
                        Some(latin) => format!("{} ({})", plant.name, latin),
                        None => plant.name.clone(),
                    }),
                    None => model.area_at(world).map(|area| area.name.clone()),
                };
                if let Some(text) = text {
                    drawing::draw_tooltip(&draw, pos, &text);
                }
            }
        }
    }

    // Draw toast notifications
    drawing::draw_toasts(&draw, &rect, &model.toasts);

    // Render to frame
    if let Err(e) = draw.to_frame(app, &frame) {
        error!("Failed to render map: {:?}", e);
    }

    // Render egui on top
    if let Err(e) = model.egui.draw_to_frame(&frame) {
        error!("Failed to render panel: {:?}", e);
    }
}

fn key_pressed(_app: &App, model: &mut Model, key: Key) {
    if model.egui.ctx().wants_keyboard_input() {
        return;
    }
    // The name prompt owns the keyboard until answered
    if model.engine.pending_draft().is_some() {
        if key == Key::Escape {
            model.dispatch(vec![DrawEvent::NameCancelled]);
        }
        return;
    }

    match key {
        // V/D/E - interaction modes
        Key::V => model.apply_panel_action(PanelAction::SetInteractionMode(InteractionMode::View)),
        Key::D => model.apply_panel_action(PanelAction::SetInteractionMode(InteractionMode::Draw)),
        Key::E => model.apply_panel_action(PanelAction::SetInteractionMode(InteractionMode::Edit)),

        // M - full/light mode
        Key::M => model.apply_panel_action(PanelAction::ToggleMode),

        // L - labels layer
        Key::L => model.apply_panel_action(PanelAction::ToggleLayer(LayerId::LABELS)),

        // Enter - close the polygon being drawn
        Key::Return => {
            let events = model.engine.surface_mut().finish_polygon();
            model.dispatch(events);
        }

        // Delete - remove selected areas
        Key::Delete | Key::Back => {
            let events = model.engine.surface_mut().delete_selected();
            model.dispatch(events);
        }

        // Escape - abandon drawing, otherwise close plant windows
        Key::Escape => {
            if model.engine.surface().is_drawing() || model.engine.surface().has_selection() {
                let events = model.engine.surface_mut().cancel();
                model.dispatch(events);
            } else {
                model.modals.close_all_modals();
            }
        }

        _ => {}
    }
}

fn mouse_pressed(app: &App, model: &mut Model, button: MouseButton) {
    if model.egui.ctx().wants_pointer_input() || model.engine.pending_draft().is_some() {
        return;
    }
    let pos = app.mouse.position();
    let projection = model.projection(app.window_rect());
    if !projection.rect.contains(pos) {
        return;
    }

    match (button, model.mode()) {
        (MouseButton::Left, InteractionMode::View) => {
            let plant_id = model.plant_at(pos, &projection).map(|p| p.id.clone());
            match plant_id {
                Some(id) => {
                    model.modals.open_modal(&id);
                }
                None => model.panning = Some(pos),
            }
        }
        (MouseButton::Left, mode) => {
            let world = projection.to_world(pos);
            let tolerance = projection.world_len(HIT_RADIUS_PX);
            let additive = app.keys.mods.shift();
            let events = model
                .engine
                .surface_mut()
                .press(world, mode, tolerance, additive);
            model.dispatch(events);
        }
        (MouseButton::Right | MouseButton::Middle, _) => model.panning = Some(pos),
        _ => {}
    }
}

fn mouse_released(_app: &App, model: &mut Model, _button: MouseButton) {
    model.panning = None;
    let events = model.engine.surface_mut().release();
    model.dispatch(events);
}

fn mouse_moved(app: &App, model: &mut Model, pos: Point2) {
    model.hover = Some(pos);

    if let Some(last) = model.panning {
        // Window y grows upwards, image y downwards
        let delta = pos - last;
        model.viewport.pan_by(delta.x as f64, -delta.y as f64);
        model.panning = Some(pos);
    }

    if model.engine.surface().is_dragging() {
        let world = model.projection(app.window_rect()).to_world(pos);
        model.engine.surface_mut().drag_to(world);
    }
}

fn mouse_wheel(app: &App, model: &mut Model, delta: MouseScrollDelta, _phase: TouchPhase) {
    if model.egui.ctx().wants_pointer_input() {
        return;
    }
    let notches = match delta {
        MouseScrollDelta::LineDelta(_, y) => y as f64,
        MouseScrollDelta::PixelDelta(pos) => pos.y / 50.0,
    };
    let pos = app.mouse.position();
    let rect = map_rect(app.window_rect());
    if !rect.contains(pos) {
        return;
    }
    let anchor = Point::new((pos.x - rect.x()) as f64, (rect.y() - pos.y) as f64);
    model
        .viewport
        .zoom_at(notches * ZOOM_STEP, anchor, model.config.config());
}

fn raw_window_event(_app: &App, model: &mut Model, event: &nannou::winit::event::WindowEvent) {
    model.egui.handle_raw_event(event);

    if let nannou::winit::event::WindowEvent::CursorLeft { .. } = event {
        model.hover = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(id: AreaId) -> Area {
        Area::new(
            id,
            id.to_string(),
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
            ],
        )
    }

    #[test]
    fn test_loaded_regions_keep_pending_drafts() {
        let current = vec![area(AreaId::Persisted(1)), area(AreaId::Draft(42))];
        let loaded = vec![area(AreaId::Persisted(1)), area(AreaId::Persisted(2))];
        let merged = merge_loaded_regions(loaded, &current);
        let ids: Vec<AreaId> = merged.iter().map(|a| a.id).collect();
        assert_eq!(
            ids,
            vec![AreaId::Persisted(1), AreaId::Persisted(2), AreaId::Draft(42)]
        );

        // Saved after the list was taken, so the list lacks it
        let current = vec![area(AreaId::Persisted(77))];
        let loaded = vec![area(AreaId::Persisted(1))];
        let merged = merge_loaded_regions(loaded, &current);
        let ids: Vec<AreaId> = merged.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![AreaId::Persisted(1), AreaId::Persisted(77)]);
    }

    #[test]
    fn test_failure_toast_only_for_recorded_failures() {
        let failures = vec![SyncFailure {
            area: AreaId::Draft(42),
            error: "timeout".to_string(),
        }];
        assert_eq!(
            failure_toast(&failures, AreaId::Draft(42), "timeout").as_deref(),
            Some("Area not saved: timeout")
        );
        // Draft deleted before the answer came back
        assert_eq!(failure_toast(&failures, AreaId::Draft(7), "timeout"), None);
    }

    #[test]
    fn test_map_rect_leaves_room_for_panel() {
        let window = Rect::from_x_y_w_h(0.0, 0.0, 1300.0, 800.0);
        let rect = map_rect(window);
        assert_eq!(rect.w(), 1000.0);
        assert_eq!(rect.right(), window.right() - SIDEBAR_WIDTH);
    }
}
