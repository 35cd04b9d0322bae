//! Map configuration store
//!
//! [`MapConfigStore`] owns the live [`MapConfig`], keeps one cached snapshot
//! per mode (full and light) and persists the current mode's snapshot through
//! a [`ConfigStorage`] backend after every change. Storage failures are logged
//! and the store keeps working in memory.
//!
//! `show_labels` is never stored independently of the layer list: every
//! change recomputes it from the membership of [`LayerId::LABELS`] in
//! `visible_layers`, so the two cannot disagree.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::geometry::{Bounds, Point};
use crate::layers::LayerId;
use crate::observer::{Observers, SubscriptionId};
use crate::storage::{self, ConfigStorage};

/// Storage key of the full-mode snapshot (entire config). Its `lightMode`
/// records which mode was active last.
pub const FULL_CONFIG_KEY: &str = "map-config";
/// Storage key of the light-mode snapshot (subset only).
pub const LIGHT_CONFIG_KEY: &str = "map-config-light";

/// What pointer input on the map does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    /// Pan, zoom and inspect only
    #[default]
    View,
    /// Draw new polygons
    Draw,
    /// Move vertices of existing polygons, delete polygons
    Edit,
}

impl InteractionMode {
    pub fn label(&self) -> &'static str {
        match self {
            InteractionMode::View => "View",
            InteractionMode::Draw => "Draw",
            InteractionMode::Edit => "Edit",
        }
    }

    pub fn all() -> &'static [InteractionMode] {
        &[
            InteractionMode::View,
            InteractionMode::Draw,
            InteractionMode::Edit,
        ]
    }

    /// Whether the drawing toolkit's edit control belongs on the map.
    pub fn uses_drawing_tools(&self) -> bool {
        matches!(self, InteractionMode::Draw | InteractionMode::Edit)
    }
}

/// Visual and behavioral configuration of the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapConfig {
    /// Visible layers, no duplicates, in the order they were enabled
    pub visible_layers: Vec<LayerId>,
    /// Light preset active (full preset otherwise)
    pub light_mode: bool,
    pub show_tooltips: bool,
    /// Mirrors membership of `"labels"` in `visible_layers`
    pub show_labels: bool,
    pub show_markers: bool,
    pub enable_clustering: bool,
    pub zoom: f64,
    pub max_zoom: f64,
    pub min_zoom: f64,
    pub center: Point,
    pub max_bounds: Option<Bounds>,
    pub max_bounds_viscosity: f64,
    pub interaction_mode: InteractionMode,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::full_defaults()
    }
}

impl MapConfig {
    /// Built-in full-mode preset
    pub fn full_defaults() -> Self {
        Self {
            visible_layers: vec![
                LayerId::IMAGERY,
                LayerId::REGIONS,
                LayerId::PLANTS,
                LayerId::LABELS,
            ],
            light_mode: false,
            show_tooltips: true,
            show_labels: true,
            show_markers: true,
            enable_clustering: false,
            zoom: 0.0,
            max_zoom: 3.0,
            min_zoom: -3.0,
            center: Point::new(500.0, 500.0),
            max_bounds: None,
            max_bounds_viscosity: 1.0,
            interaction_mode: InteractionMode::View,
        }
    }

    /// Built-in light-mode preset
    pub fn light_defaults() -> Self {
        let mut config = Self::full_defaults();
        config.apply_light_preset();
        config
    }

    fn apply_light_preset(&mut self) {
        self.light_mode = true;
        self.visible_layers = vec![LayerId::IMAGERY, LayerId::REGIONS, LayerId::PLANTS];
        self.show_tooltips = false;
        self.show_labels = false;
        self.show_markers = true;
        self.enable_clustering = true;
    }

    pub fn is_layer_visible(&self, layer: &LayerId) -> bool {
        self.visible_layers.contains(layer)
    }

    /// Drop duplicate layers and re-derive `show_labels` from the layer list.
    fn normalize(&mut self) {
        let mut seen: Vec<LayerId> = Vec::with_capacity(self.visible_layers.len());
        for layer in self.visible_layers.drain(..) {
            if !seen.contains(&layer) {
                seen.push(layer);
            }
        }
        self.visible_layers = seen;
        self.show_labels = self.is_layer_visible(&LayerId::LABELS);
    }

    fn set_labels_layer(&mut self, visible: bool) {
        let present = self.is_layer_visible(&LayerId::LABELS);
        if visible && !present {
            self.visible_layers.push(LayerId::LABELS);
        } else if !visible && present {
            self.visible_layers.retain(|l| *l != LayerId::LABELS);
        }
    }

    /// Shallow-merge `update` and restore the labels invariant.
    ///
    /// When both `visible_layers` and `show_labels` are given, the layer list
    /// wins. `light_mode` is ignored here; mode switches go through the store.
    fn merge(&mut self, update: MapConfigUpdate) {
        let layers_given = update.visible_layers.is_some();

        if let Some(layers) = update.visible_layers {
            self.visible_layers = layers;
        }
        if let Some(v) = update.show_tooltips {
            self.show_tooltips = v;
        }
        if let Some(v) = update.show_markers {
            self.show_markers = v;
        }
        if let Some(v) = update.enable_clustering {
            self.enable_clustering = v;
        }
        if let Some(v) = update.zoom {
            self.zoom = v;
        }
        if let Some(v) = update.max_zoom {
            self.max_zoom = v;
        }
        if let Some(v) = update.min_zoom {
            self.min_zoom = v;
        }
        if let Some(v) = update.center {
            self.center = v;
        }
        if let Some(v) = update.max_bounds {
            self.max_bounds = v;
        }
        if let Some(v) = update.max_bounds_viscosity {
            self.max_bounds_viscosity = v;
        }
        if let Some(v) = update.interaction_mode {
            self.interaction_mode = v;
        }
        if let Some(show) = update.show_labels {
            if !layers_given {
                self.set_labels_layer(show);
            }
        }

        self.normalize();
    }
}

/// Partial update for [`MapConfigStore::update`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapConfigUpdate {
    pub visible_layers: Option<Vec<LayerId>>,
    pub light_mode: Option<bool>,
    pub show_tooltips: Option<bool>,
    pub show_labels: Option<bool>,
    pub show_markers: Option<bool>,
    pub enable_clustering: Option<bool>,
    pub zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub min_zoom: Option<f64>,
    pub center: Option<Point>,
    pub max_bounds: Option<Option<Bounds>>,
    pub max_bounds_viscosity: Option<f64>,
    pub interaction_mode: Option<InteractionMode>,
}

/// The fields persisted for light mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightModeSnapshot {
    pub visible_layers: Vec<LayerId>,
    pub show_tooltips: bool,
    pub enable_clustering: bool,
}

impl From<&MapConfig> for LightModeSnapshot {
    fn from(config: &MapConfig) -> Self {
        Self {
            visible_layers: config.visible_layers.clone(),
            show_tooltips: config.show_tooltips,
            enable_clustering: config.enable_clustering,
        }
    }
}

impl LightModeSnapshot {
    fn apply_to(&self, config: &mut MapConfig) {
        config.visible_layers = self.visible_layers.clone();
        config.show_tooltips = self.show_tooltips;
        config.enable_clustering = self.enable_clustering;
        config.normalize();
    }
}

/// Light-mode config built on top of `base` (viewport fields carry over).
fn compose_light(base: &MapConfig, snapshot: &LightModeSnapshot) -> MapConfig {
    let mut config = base.clone();
    config.apply_light_preset();
    snapshot.apply_to(&mut config);
    config
}

/// Owner of the live map configuration
pub struct MapConfigStore {
    config: MapConfig,
    full_cache: MapConfig,
    light_cache: LightModeSnapshot,
    storage: Box<dyn ConfigStorage>,
    observers: Observers<MapConfig>,
}

impl std::fmt::Debug for MapConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapConfigStore")
            .field("config", &self.config)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

impl MapConfigStore {
    /// Open a store seeded from `storage`, in the mode that was active last.
    pub fn new(storage: impl ConfigStorage + 'static) -> Self {
        Self::with_overrides(storage, MapConfigUpdate::default())
    }

    /// Open a store seeded from `storage`, then from `overrides`.
    ///
    /// `overrides.light_mode` picks the starting mode, falling back to the
    /// persisted one. Overrides are applied
    /// in memory only; nothing is written until the first change.
    pub fn with_overrides(
        storage: impl ConfigStorage + 'static,
        mut overrides: MapConfigUpdate,
    ) -> Self {
        let storage: Box<dyn ConfigStorage> = Box::new(storage);

        let mut was_light = false;
        let full_cache = match load_snapshot::<MapConfig>(storage.as_ref(), FULL_CONFIG_KEY) {
            Some(mut saved) => {
                was_light = saved.light_mode;
                saved.light_mode = false;
                saved.normalize();
                saved
            }
            None => MapConfig::full_defaults(),
        };
        let light_cache = load_snapshot::<LightModeSnapshot>(storage.as_ref(), LIGHT_CONFIG_KEY)
            .unwrap_or_else(|| LightModeSnapshot::from(&MapConfig::light_defaults()));

        let mut config = if overrides.light_mode.take().unwrap_or(was_light) {
            compose_light(&full_cache, &light_cache)
        } else {
            full_cache.clone()
        };
        config.merge(overrides);

        Self {
            config,
            full_cache,
            light_cache,
            storage,
            observers: Observers::new(),
        }
    }

    /// Current snapshot
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn is_layer_visible(&self, layer: &LayerId) -> bool {
        self.config.is_layer_visible(layer)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&MapConfig) + 'static) -> SubscriptionId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Merge `partial`, persist the current mode's snapshot, notify once.
    pub fn update(&mut self, mut partial: MapConfigUpdate) {
        if let Some(light) = partial.light_mode.take() {
            if light != self.config.light_mode {
                self.switch_mode(light);
            }
        }
        self.config.merge(partial);
        self.persist_current();
        self.observers.notify(&self.config);
    }

    /// Add or remove `layer` from the visible set.
    pub fn toggle_layer(&mut self, layer: &LayerId) {
        let mut layers = self.config.visible_layers.clone();
        if let Some(pos) = layers.iter().position(|l| l == layer) {
            layers.remove(pos);
        } else {
            layers.push(layer.clone());
        }
        debug!("Toggling layer '{}'", layer);
        self.update(MapConfigUpdate {
            visible_layers: Some(layers),
            ..Default::default()
        });
    }

    /// Switch between the full and light presets.
    pub fn toggle_mode(&mut self) {
        let to_light = !self.config.light_mode;
        self.switch_mode(to_light);
        self.observers.notify(&self.config);
    }

    /// Restore the built-in default for the current mode and forget its
    /// persisted snapshot. The other mode is untouched.
    pub fn reset(&mut self) {
        if self.config.light_mode {
            let defaults = MapConfig::light_defaults();
            self.light_cache = LightModeSnapshot::from(&defaults);
            self.config = defaults;
            self.remove_key(LIGHT_CONFIG_KEY);
        } else {
            self.full_cache = MapConfig::full_defaults();
            self.config = self.full_cache.clone();
            self.remove_key(FULL_CONFIG_KEY);
        }
        info!(
            "Map config reset to {} defaults",
            if self.config.light_mode { "light" } else { "full" }
        );
        self.observers.notify(&self.config);
    }

    /// Persist the current mode's snapshot. Returns `false` if the write failed.
    pub fn save_to_storage(&mut self) -> bool {
        self.persist_current()
    }

    /// Reload the current mode's snapshot from storage. Returns `false` (and
    /// changes nothing) if nothing usable is stored.
    pub fn load_from_storage(&mut self) -> bool {
        if self.config.light_mode {
            let Some(snapshot) =
                load_snapshot::<LightModeSnapshot>(self.storage.as_ref(), LIGHT_CONFIG_KEY)
            else {
                return false;
            };
            snapshot.apply_to(&mut self.config);
            self.light_cache = snapshot;
        } else {
            let Some(mut saved) =
                load_snapshot::<MapConfig>(self.storage.as_ref(), FULL_CONFIG_KEY)
            else {
                return false;
            };
            saved.light_mode = false;
            saved.normalize();
            self.full_cache = saved.clone();
            self.config = saved;
        }
        self.observers.notify(&self.config);
        true
    }

    /// Snapshot the outgoing mode (cache and storage), then load the incoming one.
    fn switch_mode(&mut self, to_light: bool) {
        if to_light {
            self.full_cache = self.config.clone();
            self.persist_full(true);
            self.config = compose_light(&self.full_cache, &self.light_cache);
        } else {
            self.light_cache = LightModeSnapshot::from(&self.config);
            let snapshot = self.light_cache.clone();
            self.persist(LIGHT_CONFIG_KEY, &snapshot);
            let mut config = self.full_cache.clone();
            config.light_mode = false;
            self.config = config;
            self.persist_full(false);
        }
        info!(
            "Switched map to {} mode",
            if to_light { "light" } else { "full" }
        );
    }

    fn persist_current(&mut self) -> bool {
        if self.config.light_mode {
            self.light_cache = LightModeSnapshot::from(&self.config);
            let snapshot = self.light_cache.clone();
            self.persist(LIGHT_CONFIG_KEY, &snapshot)
        } else {
            self.full_cache = self.config.clone();
            self.persist_full(false)
        }
    }

    /// Write the full snapshot, marking whether light mode is active.
    fn persist_full(&mut self, light_active: bool) -> bool {
        let mut snapshot = self.full_cache.clone();
        snapshot.light_mode = light_active;
        self.persist(FULL_CONFIG_KEY, &snapshot)
    }

    fn persist<T: Serialize>(&mut self, key: &str, value: &T) -> bool {
        match storage::write_json(self.storage.as_mut(), key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save map config '{}': {}; keeping it in memory", key, e);
                false
            }
        }
    }

    fn remove_key(&mut self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!("Failed to clear map config '{}': {}", key, e);
        }
    }
}

fn load_snapshot<T: serde::de::DeserializeOwned>(
    storage: &dyn ConfigStorage,
    key: &str,
) -> Option<T> {
    match storage::read_json(storage, key) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to read map config '{}': {}; using defaults", key, e);
            None
        }
    }
}
