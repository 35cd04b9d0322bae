//! Control panel actions
//!
//! The panel UI only emits [`PanelAction`]s; [`apply_action`] turns them into
//! configuration store calls. The one rule enforced here: the last visible
//! layer cannot be hidden, so the map never ends up rendering nothing.

use tracing::{info, warn};

use crate::config::{InteractionMode, MapConfigStore, MapConfigUpdate};
use crate::layers::LayerId;

/// Boolean settings exposed in the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFlag {
    Tooltips,
    Labels,
    Markers,
    Clustering,
}

impl ConfigFlag {
    pub fn label(&self) -> &'static str {
        match self {
            ConfigFlag::Tooltips => "Tooltips",
            ConfigFlag::Labels => "Labels",
            ConfigFlag::Markers => "Markers",
            ConfigFlag::Clustering => "Clustering",
        }
    }

    pub fn all() -> &'static [ConfigFlag] {
        &[
            ConfigFlag::Tooltips,
            ConfigFlag::Labels,
            ConfigFlag::Markers,
            ConfigFlag::Clustering,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    ToggleLayer(LayerId),
    SetFlag(ConfigFlag, bool),
    SetZoom(f64),
    SetInteractionMode(InteractionMode),
    ToggleMode,
    Reset,
    Save,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOutcome {
    Applied,
    /// Nothing to do (value already set, nothing stored, ...)
    Unchanged,
    /// Refused to hide the only visible layer
    RefusedLastLayer,
}

/// Toggle `layer` unless that would hide the last visible layer.
pub fn toggle_layer_guarded(store: &mut MapConfigStore, layer: &LayerId) -> PanelOutcome {
    let visible = &store.config().visible_layers;
    if visible.len() == 1 && visible[0] == *layer {
        info!("'{}' is the only visible layer, keeping it", layer);
        return PanelOutcome::RefusedLastLayer;
    }
    store.toggle_layer(layer);
    PanelOutcome::Applied
}

/// Current value of a panel flag.
pub fn flag_value(store: &MapConfigStore, flag: ConfigFlag) -> bool {
    let config = store.config();
    match flag {
        ConfigFlag::Tooltips => config.show_tooltips,
        ConfigFlag::Labels => config.show_labels,
        ConfigFlag::Markers => config.show_markers,
        ConfigFlag::Clustering => config.enable_clustering,
    }
}

pub fn apply_action(store: &mut MapConfigStore, action: PanelAction) -> PanelOutcome {
    match action {
        PanelAction::ToggleLayer(layer) => toggle_layer_guarded(store, &layer),
        PanelAction::SetFlag(flag, value) => {
            if flag_value(store, flag) == value {
                return PanelOutcome::Unchanged;
            }
            let update = match flag {
                // Labels is a layer too; route it through the guard
                ConfigFlag::Labels => return toggle_layer_guarded(store, &LayerId::LABELS),
                ConfigFlag::Tooltips => MapConfigUpdate {
                    show_tooltips: Some(value),
                    ..Default::default()
                },
                ConfigFlag::Markers => MapConfigUpdate {
                    show_markers: Some(value),
                    ..Default::default()
                },
                ConfigFlag::Clustering => MapConfigUpdate {
                    enable_clustering: Some(value),
                    ..Default::default()
                },
            };
            store.update(update);
            PanelOutcome::Applied
        }
        PanelAction::SetZoom(zoom) => {
            if store.config().zoom == zoom {
                return PanelOutcome::Unchanged;
            }
            store.update(MapConfigUpdate {
                zoom: Some(zoom),
                ..Default::default()
            });
            PanelOutcome::Applied
        }
        PanelAction::SetInteractionMode(mode) => {
            if store.config().interaction_mode == mode {
                return PanelOutcome::Unchanged;
            }
            store.update(MapConfigUpdate {
                interaction_mode: Some(mode),
                ..Default::default()
            });
            PanelOutcome::Applied
        }
        PanelAction::ToggleMode => {
            store.toggle_mode();
            PanelOutcome::Applied
        }
        PanelAction::Reset => {
            store.reset();
            PanelOutcome::Applied
        }
        PanelAction::Save => {
            if store.save_to_storage() {
                PanelOutcome::Applied
            } else {
                warn!("Map config could not be saved");
                PanelOutcome::Unchanged
            }
        }
        PanelAction::Load => {
            if store.load_from_storage() {
                PanelOutcome::Applied
            } else {
                info!("No saved map config to load");
                PanelOutcome::Unchanged
            }
        }
    }
}
