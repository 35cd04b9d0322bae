//! UI module for the garden map
//!
//! The control panel, the name prompt for a freshly drawn area and the plant
//! detail windows. Nothing here mutates the stores; every interaction is
//! returned to the update loop.

use map_core::control::{flag_value, ConfigFlag, PanelAction};
use map_core::drawing::{DraftShape, SyncFailure};
use map_core::modal::{ModalEntry, ModalId, ModalRegistry};
use map_core::{AreaId, InteractionMode, LayerId, MapConfigStore, MapDataStore};
use nannou_egui::egui;

const ACCENT: egui::Color32 = egui::Color32::from_rgb(46, 125, 50);
const MUTED: egui::Color32 = egui::Color32::from_rgb(110, 120, 105);
const ERROR: egui::Color32 = egui::Color32::from_rgb(190, 50, 40);

/// Text fields of the name prompt
#[derive(Default)]
pub struct NamePromptState {
    /// Draft the fields were prepared for
    pub draft: Option<AreaId>,
    pub name: String,
    pub description: String,
    pub should_focus: bool,
}

impl NamePromptState {
    /// Reset the fields when a different draft is waiting.
    pub fn prepare(&mut self, draft: &DraftShape) {
        if self.draft != Some(draft.id) {
            self.draft = Some(draft.id);
            self.name.clear();
            self.description.clear();
            self.should_focus = true;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What the user decided in the name prompt
#[derive(Debug, Clone, PartialEq)]
pub enum NameDecision {
    Confirm {
        name: String,
        description: Option<String>,
    },
    Cancel,
}

/// Read-only inputs of the sidebar
pub struct SidebarView<'a> {
    pub config: &'a MapConfigStore,
    pub known_layers: &'a [LayerId],
    pub data: &'a MapDataStore,
    pub failures: &'a [SyncFailure],
    pub map_name: Option<&'a str>,
    pub is_drawing: bool,
    pub has_selection: bool,
    /// The name prompt is open; the panel is read-only meanwhile
    pub blocked: bool,
}

/// Result of sidebar interactions
#[derive(Default)]
pub struct SidebarResult {
    /// Configuration changes, in click order
    pub actions: Vec<PanelAction>,
    /// Resubmit a failed draft
    pub retry: Option<AreaId>,
    /// Open the details of a plant
    pub open_plant: Option<String>,
    pub finish_polygon: bool,
    pub cancel_drawing: bool,
    pub delete_selected: bool,
}

fn section_title(ui: &mut egui::Ui, title: &str) {
    ui.label(egui::RichText::new(title).size(14.0).strong().color(ACCENT));
    ui.add_space(4.0);
}

fn layer_label(layer: &LayerId) -> String {
    match layer.as_str() {
        "imagery" => "Base image".to_string(),
        "regions" => "Regions".to_string(),
        "plants" => "Plants".to_string(),
        "labels" => "Labels".to_string(),
        other => other.to_string(),
    }
}

/// Draw the control panel
pub fn draw_sidebar(ctx: &egui::Context, view: &SidebarView<'_>, width: f32) -> SidebarResult {
    let mut result = SidebarResult::default();
    let config = view.config.config();

    egui::SidePanel::right("control_panel")
        .resizable(false)
        .exact_width(width)
        .show(ctx, |ui| {
            ui.add_space(8.0);
            ui.heading(egui::RichText::new("Garden map").color(ACCENT));
            if let Some(name) = view.map_name {
                ui.label(egui::RichText::new(name).size(12.0).color(MUTED));
            }
            ui.add_space(8.0);

            ui.add_enabled_ui(!view.blocked, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    // Mode
                    ui.group(|ui| {
                        section_title(ui, "Mode");
                        ui.horizontal(|ui| {
                            let label = if config.light_mode { "Light" } else { "Full" };
                            ui.label(egui::RichText::new(label).size(12.0));
                            if ui.button("Switch (M)").clicked() {
                                result.actions.push(PanelAction::ToggleMode);
                            }
                        });
                        ui.horizontal(|ui| {
                            for mode in InteractionMode::all() {
                                let selected = config.interaction_mode == *mode;
                                if ui.selectable_label(selected, mode.label()).clicked() && !selected {
                                    result.actions.push(PanelAction::SetInteractionMode(*mode));
                                }
                            }
                        });
                        match config.interaction_mode {
                            InteractionMode::Draw => {
                                ui.label(
                                    egui::RichText::new(
                                        "Click to add vertices, click the first one or press Enter to close.",
                                    )
                                    .size(11.0)
                                    .color(MUTED),
                                );
                                ui.horizontal(|ui| {
                                    if ui
                                        .add_enabled(view.is_drawing, egui::Button::new("Finish"))
                                        .clicked()
                                    {
                                        result.finish_polygon = true;
                                    }
                                    if ui
                                        .add_enabled(view.is_drawing, egui::Button::new("Cancel"))
                                        .clicked()
                                    {
                                        result.cancel_drawing = true;
                                    }
                                });
                            }
                            InteractionMode::Edit => {
                                ui.label(
                                    egui::RichText::new(
                                        "Drag vertices to reshape. Click to select, Shift+click to add.",
                                    )
                                    .size(11.0)
                                    .color(MUTED),
                                );
                                if ui
                                    .add_enabled(view.has_selection, egui::Button::new("Delete selected"))
                                    .clicked()
                                {
                                    result.delete_selected = true;
                                }
                            }
                            InteractionMode::View => {}
                        }
                    });

                    ui.add_space(8.0);

                    // Layers
                    ui.group(|ui| {
                        section_title(ui, "Layers");
                        for layer in view.known_layers {
                            let mut visible = config.is_layer_visible(layer);
                            if ui.checkbox(&mut visible, layer_label(layer)).changed() {
                                result.actions.push(PanelAction::ToggleLayer(layer.clone()));
                            }
                        }
                    });

                    ui.add_space(8.0);

                    // Display flags
                    ui.group(|ui| {
                        section_title(ui, "Display");
                        for flag in ConfigFlag::all() {
                            let mut value = flag_value(view.config, *flag);
                            if ui.checkbox(&mut value, flag.label()).changed() {
                                result.actions.push(PanelAction::SetFlag(*flag, value));
                            }
                        }
                        let mut zoom = config.zoom;
                        let (lo, hi) = (
                            config.min_zoom.min(config.max_zoom),
                            config.min_zoom.max(config.max_zoom),
                        );
                        if ui
                            .add(egui::Slider::new(&mut zoom, lo..=hi).step_by(0.25).text("Zoom"))
                            .changed()
                        {
                            result.actions.push(PanelAction::SetZoom(zoom));
                        }
                    });

                    ui.add_space(8.0);

                    // Persistence
                    ui.group(|ui| {
                        section_title(ui, "Settings");
                        ui.horizontal(|ui| {
                            if ui.button("Save").clicked() {
                                result.actions.push(PanelAction::Save);
                            }
                            if ui.button("Load").clicked() {
                                result.actions.push(PanelAction::Load);
                            }
                            if ui.button("Reset").clicked() {
                                result.actions.push(PanelAction::Reset);
                            }
                        });
                    });

                    // Unsaved areas
                    if !view.failures.is_empty() {
                        ui.add_space(8.0);
                        ui.group(|ui| {
                            section_title(ui, "Not saved");
                            for failure in view.failures {
                                let name = view
                                    .data
                                    .area(&failure.area)
                                    .map(|a| a.name.as_str())
                                    .unwrap_or("?");
                                ui.horizontal(|ui| {
                                    ui.label(egui::RichText::new(name).size(12.0).color(ERROR));
                                    if ui.small_button("Retry").clicked() {
                                        result.retry = Some(failure.area);
                                    }
                                });
                                ui.label(
                                    egui::RichText::new(&failure.error).size(10.0).color(MUTED),
                                );
                            }
                        });
                    }

                    ui.add_space(8.0);

                    // Plants
                    ui.group(|ui| {
                        section_title(ui, "Plants");
                        let plants = view.data.plants();
                        if plants.is_empty() {
                            ui.label(egui::RichText::new("No plants loaded").size(11.0).color(MUTED));
                        }
                        egui::ScrollArea::vertical()
                            .id_source("plant_list")
                            .max_height(220.0)
                            .show(ui, |ui| {
                                for plant in plants {
                                    if ui.link(egui::RichText::new(&plant.name).size(12.0)).clicked() {
                                        result.open_plant = Some(plant.id.clone());
                                    }
                                }
                            });
                    });

                    ui.add_space(8.0);

                    // Keyboard shortcuts help
                    ui.group(|ui| {
                        section_title(ui, "Shortcuts");
                        let shortcuts = [
                            ("V/D/E", "View / draw / edit"),
                            ("M", "Full / light mode"),
                            ("L", "Labels"),
                            ("Enter", "Close polygon"),
                            ("Del", "Delete selected"),
                            ("Esc", "Cancel"),
                        ];
                        for (key, desc) in shortcuts {
                            ui.horizontal(|ui| {
                                ui.label(
                                    egui::RichText::new(format!("{:>5}", key))
                                        .size(10.0)
                                        .color(ACCENT)
                                        .monospace(),
                                );
                                ui.label(egui::RichText::new(desc).size(10.0).color(MUTED));
                            });
                        }
                    });

                    ui.add_space(6.0);
                    ui.label(
                        egui::RichText::new(format!(
                            "{} regions, {} plants",
                            view.data.areas().len(),
                            view.data.plants().len()
                        ))
                        .size(10.0)
                        .color(MUTED),
                    );
                });
            });
        });

    result
}

/// Blocking prompt for the name of a freshly drawn area
pub fn draw_name_prompt(
    ctx: &egui::Context,
    prompt: &mut NamePromptState,
    draft: &DraftShape,
) -> Option<NameDecision> {
    prompt.prepare(draft);
    let mut decision = None;

    egui::Window::new("New area")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label("Name");
            let name_response = ui.add(
                egui::TextEdit::singleline(&mut prompt.name).hint_text(draft.default_name.as_str()),
            );
            if prompt.should_focus {
                name_response.request_focus();
                prompt.should_focus = false;
            }
            ui.label("Description");
            ui.add(egui::TextEdit::multiline(&mut prompt.description).desired_rows(3));
            ui.label(
                egui::RichText::new(format!("{} vertices", draft.points.len()))
                    .size(10.0)
                    .color(MUTED),
            );
            ui.add_space(6.0);

            let enter = name_response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            ui.horizontal(|ui| {
                if ui.button("Save").clicked() || enter {
                    let description = prompt.description.trim();
                    decision = Some(NameDecision::Confirm {
                        name: prompt.name.clone(),
                        description: (!description.is_empty()).then(|| description.to_string()),
                    });
                }
                if ui.button("Cancel").clicked() {
                    decision = Some(NameDecision::Cancel);
                }
            });
        });

    if decision.is_some() {
        prompt.clear();
    }
    decision
}

/// One window per open plant modal; returns the modals the user closed.
pub fn draw_plant_modals(
    ctx: &egui::Context,
    modals: &ModalRegistry,
    data: &MapDataStore,
) -> Vec<ModalId> {
    modals
        .render_with(|entry: &ModalEntry| {
            let mut open = true;
            let title = data
                .plant(&entry.plant_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| entry.plant_id.clone());
            egui::Window::new(title)
                .id(egui::Id::new(("plant_modal", entry.id.get())))
                .open(&mut open)
                .collapsible(false)
                .resizable(false)
                .default_width(280.0)
                .show(ctx, |ui| match data.plant(&entry.plant_id) {
                    Some(plant) => {
                        if let Some(latin) = &plant.latin_name {
                            ui.label(egui::RichText::new(latin).italics().color(MUTED));
                        }
                        if let Some(description) = &plant.description {
                            ui.add_space(4.0);
                            ui.label(description);
                        }
                        ui.add_space(4.0);
                        ui.label(
                            egui::RichText::new(format!(
                                "x {:.1}, y {:.1}",
                                plant.position.x, plant.position.y
                            ))
                            .size(10.0)
                            .color(MUTED),
                        );
                    }
                    None => {
                        ui.label(egui::RichText::new("This plant is no longer on the map").color(ERROR));
                    }
                });
            (!open).then_some(entry.id)
        })
        .into_iter()
        .flatten()
        .collect()
}
