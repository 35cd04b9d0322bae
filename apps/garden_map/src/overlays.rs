//! Pluggable map layers
//!
//! Plant markers and labels are registered as layer kinds so they go through
//! the same composition path as any other overlay.

use map_core::geometry::centroid;
use map_core::layers::{LayerContext, LayerDescriptor, LayerRegistry};
use map_core::{LayerId, Point};

pub const MARKERS_KIND: &str = "markers";
pub const LABELS_KIND: &str = "labels";

#[derive(Debug, Clone, PartialEq)]
pub struct PlantMarker {
    pub plant_id: String,
    pub name: String,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapLabel {
    pub text: String,
    pub position: Point,
    /// Region labels are drawn larger than plant labels
    pub is_region: bool,
}

/// Built overlay, ready to draw
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Markers {
        markers: Vec<PlantMarker>,
        clustered: bool,
    },
    Labels(Vec<MapLabel>),
}

fn build_markers(_descriptor: &LayerDescriptor, ctx: &LayerContext<'_>) -> Overlay {
    let markers = if ctx.config.show_markers {
        ctx.plants
            .iter()
            .filter(|p| ctx.image.bounds().contains(p.position))
            .map(|p| PlantMarker {
                plant_id: p.id.clone(),
                name: p.name.clone(),
                position: p.position,
            })
            .collect()
    } else {
        Vec::new()
    };
    Overlay::Markers {
        markers,
        clustered: ctx.config.enable_clustering,
    }
}

fn build_labels(_descriptor: &LayerDescriptor, ctx: &LayerContext<'_>) -> Overlay {
    let mut labels: Vec<MapLabel> = ctx
        .areas
        .iter()
        .filter_map(|area| {
            centroid(&area.points).map(|position| MapLabel {
                text: area.name.clone(),
                position,
                is_region: true,
            })
        })
        .collect();
    if ctx.config.show_markers {
        labels.extend(ctx.plants.iter().map(|p| MapLabel {
            text: p.name.clone(),
            position: p.position,
            is_region: false,
        }));
    }
    Overlay::Labels(labels)
}

pub fn registry() -> LayerRegistry<Overlay> {
    let mut registry = LayerRegistry::new();
    registry
        .register(MARKERS_KIND, build_markers)
        .register(LABELS_KIND, build_labels);
    registry
}

/// Plant markers under labels
pub fn default_plugins() -> Vec<LayerDescriptor> {
    vec![
        LayerDescriptor::new(LayerId::PLANTS, MARKERS_KIND, 10),
        LayerDescriptor::new(LayerId::LABELS, LABELS_KIND, 20),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_core::layers::{ComposedLayer, CompositionInput, LayerManager};
    use map_core::{Area, AreaId, ImageBounds, MapConfig, Plant};

    fn manager() -> LayerManager<Overlay> {
        let mut manager = LayerManager::new(registry());
        for plugin in default_plugins() {
            manager.add_plugin(plugin);
        }
        manager
    }

    fn plant(id: &str, x: f64, y: f64) -> Plant {
        Plant {
            id: id.to_string(),
            name: format!("name {}", id),
            latin_name: None,
            description: None,
            position: Point::new(x, y),
        }
    }

    #[test]
    fn test_full_config_composes_all_layers_in_order() {
        let config = MapConfig::full_defaults();
        let areas = vec![Area::new(
            AreaId::Persisted(1),
            "Дендрарий",
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
        )];
        let plants = vec![plant("plant-1", 5.0, 5.0), plant("plant-2", 5000.0, 5.0)];
        let composed = manager().compose(CompositionInput {
            config: &config,
            image: ImageBounds::from_natural_size(1000, 800),
            areas: &areas,
            plants: &plants,
        });

        let ids: Vec<LayerId> = composed.iter().map(|c| c.layer_id()).collect();
        assert_eq!(
            ids,
            vec![LayerId::IMAGERY, LayerId::REGIONS, LayerId::PLANTS, LayerId::LABELS]
        );
        match &composed[2] {
            ComposedLayer::Plugin {
                layer: Overlay::Markers { markers, .. },
                ..
            } => {
                // The plant outside the image is not drawn
                assert_eq!(markers.len(), 1);
                assert_eq!(markers[0].plant_id, "plant-1");
            }
            other => panic!("unexpected layer {:?}", other),
        }
        match &composed[3] {
            ComposedLayer::Plugin {
                layer: Overlay::Labels(labels),
                ..
            } => {
                assert_eq!(labels[0].text, "Дендрарий");
                assert_eq!(labels[0].position, Point::new(5.0, 5.0));
                assert_eq!(labels.len(), 3);
            }
            other => panic!("unexpected layer {:?}", other),
        }
    }

    #[test]
    fn test_markers_hidden_by_flag() {
        let mut config = MapConfig::full_defaults();
        config.show_markers = false;
        let plants = vec![plant("plant-1", 5.0, 5.0)];
        let composed = manager().compose(CompositionInput {
            config: &config,
            image: ImageBounds::from_natural_size(100, 100),
            areas: &[],
            plants: &plants,
        });
        let markers = composed.iter().find_map(|c| match c {
            ComposedLayer::Plugin {
                layer: Overlay::Markers { markers, .. },
                ..
            } => Some(markers.len()),
            _ => None,
        });
        assert_eq!(markers, Some(0));
    }
}
