//! Layer composition
//!
//! Decides which layers to mount for a configuration snapshot. The built-in
//! layers (imagery, regions) always come first because they establish the
//! image coordinate frame; pluggable layers follow in ascending `order`.
//! Pluggable layers are built through a [`LayerRegistry`], a table from a
//! kind tag to a factory, so the caller decides what a "layer" is.
//!
//! Composition is pure and cheap to repeat; callers re-run it whenever the
//! configuration, the areas or the plugin list change.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::area::Area;
use crate::config::MapConfig;
use crate::geometry::ImageBounds;
use crate::plant::Plant;

/// Identifier of a toggleable layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Cow<'static, str>);

impl LayerId {
    /// Base map image
    pub const IMAGERY: LayerId = LayerId(Cow::Borrowed("imagery"));
    /// Drawn areas
    pub const REGIONS: LayerId = LayerId(Cow::Borrowed("regions"));
    /// Plant markers
    pub const PLANTS: LayerId = LayerId(Cow::Borrowed("plants"));
    /// Area and plant names; tied to `MapConfig::show_labels`
    pub const LABELS: LayerId = LayerId(Cow::Borrowed("labels"));

    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Built-in layers are rendered by the map itself, not by plugins.
    pub fn is_builtin(&self) -> bool {
        *self == Self::IMAGERY || *self == Self::REGIONS
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Pure membership test against a visible layer list.
pub fn is_layer_visible(visible_layers: &[LayerId], layer: &LayerId) -> bool {
    visible_layers.contains(layer)
}

/// A pluggable layer the caller wants composed
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    /// Stable id matched against `visible_layers`
    pub layer_id: LayerId,
    /// Registry tag selecting the factory
    pub kind: String,
    /// Ascending render order among pluggable layers
    pub order: i32,
}

impl LayerDescriptor {
    pub fn new(layer_id: LayerId, kind: impl Into<String>, order: i32) -> Self {
        Self {
            layer_id,
            kind: kind.into(),
            order,
        }
    }
}

/// Everything a factory may read while building a layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerContext<'a> {
    pub config: &'a MapConfig,
    pub image: ImageBounds,
    pub areas: &'a [Area],
    pub plants: &'a [Plant],
}

pub type LayerFactory<L> = Box<dyn Fn(&LayerDescriptor, &LayerContext<'_>) -> L>;

/// Kind tag → factory dispatch table
pub struct LayerRegistry<L> {
    factories: HashMap<String, LayerFactory<L>>,
}

impl<L> LayerRegistry<L> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register `factory` under `kind`, replacing any previous one.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&LayerDescriptor, &LayerContext<'_>) -> L + 'static,
    ) -> &mut Self {
        self.factories.insert(kind.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn build(&self, descriptor: &LayerDescriptor, ctx: &LayerContext<'_>) -> Option<L> {
        self.factories
            .get(&descriptor.kind)
            .map(|factory| factory(descriptor, ctx))
    }
}

impl<L> Default for LayerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> fmt::Debug for LayerRegistry<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("LayerRegistry").field("kinds", &kinds).finish()
    }
}

/// One entry of a composition, in render order.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposedLayer<L> {
    Imagery,
    Regions,
    Plugin { layer_id: LayerId, layer: L },
}

impl<L> ComposedLayer<L> {
    pub fn layer_id(&self) -> LayerId {
        match self {
            ComposedLayer::Imagery => LayerId::IMAGERY,
            ComposedLayer::Regions => LayerId::REGIONS,
            ComposedLayer::Plugin { layer_id, .. } => layer_id.clone(),
        }
    }
}

/// Inputs of one composition pass
#[derive(Debug, Clone, Copy)]
pub struct CompositionInput<'a> {
    pub config: &'a MapConfig,
    /// `None` until the base image is loaded and probed
    pub image: Option<ImageBounds>,
    pub areas: &'a [Area],
    pub plants: &'a [Plant],
}

/// Holds the plugin list and the registry, and composes layers on demand.
#[derive(Debug)]
pub struct LayerManager<L> {
    registry: LayerRegistry<L>,
    plugins: Vec<LayerDescriptor>,
}

impl<L> LayerManager<L> {
    pub fn new(registry: LayerRegistry<L>) -> Self {
        Self {
            registry,
            plugins: Vec::new(),
        }
    }

    /// Add a pluggable layer, replacing one with the same id.
    pub fn add_plugin(&mut self, descriptor: LayerDescriptor) {
        if descriptor.layer_id.is_builtin() {
            warn!(
                "Layer id '{}' is reserved for a built-in layer, ignoring plugin",
                descriptor.layer_id
            );
            return;
        }
        match self
            .plugins
            .iter_mut()
            .find(|p| p.layer_id == descriptor.layer_id)
        {
            Some(existing) => *existing = descriptor,
            None => self.plugins.push(descriptor),
        }
    }

    pub fn remove_plugin(&mut self, layer_id: &LayerId) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.layer_id != *layer_id);
        self.plugins.len() != before
    }

    pub fn plugins(&self) -> &[LayerDescriptor] {
        &self.plugins
    }

    /// Every layer id the map can show: built-ins, then plugins by order.
    pub fn known_layers(&self) -> Vec<LayerId> {
        let mut ids = vec![LayerId::IMAGERY, LayerId::REGIONS];
        ids.extend(self.sorted_plugins().into_iter().map(|p| p.layer_id.clone()));
        ids
    }

    fn sorted_plugins(&self) -> Vec<&LayerDescriptor> {
        let mut sorted: Vec<&LayerDescriptor> = self.plugins.iter().collect();
        sorted.sort_by_key(|p| p.order);
        sorted
    }

    /// Layers to render, in render order.
    ///
    /// Without a base image nothing is rendered: pluggable geometry is in
    /// image pixel space and has no frame to draw into.
    pub fn compose(&self, input: CompositionInput<'_>) -> Vec<ComposedLayer<L>> {
        let Some(image) = input.image else {
            return Vec::new();
        };
        let visible = &input.config.visible_layers;
        let mut composed = Vec::new();

        if is_layer_visible(visible, &LayerId::IMAGERY) {
            composed.push(ComposedLayer::Imagery);
        }
        if is_layer_visible(visible, &LayerId::REGIONS) {
            composed.push(ComposedLayer::Regions);
        }

        let ctx = LayerContext {
            config: input.config,
            image,
            areas: input.areas,
            plants: input.plants,
        };
        for descriptor in self.sorted_plugins() {
            if !is_layer_visible(visible, &descriptor.layer_id) {
                continue;
            }
            match self.registry.build(descriptor, &ctx) {
                Some(layer) => composed.push(ComposedLayer::Plugin {
                    layer_id: descriptor.layer_id.clone(),
                    layer,
                }),
                None => warn!(
                    "No factory for layer kind '{}' (layer '{}'), skipping",
                    descriptor.kind, descriptor.layer_id
                ),
            }
        }

        composed
    }
}
