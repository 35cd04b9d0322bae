//! Core of the garden map: configuration store, layer composition, region
//! drawing state machine and the REST client for the backend.
//!
//! Nothing in here knows about windows or rendering; the app crate plugs a
//! concrete [`drawing::DrawingSurface`] and layer type into these pieces.

pub mod api;
pub mod area;
pub mod config;
pub mod control;
pub mod drawing;
pub mod geometry;
pub mod layers;
pub mod modal;
pub mod observer;
pub mod plant;
pub mod settings;
pub mod storage;
pub mod viewport;

pub use area::{Area, AreaId, MapDataStore};
pub use config::{InteractionMode, MapConfig, MapConfigStore, MapConfigUpdate};
pub use geometry::{Bounds, ImageBounds, Point};
pub use layers::LayerId;
pub use plant::Plant;
pub use settings::AppSettings;
pub use storage::{ConfigStorage, FileStorage, MemoryStorage, StorageError};
