//! Background network work
//!
//! Every request runs on its own short-lived thread and reports back over an
//! mpsc channel that the update loop drains once per frame.

use std::sync::mpsc::Sender;
use std::thread;

use anyhow::{Context, Result};
use map_core::api::{self, CreateRegionRequest, HttpRegionApi, RegionApi};
use map_core::drawing::{DrawEvent, RegionSink};
use map_core::plant::plants_from_specimens;
use map_core::{Area, AreaId, ImageBounds, Plant};
use nannou::image::{DynamicImage, GenericImageView};
use tracing::{debug, error, info, warn};

/// Results of the startup loaders
pub enum LoadEvent {
    /// Base image downloaded and probed
    MapImage {
        name: String,
        image: DynamicImage,
        bounds: ImageBounds,
    },
    MapImageFailed(String),
    /// Regions from the backend, or placeholders when that failed
    Regions(Vec<Area>),
    Plants(Vec<Plant>),
    PlantsFailed(String),
}

fn spawn_named(name: &str, job: impl FnOnce() + Send + 'static) -> bool {
    match thread::Builder::new().name(name.to_string()).spawn(job) {
        Ok(_) => true,
        Err(e) => {
            error!("Failed to spawn {} thread: {}", name, e);
            false
        }
    }
}

fn send<T>(tx: &Sender<T>, value: T) {
    if tx.send(value).is_err() {
        debug!("Receiver dropped, discarding background result");
    }
}

/// Fetch the active map record, download the image and measure it.
fn load_map_image(api: &HttpRegionApi) -> Result<(String, DynamicImage, ImageBounds)> {
    let map = api
        .fetch_active_map()
        .context("fetching the active map")?;
    let url = api.image_url(&map.file_path);
    info!("Loading map '{}' from {}", map.name, url);

    let bytes = api
        .fetch_bytes(&url)
        .with_context(|| format!("downloading {}", url))?;
    let image = nannou::image::load_from_memory(&bytes)
        .with_context(|| format!("decoding {}", url))?;
    let bounds = ImageBounds::from_natural_size(image.width(), image.height())
        .with_context(|| format!("{} has no pixels", url))?;
    Ok((map.name, image, bounds))
}

/// Start the map image, region and specimen loaders.
pub fn spawn_initial_load(api: &HttpRegionApi, tx: &Sender<LoadEvent>) {
    let (map_api, map_tx) = (api.clone(), tx.clone());
    spawn_named("map-image-loader", move || {
        let event = match load_map_image(&map_api) {
            Ok((name, image, bounds)) => LoadEvent::MapImage {
                name,
                image,
                bounds,
            },
            Err(e) => {
                warn!("Map image unavailable: {:#}", e);
                LoadEvent::MapImageFailed(format!("{:#}", e))
            }
        };
        send(&map_tx, event);
    });

    let (region_api, region_tx) = (api.clone(), tx.clone());
    spawn_named("region-loader", move || {
        send(&region_tx, LoadEvent::Regions(api::load_regions(&region_api)));
    });

    let (plant_api, plant_tx) = (api.clone(), tx.clone());
    spawn_named("specimen-loader", move || {
        let event = match plant_api.fetch_specimens() {
            Ok(specimens) => LoadEvent::Plants(plants_from_specimens(&specimens)),
            Err(e) => {
                warn!("Specimens unavailable: {}", e);
                LoadEvent::PlantsFailed(e.to_string())
            }
        };
        send(&plant_tx, event);
    });
}

/// Posts new regions and answers with the reconciliation event
pub struct HttpRegionSink {
    api: HttpRegionApi,
    tx: Sender<DrawEvent>,
}

impl HttpRegionSink {
    pub fn new(api: HttpRegionApi, tx: Sender<DrawEvent>) -> Self {
        Self { api, tx }
    }
}

impl RegionSink for HttpRegionSink {
    fn submit(&mut self, draft: AreaId, request: CreateRegionRequest) {
        let (api, tx) = (self.api.clone(), self.tx.clone());
        let spawned = spawn_named("region-create", move || {
            let event = match api.create_region(&request) {
                Ok(created) => DrawEvent::RegionCreated {
                    draft,
                    server_id: created.id,
                },
                Err(e) => DrawEvent::RegionCreateFailed {
                    draft,
                    error: e.to_string(),
                },
            };
            send(&tx, event);
        });
        if !spawned {
            send(
                &self.tx,
                DrawEvent::RegionCreateFailed {
                    draft,
                    error: "could not start the upload".to_string(),
                },
            );
        }
    }
}
