//! Backend REST contracts
//!
//! DTOs for the map, region and specimen endpoints, the [`RegionApi`] trait
//! the rest of the crate talks to, and a blocking HTTP implementation. Calls
//! block; the application runs them on background threads.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::area::{Area, AreaId};
use crate::geometry::{self, Point};
use crate::plant::Specimen;

pub const DEFAULT_STROKE_COLOR: &str = "#3388ff";
pub const DEFAULT_FILL_COLOR: &str = "#3388ff";
pub const DEFAULT_FILL_OPACITY: f32 = 0.2;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Active base map metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapImageDto {
    pub id: i64,
    pub file_path: String,
    #[serde(default)]
    pub name: String,
}

/// Region as returned by the region list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDto {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON-encoded `[[x, y], ...]`, or garbage; see
    /// [`geometry::parse_polygon_coordinates`]
    #[serde(default)]
    pub polygon_coordinates: Option<String>,
    #[serde(default)]
    pub stroke_color: Option<String>,
    #[serde(default)]
    pub fill_color: Option<String>,
    #[serde(default)]
    pub fill_opacity: Option<f32>,
}

/// Body of the region creation request. `id` is always 0: "assign one".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegionRequest {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub polygon_coordinates: String,
    pub latitude: f64,
    pub longitude: f64,
    pub fill_color: String,
    pub stroke_color: String,
    pub fill_opacity: f32,
    pub sector_type: i32,
}

impl CreateRegionRequest {
    pub fn from_area(area: &Area, sector_type: i32) -> Self {
        let center = geometry::centroid(&area.points).unwrap_or(Point::new(0.0, 0.0));
        Self {
            id: 0,
            name: area.name.clone(),
            description: area.description.clone().unwrap_or_default(),
            polygon_coordinates: geometry::encode_polygon(&area.points),
            latitude: center.x,
            longitude: center.y,
            fill_color: area
                .fill_color
                .clone()
                .unwrap_or_else(|| DEFAULT_FILL_COLOR.to_string()),
            stroke_color: area
                .stroke_color
                .clone()
                .unwrap_or_else(|| DEFAULT_STROKE_COLOR.to_string()),
            fill_opacity: area.fill_opacity.unwrap_or(DEFAULT_FILL_OPACITY),
            sector_type,
        }
    }
}

/// The part of the creation response the map needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedRegion {
    pub id: i64,
}

/// Backend operations used by the map
pub trait RegionApi {
    fn fetch_active_map(&self) -> Result<MapImageDto, ApiError>;
    fn fetch_regions(&self) -> Result<Vec<RegionDto>, ApiError>;
    fn create_region(&self, request: &CreateRegionRequest) -> Result<CreatedRegion, ApiError>;
    fn fetch_specimens(&self) -> Result<Vec<Specimen>, ApiError>;
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, path)
}

/// Blocking HTTP implementation of [`RegionApi`]
#[derive(Debug, Clone)]
pub struct HttpRegionApi {
    client: Client,
    api_base_url: String,
    image_base_url: String,
}

impl HttpRegionApi {
    pub fn new(
        api_base_url: impl Into<String>,
        image_base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
            image_base_url: image_base_url.into(),
        })
    }

    /// Full URL of a map image from its `filePath`.
    pub fn image_url(&self, file_path: &str) -> String {
        join_url(&self.image_base_url, file_path)
    }

    /// Download raw bytes (used for the base image).
    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| ApiError::Request {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = join_url(&self.api_base_url, path);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
            });
        }
        response.json().map_err(|source| ApiError::Decode { url, source })
    }
}

impl RegionApi for HttpRegionApi {
    fn fetch_active_map(&self) -> Result<MapImageDto, ApiError> {
        self.get_json("map/active")
    }

    fn fetch_regions(&self) -> Result<Vec<RegionDto>, ApiError> {
        self.get_json("regions")
    }

    fn create_region(&self, request: &CreateRegionRequest) -> Result<CreatedRegion, ApiError> {
        let url = join_url(&self.api_base_url, "regions");
        debug!("POST {} ({})", url, request.name);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
            });
        }
        response.json().map_err(|source| ApiError::Decode { url, source })
    }

    fn fetch_specimens(&self) -> Result<Vec<Specimen>, ApiError> {
        self.get_json("specimens")
    }
}

/// Convert a backend region, substituting the default shape for bad geometry.
pub fn area_from_region(region: &RegionDto) -> Area {
    let name = if region.name.trim().is_empty() {
        format!("Область {}", region.id)
    } else {
        region.name.clone()
    };
    Area {
        id: AreaId::Persisted(region.id),
        name,
        points: geometry::parse_polygon_coordinates(region.polygon_coordinates.as_deref()),
        description: region.description.clone(),
        fill_color: region.fill_color.clone(),
        stroke_color: region.stroke_color.clone(),
        fill_opacity: region.fill_opacity,
    }
}

/// Regions shown when the backend cannot be reached.
pub fn placeholder_regions() -> Vec<Area> {
    let rect = |x0: f64, y0: f64, x1: f64, y1: f64| {
        vec![
            Point::new(x0, y0),
            Point::new(x0, y1),
            Point::new(x1, y1),
            Point::new(x1, y0),
        ]
    };
    let mut dendrarium = Area::new(
        AreaId::Persisted(1),
        "Дендрарий",
        rect(100.0, 100.0, 300.0, 300.0),
    );
    dendrarium.fill_color = Some("#2e7d32".to_string());
    let mut greenhouse = Area::new(
        AreaId::Persisted(2),
        "Оранжерея",
        rect(400.0, 100.0, 600.0, 250.0),
    );
    greenhouse.fill_color = Some("#f9a825".to_string());
    let mut rosarium = Area::new(
        AreaId::Persisted(3),
        "Розарий",
        rect(150.0, 400.0, 350.0, 550.0),
    );
    rosarium.fill_color = Some("#c2185b".to_string());
    vec![dendrarium, greenhouse, rosarium]
}

/// Fetch regions as areas, falling back to [`placeholder_regions`].
pub fn load_regions(api: &dyn RegionApi) -> Vec<Area> {
    match api.fetch_regions() {
        Ok(regions) => regions.iter().map(area_from_region).collect(),
        Err(e) => {
            warn!("Failed to fetch regions ({}), showing placeholder regions", e);
            placeholder_regions()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OfflineApi;

    impl RegionApi for OfflineApi {
        fn fetch_active_map(&self) -> Result<MapImageDto, ApiError> {
            Err(ApiError::Status {
                url: "map/active".into(),
                status: 503,
            })
        }

        fn fetch_regions(&self) -> Result<Vec<RegionDto>, ApiError> {
            Err(ApiError::Status {
                url: "regions".into(),
                status: 503,
            })
        }

        fn create_region(&self, _request: &CreateRegionRequest) -> Result<CreatedRegion, ApiError> {
            Err(ApiError::Status {
                url: "regions".into(),
                status: 503,
            })
        }

        fn fetch_specimens(&self) -> Result<Vec<Specimen>, ApiError> {
            Ok(Vec::new())
        }
    }

    struct FixedApi(Vec<RegionDto>);

    impl RegionApi for FixedApi {
        fn fetch_active_map(&self) -> Result<MapImageDto, ApiError> {
            Ok(MapImageDto {
                id: 1,
                file_path: "maps/garden.png".into(),
                name: "Сад".into(),
            })
        }

        fn fetch_regions(&self) -> Result<Vec<RegionDto>, ApiError> {
            Ok(self.0.clone())
        }

        fn create_region(&self, _request: &CreateRegionRequest) -> Result<CreatedRegion, ApiError> {
            Ok(CreatedRegion { id: 99 })
        }

        fn fetch_specimens(&self) -> Result<Vec<Specimen>, ApiError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_region_json_with_sentinel_coordinates() {
        let raw = r##"[
            {"id": 3, "name": "Альпинарий", "polygonCoordinates": "string", "fillColor": "#ff0000"},
            {"id": 4, "name": "Пруд", "polygonCoordinates": "[[1,2],[3,4],[5,6]]", "sectorType": 2},
            {"id": 5, "name": ""}
        ]"##;
        let regions: Vec<RegionDto> = serde_json::from_str(raw).unwrap();
        let areas = load_regions(&FixedApi(regions));

        assert_eq!(areas.len(), 3);
        assert_eq!(areas[0].id, AreaId::Persisted(3));
        assert_eq!(areas[0].points, geometry::default_polygon());
        assert_eq!(areas[0].fill_color.as_deref(), Some("#ff0000"));
        assert_eq!(areas[1].points.len(), 3);
        assert_eq!(areas[2].name, "Область 5");
        assert_eq!(areas[2].points, geometry::default_polygon());
    }

    #[test]
    fn test_fetch_failure_gives_placeholders() {
        let areas = load_regions(&OfflineApi);
        assert_eq!(areas, placeholder_regions());
        assert!(!areas.is_empty());
    }

    #[test]
    fn test_create_request_body() {
        let mut area = Area::new(
            AreaId::Draft(1),
            "Новая область 1",
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 10.0),
                Point::new(10.0, 10.0),
                Point::new(10.0, 0.0),
            ],
        );
        area.description = Some("у пруда".into());

        let request = CreateRegionRequest::from_area(&area, 4);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["id"], 0);
        assert_eq!(json["latitude"], 5.0);
        assert_eq!(json["longitude"], 5.0);
        assert_eq!(json["sectorType"], 4);
        assert_eq!(json["fillColor"], DEFAULT_FILL_COLOR);
        assert_eq!(json["description"], "у пруда");
        let polygon = json["polygonCoordinates"].as_str().unwrap();
        assert_eq!(
            geometry::parse_polygon_coordinates(Some(polygon)),
            area.points
        );
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://host/api/", "/regions"),
            "http://host/api/regions"
        );
        assert_eq!(join_url("http://host", "uploads/a.png"), "http://host/uploads/a.png");
        assert_eq!(join_url("http://host/", ""), "http://host");
    }

    #[test]
    fn test_image_url_prefixes_file_path() {
        let api = HttpRegionApi::new("http://localhost:8080/api", "http://localhost:8080/").unwrap();
        assert_eq!(
            api.image_url("/uploads/map.png"),
            "http://localhost:8080/uploads/map.png"
        );
    }
}
