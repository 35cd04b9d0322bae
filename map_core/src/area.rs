//! Areas and the map data store
//!
//! An [`Area`] is a named polygon drawn over the base image. Its identity is
//! two-phase: a [`AreaId::Draft`] from the moment the user confirms it, and a
//! [`AreaId::Persisted`] once the backend has assigned an id.
//!
//! [`MapDataStore`] is a dumb holder: `set_areas` replaces the whole list and
//! nothing is validated. Merging is the drawing engine's job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Point;
use crate::observer::{Observers, SubscriptionId};
use crate::plant::Plant;

const DRAFT_PREFIX: &str = "area-";
const PERSISTED_PREFIX: &str = "region-";

/// Identity of an area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AreaId {
    /// Client-side id, epoch milliseconds at creation (`area-<ms>`)
    Draft(i64),
    /// Backend id (`region-<id>`)
    Persisted(i64),
}

impl AreaId {
    pub fn is_draft(&self) -> bool {
        matches!(self, AreaId::Draft(_))
    }

    pub fn server_id(&self) -> Option<i64> {
        match self {
            AreaId::Draft(_) => None,
            AreaId::Persisted(id) => Some(*id),
        }
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaId::Draft(ts) => write!(f, "{}{}", DRAFT_PREFIX, ts),
            AreaId::Persisted(id) => write!(f, "{}{}", PERSISTED_PREFIX, id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not an area id: {0:?}")]
pub struct AreaIdError(pub String);

impl FromStr for AreaId {
    type Err = AreaIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |digits: &str| digits.parse::<i64>().map_err(|_| AreaIdError(s.to_string()));
        if let Some(rest) = s.strip_prefix(DRAFT_PREFIX) {
            parse(rest).map(AreaId::Draft)
        } else if let Some(rest) = s.strip_prefix(PERSISTED_PREFIX) {
            parse(rest).map(AreaId::Persisted)
        } else {
            Err(AreaIdError(s.to_string()))
        }
    }
}

impl Serialize for AreaId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AreaId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A drawn polygon region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    pub points: Vec<Point>,
    pub description: Option<String>,
    pub fill_color: Option<String>,
    pub stroke_color: Option<String>,
    pub fill_opacity: Option<f32>,
}

impl Area {
    pub fn new(id: AreaId, name: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            id,
            name: name.into(),
            points,
            description: None,
            fill_color: None,
            stroke_color: None,
            fill_opacity: None,
        }
    }
}

/// Areas and plant markers of the current map session
#[derive(Debug, Default)]
pub struct MapDataStore {
    areas: Vec<Area>,
    plants: Vec<Plant>,
    revision: u64,
    area_observers: Observers<[Area]>,
}

impl MapDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn area(&self, id: &AreaId) -> Option<&Area> {
        self.areas.iter().find(|a| a.id == *id)
    }

    /// Replace the whole area list. One call is one change.
    pub fn set_areas(&mut self, areas: Vec<Area>) {
        self.areas = areas;
        self.revision += 1;
        self.area_observers.notify(&self.areas);
    }

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn plant(&self, id: &str) -> Option<&Plant> {
        self.plants.iter().find(|p| p.id == id)
    }

    pub fn set_plants(&mut self, plants: Vec<Plant>) {
        self.plants = plants;
        self.revision += 1;
    }

    /// Bumped on every replacement of areas or plants.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Listen for area list replacements.
    pub fn subscribe(&mut self, listener: impl FnMut(&[Area]) + 'static) -> SubscriptionId {
        self.area_observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.area_observers.unsubscribe(id)
    }
}
