//! Plant markers
//!
//! Plants come from the specimen catalog; the map only reads them.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// A plant marker on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub id: String,
    pub name: String,
    pub latin_name: Option<String>,
    pub description: Option<String>,
    pub position: Point,
}

/// Catalog record as served by the specimen endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specimen {
    pub id: i64,
    #[serde(default)]
    pub russian_name: Option<String>,
    #[serde(default)]
    pub latin_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl From<&Specimen> for Plant {
    fn from(specimen: &Specimen) -> Self {
        let name = non_blank(&specimen.russian_name)
            .or_else(|| non_blank(&specimen.latin_name))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Растение #{}", specimen.id));

        Self {
            id: format!("plant-{}", specimen.id),
            name,
            latin_name: non_blank(&specimen.latin_name).map(str::to_string),
            description: non_blank(&specimen.description).map(str::to_string),
            position: Point::new(specimen.latitude, specimen.longitude),
        }
    }
}

pub fn plants_from_specimens(specimens: &[Specimen]) -> Vec<Plant> {
    specimens.iter().map(Plant::from).collect()
}

/// A group of markers drawn as one
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Mean position of the members
    pub position: Point,
    /// Indices into the input slice, in input order
    pub members: Vec<usize>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Greedy grid clustering of screen positions.
///
/// Positions falling into the same `cell_size` square share a cluster.
/// Clusters appear in the order of their first member.
pub fn cluster_positions(positions: &[Point], cell_size: f64) -> Vec<Cluster> {
    if cell_size <= 0.0 {
        return positions
            .iter()
            .enumerate()
            .map(|(i, p)| Cluster {
                position: *p,
                members: vec![i],
            })
            .collect();
    }

    let mut cells: Vec<((i64, i64), Vec<usize>)> = Vec::new();
    for (i, p) in positions.iter().enumerate() {
        let cell = (
            (p.x / cell_size).floor() as i64,
            (p.y / cell_size).floor() as i64,
        );
        match cells.iter_mut().find(|(c, _)| *c == cell) {
            Some((_, members)) => members.push(i),
            None => cells.push((cell, vec![i])),
        }
    }

    cells
        .into_iter()
        .map(|(_, members)| {
            let n = members.len() as f64;
            let (sx, sy) = members.iter().fold((0.0, 0.0), |(sx, sy), &i| {
                (sx + positions[i].x, sy + positions[i].y)
            });
            Cluster {
                position: Point::new(sx / n, sy / n),
                members,
            }
        })
        .collect()
}
