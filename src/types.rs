use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One county boundary, decoded from the TopoJSON `counties` object.
#[derive(Debug, Clone)]
pub struct CountyShape {
    pub fips: u32,
    pub geometry: MultiPolygon<f64>,
}

/// One row of the education statistics dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationRecord {
    pub fips: u32,
    pub area_name: String,
    pub state: String,
    #[serde(rename = "bachelorsOrHigher")]
    pub bachelors_or_higher: f64,
}

/// Lookup from FIPS code to its statistics row, built once before rendering.
pub type EducationIndex = HashMap<u32, EducationRecord>;
