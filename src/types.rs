use crate::scale::ColorScale;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// One row of the education dataset.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EducationRecord {
    pub fips: u32,
    pub state: String,
    pub area_name: String,
    #[serde(rename = "bachelorsOrHigher")]
    pub bachelors_or_higher: f64,
}

/// A county boundary decoded from the topology, in surface coordinates.
#[derive(Debug, Clone)]
pub struct RegionShape {
    pub id: u32,
    pub geometry: MultiPolygon<f64>,
}

/// How a region is filled. Missing data is its own state, not a zero value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "bucket", rename_all = "snake_case")]
pub enum RegionFill {
    Bucket(usize),
    Unmatched,
}

#[derive(Debug, Clone)]
pub struct RenderedRegion {
    pub shape: RegionShape,
    pub record: Option<EducationRecord>,
    pub fill: RegionFill,
}

impl RenderedRegion {
    pub fn is_matched(&self) -> bool {
        self.record.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorBucket {
    pub index: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub color: String,
}

/// Everything one draw pass needs: classified regions and the scale behind them.
#[derive(Debug, Clone)]
pub struct ChoroplethMap {
    pub regions: Vec<RenderedRegion>,
    pub scale: ColorScale,
}

impl ChoroplethMap {
    /// Fill color of a region; no-data regions use `unmatched_color`.
    pub fn fill_color<'a>(&'a self, region: &RenderedRegion, unmatched_color: &'a str) -> &'a str {
        match region.fill {
            RegionFill::Bucket(index) => self.scale.color_of_bucket(index),
            RegionFill::Unmatched => unmatched_color,
        }
    }
}
