//! Equal-width quantize scale mapping education values onto a fixed palette.

use crate::error::MapError;
use crate::types::{ColorBucket, EducationRecord};

#[derive(Debug, Clone)]
pub struct ColorScale {
    min: f64,
    max: f64,
    // Interior bucket boundaries, `palette.len() - 1` of them.
    thresholds: Vec<f64>,
    palette: Vec<String>,
}

impl ColorScale {
    /// Builds the scale over the full observed range of `values`.
    pub fn new<I>(values: I, palette: Vec<String>) -> Result<Self, MapError>
    where
        I: IntoIterator<Item = f64>,
    {
        if palette.is_empty() {
            return Err(MapError::EmptyPalette);
        }

        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .ok_or(MapError::EmptyDomain)?;

        // Same threshold formula as d3's scaleQuantize, so boundaries are exact
        // whenever the domain allows it.
        let n = palette.len();
        let thresholds = (0..n - 1)
            .map(|i| ((i + 1) as f64 * max + (n - 1 - i) as f64 * min) / n as f64)
            .collect();

        Ok(Self { min, max, thresholds, palette })
    }

    pub fn from_records(records: &[EducationRecord], palette: Vec<String>) -> Result<Self, MapError> {
        Self::new(records.iter().map(|r| r.bachelors_or_higher), palette)
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    /// Bucket index for `value`. Values on a boundary go to the upper bucket;
    /// values outside the domain clamp to the first or last bucket. A
    /// degenerate domain (`min == max`) puts everything in bucket 0.
    pub fn bucket_index(&self, value: f64) -> usize {
        if self.max <= self.min {
            return 0;
        }
        self.thresholds.partition_point(|&t| t <= value)
    }

    pub fn color_for(&self, value: f64) -> &str {
        &self.palette[self.bucket_index(value)]
    }

    pub fn color_of_bucket(&self, index: usize) -> &str {
        &self.palette[index.min(self.palette.len() - 1)]
    }

    /// Buckets ordered by increasing bound, one per palette color.
    pub fn buckets(&self) -> Vec<ColorBucket> {
        let last = self.palette.len() - 1;
        self.palette
            .iter()
            .enumerate()
            .map(|(index, color)| ColorBucket {
                index,
                lower_bound: if index == 0 { self.min } else { self.thresholds[index - 1] },
                upper_bound: if index == last { self.max } else { self.thresholds[index] },
                color: color.clone(),
            })
            .collect()
    }
}
