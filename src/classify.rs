use crate::scale::ColorScale;
use crate::types::{EducationRecord, RegionFill, RegionShape, RenderedRegion};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{info, warn};

/// Joins each shape to its education record by FIPS and assigns its bucket.
/// Produces exactly one region per shape, in input order.
pub fn classify(
    shapes: Vec<RegionShape>,
    records: &[EducationRecord],
    scale: &ColorScale,
) -> Vec<RenderedRegion> {
    info!("Classifying {} regions against {} records...", shapes.len(), records.len());

    // Index once so the join stays linear in the number of counties.
    let by_fips: HashMap<u32, &EducationRecord> = records.iter().map(|r| (r.fips, r)).collect();
    if by_fips.len() != records.len() {
        warn!(
            "Education dataset has {} duplicate FIPS codes; the last record wins",
            records.len() - by_fips.len()
        );
    }

    let regions: Vec<RenderedRegion> = shapes
        .into_par_iter()
        .map(|shape| {
            let record = by_fips.get(&shape.id).map(|r| (*r).clone());
            let fill = match &record {
                Some(r) => RegionFill::Bucket(scale.bucket_index(r.bachelors_or_higher)),
                None => RegionFill::Unmatched,
            };
            RenderedRegion { shape, record, fill }
        })
        .collect();

    let unmatched = regions.iter().filter(|r| !r.is_matched()).count();
    if unmatched > 0 {
        warn!("{} regions have no education record and will be drawn as no-data", unmatched);
    }

    regions
}
