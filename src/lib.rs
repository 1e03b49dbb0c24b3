//! County-level choropleth of US educational attainment.
//!
//! Fetches the education records and the county topology, joins them by FIPS
//! code, quantizes the values onto a five-color palette and draws the result
//! as an SVG page with a hover tooltip and legend.

pub mod types;
pub mod config;
pub mod error;
pub mod loader;
pub mod topology;
pub mod scale;
pub mod classify;
pub mod tooltip;
pub mod render;
pub mod pipeline;
pub mod session;
pub mod server;

pub use error::{Dataset, FetchCause, MapError};
pub use types::{ChoroplethMap, ColorBucket, EducationRecord, RegionFill, RegionShape, RenderedRegion};
