use crate::classify::classify;
use crate::config::AppConfig;
use crate::error::MapError;
use crate::loader::{self, Fetcher};
use crate::render::render_page;
use crate::scale::ColorScale;
use crate::topology;
use crate::types::ChoroplethMap;
use tracing::info;

/// A classified map and the page drawn from it.
#[derive(Debug, Clone)]
pub struct RenderedMap {
    pub map: ChoroplethMap,
    pub page: String,
}

/// Load, decode, classify and draw. Any failure stops the run before the
/// next stage starts, so nothing partial is ever drawn.
pub async fn build_map<F>(fetcher: &F, config: &AppConfig) -> Result<RenderedMap, MapError>
where
    F: Fetcher + ?Sized,
{
    let datasets = loader::load(fetcher, &config.sources).await?;

    let shapes = topology::decode(&datasets.topology, &config.sources.counties_object)?;
    info!("Decoded {} county shapes", shapes.len());

    let scale = ColorScale::from_records(&datasets.education, config.render.palette.clone())?;
    let (min, max) = scale.domain();
    info!("Color scale domain: {:.1}..{:.1} over {} buckets", min, max, scale.palette().len());

    let regions = classify(shapes, &datasets.education, &scale);
    let map = ChoroplethMap { regions, scale };
    let page = render_page(&map, &config.render);

    Ok(RenderedMap { map, page })
}
