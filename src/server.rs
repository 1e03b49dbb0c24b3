use crate::pipeline::RenderedMap;
use crate::tooltip::TooltipController;
use crate::types::{ChoroplethMap, ColorBucket, RegionFill};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    response::{Html, Json},
    routing::get,
    Router,
};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

// Wrapper for RTree indexing
pub struct RegionIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for RegionIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    pub map: ChoroplethMap,
    pub page: String,
    pub tree: RTree<RegionIndex>,
}

impl AppState {
    pub fn new(rendered: RenderedMap) -> Self {
        // Regions without a bounding box (empty geometry) can never be hit.
        let items: Vec<RegionIndex> = rendered
            .map
            .regions
            .iter()
            .enumerate()
            .filter_map(|(index, region)| {
                let rect = region.shape.geometry.bounding_rect()?;
                Some(RegionIndex {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        info!("Built spatial index over {} regions", items.len());

        Self {
            map: rendered.map,
            page: rendered.page,
            tree: RTree::bulk_load(items),
        }
    }

    /// Region under a surface coordinate, as the hover API reports it.
    pub fn locate(&self, x: f64, y: f64) -> Option<RegionResponse> {
        let point = Point::new(x, y);
        let envelope = AABB::from_point([x, y]);

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|candidate| self.map.regions.get(candidate.index))
            .find(|region| region.shape.geometry.contains(&point))
            .map(|region| RegionResponse {
                fips: region.shape.id,
                matched: region.is_matched(),
                education: region.record.as_ref().map(|r| r.bachelors_or_higher),
                fill: region.fill,
                tooltip: TooltipController::content_for(region),
            })
    }
}

#[derive(Deserialize)]
pub struct QueryParams {
    x: f64,
    y: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RegionResponse {
    pub fips: u32,
    pub matched: bool,
    pub education: Option<f64>,
    pub fill: RegionFill,
    pub tooltip: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/api/region", get(region_handler))
        .route("/api/legend", get(legend_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(port: u16, rendered: RenderedMap) -> Result<()> {
    let state = Arc::new(AppState::new(rendered));
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Serving map on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn page_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn region_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<RegionResponse>> {
    Json(state.locate(params.x, params.y))
}

async fn legend_handler(State(state): State<Arc<AppState>>) -> Json<Vec<ColorBucket>> {
    Json(state.map.scale.buckets())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::ColorScale;
    use crate::types::{EducationRecord, RegionShape, RenderedRegion};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use geo::{polygon, MultiPolygon};
    use tower::ServiceExt;

    fn square(id: u32, offset: f64) -> RegionShape {
        RegionShape {
            id,
            geometry: MultiPolygon::new(vec![polygon![
                (x: offset, y: 0.0),
                (x: offset + 10.0, y: 0.0),
                (x: offset + 10.0, y: 10.0),
                (x: offset, y: 10.0),
            ]]),
        }
    }

    fn state() -> AppState {
        let record = EducationRecord {
            fips: 1,
            state: "AL".to_string(),
            area_name: "Autauga".to_string(),
            bachelors_or_higher: 21.0,
        };
        let palette = crate::config::RenderConfig::default().palette;
        AppState::new(RenderedMap {
            map: ChoroplethMap {
                regions: vec![
                    RenderedRegion { shape: square(1, 0.0), record: Some(record), fill: RegionFill::Bucket(0) },
                    RenderedRegion { shape: square(99999, 20.0), record: None, fill: RegionFill::Unmatched },
                ],
                scale: ColorScale::new([21.0, 71.0], palette).unwrap(),
            },
            page: "<html>map</html>".to_string(),
        })
    }

    #[test]
    fn locates_matched_region_with_tooltip() {
        let found = state().locate(5.0, 5.0).unwrap();
        assert_eq!(found.fips, 1);
        assert!(found.matched);
        assert_eq!(found.education, Some(21.0));
        assert_eq!(found.tooltip.as_deref(), Some("Autauga, AL: 21%"));
    }

    #[test]
    fn unmatched_region_reports_no_data() {
        let found = state().locate(25.0, 5.0).unwrap();
        assert_eq!(found.fips, 99999);
        assert!(!found.matched);
        assert_eq!(found.education, None);
        assert_eq!(found.fill, RegionFill::Unmatched);
        assert_eq!(found.tooltip, None);
    }

    #[test]
    fn empty_space_finds_nothing() {
        assert_eq!(state().locate(15.0, 5.0), None);
        assert_eq!(state().locate(5.0, 50.0), None);
    }

    #[tokio::test]
    async fn serves_page_and_region_api() {
        let app = router(Arc::new(state()));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<html>map</html>");

        let response = app
            .oneshot(Request::builder().uri("/api/region?x=5&y=5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["fips"], 1);
        assert_eq!(json["tooltip"], "Autauga, AL: 21%");
        assert_eq!(json["fill"]["kind"], "bucket");
    }

    #[tokio::test]
    async fn legend_api_lists_buckets_in_order() {
        let response = router(Arc::new(state()))
            .oneshot(Request::builder().uri("/api/legend").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let buckets: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[0]["lower_bound"], 21.0);
        assert_eq!(buckets[4]["upper_bound"], 71.0);
    }
}
