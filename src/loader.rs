use crate::config::SourceConfig;
use crate::error::{Dataset, FetchCause, MapError};
use crate::topology::Topology;
use crate::types::EducationRecord;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Retrieves the raw body behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchCause>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchCause> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchCause::Status(status.as_u16()));
        }
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone)]
pub struct Datasets {
    pub education: Vec<EducationRecord>,
    pub topology: Topology,
}

/// Fetches both datasets concurrently. Either failure fails the whole load and
/// the sibling request is dropped.
pub async fn load<F>(fetcher: &F, sources: &SourceConfig) -> Result<Datasets, MapError>
where
    F: Fetcher + ?Sized,
{
    info!("Fetching education records and county topology...");

    let (education, topology) = tokio::try_join!(
        fetch_json::<F, Vec<EducationRecord>>(fetcher, Dataset::Education, &sources.education_url),
        fetch_json::<F, Topology>(fetcher, Dataset::Counties, &sources.counties_url),
    )?;

    info!(
        "Loaded {} education records and {} topology arcs",
        education.len(),
        topology.arcs.len()
    );

    Ok(Datasets { education, topology })
}

async fn fetch_json<F, T>(fetcher: &F, dataset: Dataset, url: &str) -> Result<T, MapError>
where
    F: Fetcher + ?Sized,
    T: DeserializeOwned,
{
    let wrap = |source: FetchCause| MapError::Fetch {
        dataset,
        url: url.to_string(),
        source,
    };

    let body = fetcher.fetch(url).await.map_err(wrap)?;
    debug!("Fetched {} bytes for {}", body.len(), dataset);
    serde_json::from_slice(&body).map_err(|e| wrap(e.into()))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory fetcher keyed by URL; unknown URLs answer 404.
    #[derive(Default)]
    pub struct StaticFetcher {
        bodies: HashMap<String, String>,
        delay: Option<Duration>,
        pub calls: AtomicUsize,
    }

    impl StaticFetcher {
        pub fn with(mut self, url: &str, body: impl Into<String>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchCause> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.bodies
                .get(url)
                .map(|b| b.as_bytes().to_vec())
                .ok_or(FetchCause::Status(404))
        }
    }

    pub fn sources() -> SourceConfig {
        SourceConfig {
            education_url: "mem://education.json".to_string(),
            counties_url: "mem://counties.json".to_string(),
            ..SourceConfig::default()
        }
    }

    pub const AUTAUGA_EDUCATION: &str =
        r#"[{"fips":1,"state":"AL","area_name":"Autauga","bachelorsOrHigher":21.0}]"#;

    pub const SINGLE_COUNTY_TOPOLOGY: &str = r#"{
        "type": "Topology",
        "arcs": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]],
        "objects": {
            "counties": {
                "type": "GeometryCollection",
                "geometries": [{ "type": "Polygon", "id": 1, "arcs": [[0]] }]
            }
        }
    }"#;
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    /// Serves a fixed pair of routes on an ephemeral local port.
    async fn local_upstream() -> SocketAddr {
        let app = Router::new()
            .route("/education.json", get(|| async { AUTAUGA_EDUCATION }))
            .route("/counties.json", get(|| async { SINGLE_COUNTY_TOPOLOGY }))
            .route(
                "/broken.json",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn http_fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn http_fetcher_returns_body_of_successful_response() {
        let addr = local_upstream().await;
        let body = http_fetcher()
            .fetch(&format!("http://{addr}/education.json"))
            .await
            .unwrap();
        assert_eq!(body, AUTAUGA_EDUCATION.as_bytes());
    }

    #[tokio::test]
    async fn http_fetcher_maps_error_status() {
        let addr = local_upstream().await;
        let result = http_fetcher().fetch(&format!("http://{addr}/broken.json")).await;
        assert!(matches!(result, Err(FetchCause::Status(500))));

        let result = http_fetcher().fetch(&format!("http://{addr}/missing.json")).await;
        assert!(matches!(result, Err(FetchCause::Status(404))));
    }

    #[tokio::test]
    async fn http_fetcher_maps_connection_failure() {
        // Bind then release a port so nothing is listening on it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = http_fetcher().fetch(&format!("http://{addr}/education.json")).await;
        assert!(matches!(result, Err(FetchCause::Http(_))));
    }

    #[tokio::test]
    async fn load_over_http_fails_on_upstream_error() {
        let addr = local_upstream().await;
        let ok = SourceConfig {
            education_url: format!("http://{addr}/education.json"),
            counties_url: format!("http://{addr}/counties.json"),
            ..SourceConfig::default()
        };
        let datasets = load(&http_fetcher(), &ok).await.unwrap();
        assert_eq!(datasets.education[0].fips, 1);

        let broken = SourceConfig {
            counties_url: format!("http://{addr}/broken.json"),
            ..ok
        };
        let err = load(&http_fetcher(), &broken).await.unwrap_err();
        assert!(matches!(
            err,
            MapError::Fetch { dataset: Dataset::Counties, source: FetchCause::Status(500), .. }
        ));
    }

    #[tokio::test]
    async fn resolves_with_both_datasets() {
        let sources = sources();
        let fetcher = StaticFetcher::default()
            .with(&sources.education_url, AUTAUGA_EDUCATION)
            .with(&sources.counties_url, SINGLE_COUNTY_TOPOLOGY);

        let datasets = load(&fetcher, &sources).await.unwrap();
        assert_eq!(datasets.education.len(), 1);
        assert_eq!(datasets.education[0].area_name, "Autauga");
        assert_eq!(datasets.education[0].bachelors_or_higher, 21.0);
        assert_eq!(datasets.topology.arcs.len(), 1);
        assert!(datasets.topology.objects.contains_key("counties"));
    }

    #[tokio::test]
    async fn failing_topology_fails_the_whole_load() {
        let sources = sources();
        let fetcher = StaticFetcher::default().with(&sources.education_url, AUTAUGA_EDUCATION);

        let err = load(&fetcher, &sources).await.unwrap_err();
        match err {
            MapError::Fetch { dataset, url, source } => {
                assert_eq!(dataset, Dataset::Counties);
                assert_eq!(url, sources.counties_url);
                assert!(matches!(source, FetchCause::Status(404)));
            }
            other => panic!("expected fetch failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_a_fetch_failure() {
        let sources = sources();
        let fetcher = StaticFetcher::default()
            .with(&sources.education_url, r#"{"not": "an array"}"#)
            .with(&sources.counties_url, SINGLE_COUNTY_TOPOLOGY);

        let err = load(&fetcher, &sources).await.unwrap_err();
        assert!(matches!(
            err,
            MapError::Fetch { dataset: Dataset::Education, source: FetchCause::Payload(_), .. }
        ));
    }
}
