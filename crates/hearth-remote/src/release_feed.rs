//! Catalog release feed backed by GitHub releases.
//!
//! The latest tag comes from the releases API (`tag_name`); the catalog
//! itself is a JSON array of game manifests attached to the release as
//! `{download_url}/{tag}/{asset}`.

use hearth_core::config::ReleaseFeedConfig;
use hearth_orchestrator::{BoxFuture, CollaboratorResult, ReleaseFeed};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::RemoteError;
use crate::http;

#[derive(Deserialize)]
struct LatestRelease {
    tag_name: String,
}

#[derive(Clone)]
pub struct GithubReleaseFeed {
    config: ReleaseFeedConfig,
    client: reqwest::Client,
}

impl GithubReleaseFeed {
    pub fn new(config: ReleaseFeedConfig) -> Self {
        Self {
            config,
            client: http::client(),
        }
    }

    fn asset_url(&self, tag: &str) -> String {
        http::join(&self.config.download_url, &format!("{tag}/{}", self.config.asset))
    }
}

impl ReleaseFeed for GithubReleaseFeed {
    fn latest_release_tag(&self) -> BoxFuture<'_, CollaboratorResult<String>> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.config.latest_url)
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .send()
                .await
                .map_err(RemoteError::from)?;
            let release: LatestRelease = http::read_json(response).await?;
            debug!(tag = %release.tag_name, "latest catalog release");
            Ok(release.tag_name)
        })
    }

    fn download_manifests<'a>(
        &'a self,
        tag: &'a str,
    ) -> BoxFuture<'a, CollaboratorResult<Vec<Value>>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.asset_url(tag))
                .send()
                .await
                .map_err(RemoteError::from)?;
            let manifests: Vec<Value> = http::read_json(response).await?;
            debug!(%tag, count = manifests.len(), "catalog downloaded");
            Ok(manifests)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_orchestrator::CollaboratorError;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed(server: &MockServer) -> GithubReleaseFeed {
        GithubReleaseFeed::new(ReleaseFeedConfig {
            latest_url: format!("{}/repos/acme/catalog/releases/latest", server.uri()),
            download_url: format!("{}/acme/catalog/releases/download", server.uri()),
            asset: "catalog.json".into(),
        })
    }

    #[tokio::test]
    async fn reads_tag_then_asset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/catalog/releases/latest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"tag_name": "v2.1.0", "name": "Catalog 2.1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/acme/catalog/releases/download/v2.1.0/catalog.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "valheim"}])))
            .mount(&server)
            .await;

        let feed = feed(&server);
        let tag = feed.latest_release_tag().await.unwrap();
        assert_eq!(tag, "v2.1.0");
        let manifests = feed.download_manifests(&tag).await.unwrap();
        assert_eq!(manifests, vec![json!({"id": "valheim"})]);
    }

    #[tokio::test]
    async fn asset_that_is_not_an_array_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"games": []})))
            .mount(&server)
            .await;

        let err = feed(&server).download_manifests("v1").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Malformed(_)));
    }
}
