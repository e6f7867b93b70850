//! Compute provisioning gateway.
//!
//! | Call | Request |
//! |---|---|
//! | describe instance type | `GET /instance-types/{type}` (404 means unknown) |
//! | create ingress rule | `POST /ingress-rules` `{name, rules}` → `{ruleId}` |
//! | delete ingress rule | `DELETE /ingress-rules/{id}` |
//! | allocate instance | `POST /instances` → `{instanceId}` |
//! | terminate instance | `DELETE /instances/{id}` |
//! | start / stop | `POST /instances/{id}/start`, `POST /instances/{id}/stop` |
//! | list images | `GET /images?owner=..&name=..&architecture=..` |

use hearth_core::config::ImageFilterConfig;
use hearth_orchestrator::{
    BoxFuture, CollaboratorResult, InstanceRequest, MachineImage, ProvisioningApi,
};
use hearth_state::PortRule;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{RemoteError, RemoteResult};
use crate::http;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleCreated {
    rule_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceCreated {
    instance_id: String,
}

#[derive(Clone)]
pub struct HttpProvisioningApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProvisioningApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: http::client(),
        }
    }

    fn url(&self, path: &str) -> String {
        http::join(&self.base_url, path)
    }

    async fn send_empty(&self, request: reqwest::RequestBuilder) -> RemoteResult<()> {
        http::check(request.send().await?).await?;
        Ok(())
    }
}

impl ProvisioningApi for HttpProvisioningApi {
    fn describe_instance_type<'a>(
        &'a self,
        instance_type: &'a str,
    ) -> BoxFuture<'a, CollaboratorResult<bool>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url(&format!("instance-types/{instance_type}")))
                .send()
                .await
                .map_err(RemoteError::from)?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(false);
            }
            http::check(response).await?;
            Ok(true)
        })
    }

    fn create_ingress_rule<'a>(
        &'a self,
        name: &'a str,
        rules: &'a [PortRule],
    ) -> BoxFuture<'a, CollaboratorResult<String>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("ingress-rules"))
                .json(&json!({ "name": name, "rules": rules }))
                .send()
                .await
                .map_err(RemoteError::from)?;
            let created: RuleCreated = http::read_json(response).await?;
            info!(%name, rule_id = %created.rule_id, "ingress rule created");
            Ok(created.rule_id)
        })
    }

    fn delete_ingress_rule<'a>(&'a self, rule_id: &'a str) -> BoxFuture<'a, CollaboratorResult<()>> {
        Box::pin(async move {
            self.send_empty(self.client.delete(self.url(&format!("ingress-rules/{rule_id}"))))
                .await?;
            info!(%rule_id, "ingress rule deleted");
            Ok(())
        })
    }

    fn allocate_instance<'a>(
        &'a self,
        request: &'a InstanceRequest,
    ) -> BoxFuture<'a, CollaboratorResult<String>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("instances"))
                .json(request)
                .send()
                .await
                .map_err(RemoteError::from)?;
            let created: InstanceCreated = http::read_json(response).await?;
            info!(instance_id = %created.instance_id, image = %request.image_id, "instance allocated");
            Ok(created.instance_id)
        })
    }

    fn terminate_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> BoxFuture<'a, CollaboratorResult<()>> {
        Box::pin(async move {
            self.send_empty(self.client.delete(self.url(&format!("instances/{instance_id}"))))
                .await?;
            info!(%instance_id, "instance terminated");
            Ok(())
        })
    }

    fn start_instance<'a>(&'a self, instance_id: &'a str) -> BoxFuture<'a, CollaboratorResult<()>> {
        Box::pin(async move {
            self.send_empty(self.client.post(self.url(&format!("instances/{instance_id}/start"))))
                .await?;
            Ok(())
        })
    }

    fn stop_instance<'a>(&'a self, instance_id: &'a str) -> BoxFuture<'a, CollaboratorResult<()>> {
        Box::pin(async move {
            self.send_empty(self.client.post(self.url(&format!("instances/{instance_id}/stop"))))
                .await?;
            Ok(())
        })
    }

    fn list_recent_images<'a>(
        &'a self,
        filter: &'a ImageFilterConfig,
    ) -> BoxFuture<'a, CollaboratorResult<Vec<MachineImage>>> {
        Box::pin(async move {
            let mut query: Vec<(&str, &str)> =
                filter.owners.iter().map(|o| ("owner", o.as_str())).collect();
            query.push(("name", &filter.name_pattern));
            query.push(("architecture", &filter.architecture));

            let response = self
                .client
                .get(self.url("images"))
                .query(&query)
                .send()
                .await
                .map_err(RemoteError::from)?;
            let images: Vec<MachineImage> = http::read_json(response).await?;
            debug!(count = images.len(), "images listed");
            Ok(images)
        })
    }
}
