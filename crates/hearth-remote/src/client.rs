//! Client for the Hearth HTTP API, used by `hearthd watch`.

use hearth_core::Caller;
use hearth_orchestrator::{BoxFuture, CollaboratorResult, ServerSource};
use hearth_state::ServerRecord;
use serde::Deserialize;
use tracing::warn;

use crate::error::{RemoteError, RemoteResult};
use crate::http;

pub const USER_HEADER: &str = "x-hearth-user";
pub const ROLE_HEADER: &str = "x-hearth-role";

#[derive(Deserialize)]
struct Envelope<T> {
    ok: T,
}

/// Error body of a listing whose status probes partly failed.
#[derive(Deserialize)]
struct PartialBody {
    error: String,
    message: String,
    servers: Vec<ServerRecord>,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    caller: Caller,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, caller: Caller) -> Self {
        Self {
            base_url: base_url.into(),
            caller,
            client: http::client(),
        }
    }

    pub async fn list_servers(&self, refresh_status: bool) -> RemoteResult<Vec<ServerRecord>> {
        let response = self
            .client
            .get(http::join(&self.base_url, "api/v1/servers"))
            .query(&[("refreshStatus", refresh_status)])
            .header(USER_HEADER, &self.caller.username)
            .header(ROLE_HEADER, self.caller.role.as_str())
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            let envelope: Envelope<Vec<ServerRecord>> = http::read_json(response).await?;
            return Ok(envelope.ok);
        }

        let body = response.bytes().await?;
        match serde_json::from_slice::<PartialBody>(&body) {
            Ok(partial) if partial.error == "PartialFailure" => Err(RemoteError::PartialRefresh {
                message: partial.message,
                servers: partial.servers,
            }),
            _ => Err(http::status_error(status, &body)),
        }
    }
}

impl ServerSource for ApiClient {
    fn fetch_servers(
        &self,
        refresh_status: bool,
    ) -> BoxFuture<'_, CollaboratorResult<Vec<ServerRecord>>> {
        Box::pin(async move {
            match self.list_servers(refresh_status).await {
                Ok(servers) => Ok(servers),
                // The rows are still current; the poller reconciles them.
                Err(RemoteError::PartialRefresh { message, servers }) => {
                    warn!(%message, rows = servers.len(), "listing returned with failed status probes");
                    Ok(servers)
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}
