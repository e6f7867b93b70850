//! Input validation for server creation.
//!
//! Validation never writes anything; every failure is a client error.

use std::sync::LazyLock;

use hearth_state::{Catalog, PortRule, Protocol};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::collaborators::ProvisioningApi;
use crate::error::{OrchestratorError, OrchestratorResult};

pub const MIN_STORAGE_GIB: i64 = 4;
pub const MAX_STORAGE_GIB: i64 = 128;

static SERVER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("server name pattern compiles"));

/// Body of a create request, as sent by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerRequest {
    pub server_name: String,
    pub game_id: String,
    pub instance_type: String,
    /// Root volume size in GiB.
    pub storage: i64,
    pub ports: Vec<PortInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInput {
    pub port: i64,
    pub protocol: String,
}

/// A create request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCreate {
    pub name: String,
    pub game_id: String,
    pub instance_type: String,
    pub storage_gib: u32,
    pub ports: Vec<PortRule>,
}

pub fn is_valid_server_name(name: &str) -> bool {
    SERVER_NAME.is_match(name)
}

pub fn validate_storage(storage: i64) -> OrchestratorResult<u32> {
    if !(MIN_STORAGE_GIB..=MAX_STORAGE_GIB).contains(&storage) {
        return Err(OrchestratorError::InvalidRequest("storage".into()));
    }
    Ok(storage as u32)
}

/// All ports must be valid; one bad entry rejects the request.
pub fn validate_ports(ports: &[PortInput]) -> OrchestratorResult<Vec<PortRule>> {
    ports
        .iter()
        .map(|p| {
            let port = u16::try_from(p.port).ok().filter(|port| *port >= 1);
            let protocol = Protocol::parse(&p.protocol);
            match (port, protocol) {
                (Some(port), Some(protocol)) => Ok(PortRule { port, protocol }),
                _ => Err(OrchestratorError::InvalidRequest("ports".into())),
            }
        })
        .collect()
}

/// Run every check in order: name, catalog id, instance type, storage, ports.
pub async fn validate_create(
    request: &CreateServerRequest,
    catalog: &Catalog,
    provisioning: &dyn ProvisioningApi,
) -> OrchestratorResult<ValidatedCreate> {
    if !is_valid_server_name(&request.server_name) {
        return Err(OrchestratorError::InvalidRequest("serverName".into()));
    }

    if catalog.get(&request.game_id)?.is_none() {
        return Err(OrchestratorError::InvalidRequest("gameId".into()));
    }

    // Any provider failure here counts as an unrecognized type.
    let known = !request.instance_type.is_empty()
        && provisioning
            .describe_instance_type(&request.instance_type)
            .await
            .unwrap_or(false);
    if !known {
        return Err(OrchestratorError::InvalidRequest("instanceType".into()));
    }

    let storage_gib = validate_storage(request.storage)?;
    let ports = validate_ports(&request.ports)?;

    Ok(ValidatedCreate {
        name: request.server_name.clone(),
        game_id: request.game_id.clone(),
        instance_type: request.instance_type.clone(),
        storage_gib,
        ports,
    })
}
