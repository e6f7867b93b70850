//! Parsing of catalog manifests published by the release feed.
//!
//! Manifests come from an external repository, so each one is checked field
//! by field instead of trusting a strict deserialize: a bad port or message
//! is dropped on its own, while a bad terms-of-service list or a missing
//! required field drops the whole entry.

use hearth_state::{CatalogCompute, CatalogEntry, OperatorMessage, PortRule, TermsOfService};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Parse every manifest, skipping the invalid ones.
pub fn parse_manifests(manifests: &[Value]) -> Vec<CatalogEntry> {
    manifests.iter().filter_map(parse_manifest).collect()
}

pub fn parse_manifest(manifest: &Value) -> Option<CatalogEntry> {
    let entry = parse_entry(manifest);
    if entry.is_none() {
        debug!(id = ?manifest.get("id"), "skipping invalid catalog manifest");
    }
    entry
}

fn parse_entry(manifest: &Value) -> Option<CatalogEntry> {
    let id = manifest.get("id")?.as_str()?;
    let display_name = manifest.get("displayName")?.as_str()?;
    let compute = manifest.get("compute")?;
    let instance_type = compute.get("instanceType")?.as_str()?;
    let minimum_instance_type = compute.get("minimumInstanceType")?.as_str()?;
    let storage = compute.get("storage")?.as_f64()?;
    let ports = compute.get("ports")?.as_array()?;

    let ports: Vec<PortRule> = each_valid(ports)
        .into_iter()
        .filter(|rule: &PortRule| rule.port > 0)
        .collect();

    let terms_of_service = match manifest.get("termsOfService") {
        Some(Value::Array(items)) => {
            let terms: Vec<TermsOfService> = each_valid(items);
            if terms.len() != items.len() {
                return None;
            }
            terms
        }
        _ => Vec::new(),
    };

    let messages: Vec<OperatorMessage> = match manifest.get("messages") {
        Some(Value::Array(items)) => each_valid(items),
        _ => Vec::new(),
    };

    Some(CatalogEntry {
        id: id.to_string(),
        display_name: display_name.to_string(),
        compute: CatalogCompute {
            instance_type: instance_type.to_string(),
            minimum_instance_type: minimum_instance_type.to_string(),
            storage: storage.max(0.0).round() as u32,
            ports,
        },
        terms_of_service,
        messages,
    })
}

fn each_valid<T: DeserializeOwned>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}
