//! Deployed contract addresses from truffle build artifacts.

use std::collections::HashMap;
use std::path::Path;

use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

#[derive(Deserialize)]
struct Artifact {
    #[serde(default)]
    networks: HashMap<String, Deployment>,
}

#[derive(Deserialize)]
struct Deployment {
    address: String,
}

/// Address of `name` on `network_id`, from `<build_dir>/<name>.json`.
pub fn deployed_address(build_dir: &Path, name: &str, network_id: u64) -> Result<Address> {
    let path = build_dir.join(format!("{name}.json"));
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("read artifact '{}'", path.display()))?;
    address_in(&json, network_id).with_context(|| format!("contract '{name}'"))
}

fn address_in(json: &str, network_id: u64) -> Result<Address> {
    let artifact: Artifact = serde_json::from_str(json).context("parse artifact JSON")?;
    let deployment = artifact
        .networks
        .get(&network_id.to_string())
        .ok_or_else(|| anyhow!("not deployed on network {network_id}"))?;
    deployment
        .address
        .parse()
        .with_context(|| format!("invalid address '{}'", deployment.address))
}
