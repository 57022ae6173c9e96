//! Container listing returned by the lifecycle REST collaborator
//!
//! Field names follow the Docker engine API, which the backend forwards as is.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Labels Docker Desktop sets with the published host port
const DESKTOP_PORT_LABELS: [&str; 2] = [
    "desktop.docker.io/ports/80/tcp",
    "desktop.docker.io/ports/443/tcp",
];

/// Container list payload; either a bare array or wrapped in `data`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContainerList {
    Bare(Vec<ContainerSummary>),
    Wrapped {
        #[serde(default)]
        data: Vec<ContainerSummary>,
    },
}

impl ContainerList {
    pub fn into_vec(self) -> Vec<ContainerSummary> {
        match self {
            ContainerList::Bare(list) => list,
            ContainerList::Wrapped { data } => data,
        }
    }
}

/// One container as listed by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: String,

    #[serde(default)]
    pub names: Vec<String>,

    #[serde(default)]
    pub image: Option<String>,

    /// Machine state, e.g. `running` or `exited`
    #[serde(default)]
    pub state: Option<String>,

    /// Human readable status, e.g. `Up 3 hours`
    #[serde(default)]
    pub status: Option<String>,

    /// Creation time as a Unix timestamp in seconds
    #[serde(default)]
    pub created: Option<i64>,

    #[serde(default)]
    pub ports: Vec<ContainerPort>,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub host_config: Option<HostConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerPort {
    #[serde(rename = "IP", default)]
    pub ip: Option<String>,

    #[serde(rename = "PrivatePort", default)]
    pub private_port: Option<u16>,

    #[serde(rename = "PublicPort", default)]
    pub public_port: Option<u16>,

    #[serde(rename = "Type", default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    #[serde(default)]
    pub network_mode: Option<String>,
}

impl ContainerSummary {
    /// First container name without Docker's leading slash
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|name| name.trim_start_matches('/'))
            .unwrap_or_else(|| self.short_id())
    }

    /// The 12-character id prefix Docker prints
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(12) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.as_deref() == Some("running")
    }

    /// Address the server is reachable at, even while it is stopped.
    ///
    /// Tries a published port first, then the Docker Desktop port label,
    /// then the network mode.
    pub fn endpoint(&self) -> String {
        if let Some(port) = self.ports.iter().find(|p| p.ip.is_some()) {
            let ip = port.ip.as_deref().unwrap_or_default();
            return match port.public_port {
                Some(public) => format!("{ip}:{public}"),
                None => ip.to_string(),
            };
        }

        if let Some(label) = DESKTOP_PORT_LABELS
            .iter()
            .find_map(|key| self.labels.get(*key))
        {
            return format!("127.0.0.1{label}");
        }

        self.host_config
            .as_ref()
            .and_then(|hc| hc.network_mode.clone())
            .unwrap_or_else(|| "internal-link".to_string())
    }

    /// Case-insensitive match against the first container name
    pub fn matches_name(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.names
            .first()
            .map(|name| name.to_lowercase().contains(&query))
            .unwrap_or(false)
    }
}
