//! Container listing from the lifecycle backend

use console_api::{ContainerList, ContainerSummary};

use crate::errors::ConsoleError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// List every container known to the backend
    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>, ConsoleError> {
        let list: ContainerList = self.get("/docker/containers").await?;
        Ok(list.into_vec())
    }

    /// Initial status snapshot for one server, matched by id or id prefix
    pub async fn get_container(&self, id: &str) -> Result<ContainerSummary, ConsoleError> {
        let containers = self.list_containers().await?;
        find_container(containers, id)
            .ok_or_else(|| ConsoleError::NotFound(format!("container {}", id)))
    }
}

/// Exact id match first, then a unique id prefix
pub fn find_container(containers: Vec<ContainerSummary>, id: &str) -> Option<ContainerSummary> {
    if id.is_empty() {
        return None;
    }
    if let Some(exact) = containers.iter().position(|c| c.id == id) {
        return containers.into_iter().nth(exact);
    }

    let mut matches = containers.into_iter().filter(|c| c.id.starts_with(id));
    let first = matches.next()?;
    match matches.next() {
        Some(_) => None,
        None => Some(first),
    }
}

/// Containers whose name contains `query`, case-insensitive
pub fn filter_by_name<'a>(
    containers: &'a [ContainerSummary],
    query: &'a str,
) -> impl Iterator<Item = &'a ContainerSummary> + 'a {
    containers
        .iter()
        .filter(move |c| query.is_empty() || c.matches_name(query))
}
