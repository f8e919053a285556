use regex::Regex;
use serde::Serialize;

use crate::{controllers::container_controller::ContainerRuntime, error::ProvisionError};

/// Which live containers a stop request targets.
#[derive(Debug, Clone)]
pub enum StopSelector {
    All,
    Pattern(Regex),
}

impl StopSelector {
    /// `all` selects everything, any other tag is a regular expression over container names.
    pub fn parse(tag: &str) -> Result<StopSelector, ProvisionError> {
        if tag == "all" {
            return Ok(StopSelector::All);
        }
        Regex::new(tag)
            .map(StopSelector::Pattern)
            .map_err(|err| ProvisionError::InvalidRequest(format!("bad pattern {}: {}", tag, err)))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            StopSelector::All => true,
            StopSelector::Pattern(pattern) => pattern.is_match(name),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub stopped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Stops every live container whose name matches. Not scoped to a testbed.
pub async fn stop_containers(
    runtime: &dyn ContainerRuntime,
    selector: &StopSelector,
) -> Result<StopReport, ProvisionError> {
    let containers = runtime.list_containers().await?;
    let mut report = StopReport::default();
    for container in containers {
        let Some(name) = container
            .names
            .iter()
            .map(|n| n.trim_start_matches('/'))
            .find(|n| selector.matches(n))
        else {
            continue;
        };
        tracing::info!("stopping {}", name);
        match runtime.stop_container(name).await {
            Ok(()) => report.stopped.push(name.to_string()),
            Err(err) => {
                tracing::warn!("stop container operation failed for {}: {}", name, err);
                report.failed.push((name.to_string(), err.to_string()));
            }
        }
    }
    Ok(report)
}
