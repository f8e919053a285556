use std::{future::Future, sync::Arc};

use crate::{
    db::port_registry::PortRegistryRepository, error::ProvisionError,
    utils::port_utils::allocate_free_port,
};

/// Candidate ports tried before giving up on a reservation.
pub const MAX_RESERVE_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct PortAllocator {
    registry: Arc<dyn PortRegistryRepository>,
}

impl PortAllocator {
    pub fn new(registry: Arc<dyn PortRegistryRepository>) -> PortAllocator {
        PortAllocator { registry }
    }

    /// Takes an OS-assigned free port and reserves it for `testbed_id` in one check-and-insert.
    /// A port already in the registry, whoever holds it, is discarded and another one is tried.
    pub async fn reserve(&self, testbed_id: &str) -> Result<u16, ProvisionError> {
        self.reserve_with(testbed_id, allocate_free_port).await
    }

    async fn reserve_with<F, Fut>(&self, testbed_id: &str, mut next_candidate: F) -> Result<u16, ProvisionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<u16, ProvisionError>>,
    {
        for attempt in 1..=MAX_RESERVE_ATTEMPTS {
            let port = next_candidate().await?;
            if self.registry.reserve_port(port, testbed_id).await? {
                tracing::debug!("reserved port {} for testbed {}", port, testbed_id);
                return Ok(port);
            }
            tracing::warn!(
                "port {} already held, attempt {}/{} for testbed {}",
                port,
                attempt,
                MAX_RESERVE_ATTEMPTS,
                testbed_id
            );
        }
        Err(ProvisionError::Conflict(format!(
            "no free port for testbed {} after {} attempts",
            testbed_id, MAX_RESERVE_ATTEMPTS
        )))
    }

    pub async fn release(&self, port: u16, testbed_id: &str) -> Result<bool, ProvisionError> {
        self.registry.release_port(port, testbed_id).await
    }
}
