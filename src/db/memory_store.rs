use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::ProvisionError,
    models::{
        port_registry_models::{PortAllocation, PortRegistry},
        testbed_models::{ContainerRecord, StepFailure, Testbed, TestbedStatus},
    },
};

use super::{
    port_registry::PortRegistryRepository,
    testbeds::{apply_container_field, ContainerField, ContainerFieldValue, TestbedRepository},
};

/// Process-local store for `STORE_BACKEND=memory`. Each operation holds the lock for
/// its whole read-modify-write, which gives it the same atomicity as a single-document update.
#[derive(Default)]
pub struct MemoryStore {
    testbeds: Mutex<HashMap<String, Testbed>>,
    registry: Mutex<Option<PortRegistry>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

fn missing_testbed(id: &str) -> ProvisionError {
    ProvisionError::NotFound(format!("testbed {}", id))
}

#[async_trait]
impl TestbedRepository for MemoryStore {
    async fn insert_testbed(&self, testbed: &Testbed) -> Result<(), ProvisionError> {
        let mut testbeds = self.testbeds.lock().await;
        if testbeds.contains_key(&testbed.id) {
            return Err(ProvisionError::Conflict(format!("testbed {} exists", testbed.id)));
        }
        testbeds.insert(testbed.id.clone(), testbed.clone());
        Ok(())
    }

    async fn get_testbed(&self, id: &str) -> Result<Testbed, ProvisionError> {
        self.testbeds
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| missing_testbed(id))
    }

    async fn transition_status(
        &self,
        id: &str,
        from: &[TestbedStatus],
        to: TestbedStatus,
    ) -> Result<bool, ProvisionError> {
        let mut testbeds = self.testbeds.lock().await;
        match testbeds.get_mut(id) {
            Some(testbed) if from.contains(&testbed.status) => {
                testbed.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_container_fields(
        &self,
        id: &str,
        image: &str,
        fields: &[(ContainerField, ContainerFieldValue)],
    ) -> Result<(), ProvisionError> {
        let mut testbeds = self.testbeds.lock().await;
        let record = testbeds
            .get_mut(id)
            .and_then(|t| t.containers.iter_mut().find(|c| c.image == image))
            .ok_or_else(|| {
                ProvisionError::NotFound(format!("container {} in testbed {}", image, id))
            })?;
        let mut updated = record.clone();
        for (field, value) in fields {
            apply_container_field(&mut updated, *field, value)?;
        }
        *record = updated;
        Ok(())
    }

    async fn get_container(&self, id: &str, image: &str) -> Result<ContainerRecord, ProvisionError> {
        self.testbeds
            .lock()
            .await
            .get(id)
            .and_then(|t| t.container(image).cloned())
            .ok_or_else(|| {
                ProvisionError::NotFound(format!("container {} in testbed {}", image, id))
            })
    }

    async fn record_failure(&self, id: &str, failure: &StepFailure) -> Result<(), ProvisionError> {
        let mut testbeds = self.testbeds.lock().await;
        let testbed = testbeds.get_mut(id).ok_or_else(|| missing_testbed(id))?;
        testbed.failures.push(failure.clone());
        Ok(())
    }

    async fn delete_testbed(&self, id: &str) -> Result<(), ProvisionError> {
        self.testbeds
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| missing_testbed(id))
    }
}

#[async_trait]
impl PortRegistryRepository for MemoryStore {
    async fn init_registry(&self) -> Result<(), ProvisionError> {
        let mut registry = self.registry.lock().await;
        if registry.is_none() {
            *registry = Some(PortRegistry::new());
        }
        Ok(())
    }

    async fn get_registry(&self) -> Result<PortRegistry, ProvisionError> {
        self.registry
            .lock()
            .await
            .clone()
            .ok_or_else(|| ProvisionError::NotFound("port registry".to_string()))
    }

    async fn reserve_port(&self, port: u16, testbed_id: &str) -> Result<bool, ProvisionError> {
        let mut registry = self.registry.lock().await;
        let registry = registry
            .as_mut()
            .ok_or_else(|| ProvisionError::NotFound("port registry".to_string()))?;
        if registry.owner_of(port).is_some() {
            return Ok(false);
        }
        registry.allocated_ports.push(PortAllocation {
            port,
            testbed_id: testbed_id.to_string(),
        });
        Ok(true)
    }

    async fn release_port(&self, port: u16, testbed_id: &str) -> Result<bool, ProvisionError> {
        let mut registry = self.registry.lock().await;
        let registry = registry
            .as_mut()
            .ok_or_else(|| ProvisionError::NotFound("port registry".to_string()))?;
        let before = registry.allocated_ports.len();
        registry
            .allocated_ports
            .retain(|a| !(a.port == port && a.testbed_id == testbed_id));
        Ok(registry.allocated_ports.len() != before)
    }
}
