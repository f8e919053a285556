use std::sync::Arc;

use crate::{
    controllers::{container_controller::ContainerRuntime, port_controller::PortAllocator},
    db::{port_registry::PortRegistryRepository, testbeds::TestbedRepository},
    models::testbed_models::REST_PORT,
    utils::env_utils::DEFAULT_IMAGE_REGISTRY,
};

#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// Prefix for pulled image references, e.g. `docker.io/library/`.
    pub image_registry: String,
    pub rest_port: u16,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        ProvisionSettings {
            image_registry: DEFAULT_IMAGE_REGISTRY.to_string(),
            rest_port: REST_PORT,
        }
    }
}

/// Collaborators shared by handlers and background provisioning tasks.
#[derive(Clone)]
pub struct AppContext {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub testbeds: Arc<dyn TestbedRepository>,
    pub ports: PortAllocator,
    pub settings: ProvisionSettings,
}

impl AppContext {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        testbeds: Arc<dyn TestbedRepository>,
        registry: Arc<dyn PortRegistryRepository>,
        settings: ProvisionSettings,
    ) -> AppContext {
        AppContext {
            runtime,
            testbeds,
            ports: PortAllocator::new(registry),
            settings,
        }
    }
}
