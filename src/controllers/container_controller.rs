use std::collections::HashMap;

use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
        RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
    },
    image::{CreateImageOptions, ListImagesOptions},
    models::{ContainerInspectResponse, HostConfig, PortBinding},
    Docker,
};
use futures_util::TryStreamExt;

use crate::{
    error::ProvisionError,
    models::docker_container_models::{ContainerSpec, ContainerSummaryEntry, InspectedContainer},
};

/// Operations the orchestrator needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_images(&self) -> Result<Vec<String>, ProvisionError>;

    async fn pull_image(&self, reference: &str) -> Result<(), ProvisionError>;

    /// Returns the runtime's container id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ProvisionError>;

    async fn start_container(&self, container_id: &str) -> Result<(), ProvisionError>;

    async fn inspect_container(&self, container_id: &str)
        -> Result<InspectedContainer, ProvisionError>;

    async fn stop_container(&self, name_or_id: &str) -> Result<(), ProvisionError>;

    async fn remove_container(&self, name_or_id: &str) -> Result<(), ProvisionError>;

    async fn list_containers(&self) -> Result<Vec<ContainerSummaryEntry>, ProvisionError>;
}

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> DockerRuntime {
        DockerRuntime { docker }
    }
}

/// Splits `repo:tag`, keeping registry ports (`host:5000/repo`) in the repo part.
fn split_reference(reference: &str) -> (&str, &str) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (reference, "latest"),
    }
}

fn port_bindings(spec: &ContainerSpec) -> HashMap<String, Option<Vec<PortBinding>>> {
    let mut port_binding = HashMap::new();
    port_binding.insert(
        spec.exposed_port.clone(),
        Some(vec![PortBinding {
            host_port: Some(spec.host_port.to_string()),
            host_ip: Some("0.0.0.0".to_string()),
        }]),
    );
    port_binding
}

fn inspected(response: ContainerInspectResponse) -> InspectedContainer {
    let network_settings = response.network_settings.unwrap_or_default();
    // user-defined networks leave the top-level address empty
    let ip_address = network_settings
        .ip_address
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            network_settings.networks.as_ref().and_then(|networks| {
                networks
                    .values()
                    .filter_map(|endpoint| endpoint.ip_address.clone())
                    .find(|ip| !ip.is_empty())
            })
        })
        .unwrap_or_default();
    let port_bindings = network_settings
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|(exposed, bindings)| {
            let host_ports = bindings
                .unwrap_or_default()
                .into_iter()
                .filter_map(|b| b.host_port.and_then(|p| p.parse::<u16>().ok()))
                .collect::<Vec<u16>>();
            (exposed, host_ports)
        })
        .collect();
    InspectedContainer {
        ip_address,
        port_bindings,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_images(&self) -> Result<Vec<String>, ProvisionError> {
        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await?;
        Ok(images
            .into_iter()
            .filter_map(|image| image.repo_tags.into_iter().next())
            .collect())
    }

    async fn pull_image(&self, reference: &str) -> Result<(), ProvisionError> {
        let (from_image, tag) = split_reference(reference);
        let options = CreateImageOptions::<String> {
            from_image: from_image.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };
        // the pull only finishes once the progress stream is drained
        self.docker
            .create_image(Some(options), None, None)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ProvisionError> {
        let host_config: HostConfig = HostConfig {
            port_bindings: Some(port_bindings(spec)),
            ..Default::default()
        };
        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(spec.exposed_port.clone(), HashMap::new());
        let config = Config {
            image: Some(spec.image.clone()),
            hostname: Some(spec.name.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };
        let options = Some(CreateContainerOptions::<String> {
            name: spec.name.clone(),
            ..Default::default()
        });
        let response = self.docker.create_container(options, config).await?;
        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<(), ProvisionError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn inspect_container(
        &self,
        container_id: &str,
    ) -> Result<InspectedContainer, ProvisionError> {
        let response = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await?;
        Ok(inspected(response))
    }

    async fn stop_container(&self, name_or_id: &str) -> Result<(), ProvisionError> {
        self.docker
            .stop_container(name_or_id, None::<StopContainerOptions>)
            .await?;
        Ok(())
    }

    async fn remove_container(&self, name_or_id: &str) -> Result<(), ProvisionError> {
        let remove_container_options: RemoveContainerOptions = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(name_or_id, Some(remove_container_options))
            .await?;
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummaryEntry>, ProvisionError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers
            .into_iter()
            .map(|summary| ContainerSummaryEntry {
                id: summary.id.unwrap_or_default(),
                names: summary.names.unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{EndpointSettings, NetworkSettings};

    #[test]
    fn split_reference_handles_tags_and_registry_ports() {
        assert_eq!(
            split_reference("docker.io/library/mongo:latest"),
            ("docker.io/library/mongo", "latest")
        );
        assert_eq!(split_reference("redis"), ("redis", "latest"));
        assert_eq!(
            split_reference("registry.local:5000/redis"),
            ("registry.local:5000/redis", "latest")
        );
    }

    #[test]
    fn binds_exposed_port_on_all_interfaces() {
        let spec = ContainerSpec {
            name: "tb-redis".to_string(),
            image: "docker.io/library/redis:latest".to_string(),
            exposed_port: "6379/tcp".to_string(),
            host_port: 41000,
        };
        let bindings = port_bindings(&spec);
        let binding = &bindings["6379/tcp"].as_ref().unwrap()[0];
        assert_eq!(binding.host_ip.as_deref(), Some("0.0.0.0"));
        assert_eq!(binding.host_port.as_deref(), Some("41000"));
    }

    #[test]
    fn inspected_reads_ip_and_bindings() {
        let mut ports = HashMap::new();
        ports.insert(
            "27017/tcp".to_string(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("41001".to_string()),
            }]),
        );
        let response = ContainerInspectResponse {
            network_settings: Some(NetworkSettings {
                ip_address: Some("172.17.0.4".to_string()),
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        };
        let inspected = inspected(response);
        assert_eq!(inspected.ip_address, "172.17.0.4");
        assert_eq!(inspected.host_port_for("27017/tcp"), Some(41001));
    }

    #[test]
    fn inspected_falls_back_to_network_endpoints() {
        let mut networks = HashMap::new();
        networks.insert(
            "testbeds".to_string(),
            EndpointSettings {
                ip_address: Some("10.0.3.7".to_string()),
                ..Default::default()
            },
        );
        let response = ContainerInspectResponse {
            network_settings: Some(NetworkSettings {
                ip_address: Some(String::new()),
                networks: Some(networks),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(inspected(response).ip_address, "10.0.3.7");
    }
}
