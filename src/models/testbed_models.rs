use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::service_image_models::{ServiceImage, supported_image};

/// Written into every container record once it is built.
pub const REST_PORT: u16 = 7010;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestbedStatus {
    Initiated,
    InProgress,
    Completed,
    Deleted,
}

impl TestbedStatus {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Initiated => "Initiated",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Deleted => "Deleted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// States teardown may move out of.
    pub const LIVE: [TestbedStatus; 3] = [Self::Initiated, Self::InProgress, Self::Completed];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub image: String,
    pub container_id: String,
    pub host_name: String,
    pub ip_address: String,
    pub service_port: u16,
    pub rest_port: u16,
}

impl ContainerRecord {
    pub fn new(testbed_id: &str, image: ServiceImage) -> ContainerRecord {
        ContainerRecord {
            image: image.as_str().to_string(),
            container_id: String::new(),
            host_name: container_name(testbed_id, image),
            ip_address: String::new(),
            service_port: 0,
            rest_port: 0,
        }
    }
}

/// `{testbed_id}-{image}`, used both as container name and hostname.
pub fn container_name(testbed_id: &str, image: ServiceImage) -> String {
    format!("{}-{}", testbed_id, image.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisionStep {
    Pull,
    ReservePort,
    Create,
    Start,
    Inspect,
    Persist,
    Remove,
    ReleasePort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub image: String,
    pub step: ProvisionStep,
    pub message: String,
    pub at: i64,
}

impl StepFailure {
    pub fn new(image: &str, step: ProvisionStep, message: impl Into<String>) -> StepFailure {
        StepFailure {
            image: image.to_string(),
            step,
            message: message.into(),
            at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testbed {
    #[serde(rename = "_id")]
    pub id: String,
    pub created_at: i64,
    pub name: String,
    pub containers: Vec<ContainerRecord>,
    pub status: TestbedStatus,
    #[serde(default)]
    pub skipped_images: Vec<String>,
    #[serde(default)]
    pub failures: Vec<StepFailure>,
}

impl Testbed {
    /// Builds an `Initiated` testbed. Supported images get one record each in request
    /// order (repeats collapse onto the first), everything else lands in `skipped_images`.
    pub fn new(name: &str, requested: &[String]) -> Testbed {
        let id = Uuid::new_v4().to_string();
        let mut containers: Vec<ContainerRecord> = Vec::new();
        let mut skipped_images = Vec::new();
        for requested_image in requested {
            match supported_image(requested_image) {
                Some(image) => {
                    if !containers.iter().any(|c| c.image == image.as_str()) {
                        containers.push(ContainerRecord::new(&id, image));
                    }
                }
                None => skipped_images.push(requested_image.clone()),
            }
        }
        Testbed {
            id,
            created_at: chrono::Utc::now().timestamp(),
            name: name.to_string(),
            containers,
            status: TestbedStatus::Initiated,
            skipped_images,
            failures: Vec::new(),
        }
    }

    pub fn supported_images(&self) -> Vec<ServiceImage> {
        self.containers
            .iter()
            .filter_map(|c| supported_image(&c.image))
            .collect()
    }

    pub fn container(&self, image: &str) -> Option<&ContainerRecord> {
        self.containers.iter().find(|c| c.image == image)
    }
}
