use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    context::{AppContext, ProvisionSettings},
    controllers::container_controller::ContainerRuntime,
    db::{
        memory_store::MemoryStore,
        port_registry::PortRegistryRepository,
        testbeds::{ContainerField, ContainerFieldValue, TestbedRepository},
    },
    error::ProvisionError,
    models::{
        docker_container_models::{ContainerSpec, ContainerSummaryEntry, InspectedContainer},
        port_registry_models::PortRegistry,
        testbed_models::{ContainerRecord, StepFailure, Testbed, TestbedStatus},
    },
};

/// Records every runtime call as `op:target` and fails calls whose target matches a configured image.
#[derive(Default)]
pub struct FakeRuntime {
    operations: Mutex<Vec<String>>,
    created: Mutex<Vec<(String, ContainerSpec)>>,
    extra_containers: Mutex<Vec<ContainerSummaryEntry>>,
    failing: Mutex<HashMap<&'static str, HashSet<String>>>,
    create_gates: Mutex<Vec<(String, CreateGate)>>,
}

/// Parks a create call: `entered` fires when the call arrives, the call returns after `release`.
#[derive(Clone, Default)]
pub struct CreateGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FakeRuntime {
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.operations.lock().unwrap().push(entry);
    }

    fn fail(&self, op: &'static str, image: &str) {
        self.failing
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .insert(image.to_string());
    }

    pub fn fail_pull(&self, image: &str) {
        self.fail("pull", image)
    }

    pub fn fail_create(&self, image: &str) {
        self.fail("create", image)
    }

    pub fn fail_start(&self, image: &str) {
        self.fail("start", image)
    }

    pub fn fail_inspect(&self, image: &str) {
        self.fail("inspect", image)
    }

    pub fn fail_stop(&self, name: &str) {
        self.fail("stop", name)
    }

    pub fn fail_remove(&self, image: &str) {
        self.fail("remove", image)
    }

    /// Removal answers as if the container had already been deleted out of band.
    pub fn remove_missing(&self, image: &str) {
        self.fail("gone", image)
    }

    pub fn hold_create(&self, image: &str) -> CreateGate {
        let gate = CreateGate::default();
        self.create_gates
            .lock()
            .unwrap()
            .push((format!("-{}", image), gate.clone()));
        gate
    }

    /// A container the runtime knows about that no testbed created.
    pub fn add_container(&self, id: &str, name: &str) {
        self.extra_containers.lock().unwrap().push(ContainerSummaryEntry {
            id: id.to_string(),
            names: vec![format!("/{}", name)],
        });
    }

    fn hits(&self, op: &'static str, target: &str) -> bool {
        let failing = self.failing.lock().unwrap();
        failing.get(op).is_some_and(|images| {
            images.iter().any(|image| {
                target.ends_with(&format!("-{}", image))
                    || target.contains(&format!("/{}:", image))
                    || target == image
            })
        })
    }

    fn check(&self, op: &'static str, target: &str) -> Result<(), ProvisionError> {
        if self.hits(op, target) {
            return Err(ProvisionError::RuntimeOperationFailed(format!(
                "{} {} refused",
                op, target
            )));
        }
        Ok(())
    }

    fn spec_of(&self, container_id: &str) -> Option<ContainerSpec> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == container_id)
            .map(|(_, spec)| spec.clone())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_images(&self) -> Result<Vec<String>, ProvisionError> {
        self.record("list_images".to_string());
        Ok(Vec::new())
    }

    async fn pull_image(&self, reference: &str) -> Result<(), ProvisionError> {
        self.record(format!("pull:{}", reference));
        self.check("pull", reference)
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ProvisionError> {
        self.record(format!("create:{}", spec.name));
        let gate = self
            .create_gates
            .lock()
            .unwrap()
            .iter()
            .find(|(suffix, _)| spec.name.ends_with(suffix.as_str()))
            .map(|(_, gate)| gate.clone());
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.check("create", &spec.name)?;
        let container_id = format!("cid-{}", spec.name);
        self.created
            .lock()
            .unwrap()
            .push((container_id.clone(), spec.clone()));
        Ok(container_id)
    }

    async fn start_container(&self, container_id: &str) -> Result<(), ProvisionError> {
        self.record(format!("start:{}", container_id));
        self.check("start", container_id)
    }

    async fn inspect_container(
        &self,
        container_id: &str,
    ) -> Result<InspectedContainer, ProvisionError> {
        self.record(format!("inspect:{}", container_id));
        self.check("inspect", container_id)?;
        let spec = self
            .spec_of(container_id)
            .ok_or_else(|| ProvisionError::NotFound(container_id.to_string()))?;
        let index = self.created.lock().unwrap().len();
        let mut port_bindings = HashMap::new();
        port_bindings.insert(spec.exposed_port, vec![spec.host_port]);
        Ok(InspectedContainer {
            ip_address: format!("172.17.0.{}", index + 1),
            port_bindings,
        })
    }

    async fn stop_container(&self, name_or_id: &str) -> Result<(), ProvisionError> {
        self.record(format!("stop:{}", name_or_id));
        self.check("stop", name_or_id)
    }

    async fn remove_container(&self, name_or_id: &str) -> Result<(), ProvisionError> {
        self.record(format!("remove:{}", name_or_id));
        if self.hits("gone", name_or_id) {
            return Err(ProvisionError::NotFound(format!("no such container: {}", name_or_id)));
        }
        self.check("remove", name_or_id)
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummaryEntry>, ProvisionError> {
        self.record("list_containers".to_string());
        let mut containers: Vec<ContainerSummaryEntry> = self
            .created
            .lock()
            .unwrap()
            .iter()
            .map(|(id, spec)| ContainerSummaryEntry {
                id: id.clone(),
                names: vec![format!("/{}", spec.name)],
            })
            .collect();
        containers.extend(self.extra_containers.lock().unwrap().iter().cloned());
        Ok(containers)
    }
}

/// Memory store that also remembers every status a testbed was written with.
pub struct RecordingRepository {
    inner: Arc<MemoryStore>,
    history: tokio::sync::Mutex<HashMap<String, Vec<TestbedStatus>>>,
}

impl RecordingRepository {
    pub async fn status_history(&self, id: &str) -> Vec<TestbedStatus> {
        self.history.lock().await.get(id).cloned().unwrap_or_default()
    }

    pub async fn get_registry_snapshot(&self) -> PortRegistry {
        self.inner.get_registry().await.unwrap()
    }
}

#[async_trait]
impl TestbedRepository for RecordingRepository {
    async fn insert_testbed(&self, testbed: &Testbed) -> Result<(), ProvisionError> {
        self.inner.insert_testbed(testbed).await?;
        self.history
            .lock()
            .await
            .entry(testbed.id.clone())
            .or_default()
            .push(testbed.status);
        Ok(())
    }

    async fn get_testbed(&self, id: &str) -> Result<Testbed, ProvisionError> {
        self.inner.get_testbed(id).await
    }

    async fn transition_status(
        &self,
        id: &str,
        from: &[TestbedStatus],
        to: TestbedStatus,
    ) -> Result<bool, ProvisionError> {
        let moved = self.inner.transition_status(id, from, to).await?;
        if moved {
            self.history
                .lock()
                .await
                .entry(id.to_string())
                .or_default()
                .push(to);
        }
        Ok(moved)
    }

    async fn update_container_fields(
        &self,
        id: &str,
        image: &str,
        fields: &[(ContainerField, ContainerFieldValue)],
    ) -> Result<(), ProvisionError> {
        self.inner.update_container_fields(id, image, fields).await
    }

    async fn get_container(&self, id: &str, image: &str) -> Result<ContainerRecord, ProvisionError> {
        self.inner.get_container(id, image).await
    }

    async fn record_failure(&self, id: &str, failure: &StepFailure) -> Result<(), ProvisionError> {
        self.inner.record_failure(id, failure).await
    }

    async fn delete_testbed(&self, id: &str) -> Result<(), ProvisionError> {
        self.inner.delete_testbed(id).await
    }
}

pub async fn context_with(runtime: Arc<FakeRuntime>) -> (AppContext, Arc<RecordingRepository>) {
    let memory = Arc::new(MemoryStore::new());
    memory.init_registry().await.unwrap();
    let recording = Arc::new(RecordingRepository {
        inner: memory.clone(),
        history: tokio::sync::Mutex::new(HashMap::new()),
    });
    let ctx = AppContext::new(runtime, recording.clone(), memory, ProvisionSettings::default());
    (ctx, recording)
}
