use std::fmt::Display;

use async_trait::async_trait;
use mongodb::{
    bson::{doc, Document},
    Collection, Database,
};

use crate::{
    error::ProvisionError,
    models::port_registry_models::{PortRegistry, PORT_REGISTRY_ID},
    utils::mongodb_utils::MongoCollections,
};

pub enum PortRegistryFields {
    ID,
    ALLOCATED_PORTS,
    PORT,
    TESTBED_ID,
}

impl Display for PortRegistryFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PortRegistryFields {
    pub fn as_str(&self) -> &str {
        match *self {
            Self::ID => "_id",
            Self::ALLOCATED_PORTS => "allocatedPorts",
            Self::PORT => "port",
            Self::TESTBED_ID => "testbedId",
        }
    }
}

#[async_trait]
pub trait PortRegistryRepository: Send + Sync {
    /// Creates the registry document if none exists. More than one is a `Conflict`.
    async fn init_registry(&self) -> Result<(), ProvisionError>;

    async fn get_registry(&self) -> Result<PortRegistry, ProvisionError>;

    /// Check-and-insert keyed by port. `Ok(true)` only when this call inserted the entry;
    /// a port already held, even by `testbed_id` itself, is `Ok(false)`.
    async fn reserve_port(&self, port: u16, testbed_id: &str) -> Result<bool, ProvisionError>;

    /// Removes the entry only if `testbed_id` owns it. `Ok(false)` when there was nothing to remove.
    async fn release_port(&self, port: u16, testbed_id: &str) -> Result<bool, ProvisionError>;
}

pub struct MongoPortRegistryRepository {
    collection: Collection<PortRegistry>,
}

impl MongoPortRegistryRepository {
    pub fn new(database: &Database) -> MongoPortRegistryRepository {
        MongoPortRegistryRepository {
            collection: MongoCollections::TestbedMeta.as_collection::<PortRegistry>(database),
        }
    }

    fn allocation(port: u16, testbed_id: &str) -> Document {
        doc! {
            PortRegistryFields::PORT.as_str(): i32::from(port),
            PortRegistryFields::TESTBED_ID.as_str(): testbed_id
        }
    }

    /// Matches the registry only while no entry holds `port`.
    fn reserve_filter(port: u16) -> Document {
        let held_path = format!(
            "{}.{}",
            PortRegistryFields::ALLOCATED_PORTS,
            PortRegistryFields::PORT
        );
        doc! {
            PortRegistryFields::ID.as_str(): PORT_REGISTRY_ID,
            held_path: { "$ne": i32::from(port) }
        }
    }

    fn reserve_update(port: u16, testbed_id: &str) -> Document {
        doc! {
            "$push": { PortRegistryFields::ALLOCATED_PORTS.as_str(): Self::allocation(port, testbed_id) }
        }
    }

    /// Pulls the entry only when both port and owner match.
    fn release_update(port: u16, testbed_id: &str) -> Document {
        doc! {
            "$pull": { PortRegistryFields::ALLOCATED_PORTS.as_str(): Self::allocation(port, testbed_id) }
        }
    }

    async fn ensure_single(&self) -> Result<u64, ProvisionError> {
        let count = self.collection.count_documents(doc! {}).await?;
        if count > 1 {
            return Err(ProvisionError::Conflict(format!(
                "{} port registry documents exist",
                count
            )));
        }
        Ok(count)
    }
}

#[async_trait]
impl PortRegistryRepository for MongoPortRegistryRepository {
    async fn init_registry(&self) -> Result<(), ProvisionError> {
        if self.ensure_single().await? == 0 {
            self.collection.insert_one(PortRegistry::new()).await?;
            tracing::info!("created port registry document");
        }
        Ok(())
    }

    async fn get_registry(&self) -> Result<PortRegistry, ProvisionError> {
        self.ensure_single().await?;
        self.collection
            .find_one(doc! { PortRegistryFields::ID.as_str(): PORT_REGISTRY_ID })
            .await?
            .ok_or_else(|| ProvisionError::NotFound("port registry".to_string()))
    }

    async fn reserve_port(&self, port: u16, testbed_id: &str) -> Result<bool, ProvisionError> {
        let update_result = self
            .collection
            .update_one(Self::reserve_filter(port), Self::reserve_update(port, testbed_id))
            .await?;
        Ok(update_result.modified_count == 1)
    }

    async fn release_port(&self, port: u16, testbed_id: &str) -> Result<bool, ProvisionError> {
        let update_result = self
            .collection
            .update_one(
                doc! { PortRegistryFields::ID.as_str(): PORT_REGISTRY_ID },
                Self::release_update(port, testbed_id),
            )
            .await?;
        Ok(update_result.modified_count == 1)
    }
}
