use std::fmt::Display;

use async_trait::async_trait;
use mongodb::{
    bson::{doc, Bson, Document},
    Collection, Database,
};

use crate::{
    error::ProvisionError,
    models::testbed_models::{ContainerRecord, StepFailure, Testbed, TestbedStatus},
    utils::mongodb_utils::MongoCollections,
};

pub enum TestbedFields {
    ID,
    STATUS,
    CONTAINERS,
    FAILURES,
}

impl Display for TestbedFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TestbedFields {
    pub fn as_str(&self) -> &str {
        match *self {
            Self::ID => "_id",
            Self::STATUS => "status",
            Self::CONTAINERS => "containers",
            Self::FAILURES => "failures",
        }
    }
}

/// Fields of an embedded container record that the orchestrator writes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerField {
    CONTAINER_ID,
    IP_ADDRESS,
    SERVICE_PORT,
    REST_PORT,
}

impl Display for ContainerField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ContainerField {
    pub fn as_str(&self) -> &str {
        match *self {
            Self::CONTAINER_ID => "containerId",
            Self::IP_ADDRESS => "ipAddress",
            Self::SERVICE_PORT => "servicePort",
            Self::REST_PORT => "restPort",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerFieldValue {
    Text(String),
    Port(u16),
}

impl From<&ContainerFieldValue> for Bson {
    fn from(value: &ContainerFieldValue) -> Self {
        match value {
            ContainerFieldValue::Text(text) => Bson::String(text.clone()),
            ContainerFieldValue::Port(port) => Bson::Int32(i32::from(*port)),
        }
    }
}

/// Applies one field write to an in-memory record.
pub fn apply_container_field(
    record: &mut ContainerRecord,
    field: ContainerField,
    value: &ContainerFieldValue,
) -> Result<(), ProvisionError> {
    match (field, value) {
        (ContainerField::CONTAINER_ID, ContainerFieldValue::Text(text)) => {
            record.container_id = text.clone()
        }
        (ContainerField::IP_ADDRESS, ContainerFieldValue::Text(text)) => {
            record.ip_address = text.clone()
        }
        (ContainerField::SERVICE_PORT, ContainerFieldValue::Port(port)) => {
            record.service_port = *port
        }
        (ContainerField::REST_PORT, ContainerFieldValue::Port(port)) => record.rest_port = *port,
        (field, value) => {
            return Err(ProvisionError::InvalidRequest(format!(
                "{:?} cannot be written to {}",
                value, field
            )))
        }
    }
    Ok(())
}

#[async_trait]
pub trait TestbedRepository: Send + Sync {
    async fn insert_testbed(&self, testbed: &Testbed) -> Result<(), ProvisionError>;

    async fn get_testbed(&self, id: &str) -> Result<Testbed, ProvisionError>;

    /// Moves the testbed to `to` only if it currently is in one of `from`.
    /// Returns whether the transition happened.
    async fn transition_status(
        &self,
        id: &str,
        from: &[TestbedStatus],
        to: TestbedStatus,
    ) -> Result<bool, ProvisionError>;

    /// Writes fields of the container record whose `image` matches.
    async fn update_container_fields(
        &self,
        id: &str,
        image: &str,
        fields: &[(ContainerField, ContainerFieldValue)],
    ) -> Result<(), ProvisionError>;

    async fn get_container(&self, id: &str, image: &str) -> Result<ContainerRecord, ProvisionError>;

    async fn record_failure(&self, id: &str, failure: &StepFailure) -> Result<(), ProvisionError>;

    async fn delete_testbed(&self, id: &str) -> Result<(), ProvisionError>;
}

pub struct MongoTestbedRepository {
    collection: Collection<Testbed>,
}

impl MongoTestbedRepository {
    pub fn new(database: &Database) -> MongoTestbedRepository {
        MongoTestbedRepository {
            collection: MongoCollections::Testbeds.as_collection::<Testbed>(database),
        }
    }

    fn id_filter(id: &str) -> Document {
        doc! { TestbedFields::ID.as_str(): id }
    }

    fn container_filter(id: &str, image: &str) -> Document {
        doc! {
            TestbedFields::ID.as_str(): id,
            TestbedFields::CONTAINERS.as_str(): { "$elemMatch": { "image": image } }
        }
    }
}

#[async_trait]
impl TestbedRepository for MongoTestbedRepository {
    async fn insert_testbed(&self, testbed: &Testbed) -> Result<(), ProvisionError> {
        self.collection.insert_one(testbed).await?;
        Ok(())
    }

    async fn get_testbed(&self, id: &str) -> Result<Testbed, ProvisionError> {
        self.collection
            .find_one(Self::id_filter(id))
            .await?
            .ok_or_else(|| ProvisionError::NotFound(format!("testbed {}", id)))
    }

    async fn transition_status(
        &self,
        id: &str,
        from: &[TestbedStatus],
        to: TestbedStatus,
    ) -> Result<bool, ProvisionError> {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let filter = doc! {
            TestbedFields::ID.as_str(): id,
            TestbedFields::STATUS.as_str(): { "$in": from }
        };
        let update = doc! { "$set": { TestbedFields::STATUS.as_str(): to.as_str() } };
        let update_result = self.collection.update_one(filter, update).await?;
        Ok(update_result.modified_count == 1)
    }

    async fn update_container_fields(
        &self,
        id: &str,
        image: &str,
        fields: &[(ContainerField, ContainerFieldValue)],
    ) -> Result<(), ProvisionError> {
        let mut set = Document::new();
        for (field, value) in fields {
            set.insert(
                format!("{}.$.{}", TestbedFields::CONTAINERS, field),
                Bson::from(value),
            );
        }
        let update_result = self
            .collection
            .update_one(Self::container_filter(id, image), doc! { "$set": set })
            .await?;
        if update_result.matched_count == 0 {
            return Err(ProvisionError::NotFound(format!(
                "container {} in testbed {}",
                image, id
            )));
        }
        Ok(())
    }

    async fn get_container(&self, id: &str, image: &str) -> Result<ContainerRecord, ProvisionError> {
        let testbed = self
            .collection
            .find_one(Self::container_filter(id, image))
            .await?
            .ok_or_else(|| {
                ProvisionError::NotFound(format!("container {} in testbed {}", image, id))
            })?;
        testbed.container(image).cloned().ok_or_else(|| {
            ProvisionError::NotFound(format!("container {} in testbed {}", image, id))
        })
    }

    async fn record_failure(&self, id: &str, failure: &StepFailure) -> Result<(), ProvisionError> {
        let failure = mongodb::bson::to_bson(failure)?;
        let update = doc! { "$push": { TestbedFields::FAILURES.as_str(): failure } };
        let update_result = self.collection.update_one(Self::id_filter(id), update).await?;
        if update_result.matched_count == 0 {
            return Err(ProvisionError::NotFound(format!("testbed {}", id)));
        }
        Ok(())
    }

    async fn delete_testbed(&self, id: &str) -> Result<(), ProvisionError> {
        let delete_result = self.collection.delete_one(Self::id_filter(id)).await?;
        if delete_result.deleted_count == 0 {
            return Err(ProvisionError::NotFound(format!("testbed {}", id)));
        }
        Ok(())
    }
}
