use mongodb::{Client, Collection, Database};

use crate::error::ProvisionError;

pub async fn connect(database_uri: &str, database_name: &str) -> Result<Database, ProvisionError> {
    let client: Client = Client::with_uri_str(database_uri).await?;
    Ok(client.database(database_name))
}

pub enum MongoCollections {
    Testbeds,
    TestbedMeta,
}

//the generic is the document type, so collections are resolved per call site
impl MongoCollections {
    pub fn as_collection<T: Send + Sync>(&self, database: &Database) -> Collection<T> {
        database.collection::<T>(self.as_str())
    }

    pub fn as_str(&self) -> &str {
        match &self {
            MongoCollections::Testbeds => "testbed",
            MongoCollections::TestbedMeta => "testbedmeta",
        }
    }
}
