//! MongoDB Store Adapter
//!
//! Implements the `StoreClient` port with the official MongoDB driver.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::{debug, instrument};

use crate::domain::ports::{ProbeEvent, RecordId, StoreClient};
use crate::error::StoreError;

/// Connection settings for the MongoDB adapter
#[derive(Debug, Clone)]
pub struct MongoConfig {
    /// Connection string
    pub uri: String,

    /// Database holding the probe collection
    pub database: String,

    /// Application name reported to the server
    pub app_name: String,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// How long the driver waits for a suitable server
    pub server_selection_timeout: Duration,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://mongo:27017".to_string(),
            database: "monitoring".to_string(),
            app_name: "mongo-probe".to_string(),
            connect_timeout: Duration::from_secs(10),
            server_selection_timeout: Duration::from_secs(10),
        }
    }
}

/// Store client backed by a MongoDB database
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Build a client from the connection string. The driver connects lazily.
    #[instrument(skip(config), fields(database = %config.database))]
    pub async fn connect(config: &MongoConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.uri).await.map_err(map_error)?;
        options.app_name = Some(config.app_name.clone());
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.server_selection_timeout);

        let client = Client::with_options(options).map_err(map_error)?;
        let database = client.database(&config.database);

        Ok(Self { client, database })
    }
}

impl std::fmt::Debug for MongoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoStore")
            .field("database", &self.database.name())
            .finish()
    }
}

#[async_trait]
impl StoreClient for MongoStore {
    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        self.database
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await
            .map_err(map_error)
    }

    async fn insert(&self, collection: &str, record: ProbeEvent) -> Result<RecordId, StoreError> {
        let document = doc! {
            "timestamp": BsonDateTime::from_millis(record.timestamp.timestamp_millis()),
            "source": record.source,
            "message": record.message,
        };

        let result = self
            .database
            .collection::<Document>(collection)
            .insert_one(document)
            .await
            .map_err(map_error)?;

        let id = match result.inserted_id {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => other.to_string(),
        };
        debug!(collection, record_id = %id, "Inserted probe event");
        Ok(RecordId(id))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(map_error)
    }
}

/// Classify a driver error into the store error taxonomy
fn map_error(err: mongodb::error::Error) -> StoreError {
    let message = err.to_string();
    match err.kind.as_ref() {
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => StoreError::Connection(message),
        ErrorKind::Write(_) => StoreError::Write(message),
        ErrorKind::InvalidArgument { .. } => StoreError::Validation(message),
        _ => StoreError::Other(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MongoConfig::default();
        assert_eq!(config.database, "monitoring");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_invalid_uri_is_rejected() {
        let config = MongoConfig {
            uri: "not-a-mongo-uri".to_string(),
            ..Default::default()
        };
        let result = MongoStore::connect(&config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Nothing listens on this port; the driver fails server selection.
        let config = MongoConfig {
            uri: "mongodb://127.0.0.1:19999/?directConnection=true".to_string(),
            server_selection_timeout: Duration::from_millis(200),
            connect_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let store = MongoStore::connect(&config).await.unwrap();
        let err = store.count("events").await.unwrap_err();
        assert_eq!(err.kind(), "connection");
    }
}
