//! Client for the storage array's management API.
//!
//! The exporter only depends on the [`StorageApi`] capability: one identity lookup per
//! scrape and one paged object listing per collector. [`OntapClient`] implements it over
//! the REST interface; tests substitute in-memory fakes.

pub mod config;
pub mod error;
pub mod rest;

use api_types::ClusterIdentity;
use api_types::ObjectQuery;
use api_types::ObjectType;

pub use config::ClientConfig;
pub use error::ClientError;
pub use error::ClientResult;
pub use rest::OntapClient;

/// Remote capability consumed by the collectors.
#[async_trait::async_trait]
pub trait StorageApi: Send + Sync + 'static {
    /// Look up the identity of the cluster behind the endpoint.
    async fn fetch_identity(&self) -> ClientResult<ClusterIdentity>;

    /// List every record of `object`, draining all pages before returning.
    async fn fetch_objects(
        &self,
        object: &ObjectType,
        query: &ObjectQuery,
    ) -> ClientResult<Vec<serde_json::Value>>;
}
