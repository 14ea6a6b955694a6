//! Typed facade over the Yandex Cloud API.
//!
//! Each remote service is a trait so reconcilers can run against the real
//! gRPC client ([`grpc::Sdk`]) or an in-memory double
//! ([`crate::testing::FakeCloud`]). Calls return the raw [`tonic::Status`]
//! on failure so callers can tell not-found apart from everything else;
//! `?` turns it into a [`ProviderError`](crate::ProviderError).
//!
//! Mutating calls return an [`Operation`] handle that must be awaited with
//! [`crate::operation::wait_for`].

pub mod auth;
pub mod grpc;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod proto;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use tonic::Status;

use crate::error::ProviderError;
use crate::operation::Deadline;
use proto::iam::{
    CreateServiceAccountRequest, DeleteServiceAccountRequest, GetServiceAccountRequest,
    ListServiceAccountsRequest, ListServiceAccountsResponse, ServiceAccount,
    UpdateServiceAccountRequest,
};
use proto::mdb::{ListClustersRequest, ListClustersResponse};
use proto::operation::Operation;

/// `yandex.cloud.iam.v1.ServiceAccountService`
#[async_trait]
pub trait ServiceAccountService: Send + Sync {
    /// Fetch a service account by id.
    async fn get(
        &self,
        ctx: &Deadline,
        request: GetServiceAccountRequest,
    ) -> Result<ServiceAccount, Status>;

    /// List service accounts in a folder, one page at a time.
    async fn list(
        &self,
        ctx: &Deadline,
        request: ListServiceAccountsRequest,
    ) -> Result<ListServiceAccountsResponse, Status>;

    /// Start creating a service account.
    async fn create(
        &self,
        ctx: &Deadline,
        request: CreateServiceAccountRequest,
    ) -> Result<Operation, Status>;

    /// Start updating the fields named in the request's update mask.
    async fn update(
        &self,
        ctx: &Deadline,
        request: UpdateServiceAccountRequest,
    ) -> Result<Operation, Status>;

    /// Start deleting a service account.
    async fn delete(
        &self,
        ctx: &Deadline,
        request: DeleteServiceAccountRequest,
    ) -> Result<Operation, Status>;
}

/// `yandex.cloud.operation.OperationService`
#[async_trait]
pub trait OperationService: Send + Sync {
    /// Fetch the current state of an operation.
    async fn get(&self, ctx: &Deadline, operation_id: &str) -> Result<Operation, Status>;
}

/// `yandex.cloud.mdb.*.v1.ClusterService`, reduced to listing.
#[async_trait]
pub trait ClusterService: Send + Sync {
    /// List clusters in a folder, one page at a time.
    async fn list(
        &self,
        ctx: &Deadline,
        request: ListClustersRequest,
    ) -> Result<ListClustersResponse, Status>;
}

/// Managed database engines that expose a cluster service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClusterFlavor {
    /// Managed PostgreSQL.
    PostgreSql,
    /// Managed MongoDB.
    MongoDb,
    /// Managed ClickHouse.
    ClickHouse,
}

impl ClusterFlavor {
    /// All flavors, in registry order.
    pub const ALL: [ClusterFlavor; 3] = [Self::PostgreSql, Self::MongoDb, Self::ClickHouse];

    /// The protobuf package segment of this flavor's API.
    pub fn package(&self) -> &'static str {
        match self {
            Self::PostgreSql => "postgresql",
            Self::MongoDb => "mongodb",
            Self::ClickHouse => "clickhouse",
        }
    }
}

/// Grouped access to every remote service the provider uses.
///
/// Implementations are shared process-wide and must be safe for concurrent use.
pub trait CloudApi: Send + Sync {
    /// IAM service accounts.
    fn service_accounts(&self) -> &dyn ServiceAccountService;

    /// Operation polling.
    fn operations(&self) -> &dyn OperationService;

    /// Clusters of one managed database flavor.
    fn clusters(&self, flavor: ClusterFlavor) -> &dyn ClusterService;
}

/// Render a wire timestamp as RFC 3339, empty when the server sent none.
pub fn format_timestamp(ts: Option<&prost_types::Timestamp>) -> Result<String, ProviderError> {
    let Some(ts) = ts else {
        return Ok(String::new());
    };
    let nanos = u32::try_from(ts.nanos)
        .map_err(|_| ProviderError::UnexpectedResponse(format!("invalid timestamp {}", ts)))?;
    DateTime::from_timestamp(ts.seconds, nanos)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| ProviderError::UnexpectedResponse(format!("invalid timestamp {}", ts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        let ts = prost_types::Timestamp {
            seconds: 1_546_300_800,
            nanos: 0,
        };
        assert_eq!(format_timestamp(Some(&ts)).unwrap(), "2019-01-01T00:00:00Z");
        assert_eq!(format_timestamp(None).unwrap(), "");

        let bad = prost_types::Timestamp {
            seconds: 0,
            nanos: -1,
        };
        assert!(matches!(
            format_timestamp(Some(&bad)),
            Err(ProviderError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_flavor_packages() {
        let packages: Vec<_> = ClusterFlavor::ALL.iter().map(|f| f.package()).collect();
        assert_eq!(packages, vec!["postgresql", "mongodb", "clickhouse"]);
    }
}
