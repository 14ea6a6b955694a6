//! Name-to-id resolution.
//!
//! Object names are not unique in the cloud API, so a lookup by name lists
//! every match in the folder (across all pages) and refuses to pick when
//! more than one object carries the name.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, instrument};

use crate::cloud::proto::iam::{ListServiceAccountsRequest, ServiceAccount};
use crate::cloud::proto::mdb::{Cluster, ListClustersRequest};
use crate::cloud::{CloudApi, ClusterFlavor};
use crate::error::ProviderError;
use crate::operation::Deadline;

/// Page size used for every listing call.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Kinds of objects that can be looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveKind {
    /// IAM service account.
    ServiceAccount,
    /// Managed database cluster.
    Cluster(ClusterFlavor),
}

impl fmt::Display for ResolveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccount => f.write_str("service account"),
            Self::Cluster(ClusterFlavor::PostgreSql) => f.write_str("PostgreSQL cluster"),
            Self::Cluster(ClusterFlavor::MongoDb) => f.write_str("MongoDB cluster"),
            Self::Cluster(ClusterFlavor::ClickHouse) => f.write_str("ClickHouse cluster"),
        }
    }
}

/// The fields every resolvable object shares.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamedObject {
    /// Object id.
    pub id: String,
    /// Owning folder.
    pub folder_id: String,
    /// Object name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Creation time.
    pub created_at: Option<prost_types::Timestamp>,
}

impl From<ServiceAccount> for NamedObject {
    fn from(account: ServiceAccount) -> Self {
        Self {
            id: account.id,
            folder_id: account.folder_id,
            name: account.name,
            description: account.description,
            created_at: account.created_at,
        }
    }
}

impl From<Cluster> for NamedObject {
    fn from(cluster: Cluster) -> Self {
        Self {
            id: cluster.id,
            folder_id: cluster.folder_id,
            name: cluster.name,
            description: cluster.description,
            created_at: cluster.created_at,
        }
    }
}

/// Server-side filter matching `field` exactly.
///
/// Backslashes and double quotes inside `value` are doubled.
pub fn filter(field: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\"\"");
    format!("{} = \"{}\"", field, escaped)
}

/// Looks up objects by name within a folder.
pub struct Resolver<'a> {
    cloud: &'a dyn CloudApi,
    page_size: i64,
}

impl<'a> Resolver<'a> {
    /// A resolver over `cloud` using [`DEFAULT_PAGE_SIZE`].
    pub fn new(cloud: &'a dyn CloudApi) -> Self {
        Self {
            cloud,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Use a different page size.
    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    /// The id of the single `kind` object called `name` in `folder_id`.
    pub async fn resolve(
        &self,
        deadline: &Deadline,
        kind: ResolveKind,
        name: &str,
        folder_id: &str,
    ) -> Result<String, ProviderError> {
        self.resolve_entry(deadline, kind, name, folder_id)
            .await
            .map(|entry| entry.id)
    }

    /// The single `kind` object called `name` in `folder_id`.
    ///
    /// Fails with [`ProviderError::NotFound`] when nothing matches and with
    /// [`ProviderError::AmbiguousName`] when more than one object does.
    #[instrument(skip(self, deadline, kind), fields(kind = %kind))]
    pub async fn resolve_entry(
        &self,
        deadline: &Deadline,
        kind: ResolveKind,
        name: &str,
        folder_id: &str,
    ) -> Result<NamedObject, ProviderError> {
        if name.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "cannot resolve {} with an empty name",
                kind
            )));
        }
        if folder_id.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "cannot resolve {} {:?} without a folder",
                kind, name
            )));
        }

        let filter = filter("name", name);
        let mut matches = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut page_token = String::new();
        loop {
            let (objects, next_page_token) = self
                .list_page(deadline, kind, folder_id, &filter, page_token)
                .await?;
            matches.extend(objects.into_iter().filter(|o| o.name == name));
            if next_page_token.is_empty() {
                break;
            }
            if !seen_tokens.insert(next_page_token.clone()) {
                return Err(ProviderError::UnexpectedResponse(format!(
                    "listing {} in folder {} repeated page token {:?}",
                    kind, folder_id, next_page_token
                )));
            }
            page_token = next_page_token;
        }

        debug!(matches = matches.len(), "listed objects");
        match matches.len() {
            0 => Err(ProviderError::NotFound(format!(
                "{} {:?} in folder {}",
                kind, name, folder_id
            ))),
            1 => Ok(matches.remove(0)),
            n => Err(ProviderError::AmbiguousName(format!(
                "{} {:?} matches {} objects in folder {}",
                kind, name, n, folder_id
            ))),
        }
    }

    async fn list_page(
        &self,
        deadline: &Deadline,
        kind: ResolveKind,
        folder_id: &str,
        filter: &str,
        page_token: String,
    ) -> Result<(Vec<NamedObject>, String), ProviderError> {
        match kind {
            ResolveKind::ServiceAccount => {
                let request = ListServiceAccountsRequest {
                    folder_id: folder_id.to_string(),
                    page_size: self.page_size,
                    page_token,
                    filter: filter.to_string(),
                };
                let response = self.cloud.service_accounts().list(deadline, request).await?;
                Ok((
                    response
                        .service_accounts
                        .into_iter()
                        .map(NamedObject::from)
                        .collect(),
                    response.next_page_token,
                ))
            }
            ResolveKind::Cluster(flavor) => {
                let request = ListClustersRequest {
                    folder_id: folder_id.to_string(),
                    page_size: self.page_size,
                    page_token,
                    filter: filter.to_string(),
                };
                let response = self.cloud.clusters(flavor).list(deadline, request).await?;
                Ok((
                    response.clusters.into_iter().map(NamedObject::from).collect(),
                    response.next_page_token,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::proto::iam::{
        CreateServiceAccountRequest, DeleteServiceAccountRequest, GetServiceAccountRequest,
        ListServiceAccountsResponse, UpdateServiceAccountRequest,
    };
    use crate::cloud::proto::mdb::ListClustersResponse;
    use crate::cloud::proto::operation::Operation;
    use crate::cloud::{ClusterService, OperationService, ServiceAccountService};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tonic::Status;

    /// Lists one unrelated account per page and always hands back the same token.
    #[derive(Default)]
    struct LoopingListing {
        lists: AtomicUsize,
    }

    #[async_trait]
    impl ServiceAccountService for LoopingListing {
        async fn get(
            &self,
            _ctx: &Deadline,
            _request: GetServiceAccountRequest,
        ) -> Result<ServiceAccount, Status> {
            Err(Status::unimplemented("get"))
        }

        async fn list(
            &self,
            _ctx: &Deadline,
            _request: ListServiceAccountsRequest,
        ) -> Result<ListServiceAccountsResponse, Status> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(ListServiceAccountsResponse {
                service_accounts: vec![ServiceAccount {
                    id: "sa-1".to_string(),
                    name: "other".to_string(),
                    ..Default::default()
                }],
                next_page_token: "again".to_string(),
            })
        }

        async fn create(
            &self,
            _ctx: &Deadline,
            _request: CreateServiceAccountRequest,
        ) -> Result<Operation, Status> {
            Err(Status::unimplemented("create"))
        }

        async fn update(
            &self,
            _ctx: &Deadline,
            _request: UpdateServiceAccountRequest,
        ) -> Result<Operation, Status> {
            Err(Status::unimplemented("update"))
        }

        async fn delete(
            &self,
            _ctx: &Deadline,
            _request: DeleteServiceAccountRequest,
        ) -> Result<Operation, Status> {
            Err(Status::unimplemented("delete"))
        }
    }

    #[async_trait]
    impl OperationService for LoopingListing {
        async fn get(&self, _ctx: &Deadline, _operation_id: &str) -> Result<Operation, Status> {
            Err(Status::unimplemented("operations"))
        }
    }

    #[async_trait]
    impl ClusterService for LoopingListing {
        async fn list(
            &self,
            _ctx: &Deadline,
            _request: ListClustersRequest,
        ) -> Result<ListClustersResponse, Status> {
            Err(Status::unimplemented("clusters"))
        }
    }

    impl CloudApi for LoopingListing {
        fn service_accounts(&self) -> &dyn ServiceAccountService {
            self
        }

        fn operations(&self) -> &dyn OperationService {
            self
        }

        fn clusters(&self, _flavor: ClusterFlavor) -> &dyn ClusterService {
            self
        }
    }

    #[tokio::test]
    async fn test_repeated_page_token_is_rejected() {
        let cloud = LoopingListing::default();
        let deadline = Deadline::after(Duration::from_secs(5));

        let err = Resolver::new(&cloud)
            .resolve(&deadline, ResolveKind::ServiceAccount, "ci", "f-1")
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::UnexpectedResponse(_)), "{:?}", err);
        assert_eq!(cloud.lists.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_filter_plain() {
        assert_eq!(filter("name", "db-1"), r#"name = "db-1""#);
    }

    #[test]
    fn test_filter_escapes_quotes_and_backslashes() {
        assert_eq!(filter("name", r#"a"b"#), r#"name = "a""b""#);
        assert_eq!(filter("name", r"a\b"), r#"name = "a\\b""#);
        assert_eq!(filter("name", r#"\""#), r#"name = "\\""""#);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ResolveKind::ServiceAccount.to_string(), "service account");
        assert_eq!(
            ResolveKind::Cluster(ClusterFlavor::ClickHouse).to_string(),
            "ClickHouse cluster"
        );
    }
}
