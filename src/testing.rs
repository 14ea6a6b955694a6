//! Testing utilities for the provider.
//!
//! [`FakeCloud`] is an in-memory [`CloudApi`] that records every call and can
//! be told to fail, or to leave operations pending. [`ProviderTester`] drives
//! a [`ProviderService`] the way the host does, without a plugin transport.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use yandex_provider::testing::{FakeCloud, Method, ProviderTester};
//! use yandex_provider::YandexProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_service_account() {
//!     let cloud = Arc::new(FakeCloud::new());
//!     let tester = ProviderTester::new(YandexProvider::with_cloud(cloud.clone()));
//!     tester.configure(json!({"token": "t", "folder_id": "f-1"})).await.unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("yandex_iam_service_account", json!({"name": "ci"}))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["folder_id"], "f-1");
//!     assert_eq!(cloud.call_count(Method::CreateServiceAccount), 1);
//! }
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tonic::Status;

use crate::cloud::proto::iam::{
    CreateServiceAccountRequest, DeleteServiceAccountRequest, GetServiceAccountRequest,
    ListServiceAccountsRequest, ListServiceAccountsResponse, ServiceAccount,
    UpdateServiceAccountRequest,
};
use crate::cloud::proto::mdb::{Cluster, ListClustersRequest, ListClustersResponse};
use crate::cloud::proto::operation::{operation, Operation};
use crate::cloud::proto::{rpc, Empty};
use crate::cloud::{ClusterFlavor, ClusterService, CloudApi, OperationService, ServiceAccountService};
use crate::error::ProviderError;
use crate::operation::Deadline;
use crate::resolver::DEFAULT_PAGE_SIZE;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ApplyResult, ImportedResource, PlanResult};

/// `created_at` of every account the fake creates: 2019-01-01T00:00:00Z.
pub const FAKE_CREATED_AT: i64 = 1_546_300_800;

// =========================================================================
// Fake cloud
// =========================================================================

/// Fake API methods, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `ServiceAccountService/Get`
    GetServiceAccount,
    /// `ServiceAccountService/List`
    ListServiceAccounts,
    /// `ServiceAccountService/Create`
    CreateServiceAccount,
    /// `ServiceAccountService/Update`
    UpdateServiceAccount,
    /// `ServiceAccountService/Delete`
    DeleteServiceAccount,
    /// `OperationService/Get`
    GetOperation,
    /// `ClusterService/List`, any flavor
    ListClusters,
}

/// A recorded call with its request.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// Get of the given service account id.
    GetServiceAccount(String),
    /// Service account listing.
    ListServiceAccounts(ListServiceAccountsRequest),
    /// Service account creation.
    CreateServiceAccount(CreateServiceAccountRequest),
    /// Service account update.
    UpdateServiceAccount(UpdateServiceAccountRequest),
    /// Delete of the given service account id.
    DeleteServiceAccount(String),
    /// Poll of the given operation id.
    GetOperation(String),
    /// Cluster listing.
    ListClusters(ClusterFlavor, ListClustersRequest),
}

impl Call {
    /// The method this call went to.
    pub fn method(&self) -> Method {
        match self {
            Self::GetServiceAccount(_) => Method::GetServiceAccount,
            Self::ListServiceAccounts(_) => Method::ListServiceAccounts,
            Self::CreateServiceAccount(_) => Method::CreateServiceAccount,
            Self::UpdateServiceAccount(_) => Method::UpdateServiceAccount,
            Self::DeleteServiceAccount(_) => Method::DeleteServiceAccount,
            Self::GetOperation(_) => Method::GetOperation,
            Self::ListClusters(..) => Method::ListClusters,
        }
    }
}

/// How operations started by mutating calls complete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OperationMode {
    /// Returned already done.
    #[default]
    Immediate,
    /// Done on the n-th poll.
    AfterPolls(usize),
    /// Never done.
    Never,
    /// Returned done with an error status; the mutation is not applied.
    Fail {
        /// `google.rpc.Code` value.
        code: i32,
        /// Error message.
        message: String,
    },
}

struct PendingOperation {
    polls_left: Option<usize>,
    result: operation::Result,
}

#[derive(Default)]
struct Inner {
    accounts: BTreeMap<String, ServiceAccount>,
    clusters: HashMap<ClusterFlavor, Vec<Cluster>>,
    operations: HashMap<String, PendingOperation>,
    failures: HashMap<Method, VecDeque<Status>>,
    calls: Vec<Call>,
    mode: OperationMode,
    next_id: u64,
}

impl Inner {
    fn record(&mut self, call: Call) -> Result<(), Status> {
        let method = call.method();
        self.calls.push(call);
        match self.failures.get_mut(&method).and_then(VecDeque::pop_front) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn mutations_apply(&self) -> bool {
        !matches!(self.mode, OperationMode::Fail { .. })
    }

    fn start_operation<M: prost::Name>(&mut self, response: &M) -> Result<Operation, Status> {
        let id = self.next_id("op");
        let any = prost_types::Any::from_msg(response)
            .map_err(|e| Status::internal(format!("encode response: {}", e)))?;

        let polls_left = match &self.mode {
            OperationMode::Immediate | OperationMode::AfterPolls(0) => {
                return Ok(done(id, operation::Result::Response(any)))
            }
            OperationMode::Fail { code, message } => {
                let status = rpc::Status {
                    code: *code,
                    message: message.clone(),
                    details: vec![],
                };
                return Ok(done(id, operation::Result::Error(status)));
            }
            OperationMode::AfterPolls(n) => Some(*n),
            OperationMode::Never => None,
        };

        self.operations.insert(
            id.clone(),
            PendingOperation {
                polls_left,
                result: operation::Result::Response(any),
            },
        );
        Ok(pending(id))
    }
}

fn done(id: String, result: operation::Result) -> Operation {
    Operation {
        id,
        done: true,
        result: Some(result),
        ..Default::default()
    }
}

fn pending(id: String) -> Operation {
    Operation {
        id,
        ..Default::default()
    }
}

/// Parse `name = "<escaped>"` back into the name.
fn name_filter(filter: &str) -> Result<Option<String>, Status> {
    if filter.is_empty() {
        return Ok(None);
    }
    let quoted = filter
        .strip_prefix("name = \"")
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| Status::invalid_argument(format!("unsupported filter: {}", filter)))?;
    Ok(Some(quoted.replace("\"\"", "\"").replace("\\\\", "\\")))
}

fn page<T: Clone>(items: Vec<T>, page_size: i64, page_token: &str) -> Result<(Vec<T>, String), Status> {
    let start = if page_token.is_empty() {
        0
    } else {
        page_token
            .parse::<usize>()
            .map_err(|_| Status::invalid_argument("invalid page token"))?
    };
    let size = if page_size > 0 {
        page_size as usize
    } else {
        DEFAULT_PAGE_SIZE as usize
    };
    let end = (start + size).min(items.len());
    let next = if end < items.len() {
        end.to_string()
    } else {
        String::new()
    };
    Ok((items[start.min(end)..end].to_vec(), next))
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory cloud.
///
/// Mutations take effect when the call is made; the returned operation only
/// reports completion according to the configured [`OperationMode`].
pub struct FakeCloud {
    inner: Arc<Mutex<Inner>>,
    postgresql: FakeClusters,
    mongodb: FakeClusters,
    clickhouse: FakeClusters,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCloud {
    /// An empty cloud whose operations complete immediately.
    pub fn new() -> Self {
        let inner = Arc::new(Mutex::new(Inner::default()));
        let clusters = |flavor| FakeClusters {
            flavor,
            inner: Arc::clone(&inner),
        };
        Self {
            postgresql: clusters(ClusterFlavor::PostgreSql),
            mongodb: clusters(ClusterFlavor::MongoDb),
            clickhouse: clusters(ClusterFlavor::ClickHouse),
            inner,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    /// Store a service account, replacing any with the same id.
    pub fn insert_service_account(&self, account: ServiceAccount) {
        self.lock().accounts.insert(account.id.clone(), account);
    }

    /// Remove a service account behind the provider's back.
    pub fn remove_service_account(&self, id: &str) -> Option<ServiceAccount> {
        self.lock().accounts.remove(id)
    }

    /// The stored service account with `id`.
    pub fn service_account(&self, id: &str) -> Option<ServiceAccount> {
        self.lock().accounts.get(id).cloned()
    }

    /// Every stored service account, ordered by id.
    pub fn service_accounts(&self) -> Vec<ServiceAccount> {
        self.lock().accounts.values().cloned().collect()
    }

    /// Store a cluster of `flavor`.
    pub fn insert_cluster(&self, flavor: ClusterFlavor, cluster: Cluster) {
        self.lock().clusters.entry(flavor).or_default().push(cluster);
    }

    /// Change how subsequent operations complete.
    pub fn set_operation_mode(&self, mode: OperationMode) {
        self.lock().mode = mode;
    }

    /// Make the next call to `method` fail with `status`. Failures queue up.
    pub fn fail_next(&self, method: Method, status: Status) {
        self.lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(status);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls made to `method`.
    pub fn call_count(&self, method: Method) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method() == method)
            .count()
    }

    /// Every update request received, in order.
    pub fn update_requests(&self) -> Vec<UpdateServiceAccountRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::UpdateServiceAccount(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

/// A service account as the fake would store it.
pub fn sample_service_account(id: &str, folder_id: &str, name: &str) -> ServiceAccount {
    ServiceAccount {
        id: id.to_string(),
        folder_id: folder_id.to_string(),
        created_at: Some(prost_types::Timestamp {
            seconds: FAKE_CREATED_AT,
            nanos: 0,
        }),
        name: name.to_string(),
        description: String::new(),
    }
}

/// A cluster as the fake would store it.
pub fn sample_cluster(id: &str, folder_id: &str, name: &str) -> Cluster {
    Cluster {
        id: id.to_string(),
        folder_id: folder_id.to_string(),
        created_at: Some(prost_types::Timestamp {
            seconds: FAKE_CREATED_AT,
            nanos: 0,
        }),
        name: name.to_string(),
        description: String::new(),
    }
}

#[async_trait]
impl ServiceAccountService for FakeCloud {
    async fn get(
        &self,
        _ctx: &Deadline,
        request: GetServiceAccountRequest,
    ) -> Result<ServiceAccount, Status> {
        let mut inner = self.lock();
        inner.record(Call::GetServiceAccount(request.service_account_id.clone()))?;
        inner
            .accounts
            .get(&request.service_account_id)
            .cloned()
            .ok_or_else(|| {
                Status::not_found(format!(
                    "Service account {} not found",
                    request.service_account_id
                ))
            })
    }

    async fn list(
        &self,
        _ctx: &Deadline,
        request: ListServiceAccountsRequest,
    ) -> Result<ListServiceAccountsResponse, Status> {
        let mut inner = self.lock();
        inner.record(Call::ListServiceAccounts(request.clone()))?;
        let name = name_filter(&request.filter)?;
        let matching: Vec<_> = inner
            .accounts
            .values()
            .filter(|a| a.folder_id == request.folder_id)
            .filter(|a| name.as_ref().map_or(true, |n| &a.name == n))
            .cloned()
            .collect();
        let (service_accounts, next_page_token) =
            page(matching, request.page_size, &request.page_token)?;
        Ok(ListServiceAccountsResponse {
            service_accounts,
            next_page_token,
        })
    }

    async fn create(
        &self,
        _ctx: &Deadline,
        request: CreateServiceAccountRequest,
    ) -> Result<Operation, Status> {
        let mut inner = self.lock();
        inner.record(Call::CreateServiceAccount(request.clone()))?;
        if request.folder_id.is_empty() {
            return Err(Status::invalid_argument("folder_id is required"));
        }

        let account = ServiceAccount {
            id: inner.next_id("sa"),
            folder_id: request.folder_id,
            created_at: Some(prost_types::Timestamp {
                seconds: FAKE_CREATED_AT,
                nanos: 0,
            }),
            name: request.name,
            description: request.description,
        };
        if inner.mutations_apply() {
            inner.accounts.insert(account.id.clone(), account.clone());
        }
        inner.start_operation(&account)
    }

    async fn update(
        &self,
        _ctx: &Deadline,
        request: UpdateServiceAccountRequest,
    ) -> Result<Operation, Status> {
        let mut inner = self.lock();
        inner.record(Call::UpdateServiceAccount(request.clone()))?;

        let mut account = inner
            .accounts
            .get(&request.service_account_id)
            .cloned()
            .ok_or_else(|| Status::not_found("Service account not found"))?;
        let paths = request.update_mask.map(|m| m.paths).unwrap_or_default();
        for path in &paths {
            match path.as_str() {
                "name" => account.name = request.name.clone(),
                "description" => account.description = request.description.clone(),
                other => {
                    return Err(Status::invalid_argument(format!(
                        "unknown update mask path {}",
                        other
                    )))
                }
            }
        }

        if inner.mutations_apply() {
            inner.accounts.insert(account.id.clone(), account.clone());
        }
        inner.start_operation(&account)
    }

    async fn delete(
        &self,
        _ctx: &Deadline,
        request: DeleteServiceAccountRequest,
    ) -> Result<Operation, Status> {
        let mut inner = self.lock();
        inner.record(Call::DeleteServiceAccount(request.service_account_id.clone()))?;
        if !inner.accounts.contains_key(&request.service_account_id) {
            return Err(Status::not_found("Service account not found"));
        }
        if inner.mutations_apply() {
            inner.accounts.remove(&request.service_account_id);
        }
        inner.start_operation(&Empty {})
    }
}

#[async_trait]
impl OperationService for FakeCloud {
    async fn get(&self, _ctx: &Deadline, operation_id: &str) -> Result<Operation, Status> {
        let mut inner = self.lock();
        inner.record(Call::GetOperation(operation_id.to_string()))?;

        let pending_op = inner
            .operations
            .get_mut(operation_id)
            .ok_or_else(|| Status::not_found(format!("Operation {} not found", operation_id)))?;
        let finished = match &mut pending_op.polls_left {
            None => false,
            Some(left) if *left > 1 => {
                *left -= 1;
                false
            }
            Some(_) => true,
        };
        if !finished {
            return Ok(pending(operation_id.to_string()));
        }
        match inner.operations.remove(operation_id) {
            Some(op) => Ok(done(operation_id.to_string(), op.result)),
            None => Err(Status::internal("operation vanished")),
        }
    }
}

/// Clusters of one flavor, sharing the fake's storage.
pub struct FakeClusters {
    flavor: ClusterFlavor,
    inner: Arc<Mutex<Inner>>,
}

#[async_trait]
impl ClusterService for FakeClusters {
    async fn list(
        &self,
        _ctx: &Deadline,
        request: ListClustersRequest,
    ) -> Result<ListClustersResponse, Status> {
        let mut inner = lock(&self.inner);
        inner.record(Call::ListClusters(self.flavor, request.clone()))?;
        let name = name_filter(&request.filter)?;
        let matching: Vec<_> = inner
            .clusters
            .get(&self.flavor)
            .into_iter()
            .flatten()
            .filter(|c| c.folder_id == request.folder_id)
            .filter(|c| name.as_ref().map_or(true, |n| &c.name == n))
            .cloned()
            .collect();
        let (clusters, next_page_token) = page(matching, request.page_size, &request.page_token)?;
        Ok(ListClustersResponse {
            clusters,
            next_page_token,
        })
    }
}

impl CloudApi for FakeCloud {
    fn service_accounts(&self) -> &dyn ServiceAccountService {
        self
    }

    fn operations(&self) -> &dyn OperationService {
        self
    }

    fn clusters(&self, flavor: ClusterFlavor) -> &dyn ClusterService {
        match flavor {
            ClusterFlavor::PostgreSql => &self.postgresql,
            ClusterFlavor::MongoDb => &self.mongodb,
            ClusterFlavor::ClickHouse => &self.clickhouse,
        }
    }
}

// =========================================================================
// Provider tester
// =========================================================================

/// A test harness for provider implementations.
///
/// This wraps a `ProviderService` implementation and provides
/// simplified methods for testing without the plugin transport.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> ApplyResult {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> ApplyResult {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Apply `config` on top of `prior` the way the host does.
    ///
    /// Plans first, then creates, updates in place, replaces (delete followed
    /// by create), or deletes when `config` is null. Returns the state the
    /// host would store; `None` means no resource.
    pub async fn apply(
        &self,
        resource_type: &str,
        prior: Option<Value>,
        config: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let plan = self
            .provider
            .plan(resource_type, prior.clone(), config.clone(), config)
            .await?;

        match prior {
            None if plan.planned_state.is_null() => Ok(None),
            None => self.create(resource_type, plan.planned_state).await.into_result(),
            Some(prior) if plan.planned_state.is_null() => {
                self.delete(resource_type, prior).await?;
                Ok(None)
            }
            Some(prior) if !plan.has_changes() => Ok(Some(prior)),
            Some(prior) if plan.requires_replace => {
                self.delete(resource_type, prior).await?;
                self.create(resource_type, plan.planned_state)
                    .await
                    .into_result()
            }
            Some(prior) => self
                .update(resource_type, prior, plan.planned_state)
                .await
                .into_result(),
        }
    }

    /// Run a full create lifecycle: plan → create → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;

        let created = self
            .create(resource_type, plan_result.planned_state)
            .await
            .into_result()?;
        let created = existing(resource_type, created)?;

        let read = self.read(resource_type, created).await?;
        existing(resource_type, read)
    }

    /// Run a full update lifecycle: plan → update → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;

        let updated = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await
            .into_result()?;
        let updated = existing(resource_type, updated)?;

        let read = self.read(resource_type, updated).await?;
        existing(resource_type, read)
    }

    /// Run a full delete lifecycle: plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let _ = self
            .plan_delete(resource_type, current_state.clone())
            .await?;

        self.delete(resource_type, current_state).await
    }

    /// Run a full CRUD lifecycle: create → read → update → read → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created_state = self.lifecycle_create(resource_type, initial_config).await?;

        let updated_state = self
            .lifecycle_update(resource_type, created_state.clone(), updated_config)
            .await?;

        self.lifecycle_delete(resource_type, updated_state.clone())
            .await?;

        Ok(updated_state)
    }
}

fn existing(resource_type: &str, state: Option<Value>) -> Result<Value, ProviderError> {
    state.ok_or_else(|| ProviderError::NotFound(format!("{} disappeared", resource_type)))
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

/// Check diagnostics and return an error if there are any errors.
fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan result indicates the resource will be created.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to create, not replace"
    );
}

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan result indicates changes are needed.
///
/// # Panics
///
/// Panics if the plan has no changes.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got no changes"
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan does not require resource replacement.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        has_change,
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan does not have a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan has a change for the given path.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        !has_change,
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    let has_errors = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error));

    assert!(has_errors, "Expected at least one error, but got none");
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::wait_for;
    use crate::provider::YandexProvider;
    use serde_json::json;
    use std::time::Duration;

    const SA: &str = "yandex_iam_service_account";

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    async fn configured(cloud: &Arc<FakeCloud>) -> ProviderTester<YandexProvider> {
        let tester = ProviderTester::new(YandexProvider::with_cloud(cloud.clone()));
        tester
            .configure(json!({"token": "t", "folder_id": "f-1"}))
            .await
            .unwrap();
        tester
    }

    #[test]
    fn test_name_filter_round_trips_escaping() {
        let filter = crate::resolver::filter("name", r#"we"ird\name"#);
        assert_eq!(
            name_filter(&filter).unwrap().as_deref(),
            Some(r#"we"ird\name"#)
        );
        assert_eq!(name_filter("").unwrap(), None);
        assert!(name_filter("id = 5").is_err());
    }

    #[test]
    fn test_page() {
        let items: Vec<_> = (0..5).collect();
        assert_eq!(page(items.clone(), 2, "").unwrap(), (vec![0, 1], "2".to_string()));
        assert_eq!(page(items.clone(), 2, "4").unwrap(), (vec![4], String::new()));
        assert_eq!(page(items, 0, "").unwrap().0.len(), 5);
    }

    #[tokio::test]
    async fn test_fake_records_calls_and_injects_failures() {
        let cloud = FakeCloud::new();
        cloud.insert_service_account(sample_service_account("sa-9", "f-1", "acct"));
        cloud.fail_next(Method::GetServiceAccount, Status::unavailable("flaky"));

        let request = GetServiceAccountRequest {
            service_account_id: "sa-9".to_string(),
        };
        let first = ServiceAccountService::get(&cloud, &deadline(), request.clone()).await;
        assert_eq!(first.unwrap_err().code(), tonic::Code::Unavailable);

        let second = ServiceAccountService::get(&cloud, &deadline(), request).await;
        assert_eq!(second.unwrap().name, "acct");
        assert_eq!(cloud.call_count(Method::GetServiceAccount), 2);
    }

    #[tokio::test]
    async fn test_fake_operation_after_polls() {
        let cloud = FakeCloud::new();
        cloud.set_operation_mode(OperationMode::AfterPolls(2));

        let op = ServiceAccountService::create(
            &cloud,
            &deadline(),
            CreateServiceAccountRequest {
                folder_id: "f-1".to_string(),
                name: "acct".to_string(),
                description: String::new(),
            },
        )
        .await
        .unwrap();
        assert!(!op.done);

        let account: ServiceAccount = wait_for(&cloud, op, &deadline()).await.unwrap();
        assert_eq!(account.name, "acct");
        assert_eq!(cloud.call_count(Method::GetOperation), 2);
    }

    #[tokio::test]
    async fn test_fake_failed_operation_does_not_mutate() {
        let cloud = FakeCloud::new();
        cloud.set_operation_mode(OperationMode::Fail {
            code: 9,
            message: "quota exceeded".to_string(),
        });

        let op = ServiceAccountService::create(
            &cloud,
            &deadline(),
            CreateServiceAccountRequest {
                folder_id: "f-1".to_string(),
                name: "acct".to_string(),
                description: String::new(),
            },
        )
        .await
        .unwrap();

        assert!(op.done);
        assert!(cloud.service_accounts().is_empty());
    }

    #[tokio::test]
    async fn test_tester_schema() {
        let cloud = Arc::new(FakeCloud::new());
        let tester = configured(&cloud).await;

        let schema = tester.schema();
        assert!(schema.resources.contains_key(SA));
        assert!(schema.provider.attribute("token").unwrap().flags.sensitive);
        assert_eq!(tester.resource_types(), vec![SA.to_string()]);
        assert_eq!(tester.data_source_types().len(), 4);
    }

    #[tokio::test]
    async fn test_tester_configure_requires_credentials() {
        let cloud = Arc::new(FakeCloud::new());
        let tester = ProviderTester::new(YandexProvider::with_cloud(cloud));

        match tester.configure(json!({"folder_id": "f-1"})).await {
            Err(TestError::Provider(ProviderError::Auth(_))) => {}
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tester_rejects_bad_provider_config() {
        let cloud = Arc::new(FakeCloud::new());
        let tester = ProviderTester::new(YandexProvider::with_cloud(cloud));

        match tester.validate_provider_config(json!({"token": 1})).await {
            Err(TestError::Diagnostics(diags)) => assert_error_contains(&diags, "token"),
            other => panic!("expected diagnostics, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tester_plan_create() {
        let cloud = Arc::new(FakeCloud::new());
        let tester = configured(&cloud).await;

        let plan = tester.plan_create(SA, json!({"name": "acct"})).await.unwrap();
        assert_plan_creates(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_does_not_change_attribute(&plan, "id");
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud() {
        let cloud = Arc::new(FakeCloud::new());
        let tester = configured(&cloud).await;

        let final_state = tester
            .lifecycle_crud(
                SA,
                json!({"name": "initial"}),
                json!({"name": "updated"}),
            )
            .await
            .unwrap();

        assert_eq!(final_state["name"], "updated");
        assert_eq!(final_state["folder_id"], "f-1");
        assert!(cloud.service_accounts().is_empty());
    }

    #[tokio::test]
    async fn test_tester_apply_no_changes_makes_no_calls() {
        let cloud = Arc::new(FakeCloud::new());
        let tester = configured(&cloud).await;

        let state = tester
            .apply(SA, None, json!({"name": "acct"}))
            .await
            .unwrap()
            .unwrap();
        cloud.clear_calls();

        let again = tester
            .apply(SA, Some(state.clone()), json!({"name": "acct"}))
            .await
            .unwrap();
        assert_eq!(again, Some(state));
        assert!(cloud.calls().is_empty());
    }

    #[test]
    fn test_assert_no_errors() {
        let diagnostics = vec![Diagnostic::warning("Just a warning")];
        assert_no_errors(&diagnostics);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        let diagnostics = vec![Diagnostic::error("An error")];
        assert_no_errors(&diagnostics);
    }

    #[test]
    fn test_assert_has_errors() {
        let diagnostics = vec![Diagnostic::error("An error")];
        assert_has_errors(&diagnostics);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("field1"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = format!("{}", err);
        assert!(display.contains("First error"));
        assert!(display.contains("Second error"));
        assert!(display.contains("field1"));
        assert!(display.contains("More info"));
    }
}
