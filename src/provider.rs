//! The Yandex Cloud provider: resource registry and configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::cloud::grpc::Sdk;
use crate::cloud::CloudApi;
use crate::config::ProviderConfig;
use crate::data_sources::{ClusterDataSource, DataSource, ServiceAccountDataSource};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::service_account::ServiceAccountResource;
use crate::resources::{Resource, ResourceAdapter, Timeouts};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ApplyResult, ImportedResource, PlanResult};
use crate::validation::validate;

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// What every verb needs: the shared cloud client and the provider block.
///
/// Built once by [`ProviderService::configure`] and read-only afterwards.
pub struct ProviderContext {
    /// Cloud client shared by all reconcilers.
    pub cloud: Arc<dyn CloudApi>,
    /// Provider configuration after environment layering.
    pub config: ProviderConfig,
}

impl ProviderContext {
    /// Create a context.
    pub fn new(cloud: Arc<dyn CloudApi>, config: ProviderConfig) -> Self {
        Self { cloud, config }
    }

    /// The folder to use: `declared` if set, else the provider default.
    pub fn folder_id(&self, declared: &str) -> Result<String, ProviderError> {
        if !declared.is_empty() {
            return Ok(declared.to_string());
        }
        self.config.folder_id().map(str::to_string).ok_or_else(|| {
            ProviderError::Configuration(
                "cannot determine folder_id: set it on the resource or in the provider block"
                    .to_string(),
            )
        })
    }
}

/// Provider exposing Yandex Cloud resources and data sources.
pub struct YandexProvider {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
    cloud: Option<Arc<dyn CloudApi>>,
    env: EnvLookup,
    context: RwLock<Option<Arc<ProviderContext>>>,
}

impl Default for YandexProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YandexProvider {
    /// A provider that talks to the real cloud once configured.
    pub fn new() -> Self {
        let mut resources: BTreeMap<&'static str, Arc<dyn Resource>> = BTreeMap::new();
        let service_account: Arc<dyn Resource> =
            Arc::new(ResourceAdapter(ServiceAccountResource));
        resources.insert(service_account.type_name(), service_account);

        let mut data_sources: BTreeMap<&'static str, Arc<dyn DataSource>> = BTreeMap::new();
        data_sources.insert(
            ServiceAccountDataSource.type_name(),
            Arc::new(ServiceAccountDataSource),
        );
        for cluster in ClusterDataSource::all() {
            data_sources.insert(cluster.type_name(), Arc::new(cluster));
        }

        Self {
            resources,
            data_sources,
            cloud: None,
            env: Arc::new(|key| std::env::var(key).ok()),
            context: RwLock::new(None),
        }
    }

    /// A provider that uses `cloud` instead of building a gRPC client.
    ///
    /// Environment variables are not consulted.
    pub fn with_cloud(cloud: Arc<dyn CloudApi>) -> Self {
        Self {
            cloud: Some(cloud),
            env: Arc::new(|_| None),
            ..Self::new()
        }
    }

    /// Use `lookup` instead of the process environment.
    pub fn with_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Arc::new(lookup);
        self
    }

    /// Names of the registered resource kinds.
    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    /// The configured context, or an error if `configure` has not run.
    pub async fn context(&self) -> Result<Arc<ProviderContext>, ProviderError> {
        self.context.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    async fn prepare(
        &self,
        resource_type: &str,
    ) -> Result<(Arc<dyn Resource>, Arc<ProviderContext>), ProviderError> {
        let resource = Arc::clone(self.resource(resource_type)?);
        Ok((resource, self.context().await?))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for YandexProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(*name, resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(*name, data_source.schema());
        }
        schema
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&ProviderConfig::schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let env = Arc::clone(&self.env);
        let config = ProviderConfig::from_value(config)?.with_env_from(|key| env(key));

        let cloud: Arc<dyn CloudApi> = match &self.cloud {
            Some(cloud) => {
                config.credentials()?;
                Arc::clone(cloud)
            }
            None => Arc::new(Sdk::build(&config)?),
        };

        if config.folder_id().is_none() {
            warn!("no default folder_id configured");
            diagnostics.push(
                Diagnostic::warning("No default folder_id")
                    .with_detail("Resources and lookups must set folder_id explicitly")
                    .with_attribute("folder_id"),
            );
        }

        info!(
            endpoint = config.endpoint(),
            folder_id = config.folder_id().unwrap_or_default(),
            "provider configured"
        );
        *self.context.write().await = Some(Arc::new(ProviderContext::new(cloud, config)));
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("provider stopping");
        self.context.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validate(&resource.schema(), &config);
        if let Err(err) = Timeouts::from_state(&config) {
            diagnostics.push(Diagnostic::error(err.to_string()).with_attribute("timeouts"));
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let plan = plan_resource(&resource.schema(), prior_state.as_ref(), &proposed_state);
        debug!(
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "planned"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> ApplyResult {
        match self.prepare(resource_type).await {
            Ok((resource, ctx)) => resource.create(&ctx, planned_state).await,
            Err(err) => ApplyResult::failed(None, err),
        }
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let (resource, ctx) = self.prepare(resource_type).await?;
        resource.read(&ctx, current_state).await
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> ApplyResult {
        match self.prepare(resource_type).await {
            Ok((resource, ctx)) => resource.update(&ctx, prior_state, planned_state).await,
            Err(err) => ApplyResult::failed(Some(prior_state), err),
        }
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let (resource, ctx) = self.prepare(resource_type).await?;
        resource.delete(&ctx, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let (resource, ctx) = self.prepare(resource_type).await?;
        let state = resource.import(&ctx, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let ctx = self.context().await?;
        data_source.read(&ctx, config).await
    }
}
