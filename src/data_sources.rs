//! Read-only lookups of existing objects.
//!
//! Each data source takes a small query (an id, or a name plus an optional
//! folder) and returns the object's attributes. Name lookups go through the
//! [`Resolver`], so they fail on ambiguous names instead of guessing.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::cloud::proto::iam::GetServiceAccountRequest;
use crate::cloud::{format_timestamp, ClusterFlavor};
use crate::error::ProviderError;
use crate::operation::Deadline;
use crate::provider::ProviderContext;
use crate::resolver::{NamedObject, ResolveKind, Resolver};
use crate::resources::DEFAULT_TIMEOUT;
use crate::schema::{Attribute, Schema};
use crate::state::null_as_default;

/// A read-only lookup exposed to the host.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The host-facing type name.
    fn type_name(&self) -> &'static str;

    /// Schema of the query and its results.
    fn schema(&self) -> Schema;

    /// Run the lookup described by `config`.
    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError>;
}

#[derive(Debug, Default, Deserialize)]
struct Lookup {
    #[serde(default, deserialize_with = "null_as_default")]
    service_account_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    folder_id: String,
}

impl Lookup {
    fn parse(config: Value) -> Result<Self, ProviderError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(config)
            .map_err(|e| ProviderError::Configuration(format!("invalid lookup: {}", e)))
    }
}

/// `yandex_iam_service_account` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAccountDataSource;

#[async_trait]
impl DataSource for ServiceAccountDataSource {
    fn type_name(&self) -> &'static str {
        "yandex_iam_service_account"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Look up a service account by id or by name")
            .with_attribute("service_account_id", Attribute::optional_computed_string())
            .with_attribute("name", Attribute::optional_computed_string())
            .with_attribute("folder_id", Attribute::optional_computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
    }

    #[instrument(skip_all)]
    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError> {
        let lookup = Lookup::parse(config)?;
        let deadline = Deadline::after(DEFAULT_TIMEOUT);

        let id = match (lookup.service_account_id.is_empty(), lookup.name.is_empty()) {
            (false, true) => lookup.service_account_id,
            (true, false) => {
                let folder_id = ctx.folder_id(&lookup.folder_id)?;
                deadline
                    .run(
                        "resolving service account",
                        Resolver::new(ctx.cloud.as_ref()).resolve(
                            &deadline,
                            ResolveKind::ServiceAccount,
                            &lookup.name,
                            &folder_id,
                        ),
                    )
                    .await?
            }
            _ => {
                return Err(ProviderError::Configuration(
                    "exactly one of 'service_account_id' or 'name' must be set".to_string(),
                ))
            }
        };

        let request = GetServiceAccountRequest {
            service_account_id: id,
        };
        let account = deadline
            .run("reading service account", async {
                ctx.cloud
                    .service_accounts()
                    .get(&deadline, request)
                    .await
                    .map_err(ProviderError::from)
            })
            .await?;

        Ok(json!({
            "service_account_id": account.id,
            "name": account.name,
            "folder_id": account.folder_id,
            "description": account.description,
            "created_at": format_timestamp(account.created_at.as_ref())?,
        }))
    }
}

/// `yandex_mdb_{postgresql,mongodb,clickhouse}_cluster` data sources.
#[derive(Debug, Clone, Copy)]
pub struct ClusterDataSource {
    flavor: ClusterFlavor,
}

impl ClusterDataSource {
    /// Data source for clusters of `flavor`.
    pub fn new(flavor: ClusterFlavor) -> Self {
        Self { flavor }
    }

    /// Data sources for every flavor.
    pub fn all() -> Vec<Self> {
        ClusterFlavor::ALL.into_iter().map(Self::new).collect()
    }
}

#[async_trait]
impl DataSource for ClusterDataSource {
    fn type_name(&self) -> &'static str {
        match self.flavor {
            ClusterFlavor::PostgreSql => "yandex_mdb_postgresql_cluster",
            ClusterFlavor::MongoDb => "yandex_mdb_mongodb_cluster",
            ClusterFlavor::ClickHouse => "yandex_mdb_clickhouse_cluster",
        }
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(format!(
                "Look up a managed {} cluster by name",
                self.flavor.package()
            ))
            .with_attribute("name", Attribute::required_string())
            .with_attribute("folder_id", Attribute::optional_computed_string())
            .with_attribute("cluster_id", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
    }

    #[instrument(skip_all, fields(flavor = self.flavor.package()))]
    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError> {
        let lookup = Lookup::parse(config)?;
        let folder_id = ctx.folder_id(&lookup.folder_id)?;
        let deadline = Deadline::after(DEFAULT_TIMEOUT);

        let cluster: NamedObject = deadline
            .run(
                "resolving cluster",
                Resolver::new(ctx.cloud.as_ref()).resolve_entry(
                    &deadline,
                    ResolveKind::Cluster(self.flavor),
                    &lookup.name,
                    &folder_id,
                ),
            )
            .await?;

        Ok(json!({
            "cluster_id": cluster.id,
            "name": cluster.name,
            "folder_id": cluster.folder_id,
            "description": cluster.description,
            "created_at": format_timestamp(cluster.created_at.as_ref())?,
        }))
    }
}
