//! `yandex_iam_service_account`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::{Reconciler, TIMEOUTS_ATTRIBUTE};
use crate::cloud::format_timestamp;
use crate::cloud::proto::iam::{
    CreateServiceAccountRequest, DeleteServiceAccountRequest, GetServiceAccountRequest,
    ServiceAccount, UpdateServiceAccountRequest,
};
use crate::cloud::proto::Empty;
use crate::error::ProviderError;
use crate::operation::{wait_for, Deadline};
use crate::provider::ProviderContext;
use crate::schema::{Attribute, Schema};
use crate::state::{null_as_default, PartialCommit, ResourceState};

/// Mirror of a service account in the host's state store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountState {
    /// Server-assigned id.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Account name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Free-form description.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Owning folder. Changing it replaces the account.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub folder_id: String,
    /// Creation time, RFC 3339.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub created_at: String,
}

impl ServiceAccountState {
    /// Refresh every mirrored attribute from the remote object.
    pub fn refresh_from(&mut self, account: ServiceAccount) -> Result<(), ProviderError> {
        self.created_at = format_timestamp(account.created_at.as_ref())?;
        self.name = account.name;
        self.folder_id = account.folder_id;
        self.description = account.description;
        Ok(())
    }
}

impl ResourceState for ServiceAccountState {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn copy_attribute(&mut self, from: &Self, path: &str) -> bool {
        match path {
            "name" => self.name = from.name.clone(),
            "description" => self.description = from.description.clone(),
            _ => return false,
        }
        true
    }
}

/// Reconciler for IAM service accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAccountResource;

#[async_trait]
impl Reconciler for ServiceAccountResource {
    type State = ServiceAccountState;

    const TYPE_NAME: &'static str = "yandex_iam_service_account";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("An IAM service account")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Service account ID"),
            )
            .with_attribute(
                "name",
                Attribute::optional_string()
                    .with_default(json!(""))
                    .with_description("Name of the service account"),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "folder_id",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_description("Folder to create the account in; defaults to the provider folder"),
            )
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute(
                TIMEOUTS_ATTRIBUTE,
                Attribute::optional_string_map()
                    .with_description("Per-operation timeouts: create, read, update, delete"),
            )
    }

    #[instrument(skip_all, fields(name = %state.name))]
    async fn create(
        &self,
        ctx: &ProviderContext,
        deadline: &Deadline,
        state: &mut ServiceAccountState,
    ) -> Result<(), ProviderError> {
        let folder_id = ctx.folder_id(&state.folder_id)?;
        let request = CreateServiceAccountRequest {
            folder_id: folder_id.clone(),
            name: state.name.clone(),
            description: state.description.clone(),
        };

        debug!(folder_id = %folder_id, "creating service account");
        let operation = ctx.cloud.service_accounts().create(deadline, request).await?;
        let account: ServiceAccount = wait_for(ctx.cloud.operations(), operation, deadline).await?;

        state.set_id(account.id);
        state.folder_id = folder_id;
        info!(id = %state.id, "created service account");

        self.read(ctx, deadline, state).await
    }

    #[instrument(skip_all, fields(id = %state.id))]
    async fn read(
        &self,
        ctx: &ProviderContext,
        deadline: &Deadline,
        state: &mut ServiceAccountState,
    ) -> Result<(), ProviderError> {
        let request = GetServiceAccountRequest {
            service_account_id: state.id.clone(),
        };

        match ctx.cloud.service_accounts().get(deadline, request).await {
            Ok(account) => state.refresh_from(account),
            Err(status) => {
                let err = ProviderError::from(status);
                if !err.is_not_found() {
                    return Err(err);
                }
                warn!(name = %state.name, "service account not found, removing from state");
                state.clear_id();
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(id = %state.id))]
    async fn update(
        &self,
        ctx: &ProviderContext,
        deadline: &Deadline,
        declared: &ServiceAccountState,
        state: &mut ServiceAccountState,
    ) -> Result<(), ProviderError> {
        let mut request = UpdateServiceAccountRequest {
            service_account_id: state.id.clone(),
            ..Default::default()
        };
        let mut paths = Vec::new();

        if declared.name != state.name {
            request.name = declared.name.clone();
            paths.push("name");
        }
        if declared.description != state.description {
            request.description = declared.description.clone();
            paths.push("description");
        }

        if paths.is_empty() {
            debug!("service account is up to date");
            return Ok(());
        }
        request.update_mask = Some(prost_types::FieldMask {
            paths: paths.iter().map(|p| p.to_string()).collect(),
        });

        {
            let mut session = PartialCommit::begin(&mut *state, declared);
            debug!(paths = ?paths, "updating service account");
            let operation = ctx.cloud.service_accounts().update(deadline, request).await?;
            wait_for::<ServiceAccount>(ctx.cloud.operations(), operation, deadline).await?;
            for path in paths {
                session.commit(path);
            }
            session.finish();
        }
        info!("updated service account");

        self.read(ctx, deadline, state).await
    }

    #[instrument(skip_all, fields(id = %state.id))]
    async fn delete(
        &self,
        ctx: &ProviderContext,
        deadline: &Deadline,
        state: &mut ServiceAccountState,
    ) -> Result<(), ProviderError> {
        let request = DeleteServiceAccountRequest {
            service_account_id: state.id.clone(),
        };

        let operation = match ctx.cloud.service_accounts().delete(deadline, request).await {
            Ok(operation) => operation,
            Err(status) => {
                let err = ProviderError::from(status);
                if !err.is_not_found() {
                    return Err(err);
                }
                warn!("service account already gone");
                state.clear_id();
                return Ok(());
            }
        };

        wait_for::<Empty>(ctx.cloud.operations(), operation, deadline).await?;
        state.clear_id();
        info!("deleted service account");
        Ok(())
    }
}
