//! Yandex Cloud provider
//!
//! This crate implements an infrastructure-as-code provider for Yandex Cloud:
//! it owns IAM service accounts and looks up existing service accounts and
//! managed database clusters by name.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **ProviderService trait**: the verb contract the host drives (schema,
//!   configure, plan, create/read/update/delete, import, data sources)
//! - **YandexProvider**: the registry of resources and data sources behind it
//! - **Cloud client**: gRPC clients for the IAM, operation and MDB services,
//!   with OAuth, IAM token and service account key authentication
//! - **Operation awaiter**: polls long-running operations under a deadline
//! - **Resolver**: name-to-id lookups that refuse ambiguous names
//! - **Partial state**: typed resource state that keeps what an update
//!   already committed when a later step fails
//! - **Logging**: integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use yandex_provider::{init_logging, ProviderService, YandexProvider};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = YandexProvider::new();
//!     provider
//!         .configure(json!({"token": std::env::var("YC_TOKEN")?, "folder_id": "b1g..."}))
//!         .await?;
//!
//!     let config = json!({"name": "ci-runner"});
//!     let plan = provider
//!         .plan("yandex_iam_service_account", None, config.clone(), config)
//!         .await?;
//!     let state = provider
//!         .create("yandex_iam_service_account", plan.planned_state)
//!         .await
//!         .into_result()?;
//!     println!("{:?}", state);
//!     Ok(())
//! }
//! ```
//!
//! # Resources
//!
//! - `yandex_iam_service_account`
//!
//! # Data Sources
//!
//! - `yandex_iam_service_account`
//! - `yandex_mdb_postgresql_cluster`
//! - `yandex_mdb_mongodb_cluster`
//! - `yandex_mdb_clickhouse_cluster`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cloud;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod operation;
pub mod plan;
pub mod provider;
pub mod resolver;
pub mod resources;
pub mod schema;
pub mod service;
pub mod state;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use operation::Deadline;
pub use provider::{ProviderContext, YandexProvider};
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{
    ApplyResult, AttributeChange, ImportedResource, PlanResult, ProviderMetadata,
    ServerCapabilities,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
