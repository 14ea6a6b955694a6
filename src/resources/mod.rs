//! Resource reconcilers.
//!
//! A [`Reconciler`] implements create, read, update and delete for one
//! resource kind against a typed state record. [`ResourceAdapter`] wraps it
//! into the object-safe [`Resource`] the registry stores: it converts the
//! host's JSON state at the boundary, derives a per-verb [`Deadline`] from
//! the resource's `timeouts` attribute, and reports partially applied
//! changes alongside errors.

pub mod service_account;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::ProviderError;
use crate::operation::Deadline;
use crate::provider::ProviderContext;
use crate::schema::Schema;
use crate::state::ResourceState;
use crate::types::ApplyResult;

/// Timeout applied to a verb when the resource does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Name of the attribute carrying per-verb timeouts.
pub const TIMEOUTS_ATTRIBUTE: &str = "timeouts";

/// Per-verb deadlines, from the resource's `timeouts` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Create timeout.
    pub create: Duration,
    /// Read timeout.
    pub read: Duration,
    /// Update timeout.
    pub update: Duration,
    /// Delete timeout.
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            read: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

impl Timeouts {
    /// Read timeouts from a resource state object, e.g.
    /// `{"timeouts": {"create": "5m", "delete": "30s"}}`.
    pub fn from_state(state: &Value) -> Result<Self, ProviderError> {
        let mut timeouts = Self::default();
        let Some(declared) = state.get(TIMEOUTS_ATTRIBUTE).filter(|v| !v.is_null()) else {
            return Ok(timeouts);
        };
        let declared = declared.as_object().ok_or_else(|| {
            ProviderError::Configuration("'timeouts' must be an object".to_string())
        })?;

        for (verb, value) in declared {
            if value.is_null() {
                continue;
            }
            let text = value.as_str().ok_or_else(|| {
                ProviderError::Configuration(format!("timeout for '{}' must be a string", verb))
            })?;
            let duration = parse_duration(text)?;
            match verb.as_str() {
                "create" => timeouts.create = duration,
                "read" => timeouts.read = duration,
                "update" => timeouts.update = duration,
                "delete" => timeouts.delete = duration,
                other => {
                    return Err(ProviderError::Configuration(format!(
                        "unknown timeout '{}'",
                        other
                    )))
                }
            }
        }
        Ok(timeouts)
    }
}

/// Parse a duration such as `100ms`, `30s`, `5m`, `1h` or `1h30m`.
pub fn parse_duration(text: &str) -> Result<Duration, ProviderError> {
    let invalid = || ProviderError::Configuration(format!("invalid duration '{}'", text));

    let mut rest = text.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => Duration::from_secs(60),
            "h" => Duration::from_secs(3600),
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        let amount = u32::try_from(amount).map_err(|_| invalid())?;
        total += unit.checked_mul(amount).ok_or_else(invalid)?;
    }
    Ok(total)
}

/// Create, read, update and delete for one resource kind.
///
/// Each verb mutates `state` in place to mirror what is durably true
/// remotely, including when it returns an error.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Typed state of this resource kind.
    type State: ResourceState;

    /// The host-facing type name, e.g. `yandex_iam_service_account`.
    const TYPE_NAME: &'static str;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Create the remote object described by `state`, then read it back.
    async fn create(
        &self,
        ctx: &ProviderContext,
        deadline: &Deadline,
        state: &mut Self::State,
    ) -> Result<(), ProviderError>;

    /// Refresh `state` from the remote object. Clears the id if it is gone.
    async fn read(
        &self,
        ctx: &ProviderContext,
        deadline: &Deadline,
        state: &mut Self::State,
    ) -> Result<(), ProviderError>;

    /// Apply `declared` to the remote object mirrored by `state`.
    async fn update(
        &self,
        ctx: &ProviderContext,
        deadline: &Deadline,
        declared: &Self::State,
        state: &mut Self::State,
    ) -> Result<(), ProviderError>;

    /// Delete the remote object and clear the id.
    async fn delete(
        &self,
        ctx: &ProviderContext,
        deadline: &Deadline,
        state: &mut Self::State,
    ) -> Result<(), ProviderError>;
}

/// Object-safe view of a resource kind over JSON state.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The host-facing type name.
    fn type_name(&self) -> &'static str;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Create from a planned state.
    async fn create(&self, ctx: &ProviderContext, planned: Value) -> ApplyResult;

    /// Read the current state. `None` means the resource is gone.
    async fn read(&self, ctx: &ProviderContext, current: Value)
        -> Result<Option<Value>, ProviderError>;

    /// Update from `prior` to `planned`.
    async fn update(&self, ctx: &ProviderContext, prior: Value, planned: Value) -> ApplyResult;

    /// Delete the resource.
    async fn delete(&self, ctx: &ProviderContext, current: Value) -> Result<(), ProviderError>;

    /// Adopt an existing remote object by id.
    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value, ProviderError>;
}

/// Adapts a [`Reconciler`] to the JSON state bag of the host.
pub struct ResourceAdapter<R>(pub R);

impl<R: Reconciler> ResourceAdapter<R> {
    fn decode(value: &Value) -> Result<R::State, ProviderError> {
        if value.is_null() {
            return Ok(R::State::default());
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Serialize `state`, keeping the `timeouts` the host declared.
    fn encode(state: &R::State, declared: &Value) -> Result<Value, ProviderError> {
        let mut value = serde_json::to_value(state)?;
        if let (Some(obj), Some(timeouts)) = (
            value.as_object_mut(),
            declared.get(TIMEOUTS_ATTRIBUTE).filter(|v| !v.is_null()),
        ) {
            obj.insert(TIMEOUTS_ATTRIBUTE.to_string(), timeouts.clone());
        }
        Ok(value)
    }

    fn encode_existing(state: &R::State, declared: &Value) -> Result<Option<Value>, ProviderError> {
        if state.exists() {
            Self::encode(state, declared).map(Some)
        } else {
            Ok(None)
        }
    }

    fn apply_result(
        state: &R::State,
        declared: &Value,
        result: Result<(), ProviderError>,
    ) -> ApplyResult {
        match (Self::encode_existing(state, declared), result) {
            (Ok(new_state), Ok(())) => ApplyResult {
                new_state,
                error: None,
            },
            (Ok(new_state), Err(err)) => ApplyResult::failed(new_state, err),
            (Err(err), _) => ApplyResult::failed(None, err),
        }
    }
}

#[async_trait]
impl<R: Reconciler> Resource for ResourceAdapter<R> {
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        self.0.schema()
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME))]
    async fn create(&self, ctx: &ProviderContext, planned: Value) -> ApplyResult {
        let prepared = Timeouts::from_state(&planned)
            .and_then(|timeouts| Ok((timeouts, Self::decode(&planned)?)));
        let (timeouts, mut state) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return ApplyResult::failed(None, err),
        };

        let deadline = Deadline::after(timeouts.create);
        let what = format!("creating {}", R::TYPE_NAME);
        let result = deadline
            .run(&what, self.0.create(ctx, &deadline, &mut state))
            .await;
        debug!(id = state.id(), ok = result.is_ok(), "create finished");
        Self::apply_result(&state, &planned, result)
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME))]
    async fn read(
        &self,
        ctx: &ProviderContext,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let timeouts = Timeouts::from_state(&current)?;
        let mut state = Self::decode(&current)?;
        if !state.exists() {
            return Ok(None);
        }

        let deadline = Deadline::after(timeouts.read);
        let what = format!("reading {} {}", R::TYPE_NAME, state.id());
        deadline
            .run(&what, self.0.read(ctx, &deadline, &mut state))
            .await?;
        Self::encode_existing(&state, &current)
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME))]
    async fn update(&self, ctx: &ProviderContext, prior: Value, planned: Value) -> ApplyResult {
        let prepared = Timeouts::from_state(&planned).and_then(|timeouts| {
            Ok((timeouts, Self::decode(&prior)?, Self::decode(&planned)?))
        });
        let (timeouts, mut state, declared) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return ApplyResult::failed(Some(prior), err),
        };

        let deadline = Deadline::after(timeouts.update);
        let what = format!("updating {} {}", R::TYPE_NAME, state.id());
        let result = deadline
            .run(&what, self.0.update(ctx, &deadline, &declared, &mut state))
            .await;
        Self::apply_result(&state, &planned, result)
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME))]
    async fn delete(&self, ctx: &ProviderContext, current: Value) -> Result<(), ProviderError> {
        let timeouts = Timeouts::from_state(&current)?;
        let mut state = Self::decode(&current)?;
        if !state.exists() {
            return Ok(());
        }

        let deadline = Deadline::after(timeouts.delete);
        let what = format!("deleting {} {}", R::TYPE_NAME, state.id());
        deadline
            .run(&what, self.0.delete(ctx, &deadline, &mut state))
            .await
    }

    #[instrument(skip_all, fields(resource_type = R::TYPE_NAME, id = %id))]
    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value, ProviderError> {
        let mut state = R::State::default();
        state.set_id(id.to_string());

        let deadline = Deadline::after(DEFAULT_TIMEOUT);
        let what = format!("importing {} {}", R::TYPE_NAME, id);
        deadline
            .run(&what, self.0.read(ctx, &deadline, &mut state))
            .await?;

        Self::encode_existing(&state, &Value::Null)?
            .ok_or_else(|| ProviderError::NotFound(format!("{} {}", R::TYPE_NAME, id)))
    }
}
