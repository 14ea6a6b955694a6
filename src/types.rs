//! Plan and apply results exchanged with the host.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if deleting).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(
        path: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: serde_json::Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying this plan does anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Outcome of a create or update.
///
/// A verb can fail after part of its effect is already durable (an id was
/// assigned, or some fields were committed). `new_state` carries what the
/// host must persist in either case; `error` carries the failure, if any.
#[derive(Debug)]
pub struct ApplyResult {
    /// State to persist. `None` means the resource is gone.
    pub new_state: Option<serde_json::Value>,
    /// Failure to report alongside the persisted state.
    pub error: Option<ProviderError>,
}

impl ApplyResult {
    /// A fully successful apply.
    pub fn ok(new_state: serde_json::Value) -> Self {
        Self {
            new_state: Some(new_state),
            error: None,
        }
    }

    /// An apply that failed, with whatever state was committed before the failure.
    pub fn failed(new_state: Option<serde_json::Value>, error: ProviderError) -> Self {
        Self {
            new_state,
            error: Some(error),
        }
    }

    /// Whether the apply reported an error.
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Collapse into a `Result`, discarding the committed state on failure.
    pub fn into_result(self) -> Result<Option<serde_json::Value>, ProviderError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.new_state),
        }
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider supports planning destroy operations.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", serde_json::json!("test"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(serde_json::json!("test")));

        let removed = AttributeChange::removed("name", serde_json::json!("old"));
        assert_eq!(removed.before, Some(serde_json::json!("old")));
        assert!(removed.after.is_none());

        let modified =
            AttributeChange::modified("description", serde_json::json!("a"), serde_json::json!("b"));
        assert_eq!(modified.before, Some(serde_json::json!("a")));
        assert_eq!(modified.after, Some(serde_json::json!("b")));
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(serde_json::json!({"id": "sa-1"}));
        assert!(!no_change.has_changes());
        assert!(!no_change.requires_replace);

        let with_changes = PlanResult::with_changes(
            serde_json::json!({"id": "sa-1", "name": "new"}),
            vec![AttributeChange::modified(
                "name",
                serde_json::json!("old"),
                serde_json::json!("new"),
            )],
            false,
        );
        assert!(with_changes.has_changes());
        assert_eq!(with_changes.changes.len(), 1);
    }

    #[test]
    fn test_apply_result() {
        let ok = ApplyResult::ok(serde_json::json!({"id": "sa-1"}));
        assert!(!ok.is_err());
        assert_eq!(
            ok.into_result().unwrap(),
            Some(serde_json::json!({"id": "sa-1"}))
        );

        let failed = ApplyResult::failed(
            Some(serde_json::json!({"id": "sa-1"})),
            ProviderError::Timeout("read".to_string()),
        );
        assert!(failed.is_err());
        assert_eq!(failed.new_state.as_ref().unwrap()["id"], "sa-1");
        assert!(matches!(
            failed.into_result(),
            Err(ProviderError::Timeout(_))
        ));
    }

    #[test]
    fn test_imported_resource() {
        let imported =
            ImportedResource::new("yandex_iam_service_account", serde_json::json!({"id": "sa-1"}));
        assert_eq!(imported.resource_type, "yandex_iam_service_account");
        assert_eq!(imported.state["id"], "sa-1");
    }
}
