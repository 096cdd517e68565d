//! Structured results for callers at the crate boundary.
//!
//! Route handlers and the CLI turn every mutation outcome into a
//! [`MutationResponse`] instead of propagating the error further.

use crate::audit::Recorded;
use crate::error::{Error, Result};
use serde::Serialize;

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable code from [`Error::code`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Set when the operation succeeded but its audit entry was lost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl MutationResponse {
    pub fn failure(error: &Error) -> Self {
        if matches!(error, Error::Storage(_) | Error::Io(_) | Error::Json(_)) {
            log::error!("Operation failed: {error}");
        } else {
            log::debug!("Operation rejected: {error}");
        }
        MutationResponse {
            success: false,
            error: Some(error.to_string()),
            code: Some(error.code().to_string()),
            ..Default::default()
        }
    }

    /// Build from an operation result, describing the value on success.
    pub fn from_result<T, F>(result: Result<Recorded<T>>, describe: F) -> Self
    where
        F: FnOnce(&T) -> String,
    {
        match result {
            Ok(recorded) => MutationResponse {
                success: true,
                message: Some(describe(&recorded.value)),
                warning: recorded.audit.warning(),
                ..Default::default()
            },
            Err(e) => MutationResponse::failure(&e),
        }
    }

    /// Like [`from_result`](Self::from_result) for creates, carrying the new id.
    pub fn created(result: Result<Recorded<String>>, what: &str) -> Self {
        match result {
            Ok(recorded) => MutationResponse {
                success: true,
                message: Some(format!("{what} created")),
                warning: recorded.audit.warning(),
                id: Some(recorded.value),
                ..Default::default()
            },
            Err(e) => MutationResponse::failure(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditStatus;

    #[test]
    fn test_created_success_json() {
        let response = MutationResponse::created(
            Ok(Recorded {
                value: "abc123".to_string(),
                audit: AuditStatus::Recorded("a1".to_string()),
            }),
            "Subnet",
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "id": "abc123", "message": "Subnet created"})
        );
    }

    #[test]
    fn test_failure_carries_code() {
        let response = MutationResponse::from_result::<(), _>(
            Err(Error::DuplicateSubnet("10.0.0.0/24".to_string())),
            |_| String::new(),
        );
        assert!(!response.success);
        assert_eq!(response.code.as_deref(), Some("duplicate_subnet"));
        assert_eq!(response.error.as_deref(), Some("Subnet 10.0.0.0/24 already exists"));
    }

    #[test]
    fn test_audit_failure_becomes_warning() {
        let response = MutationResponse::from_result(
            Ok(Recorded {
                value: 3usize,
                audit: AuditStatus::Failed("disk full".to_string()),
            }),
            |n| format!("{n} released"),
        );
        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("3 released"));
        assert!(response.warning.unwrap().contains("disk full"));
    }
}
