use crate::types::TreeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors raised synchronously by tree and registry operations.
///
/// All variants are recoverable by the caller: `Validation` means fix the
/// input and retry, `NotFound` means the caller holds stale ids and should
/// refresh, `InvalidOperation` means the action is structurally disallowed
/// and retrying it unchanged will fail again.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("node {0} not found")]
    NotFound(TreeId),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl TreeError {
    pub fn validation(message: impl Into<String>) -> Self {
        TreeError::Validation(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        TreeError::InvalidOperation(message.into())
    }
}

/// Failure reported by the external remote-session capability.
///
/// Never retried by the core: the session returns to `Disconnected` and
/// this value carries the external description for the caller and the log.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("connection to {target} failed (reason {code}): {description}")]
pub struct ConnectionError {
    pub tree_id: TreeId,
    pub target: String,
    pub code: u32,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_error_messages() {
        assert_eq!(TreeError::NotFound(TreeId(5)).to_string(), "node 5 not found");
        assert_eq!(
            TreeError::validation("name is empty").to_string(),
            "invalid input: name is empty"
        );
        assert_eq!(
            TreeError::invalid("cycle").to_string(),
            "invalid operation: cycle"
        );
    }

    #[test]
    fn connection_error_includes_external_text() {
        let err = ConnectionError {
            tree_id: TreeId(2),
            target: "db1".into(),
            code: 516,
            description: "Unable to establish a connection".into(),
        };
        assert_eq!(
            err.to_string(),
            "connection to db1 failed (reason 516): Unable to establish a connection"
        );
    }
}
