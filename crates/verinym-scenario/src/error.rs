use verinym_core::CoreError;
use verinym_sdk::{ErrorCode, SdkError};

/// Scenario errors. Everything except `AlreadyExists` is fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// A create call found its target in place; callers may swallow it.
    #[error("already exists: {0}")]
    AlreadyExists(SdkError),

    /// A nonce or sender verkey did not match the expected counterpart.
    #[error("authentication mismatch: {0}")]
    AuthenticationMismatch(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("sdk error: {0}")]
    Sdk(SdkError),

    #[error("config error: {0}")]
    Config(#[from] CoreError),

    /// An exchanged message was malformed or arrived out of order.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<SdkError> for ScenarioError {
    fn from(err: SdkError) -> Self {
        match err.code {
            code if code.is_already_exists() => Self::AlreadyExists(err),
            ErrorCode::ProofRejected => Self::VerificationFailed(err.message),
            _ => Self::Sdk(err),
        }
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("malformed message: {}", err))
    }
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// Treat an already-exists failure of an idempotent create as success.
pub fn ignore_already_exists(result: ScenarioResult<()>, what: &str) -> ScenarioResult<()> {
    match result {
        Err(ScenarioError::AlreadyExists(err)) => {
            tracing::warn!(target_name = what, error = %err, "already exists, reusing");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_error_classification() {
        let err: ScenarioError =
            SdkError::new(ErrorCode::PoolLedgerConfigAlreadyExists, "pool1").into();
        assert!(matches!(err, ScenarioError::AlreadyExists(_)));

        let err: ScenarioError = SdkError::new(ErrorCode::ProofRejected, "average").into();
        assert!(matches!(err, ScenarioError::VerificationFailed(_)));

        let err: ScenarioError = SdkError::new(ErrorCode::LedgerUnauthorized, "nym").into();
        assert!(matches!(err, ScenarioError::Sdk(_)));
    }

    #[test]
    fn test_ignore_already_exists() {
        let exists = Err(ScenarioError::AlreadyExists(SdkError::new(
            ErrorCode::WalletAlreadyExists,
            "alice_wallet",
        )));
        assert!(ignore_already_exists(exists, "alice_wallet").is_ok());

        let other = Err(ScenarioError::Protocol("bad".into()));
        assert!(ignore_already_exists(other, "alice_wallet").is_err());
    }
}
