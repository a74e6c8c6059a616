use std::fmt;

use verinym_core::CoreError;
use verinym_crypto::CryptoError;

/// Error codes reported by the identity SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CommonInvalidStructure,
    CommonInvalidState,
    CommonIOError,
    InvalidHandle,
    WalletAlreadyExists,
    WalletNotFound,
    WalletAccessFailed,
    WalletItemNotFound,
    WalletItemAlreadyExists,
    WalletStorageTypeUnknown,
    WalletAlreadyOpened,
    PoolLedgerConfigAlreadyExists,
    PoolLedgerNotCreated,
    PoolIncompatibleProtocolVersion,
    LedgerNotFound,
    LedgerInvalidTransaction,
    LedgerUnauthorized,
    ProofRejected,
    RevocationRegistryFull,
    CredentialRevoked,
    TailsMismatch,
    CryptoDecryptionFailed,
}

impl ErrorCode {
    /// Whether this code reports that a create call found its target in place.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::WalletAlreadyExists
                | Self::PoolLedgerConfigAlreadyExists
                | Self::WalletItemAlreadyExists
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An SDK call failure: a code plus a human-readable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct SdkError {
    pub code: ErrorCode,
    pub message: String,
}

impl SdkError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CommonInvalidStructure, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CommonInvalidState, message)
    }

    pub fn invalid_handle(handle: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidHandle, format!("unknown handle {}", handle))
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CommonIOError, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<CoreError> for SdkError {
    fn from(err: CoreError) -> Self {
        Self::invalid_structure(err.to_string())
    }
}

impl From<CryptoError> for SdkError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionError(msg) => Self::new(ErrorCode::CryptoDecryptionFailed, msg),
            other => Self::invalid_structure(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_structure(format!("json: {}", err))
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
