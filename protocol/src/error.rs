//! Error types for the UPACP gateway client.
//!
//! Every fallible operation in this crate returns an [`UpacpError`]. The
//! variants follow the failure taxonomy of the gateway integration:
//! credential problems are fatal at startup, signing and verification
//! failures are fatal per call, gateway rejections carry the identifiers
//! needed for diagnosis, and transport failures are the only ones a caller
//! should consider retrying.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UpacpError>;

/// Errors that can occur while signing, verifying, talking to the gateway,
/// or ingesting settlement files.
#[derive(Debug, Error)]
pub enum UpacpError {
    /// Key or certificate material could not be loaded.
    #[error("credential error: {0}")]
    Credential(String),

    /// The private key refused to produce a signature.
    #[error("signing failed: {0}")]
    Sign(String),

    /// A signature is missing, undecodable, or does not match the payload.
    ///
    /// This is an authentication failure. The payload it was attached to
    /// must be discarded.
    #[error("signature verification failed: {0}")]
    Verification(String),

    /// The gateway answered, but not with success.
    #[error("gateway rejected request: respCode={resp_code}, orderId={order_id}, message={message}")]
    Gateway {
        /// `respCode` returned by the gateway, empty if the reply had none,
        /// or the HTTP status when no payload was produced.
        resp_code: String,
        /// The order the request referred to, when known.
        order_id: String,
        /// `respMsg` or HTTP reason phrase.
        message: String,
    },

    /// The request never produced a response (timeout, refused connection).
    #[error("transport error: {0}")]
    Transport(String),

    /// A settlement line could not be projected into a record.
    #[error("malformed settlement record at {file}:{line}: {reason}")]
    MalformedRecord {
        /// Name of the settlement file the line came from.
        file: String,
        /// 1-based line number within that file.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// A mandatory field was absent from a request or a response.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A field carried a value outside its code table or format.
    #[error("invalid field value: {0}")]
    InvalidField(String),

    /// The settlement archive could not be decoded or unpacked.
    #[error("settlement archive error: {0}")]
    Archive(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpacpError {
    /// Returns `true` for failures a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if the error means the counterparty could not be
    /// authenticated.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}
