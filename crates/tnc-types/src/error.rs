//! Error taxonomy surfaced at the public boundary (spec §7).

use thiserror::Error;

/// The failure kinds a caller of this runtime can observe. `Success` has no
/// variant here; it is simply `Ok(_)` in [`TncResult`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TncError {
    /// A call was made before the one-time `initialize`.
    #[error("not initialized")]
    NotInitialized,

    /// `initialize` was called a second time.
    #[error("already initialized")]
    AlreadyInitialized,

    /// Unknown id, malformed message type, wrong `Recipient`, unknown
    /// bind-function name, absent attribute, out-of-range attribute id, or a
    /// wildcard-only incoming message type.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No overlap between a plugin's supported version range and the host's.
    #[error("no common version")]
    NoCommonVersion,

    /// Unrecoverable: allocation failure, library-open failure, a missing
    /// mandatory entry point, an XML parse failure, a missing root element
    /// or `BatchId`, or aggregator inability to finalize.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type TncResult<T> = Result<T, TncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = TncError::InvalidParameter("bad Recipient".into());
        assert!(e.to_string().contains("bad Recipient"));
    }
}
