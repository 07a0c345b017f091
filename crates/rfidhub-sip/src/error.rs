//! SIP2 errors.

/// Errors talking to the SIP2 server.
#[derive(Debug, thiserror::Error)]
pub enum SipError {
    #[error("SIP connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("SIP server closed the connection")]
    Closed,

    #[error("SIP call timed out after {0}s")]
    Timeout(u64),

    #[error("SIP login rejected")]
    LoginFailed,

    #[error("malformed SIP response: {0}")]
    Malformed(String),

    #[error("SIP connection pool is closed")]
    PoolClosed,
}

pub type SipResult<T> = Result<T, SipError>;
