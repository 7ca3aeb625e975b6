use thiserror::Error;

/// Transport-level failures for reachability checks and remote shells.
///
/// Every variant describes a target that is unreachable (or unusable) over
/// a given protocol. The discovery scheduler treats this whole type as the
/// transient error kind: it is recorded as a failed probe outcome and never
/// aborts sibling probes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// The remote port actively refused the connection.
    #[error("connection refused by {address}")]
    Refused { address: String },

    /// The remote end closed the connection mid-session.
    #[error("connection closed by {address}")]
    Closed { address: String },

    /// Credentials were rejected by the remote end.
    #[error("authentication rejected for {user}@{address}")]
    AuthRejected { user: String, address: String },

    /// Connect or command did not complete in time.
    #[error("timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Protocol ────────────────────────────────────────────────────
    /// Any other failure reported by the transport itself.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server's host key does not match `known_hosts`.
    #[error("host key for {address} does not match known_hosts")]
    HostKeyMismatch { address: String },

    /// A remote command ran but exited unsuccessfully.
    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    // ── Local ───────────────────────────────────────────────────────
    /// A private key file could not be decoded.
    #[error("unusable private key {path}: {reason}")]
    InvalidKey { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the remote end was reached but refused us.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthRejected { .. })
    }

    /// Returns `true` for connect/command timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        let err = Error::AuthRejected {
            user: "root".into(),
            address: "10.0.0.5".into(),
        };
        assert_eq!(err.to_string(), "authentication rejected for root@10.0.0.5");
        assert!(err.is_auth_rejected());

        let err = Error::Timeout { timeout_secs: 10 };
        assert_eq!(err.to_string(), "timed out after 10s");
        assert!(err.is_timeout());
    }
}
