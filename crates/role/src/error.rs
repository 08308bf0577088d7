//! Role Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Configuration faults; every one of them stops the node
#[derive(Debug, Error)]
pub enum RoleError {
    /// No role file present
    #[error("Node role is not set")]
    Unset,

    /// Role file holds something other than a valid token
    #[error("Invalid role '{content}' in {}", path.display())]
    Invalid { path: PathBuf, content: String },

    /// Unrecognised role name
    #[error("Unknown role '{0}' (expected car or ground)")]
    UnknownRole(String),

    /// Production role change attempted without root
    #[error("Setting the production role requires root privileges")]
    PermissionDenied,

    /// Role file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
