// Error taxonomy for routing and stream operations
//
// Routing errors for displaced usecases are logged by the arbiter and never
// propagated; everything else surfaces through this enum. I/O errors force
// the affected stream to standby before they are returned.

use super::types::{RoutePath, UsecaseId};

/// Errors that can occur during routing arbitration and stream I/O
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("Routing path '{path}' is not defined by the platform configuration")]
    UnconfiguredPath { path: RoutePath },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Usecase '{id}' not found in registry")]
    UsecaseNotFound { id: UsecaseId },

    #[error("Usecase '{id}' is already registered")]
    DuplicateUsecase { id: UsecaseId },

    #[error("Hardware endpoint busy after {attempts} open attempts")]
    HardwareBusy { attempts: u32 },

    #[error("Hardware card {card} is offline")]
    HardwareOffline { card: u32 },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),
}

impl HalError {
    /// True for the invalid-argument family (bad path/usecase parameters)
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            HalError::UnconfiguredPath { .. } | HalError::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HalError>;
