// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pipeline error taxonomy

use crate::session::SessionState;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the reconstruction and export pipeline
///
/// Every variant carries a human-readable reason. Internal faults (codec
/// panics, worker failures) are caught and converted into one of these
/// kinds; nothing in the pipeline aborts the process.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// A surface patch violated its structural invariants and was discarded
    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    /// No usable color frame was available when the texture was sampled
    #[error("color frame unavailable: {reason}")]
    FrameUnavailable { reason: String },

    /// Serializing or writing the container failed
    #[error("export failed: {reason}")]
    ExportFailed { reason: String },

    /// A second export was requested while one is still in flight
    #[error("an export is already in progress")]
    ExportInProgress,

    /// Moving the finished container to its destination failed
    #[error("relocation failed: {reason}")]
    RelocationFailed { reason: String },

    /// An operation was invoked outside its legal session state
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl PipelineError {
    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            reason: reason.into(),
        }
    }

    pub fn frame_unavailable(reason: impl Into<String>) -> Self {
        Self::FrameUnavailable {
            reason: reason.into(),
        }
    }

    pub fn export_failed(reason: impl Into<String>) -> Self {
        Self::ExportFailed {
            reason: reason.into(),
        }
    }

    pub fn relocation_failed(reason: impl Into<String>) -> Self {
        Self::RelocationFailed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_carry_readable_reasons() {
        let err = PipelineError::invalid_geometry("index 9 exceeds vertex count 4");
        assert_eq!(
            err.to_string(),
            "invalid geometry: index 9 exceeds vertex count 4"
        );

        let err = PipelineError::InvalidState {
            operation: "finalize",
            state: SessionState::Idle,
        };
        assert_eq!(err.to_string(), "cannot finalize while the session is idle");
    }
}
