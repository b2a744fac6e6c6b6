//! Error types for the booking wizard and its configuration

use std::path::PathBuf;
use thiserror::Error;

use crate::wizard::WizardState;

/// Failures reported by [`crate::BookingWizard`] commands
///
/// Local validation failures are returned synchronously and never retried.
/// Only `CollaboratorFailure` originates outside the wizard.
#[derive(Error, Debug)]
pub enum WizardError {
    /// The command is not valid in the current state
    #[error("'{operation}' is not allowed while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: WizardState,
    },

    /// A date or slot failed validation
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Advancing without the required fields
    #[error("Selection incomplete, missing: {}", .missing.join(", "))]
    IncompleteSelection { missing: Vec<&'static str> },

    /// A booking request is still outstanding
    #[error("A booking request is already in progress")]
    OperationInProgress,

    /// The availability source or booking sink failed
    #[error("{operation} failed: {source}")]
    CollaboratorFailure {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl WizardError {
    /// Whether the caller can recover by re-issuing the same command
    pub fn is_retryable(&self) -> bool {
        matches!(self, WizardError::CollaboratorFailure { .. })
    }

    pub(crate) fn collaborator(operation: &'static str, source: anyhow::Error) -> Self {
        tracing::warn!(operation, error = %source, "collaborator call failed");
        WizardError::CollaboratorFailure { operation, source }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a config file
    #[error("Failed to read booking config from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a config file
    #[error("Failed to parse booking config at {path} (invalid JSON)")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
