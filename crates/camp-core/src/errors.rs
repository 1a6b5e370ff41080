//! Structured error types shared across campaign crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`CampaignError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, line numbers, indices).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the campaign orchestrator.
///
/// Each variant is one failure class. Configuration classes (`SpecRead`
/// through `Plan`) are raised before any directory is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CampaignError {
    /// The specification file is missing or unreadable.
    #[error("spec read error: {0}")]
    SpecRead(ErrorInfo),
    /// A recognized specification key carries an unparseable value.
    #[error("spec value error: {0}")]
    SpecValue(ErrorInfo),
    /// The `sensitivity:` selector names an unknown mode.
    #[error("sensitivity mode error: {0}")]
    SensitivityMode(ErrorInfo),
    /// A selected sensitivity variable cannot be resolved to bounds.
    #[error("sensitivity lookup error: {0}")]
    SensitivityLookup(ErrorInfo),
    /// The experiment space cannot be planned.
    #[error("plan error: {0}")]
    Plan(ErrorInfo),
    /// A result directory already exists or cannot be created.
    #[error("layout error: {0}")]
    Layout(ErrorInfo),
    /// A job configuration artifact cannot be written.
    #[error("config write error: {0}")]
    ConfigWrite(ErrorInfo),
    /// An engine session failed to start or to execute a job.
    #[error("engine error: {0}")]
    Engine(ErrorInfo),
    /// The worker pool could not be built or driven.
    #[error("dispatch error: {0}")]
    Dispatch(ErrorInfo),
    /// Serialization and report persistence errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl CampaignError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            CampaignError::SpecRead(info)
            | CampaignError::SpecValue(info)
            | CampaignError::SensitivityMode(info)
            | CampaignError::SensitivityLookup(info)
            | CampaignError::Plan(info)
            | CampaignError::Layout(info)
            | CampaignError::ConfigWrite(info)
            | CampaignError::Engine(info)
            | CampaignError::Dispatch(info)
            | CampaignError::Serde(info) => info,
        }
    }

    /// Stable process exit code for the failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            CampaignError::SpecRead(_) => 10,
            CampaignError::SpecValue(_) => 11,
            CampaignError::SensitivityMode(_) => 12,
            CampaignError::SensitivityLookup(_) => 13,
            CampaignError::Plan(_) => 14,
            CampaignError::Layout(_) => 20,
            CampaignError::ConfigWrite(_) => 21,
            CampaignError::Engine(_) => 30,
            CampaignError::Dispatch(_) => 31,
            CampaignError::Serde(_) => 40,
        }
    }

    /// Returns true for failures raised while reading or resolving configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CampaignError::SpecRead(_)
                | CampaignError::SpecValue(_)
                | CampaignError::SensitivityMode(_)
                | CampaignError::SensitivityLookup(_)
                | CampaignError::Plan(_)
        )
    }
}
