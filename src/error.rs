use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage identifiers, used in errors, timings and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Grayscale,
    NoiseEstimate,
    Denoise,
    Sharpen,
    Equalize,
    Deskew,
    Blur,
    Threshold,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::NoiseEstimate => "noise_estimate",
            Self::Denoise => "denoise",
            Self::Sharpen => "sharpen",
            Self::Equalize => "equalize",
            Self::Deskew => "deskew",
            Self::Blur => "blur",
            Self::Threshold => "threshold",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Stage '{stage}' failed: {message}")]
    StageFailure { stage: Stage, message: String },

    #[error("Invalid configuration: {parameter} = {value} ({reason})")]
    Configuration {
        parameter: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Pipeline cancelled after stage '{after}'")]
    Cancelled { after: Stage },
}

impl PreprocessError {
    pub fn stage_failure(stage: Stage, message: impl Into<String>) -> Self {
        Self::StageFailure {
            stage,
            message: message.into(),
        }
    }

    pub fn configuration(
        parameter: &'static str,
        value: impl fmt::Display,
        reason: &'static str,
    ) -> Self {
        Self::Configuration {
            parameter,
            value: value.to_string(),
            reason,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidImage(_) => "INVALID_IMAGE",
            Self::StageFailure { .. } => "STAGE_FAILURE",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Cancelled { .. } => "CANCELLED",
        }
    }

    /// Stage the failure originated from, when there is one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailure { stage, .. } => Some(*stage),
            Self::Cancelled { after } => Some(*after),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

impl From<&PreprocessError> for ErrorResponse {
    fn from(err: &PreprocessError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code().to_string(),
            stage: err.stage(),
        }
    }
}
