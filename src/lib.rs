//! Adaptive preprocessing of scanned pages ahead of OCR

pub mod config;
pub mod error;
pub mod preprocessing;

pub use config::{BranchSelection, PipelineConfig};
pub use error::{ErrorResponse, PreprocessError, Stage};
pub use preprocessing::{process, Branch, Pipeline, PreprocessingResult, StepTiming};
