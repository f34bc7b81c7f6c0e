//! Scan preprocessing for OCR
//!
//! Converts a page image to grayscale, routes it through a restoration or a
//! light-blur branch depending on how noisy it looks, and binarizes the result.

pub mod convolve;
pub mod pipeline;
pub mod steps;

pub use pipeline::{process, Branch, Pipeline, PreprocessingResult, StepTiming};
