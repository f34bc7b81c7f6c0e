use crate::error::PreprocessError;
use serde::{Deserialize, Serialize};

/// Which branch the pipeline takes after noise estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchSelection {
    /// Follow the noise verdict
    #[default]
    Auto,
    /// Always run the restoration branch (denoise, sharpen, equalize, deskew)
    Noisy,
    /// Always run the light-blur branch
    Clean,
}

impl BranchSelection {
    /// Parse from a command-line or config value
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "noisy" => Some(Self::Noisy),
            "clean" => Some(Self::Clean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Noisy => "noisy",
            Self::Clean => "clean",
        }
    }
}

/// Tunable pipeline parameters.
///
/// The noise threshold and the adaptive-threshold constants are not
/// calibrated against scan resolution; treat them as starting points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Laplacian variance below which an image is routed to the noisy branch
    pub noise_variance_threshold: f64,
    /// Non-local-means filter strength (h)
    pub denoise_strength: f32,
    /// Side of the square patch compared by non-local means
    pub denoise_template_window: u32,
    /// Side of the square area searched for similar patches
    pub denoise_search_window: u32,
    /// Radius of the median pre-filter run before non-local means; 0 disables it
    pub denoise_median_radius: u32,
    /// Side of the Gaussian window used for the local threshold
    pub adaptive_block_size: u32,
    /// Constant subtracted from the local mean
    pub adaptive_constant: f32,
    /// Gaussian kernel size on the clean branch
    pub clean_blur_kernel: u32,
    /// Pixels darker than this count as ink when estimating skew
    pub deskew_ink_threshold: u8,
    pub branch: BranchSelection,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            noise_variance_threshold: 100.0,
            denoise_strength: 30.0,
            denoise_template_window: 7,
            denoise_search_window: 21,
            denoise_median_radius: 1,
            adaptive_block_size: 11,
            adaptive_constant: 2.0,
            clean_blur_kernel: 3,
            deskew_ink_threshold: 128,
            branch: BranchSelection::Auto,
        }
    }
}

impl PipelineConfig {
    /// Check every parameter against its valid domain
    pub fn validate(&self) -> Result<(), PreprocessError> {
        if !self.noise_variance_threshold.is_finite() || self.noise_variance_threshold < 0.0 {
            return Err(PreprocessError::configuration(
                "noise_variance_threshold",
                self.noise_variance_threshold,
                "must be a finite, non-negative number",
            ));
        }

        if !self.denoise_strength.is_finite() || self.denoise_strength <= 0.0 {
            return Err(PreprocessError::configuration(
                "denoise_strength",
                self.denoise_strength,
                "must be a finite, positive number",
            ));
        }

        require_odd("denoise_template_window", self.denoise_template_window, 1)?;
        require_odd("denoise_search_window", self.denoise_search_window, 1)?;
        if self.denoise_search_window < self.denoise_template_window {
            return Err(PreprocessError::configuration(
                "denoise_search_window",
                self.denoise_search_window,
                "must not be smaller than denoise_template_window",
            ));
        }

        require_odd("adaptive_block_size", self.adaptive_block_size, 3)?;

        if !self.adaptive_constant.is_finite() {
            return Err(PreprocessError::configuration(
                "adaptive_constant",
                self.adaptive_constant,
                "must be finite",
            ));
        }

        require_odd("clean_blur_kernel", self.clean_blur_kernel, 1)?;

        Ok(())
    }
}

fn require_odd(parameter: &'static str, value: u32, min: u32) -> Result<(), PreprocessError> {
    if value < min {
        return Err(PreprocessError::configuration(
            parameter,
            value,
            "is below the minimum window size",
        ));
    }
    if value % 2 == 0 {
        return Err(PreprocessError::configuration(parameter, value, "must be odd"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.noise_variance_threshold, 100.0);
        assert_eq!(config.denoise_template_window, 7);
        assert_eq!(config.denoise_search_window, 21);
        assert_eq!(config.adaptive_block_size, 11);
        assert_eq!(config.adaptive_constant, 2.0);
        assert_eq!(config.clean_blur_kernel, 3);
    }

    #[test]
    fn test_even_block_size_rejected() {
        let config = PipelineConfig {
            adaptive_block_size: 10,
            ..Default::default()
        };
        match config.validate() {
            Err(PreprocessError::Configuration { parameter, .. }) => {
                assert_eq!(parameter, "adaptive_block_size")
            }
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_search_window_smaller_than_template_rejected() {
        let config = PipelineConfig {
            denoise_template_window: 9,
            denoise_search_window: 7,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PreprocessError::Configuration {
                parameter: "denoise_search_window",
                ..
            })
        ));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let config = PipelineConfig {
            noise_variance_threshold: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            denoise_strength: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"adaptive_block_size": 15, "branch": "noisy"}"#).unwrap();
        assert_eq!(config.adaptive_block_size, 15);
        assert_eq!(config.branch, BranchSelection::Noisy);
        assert_eq!(config.denoise_search_window, 21);
    }

    #[test]
    fn test_branch_selection_names() {
        assert_eq!(BranchSelection::from_name("NOISY"), Some(BranchSelection::Noisy));
        assert_eq!(BranchSelection::from_name("auto"), Some(BranchSelection::Auto));
        assert_eq!(BranchSelection::from_name("aggressive"), None);
        assert_eq!(BranchSelection::Clean.as_str(), "clean");
    }
}
