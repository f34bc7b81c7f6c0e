//! Individual preprocessing steps

pub mod blur;
pub mod denoise;
pub mod deskew;
pub mod equalize;
pub mod grayscale;
pub mod noise;
pub mod sharpen;
pub mod threshold;
