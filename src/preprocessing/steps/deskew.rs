//! Skew estimation from the minimum-area rectangle around the ink, and
//! bicubic rotation to undo it.
//!
//! Rectangles have no intrinsic "up", so any rectangle angle is ambiguous by
//! 90 degrees. The correction rule in [`SkewAngle::from_rect_angle`] is tied
//! to the rectangle angle being reported in `[-90, 0)`: the angle of the
//! rectangle's edges measured counter-clockwise from the x axis with y
//! pointing up. A routine reporting angles in another range needs a
//! different rule.

use crate::error::{PreprocessError, Stage};
use crate::preprocessing::convolve::clamp_index;
use image::{GrayImage, Luma};
use imageproc::geometry::{contour_area, convex_hull, min_area_rect};
use imageproc::point::Point;
use serde::Serialize;

/// Corrections smaller than this are not worth a resample
const MIN_CORRECTION_DEGREES: f32 = 0.1;

/// Hulls thinner than this carry no usable orientation
const MIN_HULL_AREA: f64 = 1.0;

/// Keys cubic convolution coefficient
const CUBIC_A: f64 = -0.75;

/// Estimated document skew, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkewAngle {
    /// Raw minimum-area-rectangle angle in `[-90, 0)`
    pub rect_angle: f32,
    /// Counter-clockwise rotation that levels the text, in `(-45, 45]`
    pub correction: f32,
}

impl SkewAngle {
    /// Map a rectangle angle onto the rotation that brings baselines horizontal
    pub fn from_rect_angle(rect_angle: f32) -> Self {
        let correction = if rect_angle < -45.0 {
            -(90.0 + rect_angle)
        } else {
            -rect_angle
        };
        Self {
            rect_angle,
            correction,
        }
    }
}

/// Output of the deskew step
#[derive(Debug, Clone)]
pub struct Deskewed {
    pub image: GrayImage,
    /// `None` when there was not enough ink to estimate an angle
    pub angle: Option<SkewAngle>,
}

/// Estimate skew and rotate the image to correct it
pub fn apply(image: &GrayImage, ink_threshold: u8) -> Result<Deskewed, PreprocessError> {
    let angle = match estimate_skew(image, ink_threshold)? {
        Some(angle) => angle,
        None => {
            tracing::debug!("Not enough ink to estimate skew, leaving image as is");
            return Ok(Deskewed {
                image: image.clone(),
                angle: None,
            });
        }
    };

    if angle.correction.abs() < MIN_CORRECTION_DEGREES {
        tracing::debug!(
            "Skew correction {:.3}° is negligible, skipping rotation",
            angle.correction
        );
        return Ok(Deskewed {
            image: image.clone(),
            angle: Some(angle),
        });
    }

    tracing::debug!(
        "Rotating by {:.2}° (rectangle angle {:.2}°)",
        angle.correction,
        angle.rect_angle
    );

    Ok(Deskewed {
        image: rotate_about_center(image, angle.correction),
        angle: Some(angle),
    })
}

/// Estimate skew from the pixels darker than `ink_threshold`.
///
/// Returns `Ok(None)` for blank pages and for ink that is a point or a line.
pub fn estimate_skew(
    image: &GrayImage,
    ink_threshold: u8,
) -> Result<Option<SkewAngle>, PreprocessError> {
    let ink: Vec<Point<i32>> = image
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] < ink_threshold)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect();

    if ink.len() < 3 {
        return Ok(None);
    }

    let hull = convex_hull(ink.as_slice());
    if hull.len() < 3 || contour_area(&hull) < MIN_HULL_AREA {
        return Ok(None);
    }

    let rect_angle = min_area_rect_angle(&hull);
    if !rect_angle.is_finite() {
        return Err(PreprocessError::stage_failure(
            Stage::Deskew,
            format!(
                "rectangle angle is not finite ({} ink pixels, {} hull points)",
                ink.len(),
                hull.len()
            ),
        ));
    }

    Ok(Some(SkewAngle::from_rect_angle(rect_angle)))
}

/// Angle of the minimum-area rectangle around `hull`, in `[-90, 0)`
fn min_area_rect_angle(hull: &[Point<i32>]) -> f32 {
    // Corners come back as [top left, top right, bottom right, bottom left]
    let [top_left, top_right, _, _] = min_area_rect(hull);
    let dx = (top_right.x - top_left.x) as f64;
    let dy = (top_right.y - top_left.y) as f64;

    // Edge direction is measured clockwise on screen (y down); fold it into
    // (0, 90] and flip the sign to get the y-up convention
    let folded = dy.atan2(dx).to_degrees().rem_euclid(90.0);
    let folded = if folded == 0.0 { 90.0 } else { folded };
    -(folded as f32)
}

/// Rotate counter-clockwise (as displayed) by `degrees` about `(w/2, h/2)`.
///
/// Bicubic resampling; samples falling outside the image take the value of
/// the nearest edge pixel. Output size equals input size.
pub fn rotate_about_center(image: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = image.as_raw();

    let (sin, cos) = (degrees as f64).to_radians().sin_cos();
    let cx = (width / 2) as f64;
    let cy = (height / 2) as f64;

    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = cos * dx - sin * dy + cx;
        let sy = sin * dx + cos * dy + cy;
        Luma([sample_bicubic(src, w, h, sx, sy)])
    })
}

fn cubic_weights(t: f64) -> [f64; 4] {
    let a = CUBIC_A;
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let w2 = ((a + 2.0) * (1.0 - t) - (a + 3.0)) * (1.0 - t) * (1.0 - t) + 1.0;
    [w0, w1, w2, 1.0 - w0 - w1 - w2]
}

fn sample_bicubic(src: &[u8], w: usize, h: usize, x: f64, y: f64) -> u8 {
    let (x0, y0) = (x.floor(), y.floor());
    let wx = cubic_weights(x - x0);
    let wy = cubic_weights(y - y0);
    let (xi, yi) = (x0 as isize, y0 as isize);

    let mut acc = 0.0f64;
    for (j, weight_y) in wy.iter().enumerate() {
        let row = clamp_index(yi - 1 + j as isize, h) * w;
        let mut row_acc = 0.0f64;
        for (i, weight_x) in wx.iter().enumerate() {
            row_acc += weight_x * src[row + clamp_index(xi - 1 + i as isize, w)] as f64;
        }
        acc += weight_y * row_acc;
    }

    acc.round().clamp(0.0, 255.0) as u8
}
