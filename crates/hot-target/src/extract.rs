//! HSV threshold contour extraction.
//!
//! Frames are converted to HSV with the 8-bit OpenCV scaling (hue halved to
//! `0..180`), thresholded into a binary mask, median filtered and traced.
//! Every outer contour is reduced to its convex hull before scoring.

use hot_target_core::Shape;
use hot_target_tracker::ShapeExtractor;
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::filter::median_filter;
use imageproc::geometry::convex_hull;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Inclusive `min..=max` range on one 8-bit channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub min: u8,
    pub max: u8,
}

impl ChannelRange {
    pub const FULL: Self = Self { min: 0, max: 255 };

    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, v: u8) -> bool {
        self.min <= v && v <= self.max
    }
}

/// Thresholds for [`HsvExtractor`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HsvParams {
    pub hue: ChannelRange,
    pub saturation: ChannelRange,
    pub value: ChannelRange,
    /// Median filter radius; 6 gives a 13x13 kernel. 0 disables the filter.
    pub blur_radius: u32,
}

impl Default for HsvParams {
    fn default() -> Self {
        Self {
            hue: ChannelRange::FULL,
            saturation: ChannelRange::FULL,
            value: ChannelRange::new(50, 200),
            blur_radius: 6,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{channel} range is inverted ({min} > {max})")]
    InvertedRange {
        channel: &'static str,
        min: u8,
        max: u8,
    },
    #[error("empty frame ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

impl HsvParams {
    pub fn validate(&self) -> Result<(), ExtractError> {
        for (channel, range) in [
            ("hue", self.hue),
            ("saturation", self.saturation),
            ("value", self.value),
        ] {
            if range.min > range.max {
                return Err(ExtractError::InvertedRange {
                    channel,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }
}

/// [`ShapeExtractor`] for RGB frames based on HSV thresholding.
#[derive(Clone, Debug)]
pub struct HsvExtractor {
    params: HsvParams,
}

impl HsvExtractor {
    pub fn new(params: HsvParams) -> Result<Self, ExtractError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &HsvParams {
        &self.params
    }

    /// Binary mask of pixels inside all three ranges, before filtering.
    pub fn threshold(&self, frame: &RgbImage) -> GrayImage {
        let p = &self.params;
        GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
            let [h, s, v] = rgb_to_hsv(frame.get_pixel(x, y).0);
            let inside = p.hue.contains(h) && p.saturation.contains(s) && p.value.contains(v);
            Luma([if inside { 255 } else { 0 }])
        })
    }
}

impl ShapeExtractor for HsvExtractor {
    type Frame = RgbImage;
    type Error = ExtractError;

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    fn extract(&self, frame: &RgbImage) -> Result<Vec<Shape>, ExtractError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(ExtractError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let mut mask = self.threshold(frame);
        if self.params.blur_radius > 0 {
            mask = median_filter(&mask, self.params.blur_radius, self.params.blur_radius);
        }

        let shapes = find_contours::<i32>(&mask)
            .into_iter()
            .filter(|c| c.parent.is_none() && c.border_type == BorderType::Outer)
            .map(|c| {
                convex_hull(c.points.as_slice())
                    .into_iter()
                    .map(|p| Point2::new(p.x, p.y))
                    .collect::<Shape>()
            })
            .collect::<Vec<_>>();
        log::debug!("extracted {} outer contours", shapes.len());
        Ok(shapes)
    }
}

/// RGB to HSV with 8-bit OpenCV scaling: H in `0..180`, S and V in `0..=255`.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let h = (h / 2.0).round() as u32 % 180;
    [h as u8, s.round() as u8, v as u8]
}
