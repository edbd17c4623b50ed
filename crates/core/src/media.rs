//! Output framing for generated media: aspect ratios and resolution tiers.
//!
//! The dimension table mirrors what the image models are tuned for; unknown
//! ratios fall back to the square frame.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Aspect ratio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    StandardPortrait,
    #[serde(rename = "3:2")]
    Photo,
    #[serde(rename = "2:3")]
    PhotoPortrait,
}

impl AspectRatio {
    /// Parse from a `"w:h"` string.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "1:1" => Ok(Self::Square),
            "16:9" => Ok(Self::Widescreen),
            "9:16" => Ok(Self::Vertical),
            "4:3" => Ok(Self::Standard),
            "3:4" => Ok(Self::StandardPortrait),
            "3:2" => Ok(Self::Photo),
            "2:3" => Ok(Self::PhotoPortrait),
            other => Err(CoreError::Validation(format!(
                "Unknown aspect ratio '{other}'"
            ))),
        }
    }

    /// Lenient parse used for stored project settings.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Widescreen => "16:9",
            Self::Vertical => "9:16",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
            Self::Photo => "3:2",
            Self::PhotoPortrait => "2:3",
        }
    }

    /// Pixel dimensions `(width, height)` for image generation.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Square => (1328, 1328),
            Self::Widescreen => (1664, 928),
            Self::Vertical => (928, 1664),
            Self::Standard => (1472, 1140),
            Self::StandardPortrait => (1140, 1472),
            Self::Photo => (1584, 1056),
            Self::PhotoPortrait => (1056, 1584),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "hd")]
    Hd,
    #[default]
    #[serde(rename = "2k")]
    TwoK,
    #[serde(rename = "4k")]
    FourK,
}

impl Resolution {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "hd" => Ok(Self::Hd),
            "2k" => Ok(Self::TwoK),
            "4k" => Ok(Self::FourK),
            other => Err(CoreError::Validation(format!(
                "Unknown resolution '{other}'. Must be one of: hd, 2k, 4k"
            ))),
        }
    }

    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Hd => "hd",
            Self::TwoK => "2k",
            Self::FourK => "4k",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widescreen_dimensions() {
        assert_eq!(AspectRatio::Widescreen.dimensions(), (1664, 928));
    }

    #[test]
    fn unknown_ratio_falls_back_to_square() {
        assert_eq!(AspectRatio::from_name_or_default("5:4"), AspectRatio::Square);
        assert!(AspectRatio::from_name("5:4").is_err());
    }

    #[test]
    fn ratio_names_round_trip() {
        for name in ["1:1", "16:9", "9:16", "4:3", "3:4", "3:2", "2:3"] {
            assert_eq!(AspectRatio::from_name(name).unwrap().name(), name);
        }
    }

    #[test]
    fn resolution_serializes_as_tier_name() {
        let json = serde_json::to_string(&Resolution::FourK).unwrap();
        assert_eq!(json, "\"4k\"");
        assert_eq!(Resolution::from_name_or_default("8k"), Resolution::TwoK);
    }
}
