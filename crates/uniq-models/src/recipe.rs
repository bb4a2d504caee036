//! Per-copy transformation recipe.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Noise strength band (`noise=alls=`), just below perceptible.
///
/// FFmpeg parses `alls` as an integer, so this band lands on 0 or 1.
pub const NOISE_MIN: f64 = 0.3;
pub const NOISE_MAX: f64 = 0.8;

/// Brightness offset band around 0.0.
pub const BRIGHTNESS_DELTA: f64 = 0.03;

/// Contrast, saturation and gamma band around 1.0.
pub const COLOR_DELTA: f64 = 0.02;

/// Lower bound for the heuristic bitrate, kbit/s.
pub const MIN_BASE_BITRATE_KBPS: u32 = 1000;

/// kbit/s per MiB of source file.
pub const BITRATE_PER_MIB: f64 = 200.0;

/// Relative bitrate jitter.
pub const BITRATE_JITTER: f64 = 0.05;

/// Color-correction coefficients for the `eq` filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColorCorrection {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub gamma: f64,
}

impl ColorCorrection {
    /// Identity correction (no visible change).
    pub fn identity() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            gamma: 1.0,
        }
    }

    pub fn to_filter(&self) -> String {
        format!(
            "eq=brightness={:.4}:contrast={:.4}:saturation={:.4}:gamma={:.4}",
            self.brightness, self.contrast, self.saturation, self.gamma
        )
    }
}

/// Randomized parameters for one output copy.
///
/// A recipe is generated fresh for every copy and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransformRecipe {
    /// Noise strength applied to all planes.
    pub noise: f64,
    /// Color correction applied after the noise.
    pub color: ColorCorrection,
    /// Target video bitrate in kbit/s.
    pub bitrate_kbps: u32,
}

impl TransformRecipe {
    /// Render the filter chain. Noise comes first so the correction
    /// neither amplifies nor cancels the injected pattern.
    ///
    /// There is deliberately no scale or crop stage: output dimensions
    /// always equal input dimensions.
    pub fn filter_chain(&self) -> String {
        format!("noise=alls={:.2}:allf=t+u,{}", self.noise, self.color.to_filter())
    }

    /// Whether every parameter sits inside its allowed band.
    pub fn is_within_bounds(&self) -> bool {
        let c = &self.color;
        (NOISE_MIN..=NOISE_MAX).contains(&self.noise)
            && (-BRIGHTNESS_DELTA..=BRIGHTNESS_DELTA).contains(&c.brightness)
            && (1.0 - COLOR_DELTA..=1.0 + COLOR_DELTA).contains(&c.contrast)
            && (1.0 - COLOR_DELTA..=1.0 + COLOR_DELTA).contains(&c.saturation)
            && (1.0 - COLOR_DELTA..=1.0 + COLOR_DELTA).contains(&c.gamma)
            && self.bitrate_kbps > 0
    }
}

/// Base bitrate estimate from the source byte size, before jitter.
pub fn base_bitrate_kbps(size_bytes: u64) -> u32 {
    let size_mib = size_bytes as f64 / (1024.0 * 1024.0);
    let estimate = (size_mib * BITRATE_PER_MIB) as u32;
    estimate.max(MIN_BASE_BITRATE_KBPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransformRecipe {
        TransformRecipe {
            noise: 0.5,
            color: ColorCorrection {
                brightness: 0.01,
                contrast: 1.015,
                saturation: 0.99,
                gamma: 1.0,
            },
            bitrate_kbps: 1500,
        }
    }

    #[test]
    fn test_filter_chain_order() {
        let chain = sample().filter_chain();
        assert_eq!(
            chain,
            "noise=alls=0.50:allf=t+u,eq=brightness=0.0100:contrast=1.0150:saturation=0.9900:gamma=1.0000"
        );
        assert!(chain.find("noise").unwrap() < chain.find("eq=").unwrap());
    }

    #[test]
    fn test_filter_chain_never_resizes() {
        let chain = sample().filter_chain();
        for forbidden in ["scale", "crop", "pad", "setsar"] {
            assert!(!chain.contains(forbidden), "unexpected {} in {}", forbidden, chain);
        }
    }

    #[test]
    fn test_base_bitrate() {
        // Tiny file floors at the minimum
        assert_eq!(base_bitrate_kbps(1024), MIN_BASE_BITRATE_KBPS);
        // 50 MiB -> 10000 kbit/s
        assert_eq!(base_bitrate_kbps(50 * 1024 * 1024), 10_000);
    }

    #[test]
    fn test_bounds() {
        assert!(sample().is_within_bounds());
        let mut r = sample();
        r.color.contrast = 1.2;
        assert!(!r.is_within_bounds());
    }
}
