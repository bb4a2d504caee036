//! Randomized per-copy recipe generation.

use rand::Rng;
use tracing::trace;

use uniq_models::recipe::{
    base_bitrate_kbps, BITRATE_JITTER, BRIGHTNESS_DELTA, COLOR_DELTA, NOISE_MAX, NOISE_MIN,
};
use uniq_models::{ColorCorrection, Resolution, TransformRecipe};

/// Produces a fresh [`TransformRecipe`] for every copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecipeGenerator;

impl RecipeGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a recipe using the thread-local RNG.
    pub fn generate(&self, resolution_hint: Option<Resolution>, size_bytes: u64) -> TransformRecipe {
        self.generate_with(&mut rand::rng(), resolution_hint, size_bytes)
    }

    /// Generate a recipe from the given RNG.
    ///
    /// `resolution_hint` is informational only. No parameter derived from it
    /// may change the frame size.
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        resolution_hint: Option<Resolution>,
        size_bytes: u64,
    ) -> TransformRecipe {
        let noise = rng.random_range(NOISE_MIN..=NOISE_MAX);

        let color = ColorCorrection {
            brightness: rng.random_range(-BRIGHTNESS_DELTA..=BRIGHTNESS_DELTA),
            contrast: rng.random_range(1.0 - COLOR_DELTA..=1.0 + COLOR_DELTA),
            saturation: rng.random_range(1.0 - COLOR_DELTA..=1.0 + COLOR_DELTA),
            gamma: rng.random_range(1.0 - COLOR_DELTA..=1.0 + COLOR_DELTA),
        };

        let base = base_bitrate_kbps(size_bytes);
        let jitter = rng.random_range(1.0 - BITRATE_JITTER..=1.0 + BITRATE_JITTER);
        let bitrate_kbps = ((base as f64 * jitter) as u32).max(1);

        let recipe = TransformRecipe {
            noise,
            color,
            bitrate_kbps,
        };

        trace!(
            resolution = ?resolution_hint,
            bitrate_kbps,
            chain = %recipe.filter_chain(),
            "Generated recipe"
        );

        recipe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_recipes_stay_in_bounds() {
        let generator = RecipeGenerator::new();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let recipe = generator.generate_with(&mut rng, None, 20 * 1024 * 1024);
            assert!(recipe.is_within_bounds(), "out of bounds: {:?}", recipe);
        }
    }

    #[test]
    fn test_bitrate_jitter_band() {
        let generator = RecipeGenerator::new();
        let mut rng = StdRng::seed_from_u64(42);
        // 50 MiB -> base 10000 kbit/s
        for _ in 0..200 {
            let recipe = generator.generate_with(&mut rng, None, 50 * 1024 * 1024);
            assert!((9500..=10500).contains(&recipe.bitrate_kbps));
        }
    }

    #[test]
    fn test_small_file_uses_floor() {
        let recipe = RecipeGenerator::new().generate(None, 4096);
        assert!((950..=1050).contains(&recipe.bitrate_kbps));
    }

    #[test]
    fn test_consecutive_recipes_differ() {
        let generator = RecipeGenerator::new();
        let a = generator.generate(Some(Resolution::new(1920, 1080)), 1 << 20);
        let b = generator.generate(Some(Resolution::new(1920, 1080)), 1 << 20);
        assert_ne!(a.filter_chain(), b.filter_chain());
    }

    #[test]
    fn test_resolution_hint_never_resizes() {
        let generator = RecipeGenerator::new();
        let mut rng = StdRng::seed_from_u64(1);
        let recipe = generator.generate_with(&mut rng, Some(Resolution::new(720, 1280)), 1 << 24);
        let chain = recipe.filter_chain();
        assert!(!chain.contains("scale") && !chain.contains("crop"));
    }
}
