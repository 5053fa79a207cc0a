use rand::Rng;

/// Scaled by `1 + factor`.
pub const RADIUS_FEATURE: &str = "mean radius";
/// Offset by `0.01 * factor`.
pub const SMOOTHNESS_FEATURE: &str = "mean smoothness";
/// Receives uniform noise.
pub const TEXTURE_FEATURE: &str = "mean texture";

/// Half-width of the uniform noise added to the texture feature.
pub const NOISE_AMPLITUDE: f64 = 5.0;

/// Oscillating drift strength: steps by 0.05 every 30 seconds and wraps after
/// 20 steps, so it stays within `[1.0, 1.95]`.
pub fn drift_factor(unix_seconds: i64) -> f64 {
    1.0 + 0.05 * unix_seconds.div_euclid(30).rem_euclid(20) as f64
}

/// Column indices of a feature schema that receive each kind of distortion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftTargets {
    pub scaled: Option<usize>,
    pub offset: Option<usize>,
    pub noised: Option<usize>,
}

impl DriftTargets {
    /// Resolves each distortion to its named column. A distortion whose column
    /// is missing falls back to its position (0, 1, 2) when that position
    /// exists and is not claimed by a named column.
    pub fn for_features(feature_names: &[String]) -> Self {
        let named = |name: &str| feature_names.iter().position(|feature| feature == name);
        let mut targets = Self {
            scaled: named(RADIUS_FEATURE),
            offset: named(SMOOTHNESS_FEATURE),
            noised: named(TEXTURE_FEATURE),
        };

        let claimed = [targets.scaled, targets.offset, targets.noised];
        let free = |position: usize| position < feature_names.len() && !claimed.contains(&Some(position));
        for (position, slot) in [&mut targets.scaled, &mut targets.offset, &mut targets.noised]
            .into_iter()
            .enumerate()
        {
            if slot.is_none() && free(position) {
                *slot = Some(position);
            }
        }
        targets
    }

    /// Distorts one row laid out like the schema the targets were resolved for.
    pub fn apply<R: Rng + ?Sized>(&self, features: &mut [f64], factor: f64, rng: &mut R) {
        if let Some(value) = self.scaled.and_then(|i| features.get_mut(i)) {
            *value *= 1.0 + factor;
        }
        if let Some(value) = self.offset.and_then(|i| features.get_mut(i)) {
            *value += 0.01 * factor;
        }
        if let Some(value) = self.noised.and_then(|i| features.get_mut(i)) {
            *value += rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
        }
    }
}
