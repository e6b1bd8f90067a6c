//! Tuned constants for disaster behavior.
//!
//! Damage formulas and cooperation thresholds were hand-tuned in the
//! original design; tests and experiments need to vary them, so they live
//! in one config struct instead of being scattered as literals. The
//! defaults are the canonical values.

/// Every tuned stochastic constant of the disaster subsystem.
#[derive(Debug, Clone)]
pub struct DisasterTuning {
    /// Building integrity below this counts as structurally unsafe.
    pub unsafe_integrity: f64,
    /// HP below this marks an agent injured.
    pub injured_hp: i32,
    /// Initial damage range inside an unsafe building: `intensity * [min, max]`.
    pub collapse_damage: (f64, f64),
    /// Chance factor of taking initial damage inside a sound building.
    pub indoor_damage_chance: f64,
    /// Initial indoor damage upper factor: `1..=intensity * max`.
    pub indoor_damage_max: f64,
    /// Chance factor of taking initial damage outdoors.
    pub outdoor_damage_chance: f64,
    /// Initial outdoor damage upper factor.
    pub outdoor_damage_max: f64,
    /// Per-step ongoing damage: chance = `intensity * (base + (100-integrity)) / divisor`.
    pub ongoing_damage_base: f64,
    /// Divisor of the ongoing-damage chance.
    pub ongoing_damage_divisor: f64,
    /// Per-step ongoing damage cap factor: `0..=intensity * max`.
    pub ongoing_damage_max: f64,
    /// Help-probability tiers as `(min inclination, probability)`, highest first.
    pub help_tiers: [(f64, f64); 4],
    /// Probability when below every tier.
    pub help_floor: f64,
    /// Multiplier applied when helping would abandon cover in an unsafe building.
    pub help_unsafe_factor: f64,
    /// HP restored by a targeted heal.
    pub heal_range: (i32, i32),
    /// HP restored by the one-shot stabilize support.
    pub stabilize_range: (i32, i32),
    /// Peers below this HP are worth helping even when not flagged injured.
    pub help_hp_threshold: i32,
    /// Chance per recovery step of passive self-healing.
    pub recovery_heal_chance: f64,
    /// Passive self-heal amount range.
    pub recovery_heal_range: (i32, i32),
    /// Chance per recovery step of the mental state easing one notch.
    pub recovery_calm_chance: f64,
}

impl Default for DisasterTuning {
    fn default() -> Self {
        Self {
            unsafe_integrity: 50.0,
            injured_hp: 60,
            collapse_damage: (25.0, 55.0),
            indoor_damage_chance: 0.5,
            indoor_damage_max: 30.0,
            outdoor_damage_chance: 0.25,
            outdoor_damage_max: 15.0,
            ongoing_damage_base: 20.0,
            ongoing_damage_divisor: 400.0,
            ongoing_damage_max: 5.0,
            help_tiers: [(0.9, 0.97), (0.75, 0.85), (0.6, 0.70), (0.45, 0.55)],
            help_floor: 0.35,
            help_unsafe_factor: 0.5,
            heal_range: (6, 20),
            stabilize_range: (4, 10),
            help_hp_threshold: 90,
            recovery_heal_chance: 0.5,
            recovery_heal_range: (1, 5),
            recovery_calm_chance: 0.4,
        }
    }
}

impl DisasterTuning {
    /// The probability of switching to a helping action for a given
    /// cooperation inclination.
    pub fn help_probability(&self, inclination: f64) -> f64 {
        for (threshold, probability) in self.help_tiers {
            if inclination >= threshold {
                return probability;
            }
        }
        self.help_floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_tiers_match_spec_values() {
        let tuning = DisasterTuning::default();
        assert!((tuning.help_probability(0.95) - 0.97).abs() < 1e-9);
        assert!((tuning.help_probability(0.8) - 0.85).abs() < 1e-9);
        assert!((tuning.help_probability(0.65) - 0.70).abs() < 1e-9);
        assert!((tuning.help_probability(0.5) - 0.55).abs() < 1e-9);
        assert!((tuning.help_probability(0.1) - 0.35).abs() < 1e-9);
    }
}
