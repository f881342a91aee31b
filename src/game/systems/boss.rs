//! Boss phase tracking
//!
//! Phases start at 1 and only ever go up. Each descending health-ratio
//! threshold the boss has dropped to adds one phase, so `[0.7, 0.4, 0.15]`
//! maps to phases 2, 3 and 4.

use rand::Rng;
use std::ops::RangeInclusive;

use crate::game::constants::boss::*;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone)]
pub struct BossPhaseManager {
    phase: u8,
    /// Descending health-ratio breakpoints
    thresholds: Vec<f32>,
    /// Cooldown multiplier applied when entering phase `i + 2`
    cooldown_factors: Vec<f32>,
    current_pattern: Option<usize>,
    erratic_timer: f32,
    erratic_heading: Vec2,
}

impl BossPhaseManager {
    pub fn new() -> Self {
        Self::with_thresholds(PHASE_THRESHOLDS.to_vec(), PHASE_COOLDOWN_FACTORS.to_vec())
    }

    /// Thresholds must be descending. Missing cooldown factors default to 1.0.
    pub fn with_thresholds(thresholds: Vec<f32>, cooldown_factors: Vec<f32>) -> Self {
        Self {
            phase: 1,
            thresholds,
            cooldown_factors,
            current_pattern: None,
            erratic_timer: 0.0,
            erratic_heading: Vec2::ZERO,
        }
    }

    #[inline]
    pub fn phase(&self) -> u8 {
        self.phase
    }

    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    pub fn current_attack_pattern(&self) -> Option<usize> {
        self.current_pattern
    }

    /// Phase the given health ratio calls for
    pub fn target_phase(&self, health_ratio: f32) -> u8 {
        let crossed = self.thresholds.iter().filter(|&&t| health_ratio <= t).count();
        1 + crossed.min(u8::MAX as usize - 1) as u8
    }

    /// Advance to the phase `health_ratio` calls for. Returns every phase
    /// entered, in order, or `None` if the phase did not change.
    pub fn check_phase(&mut self, health_ratio: f32) -> Option<RangeInclusive<u8>> {
        let target = self.target_phase(health_ratio);
        if target <= self.phase {
            return None;
        }
        let entered = (self.phase + 1)..=target;
        self.phase = target;
        Some(entered)
    }

    /// Cooldown multiplier for entering `phase`
    pub fn cooldown_factor(&self, phase: u8) -> f32 {
        (phase as usize)
            .checked_sub(2)
            .and_then(|i| self.cooldown_factors.get(i))
            .copied()
            .unwrap_or(1.0)
    }

    /// Phase 2 and up pursue without waiting for aggro range
    pub fn is_aggressive(&self) -> bool {
        self.phase >= 2
    }

    pub fn specials_unlocked(&self) -> bool {
        self.phase >= 3
    }

    /// Pick a pattern index from the current phase's bucket.
    ///
    /// The list is split into `PATTERN_PHASES` near-equal buckets; phases past
    /// the end of a short list clamp to its last entry.
    pub fn select_attack_pattern<R: Rng + ?Sized>(&mut self, pattern_count: usize, rng: &mut R) -> Option<usize> {
        if pattern_count == 0 {
            self.current_pattern = None;
            return None;
        }
        let per_phase = pattern_count.div_ceil(PATTERN_PHASES);
        let bucket = (self.phase as usize - 1).min(PATTERN_PHASES - 1);
        let start = bucket * per_phase;
        let index = (start + rng.gen_range(0..per_phase)).min(pattern_count - 1);
        self.current_pattern = Some(index);
        Some(index)
    }

    /// Scale or perturb a pursuit direction according to the current phase
    pub fn movement_bias<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        distance: f32,
        direction: Vec2,
        rng: &mut R,
    ) -> Vec2 {
        match self.phase {
            0 | 1 => direction,
            2 => {
                if distance > PHASE2_CHASE_DISTANCE {
                    direction * PHASE2_CHASE_SCALE
                } else {
                    direction
                }
            }
            3 => {
                self.erratic_timer += dt;
                if self.erratic_timer >= PHASE3_ERRATIC_INTERVAL || self.erratic_heading == Vec2::ZERO {
                    self.erratic_timer = 0.0;
                    self.erratic_heading = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU));
                }
                let blended = direction * (1.0 - PHASE3_ERRATIC_WEIGHT) + self.erratic_heading * PHASE3_ERRATIC_WEIGHT;
                blended.normalize()
            }
            _ => direction * PHASE4_CHASE_SCALE,
        }
    }
}

impl Default for BossPhaseManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_phases_follow_thresholds() {
        let boss = BossPhaseManager::new();
        assert_eq!(boss.target_phase(1.0), 1);
        assert_eq!(boss.target_phase(0.71), 1);
        assert_eq!(boss.target_phase(0.7), 2);
        assert_eq!(boss.target_phase(0.5), 2);
        assert_eq!(boss.target_phase(0.4), 3);
        assert_eq!(boss.target_phase(0.1), 4);
        assert_eq!(boss.target_phase(0.0), 4);
    }

    #[test]
    fn test_phase_never_decreases_after_heal() {
        let mut boss = BossPhaseManager::new();
        let mut seen = Vec::new();
        for ratio in [1.0, 0.8, 0.65, 0.35, 0.5, 0.9, 1.0, 0.3, 0.1, 0.95] {
            boss.check_phase(ratio);
            seen.push(boss.phase());
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(boss.phase(), 4);
    }

    #[test]
    fn test_multi_phase_jump_reports_each_phase() {
        let mut boss = BossPhaseManager::new();
        assert_eq!(boss.check_phase(0.9), None);
        assert_eq!(boss.check_phase(0.1), Some(2..=4));
        assert_eq!(boss.check_phase(0.05), None);
    }

    #[test]
    fn test_cooldown_factors() {
        let boss = BossPhaseManager::new();
        assert_eq!(boss.cooldown_factor(1), 1.0);
        assert_eq!(boss.cooldown_factor(2), 0.8);
        assert_eq!(boss.cooldown_factor(4), 0.6);
        assert_eq!(boss.cooldown_factor(9), 1.0);
    }

    #[test]
    fn test_pattern_buckets_per_phase() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut boss = BossPhaseManager::new();

        // 8 patterns -> buckets of 2
        for _ in 0..50 {
            let i = boss.select_attack_pattern(8, &mut rng).unwrap();
            assert!(i < 2);
        }
        boss.check_phase(0.1);
        for _ in 0..50 {
            let i = boss.select_attack_pattern(8, &mut rng).unwrap();
            assert!((6..8).contains(&i));
        }
        assert!(boss.current_attack_pattern().is_some());
    }

    #[test]
    fn test_short_pattern_list_clamps() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut boss = BossPhaseManager::new();
        boss.check_phase(0.3);
        assert_eq!(boss.phase(), 3);
        assert_eq!(boss.select_attack_pattern(2, &mut rng), Some(1));
        assert_eq!(boss.select_attack_pattern(0, &mut rng), None);
        assert_eq!(boss.current_attack_pattern(), None);
    }

    #[test]
    fn test_movement_bias_by_phase() {
        let mut rng = StdRng::seed_from_u64(9);
        let dir = Vec2::RIGHT;

        let mut boss = BossPhaseManager::new();
        assert_eq!(boss.movement_bias(0.016, 400.0, dir, &mut rng), dir);

        boss.check_phase(0.6);
        assert_eq!(boss.movement_bias(0.016, 400.0, dir, &mut rng), dir * PHASE2_CHASE_SCALE);
        assert_eq!(boss.movement_bias(0.016, 100.0, dir, &mut rng), dir);

        boss.check_phase(0.3);
        let first = boss.movement_bias(0.016, 400.0, dir, &mut rng);
        let second = boss.movement_bias(0.016, 400.0, dir, &mut rng);
        assert_eq!(first, second, "erratic heading holds between re-rolls");
        assert!((first.length() - 1.0).abs() < 1e-4 || first == Vec2::ZERO);

        boss.check_phase(0.1);
        assert_eq!(boss.movement_bias(0.016, 10.0, dir, &mut rng), dir * PHASE4_CHASE_SCALE);
    }
}
