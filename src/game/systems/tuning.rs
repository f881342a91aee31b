//! Per-kind AI tuning
//!
//! Defaults live in `AiTuning::for_kind`. Hosts can override any kind with a
//! JSON table keyed by kind name; omitted fields keep the defaults.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::game::constants::{ai, avoidance};
use crate::game::state::EnemyKind;

#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    #[error("Invalid tuning JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{kind:?}: {field} must be {expected}, got {value}")]
    OutOfRange {
        kind: EnemyKind,
        field: &'static str,
        expected: &'static str,
        value: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    pub attack_range: f32,
    /// Seconds between attacks before phase scaling and jitter
    pub attack_cooldown: f32,
    pub target_update_min: f32,
    pub target_update_max: f32,
    pub max_target_distance: f32,
    pub separation_radius: f32,
    pub avoidance_interval_min: f32,
    pub avoidance_interval_max: f32,
    /// Pursue any valid target without waiting for aggro range
    pub aggressive: bool,
    /// Pursuit radius for non-aggressive kinds; 0 disables
    pub aggro_radius: f32,
    pub special_eligible: bool,
    /// Retreat once when health drops to this ratio while engaged
    pub retreat_health_ratio: Option<f32>,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self::for_kind(EnemyKind::Basic)
    }
}

impl AiTuning {
    pub fn for_kind(kind: EnemyKind) -> Self {
        let base = Self {
            attack_range: kind.attack_class().attack_range(),
            attack_cooldown: 1.0,
            target_update_min: ai::TARGET_UPDATE_MIN,
            target_update_max: ai::TARGET_UPDATE_MAX,
            max_target_distance: ai::MAX_TARGET_DISTANCE,
            separation_radius: kind.radius() * 2.5,
            avoidance_interval_min: avoidance::INTERVAL_MIN,
            avoidance_interval_max: avoidance::INTERVAL_MAX,
            aggressive: true,
            aggro_radius: 0.0,
            special_eligible: false,
            retreat_health_ratio: None,
        };

        match kind {
            EnemyKind::Basic => base,
            EnemyKind::Fast => Self {
                attack_cooldown: 0.6,
                ..base
            },
            EnemyKind::Tank => Self {
                attack_cooldown: 1.5,
                ..base
            },
            EnemyKind::Ranged => Self {
                attack_cooldown: 2.0,
                aggressive: false,
                aggro_radius: 450.0,
                retreat_health_ratio: Some(0.3),
                ..base
            },
            EnemyKind::Dasher => Self {
                attack_cooldown: 1.2,
                special_eligible: true,
                ..base
            },
            EnemyKind::Exploder => Self {
                attack_cooldown: 0.5,
                ..base
            },
            EnemyKind::Boss => Self {
                attack_cooldown: 1.5,
                max_target_distance: 1200.0,
                aggressive: false,
                aggro_radius: 600.0,
                ..base
            },
        }
    }

    pub fn validate(&self, kind: EnemyKind) -> Result<(), TuningError> {
        let check = |field: &'static str, value: f32, ok: bool, expected: &'static str| {
            if ok {
                Ok(())
            } else {
                Err(TuningError::OutOfRange { kind, field, expected, value })
            }
        };

        check("attack_range", self.attack_range, self.attack_range > 0.0, "> 0")?;
        check("attack_cooldown", self.attack_cooldown, self.attack_cooldown > 0.0, "> 0")?;
        check("target_update_min", self.target_update_min, self.target_update_min > 0.0, "> 0")?;
        check(
            "target_update_max",
            self.target_update_max,
            self.target_update_max >= self.target_update_min,
            ">= target_update_min",
        )?;
        check("max_target_distance", self.max_target_distance, self.max_target_distance > 0.0, "> 0")?;
        check("separation_radius", self.separation_radius, self.separation_radius >= 0.0, ">= 0")?;
        check(
            "avoidance_interval_max",
            self.avoidance_interval_max,
            self.avoidance_interval_max >= self.avoidance_interval_min && self.avoidance_interval_min >= 0.0,
            ">= avoidance_interval_min >= 0",
        )?;
        check("aggro_radius", self.aggro_radius, self.aggro_radius >= 0.0, ">= 0")?;
        if let Some(ratio) = self.retreat_health_ratio {
            check("retreat_health_ratio", ratio, (0.0..=1.0).contains(&ratio), "in [0, 1]")?;
        }
        Ok(())
    }
}

/// Tuning for every kind, with optional overrides
#[derive(Debug, Clone)]
pub struct TuningTable {
    tunings: HashMap<EnemyKind, AiTuning>,
}

impl TuningTable {
    pub fn new() -> Self {
        Self {
            tunings: EnemyKind::ALL.iter().map(|&k| (k, AiTuning::for_kind(k))).collect(),
        }
    }

    /// Parse `{"ranged": {"attack_cooldown": 1.5}, ...}`. Fields left out
    /// fall back to the kind's own defaults, not to `Basic`'s.
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let overrides: HashMap<EnemyKind, serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(json)?;
        let mut table = Self::new();
        for (kind, fields) in overrides {
            let mut merged = serde_json::to_value(AiTuning::for_kind(kind))?;
            if let serde_json::Value::Object(base) = &mut merged {
                base.extend(fields);
            }
            let tuning: AiTuning = serde_json::from_value(merged)?;
            tuning.validate(kind)?;
            table.tunings.insert(kind, tuning);
        }
        Ok(table)
    }

    pub fn get(&self, kind: EnemyKind) -> AiTuning {
        self.tunings.get(&kind).cloned().unwrap_or_else(|| AiTuning::for_kind(kind))
    }

    pub fn set(&mut self, kind: EnemyKind, tuning: AiTuning) -> Result<(), TuningError> {
        tuning.validate(kind)?;
        self.tunings.insert(kind, tuning);
        Ok(())
    }
}

impl Default for TuningTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        for kind in EnemyKind::ALL {
            AiTuning::for_kind(kind).validate(kind).unwrap();
        }
    }

    #[test]
    fn test_ranged_is_not_aggressive() {
        let t = AiTuning::for_kind(EnemyKind::Ranged);
        assert!(!t.aggressive);
        assert!(t.aggro_radius > 0.0);
        assert_eq!(t.attack_range, crate::game::constants::range::RANGED);
    }

    #[test]
    fn test_json_override_keeps_kind_defaults() {
        let table = TuningTable::from_json(r#"{"ranged": {"attack_cooldown": 0.75}}"#).unwrap();
        let ranged = table.get(EnemyKind::Ranged);
        assert_eq!(ranged.attack_cooldown, 0.75);
        assert_eq!(ranged.retreat_health_ratio, Some(0.3));
        assert_eq!(table.get(EnemyKind::Tank), AiTuning::for_kind(EnemyKind::Tank));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = TuningTable::from_json(r#"{"fast": {"attack_cooldown": -1.0}}"#).unwrap_err();
        assert!(matches!(err, TuningError::OutOfRange { field: "attack_cooldown", .. }));

        let err = TuningTable::from_json(r#"{"dragon": {}}"#).unwrap_err();
        assert!(matches!(err, TuningError::Parse(_)));
    }
}
