//! Separation against same-kind neighbors
//!
//! The repulsion vector is recomputed on a per-enemy randomized cadence and
//! cached in between. Recomputing every tick makes stacked enemies jitter as
//! neighbor counts flicker.

use rand::Rng;
use smallvec::SmallVec;

use crate::game::constants::avoidance::*;
use crate::game::state::{EnemyKind, EntityId};
use crate::game::world::AiWorld;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone)]
pub struct AvoidanceSolver {
    radius: f32,
    interval: f32,
    timer: f32,
    repulsion: Vec2,
}

impl AvoidanceSolver {
    /// Interval drawn from `interval_range`; the first recompute lands at a
    /// random point inside it.
    pub fn new<R: Rng + ?Sized>(radius: f32, interval_range: (f32, f32), rng: &mut R) -> Self {
        let (lo, hi) = interval_range;
        let interval = if hi > lo { rng.gen_range(lo..hi) } else { lo.max(0.0) };
        let timer = if interval > 0.0 { rng.gen_range(0.0..interval) } else { 0.0 };
        Self {
            radius,
            interval,
            timer,
            repulsion: Vec2::ZERO,
        }
    }

    pub fn with_default_interval<R: Rng + ?Sized>(radius: f32, rng: &mut R) -> Self {
        Self::new(radius, (INTERVAL_MIN, INTERVAL_MAX), rng)
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Cached repulsion from the last recompute
    pub fn repulsion(&self) -> Vec2 {
        self.repulsion
    }

    /// Advance the cadence timer, recompute when due, and blend into `direction`
    pub fn apply<W: AiWorld + ?Sized>(
        &mut self,
        dt: f32,
        id: EntityId,
        kind: EnemyKind,
        position: Vec2,
        direction: Vec2,
        world: &W,
    ) -> Vec2 {
        self.timer += dt;
        if self.timer >= self.interval {
            self.timer = 0.0;
            self.repulsion = self.compute_repulsion(id, kind, position, world);
        }
        self.blend(direction)
    }

    /// Average linear-falloff push away from up to `MAX_NEIGHBORS` nearest
    /// same-kind neighbors inside the radius
    pub fn compute_repulsion<W: AiWorld + ?Sized>(
        &self,
        id: EntityId,
        kind: EnemyKind,
        position: Vec2,
        world: &W,
    ) -> Vec2 {
        if self.radius <= 0.0 {
            return Vec2::ZERO;
        }

        let radius_sq = self.radius * self.radius;
        let mut neighbors: SmallVec<[(f32, EntityId, Vec2); 16]> = SmallVec::new();
        world.for_each_nearby(kind, position, self.radius, &mut |other, other_pos| {
            if other == id {
                return;
            }
            let d_sq = other_pos.distance_sq_to(position);
            if d_sq < radius_sq {
                neighbors.push((d_sq, other, other_pos));
            }
        });

        if neighbors.is_empty() {
            return Vec2::ZERO;
        }

        neighbors.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        neighbors.truncate(MAX_NEIGHBORS);

        let mut sum = Vec2::ZERO;
        for &(d_sq, _, other_pos) in &neighbors {
            let weight = (self.radius - d_sq.sqrt()) / self.radius;
            sum += other_pos.direction_to(position) * weight;
        }
        sum * (1.0 / neighbors.len() as f32)
    }

    /// No cached repulsion means no change
    pub fn blend(&self, direction: Vec2) -> Vec2 {
        if self.repulsion == Vec2::ZERO {
            return direction;
        }
        (direction + self.repulsion * BLEND_WEIGHT).normalize()
    }
}
