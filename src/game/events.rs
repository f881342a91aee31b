//! Presentation events emitted by the simulation core
//!
//! Events are fire-and-forget: the core pushes them into an unbounded
//! channel and never inspects whether anyone received them.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::game::state::{EntityId, PlayerId};
use crate::util::vec2::Vec2;

/// Events for renderers, audio and HUD collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A boss entered a new phase
    PhaseChanged { enemy_id: EntityId, phase: u8 },
    /// Floating combat text
    FloatingText {
        text: String,
        position: Vec2,
        color: [f32; 4],
        size: f32,
    },
    /// Camera shake request
    ScreenShake { intensity: f32, duration: f32 },
    /// An enemy started a special move
    SpecialStarted { enemy_id: EntityId, target_id: PlayerId },
    /// Chain lightning jumped between two points
    ChainArc { from: Vec2, to: Vec2, target_id: EntityId },
    /// Area damage was applied
    Explosion { position: Vec2, radius: f32 },
    /// A ricochet redirected a projectile
    Ricochet { projectile_id: EntityId, target_id: EntityId },
    /// An enemy died
    EnemyKilled { enemy_id: EntityId, position: Vec2 },
    /// A player took damage
    PlayerHit { player_id: PlayerId, damage: f32 },
}

/// Sending half of the presentation channel
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<Sender<GameEvent>>,
}

impl EventSink {
    /// Create a connected sink and its receiver
    pub fn channel() -> (Self, Receiver<GameEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit an event. Delivery failures are ignored.
    #[inline]
    pub fn emit(&self, event: GameEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delivers() {
        let (sink, rx) = EventSink::channel();
        sink.emit(GameEvent::ScreenShake { intensity: 1.0, duration: 0.2 });
        assert_eq!(
            rx.try_recv().unwrap(),
            GameEvent::ScreenShake { intensity: 1.0, duration: 0.2 }
        );
    }

    #[test]
    fn test_dropped_receiver_does_not_fail() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(GameEvent::ScreenShake { intensity: 1.0, duration: 0.2 });
        EventSink::disabled().emit(GameEvent::ScreenShake { intensity: 1.0, duration: 0.2 });
    }
}
