use glam::Vec2;
use serde::Serialize;

use crate::protocol::{PlayerState, PlayerStatePatch};

/// Kinematic state of one ship on the water plane. `position.x` is world x,
/// `position.y` is world z.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EntityState {
    pub position: Vec2,
    pub heading: f32,
    pub velocity: f32,
    pub tick_delta: f32,
}

impl EntityState {
    pub fn new(x: f32, z: f32, heading: f32) -> Self {
        Self {
            position: Vec2::new(x, z),
            heading,
            ..Default::default()
        }
    }

    pub fn x(&self) -> f32 {
        self.position.x
    }

    pub fn z(&self) -> f32 {
        self.position.y
    }

    /// Copy of `self` with every field present in `patch` overwritten.
    pub fn patched(&self, patch: &PlayerStatePatch) -> Self {
        Self {
            position: Vec2::new(
                patch.x.unwrap_or(self.position.x),
                patch.z.unwrap_or(self.position.y),
            ),
            heading: patch.angle.unwrap_or(self.heading),
            velocity: patch.velocity.unwrap_or(self.velocity),
            tick_delta: patch.delta.unwrap_or(self.tick_delta),
        }
    }
}

impl From<PlayerState> for EntityState {
    fn from(state: PlayerState) -> Self {
        Self {
            position: Vec2::new(state.x, state.z),
            heading: state.angle,
            velocity: state.velocity,
            tick_delta: state.delta,
        }
    }
}

/// A remotely controlled ship as seen by the render loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteEntity {
    pub name: String,
    pub current: EntityState,
    target: Option<EntityState>,
}

impl RemoteEntity {
    pub(crate) fn new(name: String, initial: Option<EntityState>) -> Self {
        Self {
            name,
            current: initial.unwrap_or_default(),
            target: initial,
        }
    }

    pub fn target(&self) -> Option<&EntityState> {
        self.target.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.target.is_some()
    }

    pub(crate) fn set_target(&mut self, target: EntityState) {
        self.target = Some(target);
    }

    /// State the next patch applies on top of.
    pub(crate) fn authoritative(&self) -> EntityState {
        self.target.unwrap_or(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_keeps_missing_fields() {
        let state = EntityState {
            position: Vec2::new(1.0, 2.0),
            heading: 0.5,
            velocity: 3.0,
            tick_delta: 0.1,
        };
        let patch = PlayerStatePatch {
            z: Some(-4.0),
            velocity: Some(0.0),
            ..Default::default()
        };

        let patched = state.patched(&patch);
        assert_eq!(patched.x(), 1.0);
        assert_eq!(patched.z(), -4.0);
        assert_eq!(patched.heading, 0.5);
        assert_eq!(patched.velocity, 0.0);
        assert_eq!(patched.tick_delta, 0.1);
    }

    #[test]
    fn test_uninitialized_entity_renders_default() {
        let entity = RemoteEntity::new("ghost".into(), None);
        assert!(!entity.is_initialized());
        assert_eq!(entity.current, EntityState::default());
        assert_eq!(entity.authoritative(), EntityState::default());
    }
}
