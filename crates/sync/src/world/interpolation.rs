use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::f32::consts::{PI, TAU};
use std::rc::Rc;

use crate::bus::{MessageRouter, Subscription};
use crate::protocol::{GameStateInit, GameStateUpdate, PlayerJoined, PlayerLeft, PlayerStatePatch};

use super::entity::{EntityState, RemoteEntity};

pub const DEFAULT_TIME_CONSTANT_SECS: f32 = 0.25;

/// Each tick closes `1 - exp(-dt / time_constant)` of the remaining gap. A
/// non-positive time constant snaps to target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationConfig {
    pub position_time_constant: f32,
    pub heading_time_constant: f32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            position_time_constant: DEFAULT_TIME_CONSTANT_SECS,
            heading_time_constant: DEFAULT_TIME_CONSTANT_SECS,
        }
    }
}

impl InterpolationConfig {
    pub fn uniform(time_constant: f32) -> Self {
        Self {
            position_time_constant: time_constant,
            heading_time_constant: time_constant,
        }
    }
}

/// Wraps an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

pub fn smoothing_factor(dt: f32, time_constant: f32) -> f32 {
    if !dt.is_finite() || dt <= 0.0 {
        return 0.0;
    }
    if time_constant <= 0.0 {
        return 1.0;
    }
    (1.0 - (-dt / time_constant).exp()).clamp(0.0, 1.0)
}

fn step_towards(
    current: &mut EntityState,
    target: &EntityState,
    position_alpha: f32,
    heading_alpha: f32,
) {
    if position_alpha >= 1.0 {
        current.position = target.position;
    } else {
        current.position += (target.position - current.position) * position_alpha;
    }

    let diff = wrap_angle(target.heading - current.heading);
    current.heading = if heading_alpha >= 1.0 {
        wrap_angle(target.heading)
    } else {
        wrap_angle(current.heading + diff * heading_alpha)
    };

    current.velocity = target.velocity;
    current.tick_delta = target.tick_delta;
}

#[derive(Debug, Default)]
pub struct EntityInterpolator {
    config: InterpolationConfig,
    entities: HashMap<String, RemoteEntity>,
}

impl EntityInterpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            entities: HashMap::new(),
        }
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    /// Creates `name` if it does not exist. A join carrying state for an
    /// existing entity is treated as an authoritative update.
    pub fn join(&mut self, name: &str, initial: Option<EntityState>) {
        match self.entities.get_mut(name) {
            Some(entity) => {
                if let Some(state) = initial {
                    entity.set_target(state);
                }
            }
            None => {
                log::debug!("entity {} joined", name);
                self.entities
                    .insert(name.to_string(), RemoteEntity::new(name.to_string(), initial));
            }
        }
    }

    // Unknown entities are created on the spot.
    pub fn apply_update(&mut self, name: &str, patch: &PlayerStatePatch) {
        match self.entities.get_mut(name) {
            Some(entity) => {
                let target = entity.authoritative().patched(patch);
                entity.set_target(target);
            }
            None => {
                log::debug!("implicit join for {}", name);
                let state = EntityState::default().patched(patch);
                self.entities
                    .insert(name.to_string(), RemoteEntity::new(name.to_string(), Some(state)));
            }
        }
    }

    pub fn apply_snapshot<'a>(&mut self, states: impl IntoIterator<Item = (&'a str, EntityState)>) {
        let mut seen = HashSet::new();
        for (name, state) in states {
            match self.entities.get_mut(name) {
                Some(entity) => entity.set_target(state),
                None => {
                    self.entities
                        .insert(name.to_string(), RemoteEntity::new(name.to_string(), Some(state)));
                }
            }
            seen.insert(name);
        }

        let before = self.entities.len();
        self.entities.retain(|name, _| seen.contains(name.as_str()));
        let removed = before - self.entities.len();
        if removed > 0 {
            log::debug!("snapshot removed {} stale entities", removed);
        }
    }

    pub fn leave(&mut self, name: &str) -> Option<RemoteEntity> {
        let removed = self.entities.remove(name);
        if removed.is_some() {
            log::debug!("entity {} left", name);
        }
        removed
    }

    pub fn tick(&mut self, dt: f32) {
        let position_alpha = smoothing_factor(dt, self.config.position_time_constant);
        let heading_alpha = smoothing_factor(dt, self.config.heading_time_constant);
        if position_alpha == 0.0 && heading_alpha == 0.0 {
            return;
        }

        for entity in self.entities.values_mut() {
            if let Some(target) = entity.target().copied() {
                step_towards(&mut entity.current, &target, position_alpha, heading_alpha);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RemoteEntity> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    pub fn sorted(&self) -> Vec<&RemoteEntity> {
        let mut entities: Vec<_> = self.entities.values().collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn attach(world: &Rc<RefCell<Self>>, router: &mut MessageRouter) -> Vec<Subscription> {
        let init = {
            let world = Rc::clone(world);
            router.subscribe::<GameStateInit>(move |init| {
                world.borrow_mut().apply_snapshot(
                    init.player_states
                        .iter()
                        .map(|(name, state)| (name.as_str(), EntityState::from(*state))),
                );
            })
        };

        let update = {
            let world = Rc::clone(world);
            router.subscribe::<GameStateUpdate>(move |update| {
                let mut world = world.borrow_mut();
                for (name, patch) in &update.player_states {
                    world.apply_update(name, patch);
                }
            })
        };

        let joined = {
            let world = Rc::clone(world);
            router.subscribe::<PlayerJoined>(move |joined| {
                let initial = (!joined.state.is_empty())
                    .then(|| EntityState::default().patched(&joined.state));
                world.borrow_mut().join(&joined.username, initial);
            })
        };

        let left = {
            let world = Rc::clone(world);
            router.subscribe::<PlayerLeft>(move |left| {
                world.borrow_mut().leave(&left.username);
            })
        };

        vec![init, update, joined, left]
    }
}
