//! Per-entity projected state for remote entities
//!
//! Snapshots arrive late, irregularly, and possibly out of order; rendering
//! runs every frame. This module bridges the two: it keeps the last accepted
//! authoritative state per entity, rejects anything that would move an entity
//! backward in tick order, extrapolates linearly between arrivals, and decays
//! the visible disagreement across a short blend window instead of snapping.

use log::debug;
use shared::{lerp, project, Snapshot, Vec2};
use std::collections::HashMap;
use std::time::Duration;

/// What to do when an entity's snapshots stop arriving. The source of the
/// silence (disconnect vs. loss) is indistinguishable down here, so the
/// choice is configuration, not a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalePolicy {
    /// Keep projecting along the last known velocity indefinitely
    Extrapolate,
    /// Hold position once `stale_after_ticks` expected snapshots are missed
    Freeze,
}

#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Expected interval between authoritative ticks
    pub tick_interval: Duration,
    /// How long to blend out the error revealed by a new snapshot
    pub blend_window: Duration,
    pub stale_policy: StalePolicy,
    /// Missed-tick count after which an entity counts as stale
    pub stale_after_ticks: u32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            blend_window: Duration::from_millis(100),
            stale_policy: StalePolicy::Extrapolate,
            stale_after_ticks: 5,
        }
    }
}

/// Projected state for one remote entity
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    /// Tick of the last accepted snapshot; never decreases
    pub last_tick: u64,
    /// Authoritative position at `last_tick`
    pub pos: Vec2,
    /// Projected velocity, refreshed on each accepted snapshot
    pub vel: Vec2,
    /// Local receipt time of the last accepted snapshot
    pub received_at_ms: u64,
    /// Rendered-vs-authoritative gap captured at the last accept
    error_offset: Vec2,
}

impl TrackedEntity {
    fn from_first_snapshot(tick: u64, pos: Vec2, vel: Vec2, now_ms: u64) -> Self {
        Self {
            last_tick: tick,
            pos,
            vel,
            received_at_ms: now_ms,
            error_offset: Vec2::ZERO,
        }
    }

    fn is_stale(&self, config: &ProjectionConfig, now_ms: u64) -> bool {
        let stale_after_ms =
            config.stale_after_ticks as u64 * config.tick_interval.as_millis() as u64;
        now_ms.saturating_sub(self.received_at_ms) > stale_after_ms
    }

    /// Rendered position at `now_ms`: linear projection from the last
    /// accepted state, with the residual error blended out over the window.
    fn sample(&self, config: &ProjectionConfig, now_ms: u64) -> Vec2 {
        let mut elapsed_ms = now_ms.saturating_sub(self.received_at_ms);

        if config.stale_policy == StalePolicy::Freeze {
            let cap = config.stale_after_ticks as u64 * config.tick_interval.as_millis() as u64;
            elapsed_ms = elapsed_ms.min(cap);
        }

        let base = project(self.pos, self.vel, elapsed_ms as f32 / 1000.0);

        let blend_ms = config.blend_window.as_millis() as u64;
        if blend_ms == 0 || self.error_offset == Vec2::ZERO {
            return base;
        }

        let since_accept = now_ms.saturating_sub(self.received_at_ms);
        let t = since_accept as f32 / blend_ms as f32;
        lerp(base.add(self.error_offset), base, t)
    }
}

/// Client-local projected state for every tracked remote entity.
///
/// Per-entity lifecycle is Uninitialized (unknown id) → Tracking (first
/// accepted snapshot onward) → Removed (explicit leave notification).
pub struct ProjectionState {
    config: ProjectionConfig,
    tracked: HashMap<u32, TrackedEntity>,
}

impl ProjectionState {
    pub fn new(config: ProjectionConfig) -> Self {
        Self {
            config,
            tracked: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Applies an authoritative snapshot received at `now_ms`.
    ///
    /// Per entity: a tick not strictly greater than the last accepted one is
    /// a silent no-op (expected under UDP reordering, not an error). On
    /// accept, the projected velocity is recomputed from displacement over
    /// the elapsed tick time, and whatever gap there was between the rendered
    /// and the new authoritative position becomes the error offset that the
    /// blend window decays.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, now_ms: u64) {
        for state in &snapshot.entities {
            match self.tracked.get_mut(&state.id) {
                None => {
                    // First sight: no prior position to derive velocity from,
                    // use the snapshot-carried one
                    self.tracked.insert(
                        state.id,
                        TrackedEntity::from_first_snapshot(
                            snapshot.tick,
                            state.pos,
                            state.vel,
                            now_ms,
                        ),
                    );
                }
                Some(entity) => {
                    if snapshot.tick <= entity.last_tick {
                        debug!(
                            "Discarding stale snapshot tick {} for entity {} (at tick {})",
                            snapshot.tick, state.id, entity.last_tick
                        );
                        continue;
                    }

                    let tick_gap = snapshot.tick - entity.last_tick;
                    let elapsed_secs = tick_gap as f32 * self.config.tick_interval.as_secs_f32();

                    let vel = if elapsed_secs > 0.0 {
                        state.pos.sub(entity.pos).scale(1.0 / elapsed_secs)
                    } else {
                        state.vel
                    };

                    let rendered = entity.sample(&self.config, now_ms);

                    *entity = TrackedEntity {
                        last_tick: snapshot.tick,
                        pos: state.pos,
                        vel,
                        received_at_ms: now_ms,
                        error_offset: rendered.sub(state.pos),
                    };
                }
            }
        }
    }

    /// Rendered position for one entity, or `None` if it was never tracked
    /// or already removed.
    pub fn sample(&self, entity_id: u32, now_ms: u64) -> Option<Vec2> {
        self.tracked
            .get(&entity_id)
            .map(|entity| entity.sample(&self.config, now_ms))
    }

    /// Rendered positions for all tracked entities, in ascending id order.
    pub fn sample_all(&self, now_ms: u64) -> Vec<(u32, Vec2)> {
        let mut positions: Vec<(u32, Vec2)> = self
            .tracked
            .iter()
            .map(|(id, entity)| (*id, entity.sample(&self.config, now_ms)))
            .collect();
        positions.sort_by_key(|(id, _)| *id);
        positions
    }

    /// Last accepted tick for an entity. Test hook for the ordering property.
    pub fn accepted_tick(&self, entity_id: u32) -> Option<u64> {
        self.tracked.get(&entity_id).map(|e| e.last_tick)
    }

    /// Entities whose snapshots have gone silent past the configured span.
    pub fn stale_ids(&self, now_ms: u64) -> Vec<u32> {
        self.tracked
            .iter()
            .filter(|(_, entity)| entity.is_stale(&self.config, now_ms))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Handles an explicit leave notification: the entity's projected state
    /// is dropped entirely.
    pub fn remove(&mut self, entity_id: u32) -> bool {
        self.tracked.remove(&entity_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}
