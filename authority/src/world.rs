use log::info;
use shared::{
    project, EntityState, Snapshot, SteerCommand, Vec2, MAX_STEER_SPEED, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub last_steer_sequence: u32,
}

impl Entity {
    pub fn new(id: u32, pos: Vec2) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            last_steer_sequence: 0,
        }
    }
}

/// Authoritative simulation state. The world is the single writer of entity
/// positions; clients only ever observe it through snapshots.
#[derive(Debug, Clone)]
pub struct World {
    pub tick: u64,
    pub entities: HashMap<u32, Entity>,
}

impl World {
    pub fn new() -> Self {
        Self {
            tick: 0,
            entities: HashMap::new(),
        }
    }

    /// Spawn placement is derived from the entity id alone so that repeated
    /// runs with the same join order place entities identically.
    pub fn spawn(&mut self, entity_id: u32) {
        let spawn_x = 100.0 + (entity_id as f32 * 60.0) % (WORLD_WIDTH - 200.0);
        let spawn_y = 100.0 + (entity_id as f32 * 40.0) % (WORLD_HEIGHT - 200.0);

        let entity = Entity::new(entity_id, Vec2::new(spawn_x, spawn_y));

        info!(
            "Spawned entity {} at ({}, {})",
            entity_id, entity.pos.x, entity.pos.y
        );
        self.entities.insert(entity_id, entity);
    }

    pub fn despawn(&mut self, entity_id: &u32) {
        self.entities.remove(entity_id);
        info!("Despawned entity {}", entity_id);
    }

    /// Applies a steering command. Commands carry a sequence number so that
    /// late or duplicated packets cannot override a newer command.
    pub fn steer(&mut self, entity_id: u32, cmd: &SteerCommand) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            if cmd.sequence <= entity.last_steer_sequence {
                return;
            }
            entity.vel = cmd.vel.clamp_length(MAX_STEER_SPEED);
            entity.last_steer_sequence = cmd.sequence;
        }
    }

    /// Advances every entity by one fixed timestep. `dt` is always the
    /// configured tick interval, never measured wall-clock time, so identical
    /// command sequences integrate to identical positions.
    pub fn step(&mut self, dt: f32) {
        for entity in self.entities.values_mut() {
            entity.pos = project(entity.pos, entity.vel, dt);

            if entity.pos.x <= 0.0 || entity.pos.x >= WORLD_WIDTH {
                entity.pos.x = entity.pos.x.clamp(0.0, WORLD_WIDTH);
                entity.vel.x = 0.0;
            }
            if entity.pos.y <= 0.0 || entity.pos.y >= WORLD_HEIGHT {
                entity.pos.y = entity.pos.y.clamp(0.0, WORLD_HEIGHT);
                entity.vel.y = 0.0;
            }
        }

        self.tick += 1;
    }

    /// Assembles the snapshot for the current tick. Entities are emitted in
    /// ascending id order; HashMap iteration order would make two otherwise
    /// identical runs serialize differently.
    pub fn snapshot(&self, timestamp_ms: u64) -> Snapshot {
        let mut entities: Vec<EntityState> = self
            .entities
            .values()
            .map(|e| EntityState {
                id: e.id,
                pos: e.pos,
                vel: e.vel,
            })
            .collect();
        entities.sort_by_key(|e| e.id);

        Snapshot {
            tick: self.tick,
            timestamp_ms,
            entities,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn steer_cmd(sequence: u32, x: f32, y: f32) -> SteerCommand {
        SteerCommand {
            sequence,
            vel: Vec2::new(x, y),
        }
    }

    #[test]
    fn test_spawn_is_deterministic() {
        let mut world_a = World::new();
        let mut world_b = World::new();

        world_a.spawn(7);
        world_b.spawn(7);

        assert_eq!(world_a.entities[&7].pos, world_b.entities[&7].pos);
    }

    #[test]
    fn test_spawn_and_despawn() {
        let mut world = World::new();

        world.spawn(1);
        world.spawn(2);
        assert_eq!(world.entities.len(), 2);

        world.despawn(&1);
        assert_eq!(world.entities.len(), 1);
        assert!(!world.entities.contains_key(&1));
    }

    #[test]
    fn test_steer_applies_clamped_velocity() {
        let mut world = World::new();
        world.spawn(1);

        world.steer(1, &steer_cmd(1, 10_000.0, 0.0));

        let vel = world.entities[&1].vel;
        assert_approx_eq!(vel.length(), MAX_STEER_SPEED, 1e-3);
    }

    #[test]
    fn test_steer_ignores_stale_sequence() {
        let mut world = World::new();
        world.spawn(1);

        world.steer(1, &steer_cmd(5, 100.0, 0.0));
        world.steer(1, &steer_cmd(3, -100.0, 0.0));

        assert_eq!(world.entities[&1].vel, Vec2::new(100.0, 0.0));
        assert_eq!(world.entities[&1].last_steer_sequence, 5);
    }

    #[test]
    fn test_steer_unknown_entity_is_noop() {
        let mut world = World::new();
        world.steer(99, &steer_cmd(1, 100.0, 0.0));
        assert!(world.entities.is_empty());
    }

    #[test]
    fn test_step_integrates_and_advances_tick() {
        let mut world = World::new();
        world.spawn(1);
        world.steer(1, &steer_cmd(1, 100.0, 0.0));

        let start = world.entities[&1].pos;
        world.step(0.1);

        assert_eq!(world.tick, 1);
        assert_approx_eq!(world.entities[&1].pos.x, start.x + 10.0, 1e-4);
        assert_approx_eq!(world.entities[&1].pos.y, start.y, 1e-4);
    }

    #[test]
    fn test_step_clamps_to_world_bounds() {
        let mut world = World::new();
        world.spawn(1);

        if let Some(entity) = world.entities.get_mut(&1) {
            entity.pos = Vec2::new(WORLD_WIDTH - 1.0, 50.0);
            entity.vel = Vec2::new(MAX_STEER_SPEED, 0.0);
        }

        world.step(0.1);

        let entity = &world.entities[&1];
        assert_eq!(entity.pos.x, WORLD_WIDTH);
        assert_eq!(entity.vel.x, 0.0);
    }

    #[test]
    fn test_snapshot_entities_sorted_by_id() {
        let mut world = World::new();
        world.spawn(3);
        world.spawn(1);
        world.spawn(2);

        let snapshot = world.snapshot(0);
        let ids: Vec<u32> = snapshot.entities.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_identical_runs_produce_identical_snapshots() {
        let commands = vec![
            (1u32, steer_cmd(1, 120.0, -40.0)),
            (2u32, steer_cmd(1, -80.0, 60.0)),
            (1u32, steer_cmd(2, 0.0, 150.0)),
        ];

        let run = |commands: &[(u32, SteerCommand)]| {
            let mut world = World::new();
            world.spawn(1);
            world.spawn(2);

            let mut snapshots = Vec::new();
            for (entity_id, cmd) in commands {
                world.steer(*entity_id, cmd);
                world.step(0.1);
                snapshots.push(world.snapshot(0));
            }
            snapshots
        };

        let first = run(&commands);
        let second = run(&commands);

        assert_eq!(first, second);

        // Bit-identical on the wire, not just approximately equal
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(
                bincode::serialize(a).unwrap(),
                bincode::serialize(b).unwrap()
            );
        }
    }
}
