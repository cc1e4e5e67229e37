use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_TICK_RATE: u32 = 10;
pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const MAX_STEER_SPEED: f32 = 300.0;

/// 2D vector used for authoritative positions and velocities.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(&self, factor: f32) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the vector clamped to the given maximum length.
    pub fn clamp_length(&self, max: f32) -> Vec2 {
        let len = self.length();
        if len > max && len > 0.0 {
            self.scale(max / len)
        } else {
            *self
        }
    }
}

/// Componentwise linear blend between two points. `t` is clamped to [0, 1],
/// so the result always lies on the segment between `a` and `b`.
pub fn lerp(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    let t = t.clamp(0.0, 1.0);
    Vec2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

/// Linear motion projection: where an entity moving at `vel` ends up
/// `elapsed_secs` after it was observed at `pos`.
pub fn project(pos: Vec2, vel: Vec2, elapsed_secs: f32) -> Vec2 {
    pos.add(vel.scale(elapsed_secs))
}

/// Authoritative per-entity record carried in each snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
}

/// Immutable authoritative state for one tick. Produced once per tick by the
/// server and broadcast to every connected client; a new snapshot supersedes
/// the previous one, nothing is persisted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Snapshot {
    pub tick: u64,
    pub timestamp_ms: u64,
    pub entities: Vec<EntityState>,
}

impl Snapshot {
    pub fn entity(&self, id: u32) -> Option<&EntityState> {
        self.entities.iter().find(|e| e.id == id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Join {
        client_version: u32,
    },
    Steer {
        sequence: u32,
        vel: Vec2,
    },
    /// Keepalive from clients that have nothing to steer; refreshes session
    /// liveness so pure observers are not swept out by the timeout.
    Ping,
    Leave,

    Joined {
        entity_id: u32,
    },
    State(Snapshot),
    EntityLeft {
        entity_id: u32,
    },
    Refused {
        reason: String,
    },
}

/// A steering command queued server-side until the next tick.
#[derive(Debug, Clone, Copy)]
pub struct SteerCommand {
    pub sequence: u32,
    pub vel: Vec2,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vec2_arithmetic() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, -4.0);

        let sum = a.add(b);
        assert_eq!(sum, Vec2::new(4.0, -2.0));

        let diff = b.sub(a);
        assert_eq!(diff, Vec2::new(2.0, -6.0));

        let scaled = a.scale(2.5);
        assert_eq!(scaled, Vec2::new(2.5, 5.0));

        assert_approx_eq!(b.length(), 5.0, 1e-6);
    }

    #[test]
    fn test_vec2_clamp_length() {
        let v = Vec2::new(300.0, 400.0);
        let clamped = v.clamp_length(100.0);
        assert_approx_eq!(clamped.length(), 100.0, 1e-3);
        assert_approx_eq!(clamped.x, 60.0, 1e-3);
        assert_approx_eq!(clamped.y, 80.0, 1e-3);

        let short = Vec2::new(3.0, 4.0);
        assert_eq!(short.clamp_length(100.0), short);

        assert_eq!(Vec2::ZERO.clamp_length(10.0), Vec2::ZERO);
    }

    #[test]
    fn test_lerp_endpoints() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 20.0);

        assert_eq!(lerp(a, b, 0.0), a);
        assert_eq!(lerp(a, b, 1.0), b);
        assert_eq!(lerp(a, b, 0.5), Vec2::new(5.0, 10.0));
    }

    #[test]
    fn test_lerp_clamps_out_of_range() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);

        assert_eq!(lerp(a, b, -0.5), a);
        assert_eq!(lerp(a, b, 1.5), b);
    }

    #[test]
    fn test_lerp_stays_on_segment() {
        let a = Vec2::new(-5.0, 3.0);
        let b = Vec2::new(7.0, -9.0);

        for i in 0..=20 {
            let t = i as f32 / 20.0;
            let p = lerp(a, b, t);

            // Collinearity: cross product of (p - a) and (b - a) is zero
            let cross = (p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x);
            assert_approx_eq!(cross, 0.0, 1e-3);

            assert!(p.x >= b.x.min(a.x) - 1e-4 && p.x <= b.x.max(a.x) + 1e-4);
            assert!(p.y >= b.y.min(a.y) - 1e-4 && p.y <= b.y.max(a.y) + 1e-4);
        }
    }

    #[test]
    fn test_project_linear_motion() {
        let pos = Vec2::new(10.0, 0.0);
        let vel = Vec2::new(100.0, 0.0);

        let projected = project(pos, vel, 0.05);
        assert_approx_eq!(projected.x, 15.0, 1e-4);
        assert_approx_eq!(projected.y, 0.0, 1e-4);

        assert_eq!(project(pos, vel, 0.0), pos);
    }

    #[test]
    fn test_snapshot_entity_lookup() {
        let snapshot = Snapshot {
            tick: 7,
            timestamp_ms: 1234,
            entities: vec![
                EntityState {
                    id: 1,
                    pos: Vec2::new(1.0, 1.0),
                    vel: Vec2::ZERO,
                },
                EntityState {
                    id: 2,
                    pos: Vec2::new(2.0, 2.0),
                    vel: Vec2::ZERO,
                },
            ],
        };

        assert_eq!(snapshot.entity(2).unwrap().pos, Vec2::new(2.0, 2.0));
        assert!(snapshot.entity(99).is_none());
    }

    #[test]
    fn test_packet_serialization_join() {
        let packet = Packet::Join { client_version: 42 };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Join { client_version } => assert_eq!(client_version, 42),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_steer() {
        let packet = Packet::Steer {
            sequence: 123,
            vel: Vec2::new(-50.0, 25.0),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Steer { sequence, vel } => {
                assert_eq!(sequence, 123);
                assert_eq!(vel, Vec2::new(-50.0, 25.0));
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_ping() {
        let serialized = bincode::serialize(&Packet::Ping).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Ping => {}
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_state() {
        let snapshot = Snapshot {
            tick: 42,
            timestamp_ms: 123456789,
            entities: vec![EntityState {
                id: 1,
                pos: Vec2::new(100.0, 200.0),
                vel: Vec2::new(10.0, 0.0),
            }],
        };

        let packet = Packet::State(snapshot.clone());
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::State(s) => assert_eq!(s, snapshot),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
