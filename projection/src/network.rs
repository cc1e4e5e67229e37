use crate::track::{ProjectionConfig, ProjectionState};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

/// How often the viewer pings the server. Observers never send steering
/// commands, so without this the server's liveness sweep would take the
/// session down mid-stream.
const PING_INTERVAL: Duration = Duration::from_secs(1);

/// How long to wait for a join response before giving up.
const JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Headless client driving a [`ProjectionState`] from live snapshots.
///
/// Receives on the socket asynchronously, samples every tracked entity on a
/// fixed frame cadence, and never blocks the frame on network I/O. Rendering
/// proper is out of scope; sampled positions go to the log instead.
pub struct Viewer {
    socket: UdpSocket,
    server_addr: SocketAddr,
    entity_id: Option<u32>,
    connected: bool,

    projection: ProjectionState,
    frame_duration: Duration,
}

impl Viewer {
    pub async fn new(
        server_addr: &str,
        config: ProjectionConfig,
        frame_duration: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Viewer {
            socket,
            server_addr,
            entity_id: None,
            connected: false,
            projection: ProjectionState::new(config),
            frame_duration,
        })
    }

    async fn join(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Joining server at {}...", self.server_addr);

        let packet = Packet::Join {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(
        &mut self,
        packet: Packet,
        now_ms: u64,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match packet {
            Packet::Joined { entity_id } => {
                info!("Joined. Assigned entity {}", entity_id);
                self.entity_id = Some(entity_id);
                self.connected = true;
            }

            Packet::State(snapshot) => {
                self.projection.apply_snapshot(&snapshot, now_ms);
            }

            Packet::EntityLeft { entity_id } => {
                if self.projection.remove(entity_id) {
                    info!("Entity {} left", entity_id);
                }
            }

            // A refusal is terminal: nothing will ever arrive on this
            // socket, so spinning the frame loop would just hang silently
            Packet::Refused { reason } => {
                self.connected = false;
                self.entity_id = None;
                return Err(format!("Join refused: {}", reason).into());
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }

        Ok(())
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.join().await?;

        let mut frame_interval = interval(self.frame_duration);
        let mut ping_interval = interval(PING_INTERVAL);
        let join_deadline = tokio::time::Instant::now() + JOIN_TIMEOUT;
        let mut buffer = [0u8; 2048];
        let mut frame_count: u64 = 0;
        let frames_per_report =
            (Duration::from_secs(1).as_millis() / self.frame_duration.as_millis().max(1)) as u64;

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                self.handle_packet(packet, now_ms())?;
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = ping_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Ping).await {
                            error!("Error sending keepalive: {}", e);
                        }
                    }
                },

                _ = frame_interval.tick() => {
                    if !self.connected && tokio::time::Instant::now() >= join_deadline {
                        return Err("no join response from server".into());
                    }

                    let positions = self.projection.sample_all(now_ms());
                    frame_count += 1;

                    if frame_count % frames_per_report.max(1) == 0 {
                        for (id, pos) in &positions {
                            info!("entity {}: ({:.1}, {:.1})", id, pos.x, pos.y);
                        }
                        let stale = self.projection.stale_ids(now_ms());
                        if !stale.is_empty() {
                            info!("stale entities (still projected): {:?}", stale);
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Leave).await;
        }

        Ok(())
    }
}

fn now_ms() -> u64 {
    let ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    ms.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{EntityState, Snapshot, Vec2};

    fn viewer_for_test() -> Viewer {
        tokio_test::block_on(Viewer::new(
            "127.0.0.1:8080",
            ProjectionConfig::default(),
            Duration::from_millis(16),
        ))
        .unwrap()
    }

    #[test]
    fn test_joined_packet_sets_identity() {
        let mut viewer = viewer_for_test();

        viewer
            .handle_packet(Packet::Joined { entity_id: 9 }, 0)
            .unwrap();

        assert!(viewer.connected);
        assert_eq!(viewer.entity_id, Some(9));
    }

    #[test]
    fn test_state_packet_feeds_projection() {
        let mut viewer = viewer_for_test();

        let snapshot = Snapshot {
            tick: 1,
            timestamp_ms: 0,
            entities: vec![EntityState {
                id: 4,
                pos: Vec2::new(1.0, 2.0),
                vel: Vec2::ZERO,
            }],
        };

        viewer.handle_packet(Packet::State(snapshot), 1000).unwrap();

        assert_eq!(viewer.projection.sample(4, 1000), Some(Vec2::new(1.0, 2.0)));
    }

    #[test]
    fn test_entity_left_removes_tracking() {
        let mut viewer = viewer_for_test();

        let snapshot = Snapshot {
            tick: 1,
            timestamp_ms: 0,
            entities: vec![EntityState {
                id: 4,
                pos: Vec2::ZERO,
                vel: Vec2::ZERO,
            }],
        };
        viewer.handle_packet(Packet::State(snapshot), 1000).unwrap();
        viewer
            .handle_packet(Packet::EntityLeft { entity_id: 4 }, 1100)
            .unwrap();

        assert!(viewer.projection.is_empty());
    }

    #[test]
    fn test_refused_packet_is_terminal() {
        let mut viewer = viewer_for_test();

        viewer
            .handle_packet(Packet::Joined { entity_id: 9 }, 0)
            .unwrap();

        let result = viewer.handle_packet(
            Packet::Refused {
                reason: "Server full".to_string(),
            },
            0,
        );

        let err = result.expect_err("refusal must terminate the viewer");
        assert!(err.to_string().contains("Server full"));
        assert!(!viewer.connected);
        assert_eq!(viewer.entity_id, None);
    }
}
