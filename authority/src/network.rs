//! UDP server layer coordinating the fixed-cadence tick loop
//!
//! Three spawned tasks (receiver, sender, timeout sweeper) feed the main
//! `select!` loop through channels. The tick interval drives the simulation;
//! snapshot delivery goes through the sender task's queue so a slow or dead
//! client can never stall a tick.

use crate::session::SessionManager;
use crate::world::World;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, SteerCommand, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    SessionTimeout {
        entity_id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the tick loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    Send { packet: Packet, addr: SocketAddr },
    Broadcast { packet: Packet },
}

/// Main server coordinating networking and the authoritative simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionManager>>,
    world: World,
    tick_duration: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_sessions: usize,
        session_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Authority listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            sessions: Arc::new(RwLock::new(SessionManager::new(
                max_sessions,
                session_timeout,
            ))),
            world: World::new(),
            tick_duration,
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx,
        })
    }

    /// Spawns the task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to forward packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing queue. Delivery failures are
    /// logged per destination and never surface back into the tick loop.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let sessions = Arc::clone(&self.sessions);
        let mut outbound_rx = std::mem::replace(&mut self.outbound_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::Send { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::Broadcast { packet } => {
                        let targets = {
                            let sessions_guard = sessions.read().await;
                            sessions_guard.delivery_targets()
                        };

                        for (entity_id, addr) in targets {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to session {}: {}", entity_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns the task that sweeps out silent sessions once per second
    fn spawn_timeout_sweeper(&self) {
        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut sweep_interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                sweep_interval.tick().await;

                let timed_out = {
                    let mut sessions_guard = sessions.write().await;
                    sessions_guard.check_timeouts()
                };

                for entity_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::SessionTimeout { entity_id }) {
                        error!("Failed to forward timeout: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn queue_send(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.outbound_tx.send(OutboundMessage::Send {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet: {}", e);
        }
    }

    fn queue_broadcast(&self, packet: &Packet) {
        if let Err(e) = self.outbound_tx.send(OutboundMessage::Broadcast {
            packet: packet.clone(),
        }) {
            error!("Failed to queue broadcast: {}", e);
        }
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Join { client_version } => {
                info!("Join from {} (version: {})", addr, client_version);

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Refused {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.queue_send(&response, addr);
                    return;
                }

                // A rejoin from the same address replaces the old session
                let existing = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(existing_id) = existing {
                    info!("Replacing session {} from {}", existing_id, addr);
                    let mut sessions = self.sessions.write().await;
                    sessions.leave(&existing_id);
                    self.world.despawn(&existing_id);
                    self.queue_broadcast(&Packet::EntityLeft {
                        entity_id: existing_id,
                    });
                }

                let entity_id = {
                    let mut sessions = self.sessions.write().await;
                    sessions.join(addr)
                };

                if let Some(entity_id) = entity_id {
                    self.world.spawn(entity_id);
                    self.queue_send(&Packet::Joined { entity_id }, addr);
                } else {
                    let response = Packet::Refused {
                        reason: "Server full".to_string(),
                    };
                    self.queue_send(&response, addr);
                }
            }

            Packet::Steer { sequence, vel } => {
                let entity_id = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(entity_id) = entity_id {
                    let mut sessions = self.sessions.write().await;
                    sessions.push_command(entity_id, SteerCommand { sequence, vel });
                }
            }

            Packet::Ping => {
                let entity_id = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(entity_id) = entity_id {
                    let mut sessions = self.sessions.write().await;
                    sessions.touch(entity_id);
                }
            }

            Packet::Leave => {
                let entity_id = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(entity_id) = entity_id {
                    let mut sessions = self.sessions.write().await;
                    sessions.leave(&entity_id);
                    self.world.despawn(&entity_id);
                    self.queue_broadcast(&Packet::EntityLeft { entity_id });
                }
            }

            _ => {
                warn!("Unexpected packet type from {}", addr);
            }
        }
    }

    /// Runs one tick: drain commands, integrate with the fixed timestep,
    /// assemble the snapshot, queue the broadcast.
    async fn run_tick(&mut self) {
        let commands = {
            let mut sessions = self.sessions.write().await;
            sessions.drain_commands()
        };

        for (entity_id, cmd) in &commands {
            self.world.steer(*entity_id, cmd);
        }

        // Fixed dt: wall-clock jitter must never reach the integration
        self.world.step(self.tick_duration.as_secs_f32());

        let session_count = {
            let sessions = self.sessions.read().await;
            sessions.len()
        };

        if session_count == 0 {
            return;
        }

        let snapshot = self.world.snapshot(current_timestamp_ms());
        self.queue_broadcast(&Packet::State(snapshot));
    }

    /// Main server loop coordinating packet handling and the tick cadence
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_sweeper();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Authority loop started at {:.1}Hz",
            1.0 / self.tick_duration.as_secs_f64()
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::SessionTimeout { entity_id }) => {
                            self.world.despawn(&entity_id);
                            self.queue_broadcast(&Packet::EntityLeft { entity_id });
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Authority shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.run_tick().await;

                    if self.world.tick % 100 == 0 {
                        let session_count = {
                            let sessions = self.sessions.read().await;
                            sessions.len()
                        };

                        if session_count > 0 {
                            debug!("Tick {}: {} sessions, {} entities",
                                   self.world.tick, session_count, self.world.entities.len());
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

/// Wall-clock timestamp in milliseconds, for snapshot latency measurement only
pub fn current_timestamp_ms() -> u64 {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    ms.min(u64::MAX as u128) as u64
}
