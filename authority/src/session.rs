//! Session tracking for connected clients
//!
//! Supplies the join/leave lifecycle the simulation consumes: capacity-limited
//! joins, explicit leaves, timeout sweeps for silent clients, and per-session
//! buffering of steering commands until the next tick drains them.

use log::info;
use shared::SteerCommand;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One connected client and the commands it has sent since the last tick.
#[derive(Debug)]
pub struct Session {
    /// Entity id assigned at join; doubles as the session id
    pub entity_id: u32,
    /// Network address for snapshot delivery
    pub addr: SocketAddr,
    /// Last time any packet arrived from this client
    pub last_seen: Instant,
    /// Steering commands waiting for the next tick
    pub pending: Vec<SteerCommand>,
}

impl Session {
    pub fn new(entity_id: u32, addr: SocketAddr) -> Self {
        Self {
            entity_id,
            addr,
            last_seen: Instant::now(),
            pending: Vec::new(),
        }
    }

    /// Buffers a command and refreshes liveness. Commands are kept sorted by
    /// sequence so out-of-order UDP delivery cannot reorder them at drain time.
    pub fn push_command(&mut self, cmd: SteerCommand) {
        self.last_seen = Instant::now();
        self.pending.push(cmd);
        self.pending.sort_by_key(|c| c.sequence);
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Tracks every connected client, enforces the capacity limit, and hands the
/// tick loop its per-tick batch of steering commands.
pub struct SessionManager {
    sessions: HashMap<u32, Session>,
    next_entity_id: u32,
    max_sessions: usize,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(max_sessions: usize, timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            next_entity_id: 1,
            max_sessions,
            timeout,
        }
    }

    /// Admits a new client, returning its entity id, or `None` when the
    /// server is at capacity.
    pub fn join(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.sessions.len() >= self.max_sessions {
            return None;
        }

        let entity_id = self.next_entity_id;
        self.next_entity_id += 1;

        info!("Session {} joined from {}", entity_id, addr);
        self.sessions.insert(entity_id, Session::new(entity_id, addr));

        Some(entity_id)
    }

    /// Removes a session. Returns true if it existed.
    pub fn leave(&mut self, entity_id: &u32) -> bool {
        if let Some(session) = self.sessions.remove(entity_id) {
            info!("Session {} left", session.entity_id);
            true
        } else {
            false
        }
    }

    /// Associates an incoming packet's source address with a session.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.sessions
            .iter()
            .find(|(_, session)| session.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Buffers a steering command for a session. Returns false for unknown ids.
    pub fn push_command(&mut self, entity_id: u32, cmd: SteerCommand) -> bool {
        if let Some(session) = self.sessions.get_mut(&entity_id) {
            session.push_command(cmd);
            true
        } else {
            false
        }
    }

    /// Refreshes liveness for a session without queueing a command, so
    /// observer clients that only ever ping survive the timeout sweep.
    /// Returns false for unknown ids.
    pub fn touch(&mut self, entity_id: u32) -> bool {
        if let Some(session) = self.sessions.get_mut(&entity_id) {
            session.last_seen = Instant::now();
            true
        } else {
            false
        }
    }

    /// Drains all buffered commands in (entity id, sequence) order. The stable
    /// order keeps command application deterministic across runs.
    pub fn drain_commands(&mut self) -> Vec<(u32, SteerCommand)> {
        let mut all: Vec<(u32, SteerCommand)> = Vec::new();

        for (entity_id, session) in &mut self.sessions {
            for cmd in session.pending.drain(..) {
                all.push((*entity_id, cmd));
            }
        }

        all.sort_by_key(|(id, cmd)| (*id, cmd.sequence));
        all
    }

    /// Sweeps out sessions that have gone silent, returning the ids removed
    /// so the simulation can despawn their entities.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timeout = self.timeout;
        let timed_out: Vec<u32> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for entity_id in &timed_out {
            self.leave(entity_id);
        }

        timed_out
    }

    /// Snapshot delivery targets: every live (entity id, address) pair.
    pub fn delivery_targets(&self) -> Vec<(u32, SocketAddr)> {
        self.sessions
            .iter()
            .map(|(id, session)| (*id, session.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
