//! # Authority Loop
//!
//! The authoritative half of the synchronization scheme: this library owns the
//! canonical entity state, advances it on a fixed tick, and broadcasts a
//! snapshot of every entity once per tick to all connected clients.
//!
//! ## Design
//!
//! ### Single writer
//! The simulation in [`world`] is the only writer of entity positions. Clients
//! influence it solely through steering commands routed via their session;
//! nothing a client sends mutates state directly.
//!
//! ### Fixed cadence, fixed timestep
//! The tick timer fires at a configured rate (10 Hz by default) and each tick
//! integrates with the configured tick duration as its timestep. Measured
//! wall-clock elapsed time is deliberately kept out of the integration so two
//! runs fed the same command sequence produce bit-identical snapshots.
//!
//! ### Non-blocking delivery
//! Snapshot broadcast is queued to a dedicated sender task. Per-client send
//! failures are logged and isolated there; the tick never waits on a socket,
//! so one slow or dead connection cannot affect the cadence others see.
//!
//! ## Modules
//!
//! - [`world`]: deterministic entity simulation and snapshot assembly
//! - [`session`]: join/leave/timeout lifecycle and command buffering
//! - [`network`]: UDP socket tasks and the `select!`-driven tick loop
//!
//! ## Usage
//!
//! ```rust,no_run
//! use authority::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(100), // 10 Hz
//!         32,
//!         Duration::from_secs(5),
//!     ).await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod session;
pub mod world;
