//! # Projection Layer
//!
//! Client-side half of the synchronization scheme: turns delayed, irregular,
//! possibly reordered snapshot arrivals into smooth per-frame positions for
//! remote entities.
//!
//! ## How it works
//!
//! ### Tick-ordered acceptance
//! Each tracked entity remembers the tick of its last accepted snapshot.
//! Anything not strictly newer is silently dropped, so late UDP delivery can
//! never move an entity backward. Gaps (lost ticks) are fine; the next
//! accepted snapshot spreads the displacement over the missed interval.
//!
//! ### Dead reckoning
//! Between arrivals every entity is projected forward along its last known
//! velocity. The velocity itself is derived from the displacement between the
//! last two accepted snapshots, not trusted from the wire, except on first
//! sight where the snapshot-carried value is the only thing available.
//!
//! ### Blend-window correction
//! When a fresh snapshot disagrees with where extrapolation had put an
//! entity, the visible gap is captured as an error offset and faded out over
//! a short configurable window instead of teleporting the entity.
//!
//! ### Staleness policy
//! Whether an entity that stops receiving snapshots keeps drifting or
//! freezes in place is a [`track::StalePolicy`] choice; the layer itself
//! keeps producing positions either way and never errors on silence.
//!
//! ## Modules
//!
//! - [`track`]: the projection core — pure state, no I/O, fully testable
//!   with explicit millisecond clocks
//! - [`network`]: the headless UDP viewer that feeds it

pub mod network;
pub mod track;
