//! Shared data model for Ava: assistant threads and runs, avatar talks,
//! turn events and realtime relay frames.

pub mod protocol;

pub use protocol::*;
