//! Venue supervisors (C8) and the multi-venue fan-out (C9).

pub mod multi;
pub mod venue;

pub use multi::run_multi_venue;
pub use venue::{HeartbeatSummary, VenueSupervisor};
