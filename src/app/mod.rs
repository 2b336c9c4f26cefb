//! Application core: pure domain logic, no I/O.
//!
//! Orchestrates one wake cycle of a RoomSense node on top of the
//! [`power`](crate::power) core: resume retained state, decide, run the
//! full-wake flusher when escalated, persist, suspend.  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod events;
pub mod flusher;
pub mod payload;
pub mod ports;
pub mod service;
