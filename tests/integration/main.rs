//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives complete wake cycles
//! through the host simulation backends.  All tests run on the host
//! (x86_64) with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod full_wake_tests;
mod mock_hw;
mod wake_cycle_tests;
