//! Sensor drivers read during a full wake.
//!
//! Motion and door contact are not read here: they only ever arrive as
//! EXT1 wake bits (see [`crate::power::wake`]).

pub mod battery;
