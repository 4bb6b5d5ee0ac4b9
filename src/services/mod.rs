//! Services that talk to the outside world.
pub mod remote;
