//! Types and pure functions shared by the temperature monitor.
#![warn(missing_docs)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

pub mod datetime;
pub mod readings;

pub use datetime::{Epoch, Granularity, Window};
pub use readings::{CurrentTemperature, Labels, NormalizedReading, Reading};
