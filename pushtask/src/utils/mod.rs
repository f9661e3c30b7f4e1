//! Time helpers shared by the dispatcher and the pipeline engines.
//!
//! Everything that reads "now" goes through a [`Clock`] so schedules and
//! routine timestamps can be frozen in tests.

mod clock;

pub use clock::{seconds_until, Clock, FixedClock, SystemClock, Timestamp};
