//! Meridian Clock Infrastructure
//!
//! Time sources behind the [`Clock`] port:
//!
//! - [`SystemClock`]: wall-clock time for live trading
//! - [`ManualClock`]: time that only moves when told to, for tests that
//!   need deterministic timestamps or a trading-day rollover
//!
//! ## Usage
//!
//! ```ignore
//! use meridian_clock::{ManualClock, Clock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(start);
//! clock.advance(Duration::days(1)); // next trading day
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use meridian_ports::Clock;
