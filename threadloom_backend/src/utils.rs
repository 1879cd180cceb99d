//! Shared helpers and constants.

use chrono::{DateTime, SubsecRound, Utc};

pub const APP_NAME: &str = "threadloom_backend";

/// Current time at millisecond precision.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn print_banner() {
    println!("{APP_NAME} v{}", env!("CARGO_PKG_VERSION"));
}
