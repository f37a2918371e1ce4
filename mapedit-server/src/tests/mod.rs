//! Shared test harness modules for the map editor server.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected configuration outcomes"
)]

use super::*;

mod unit;
