//! Tests for the consensus tracker.
//!
//! Tests are organized by component:
//! - `poller_tests`: Per-backend health rounds
//! - `resolver_tests`: Agreement within a class and latch handling
//! - `group_tests`: Full rounds through `BackendGroup`, fallback scenarios and the driver
//! - Unit tests for state, latch and hash majority are in their respective modules

mod support;
