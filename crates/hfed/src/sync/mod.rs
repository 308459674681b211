// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Synchronization-point coordination.
//!
//! A sync-point is a named federation-wide barrier. Points live in named
//! lists; lists live in a [`SyncPointManager`] that routes the four RTI
//! sync-point callbacks and provides the blocking waits the execution
//! control layer builds its initialization barriers on.
//!
//! # Lifecycle
//!
//! ```text
//! Unknown --add--> Exists --register--> Registered --announced--> Announced
//!                     \------announced (peer registered first)------^
//! Announced --achieve--> Achieved --federation synchronized--> Synchronized
//! Synchronized --reset--> Exists        (barrier consumed, recyclable)
//! any --registration failed (other)--> Error
//! ```
//!
//! Transitions outside this graph are rejected: fatal in debug builds,
//! logged and ignored in release builds.

mod list;
mod manager;
mod point;

pub use list::SyncPointList;
pub use manager::{AnnounceOutcome, SyncPointManager};
pub use point::{SyncPoint, SyncPointState};
