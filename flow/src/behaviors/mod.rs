// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Built-in behaviors
//!
//! Behaviors the runtime relies on (`ErrorHandler`, `Log`) and a few generic
//! building blocks for routing and fan-in.
//!

mod balancer;
mod collector;
mod error_handler;
mod ignore;
mod log;
mod merger;
mod relay;

pub use balancer::Balancer;
pub use collector::{Collected, Collection, Collector, CollectorConfig};
pub use error_handler::ErrorHandler;
pub use ignore::Ignore;
pub use log::{Log, LogConfig};
pub use merger::{Merger, MergerConfig};
pub use relay::Relay;
