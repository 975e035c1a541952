#![doc = include_str!("../README.md")]

mod clock;
mod config;
pub mod counters;
mod error;
mod limiter;
mod message;
mod pool;
mod queue;
mod reporter;
mod runner;
mod signal;
mod sink;

pub use crate::clock::*;
pub use crate::config::*;
pub use crate::counters::{CounterRegistry, Snapshot};
pub use crate::error::*;
pub use crate::limiter::*;
pub use crate::message::*;
pub use crate::pool::*;
pub use crate::queue::*;
pub use crate::reporter::*;
pub use crate::runner::*;
pub use crate::signal::*;
pub use crate::sink::*;
