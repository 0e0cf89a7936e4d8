#![deny(warnings, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod observability;
pub mod period;
pub mod pipeline;
pub mod store;
pub mod util;
