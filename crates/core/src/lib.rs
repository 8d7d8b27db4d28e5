//! Domain building blocks for the cruise pricing synchronization engine.
//!
//! Everything in this crate is pure apart from [`env`], which reads process
//! configuration. The I/O-bound crates (`db`, `transfer`, `pipeline`) build
//! on these types.

pub mod env;
pub mod error;
pub mod integrity;
pub mod line_mapping;
pub mod notification;
pub mod outcome;
pub mod pass_state;
pub mod pricing;
pub mod remote_path;
pub mod types;
