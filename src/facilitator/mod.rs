//! The facilitator: the only process holding the relayer key. Exposes
//! verify/settle/health/demo-ai over a loopback-only HTTP server.

pub mod config;
pub mod core;
pub mod demo;
pub mod http;

pub use config::{FacilitatorArgs, FacilitatorConfig};
pub use core::FacilitatorCore;
