//! Admin and control-plane HTTP API

pub mod http;

pub use http::{serve, AdminApi};
