//! Rider-side ride request and assignment workflow for the campus ride-hailing client.
//!
//! The crate owns the state-transition logic behind the rider screens: address suggestions,
//! ride submission and classification, live ride tracking, and password-policy validation.
//! Screens, maps, and credential storage stay outside and talk to it through the ports in
//! [`workflows::ride::ports`].

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
