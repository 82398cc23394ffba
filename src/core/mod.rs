//! Core library modules for tripfare
//!
//! Leaves first: classification and pricing are pure, the engine talks to
//! providers, the controller owns trip state, persistence keeps it across runs.

pub mod config;
pub mod congestion;
pub mod controller;
pub mod customer;
pub mod engine;
pub mod error;
pub mod fare;
pub mod http;
pub mod location;
pub mod persistence;
pub mod provider;
pub mod search;

