//! Spool Core - Foundational types for the rope-winding simulation
//!
//! This crate provides the types every other spool crate depends on:
//! - `Vec3` - Spatial vector with `{x, y, z}` wire form
//! - `ParticleHandle` - Stable arena handle for chain particles
//! - `CoilerProfile`, `ProfileCatalog`, `SimSettings` - TOML configuration
//! - `spline` - Cardinal curve sampling and parallel-transport frames
//! - Error types and Result alias

mod config;
mod error;
mod handle;
mod profile;
pub mod spline;
mod types;

pub use config::SimSettings;
pub use error::{Result, SpoolError};
pub use handle::ParticleHandle;
pub use profile::{CoilerProfile, ProfileCatalog};
pub use types::Vec3;
