// src/models/mod.rs
//! Data structures shared across the engine and the API surface.

pub mod certificate;
