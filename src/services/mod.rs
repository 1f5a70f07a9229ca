// src/services/mod.rs
//! Business logic and API: certificate engine, batch coordination,
//! verification queries, outbound notifications and the REST surface.

pub mod api_server;
pub mod batch;
pub mod certificate_engine;
pub mod notifier;
pub mod query;
