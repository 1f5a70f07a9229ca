// src/blockchain/mod.rs
//! Blockchain layer: RPC connection, gas policy, transaction submission and
//! event decoding for the Certificate contract.

pub mod chain_client;
pub mod events;
pub mod gas;
pub mod submitter;
