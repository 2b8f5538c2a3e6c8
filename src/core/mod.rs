// src/core/mod.rs

// The `core` module holds everything that talks to the Cymulate API or to the
// export directory. The binary entry point only wires configuration into it.

/// Data types shared across the pipeline: modules, environments, date
/// ranges and the metadata stamped onto every saved payload.
pub mod models;

/// The error type of every fallible pipeline step.
pub mod error;

/// Request authentication for the Cymulate API.
pub mod auth;

/// Endpoint paths, the `ApiSource` seam and its reqwest implementation.
pub mod api;

/// Export directory layout, directory lifecycle and JSON file helpers.
pub mod storage;

/// The per-module collection pipeline: histories, assessment reports,
/// unification and the fan-out pool driving them.
pub mod collector;
