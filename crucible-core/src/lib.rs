//! Crucible Core
//!
//! Core types and abstractions for the Crucible pipeline backend.
//!
//! This crate contains:
//! - Domain types: Core business entities (Task, PipelineRun, Artifact, etc.)
//! - DTOs: Commands and result shapes exchanged with the API layer
//! - Credits: fixed-point money type used for cost estimates and balances

pub mod credits;
pub mod domain;
pub mod dto;

pub use credits::Credits;
