//! Core domain types
//!
//! This module contains the core domain structures used across Crucible
//! services. These types represent the fundamental business entities and are
//! shared between the engine (for execution) and the store (for persistence).

pub mod artifact;
pub mod definition;
pub mod run;
pub mod task;
