//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store transitions into use-case level APIs.
//! - Keep hosts decoupled from the save transport.

pub mod save_service;
