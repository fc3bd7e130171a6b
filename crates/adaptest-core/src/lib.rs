//! adaptest-core: Computerized adaptive testing engine.
//!
//! This crate defines the 3PL response model, maximum-likelihood ability
//! estimation, maximum-information item selection, the stopping rule, and
//! the session orchestrator that composes them over injected storage.

pub mod balance;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod irt;
pub mod model;
pub mod parser;
pub mod report;
pub mod selector;
pub mod simulation;
pub mod statistics;
pub mod termination;
pub mod traits;
