//! # Gavel Core
//!
//! Domain types, traits, and error definitions for the gavel analysis agent.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The seams are defined as traits and closed enums here. Implementations
//! live in their respective crates. This enables:
//! - Swapping the LLM backend via configuration
//! - Easy testing with mock/stub providers
//! - Clean dependency graph (all crates depend inward on core)

pub mod action;
pub mod error;
pub mod message;
pub mod provider;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use action::{ActionDirective, ActionRunner};
pub use error::{Error, HistoryError, ProviderError, Result, StoreError};
pub use message::{ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use turn::TurnRecord;
