//! LLM provider implementations for gavel.
//!
//! All providers implement the `gavel_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
