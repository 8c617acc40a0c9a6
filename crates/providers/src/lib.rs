//! Model client implementations for Dossier.
//!
//! All clients implement the `dossier_core::ModelClient` trait.
//! [`build_from_config`] selects and configures the client named by the
//! application configuration.

pub mod factory;
pub mod openai_compat;

pub use factory::{build_from_config, default_base_url};
pub use openai_compat::OpenAiCompatClient;
