//! LLM Provider implementations for Minerva.
//!
//! All providers implement the `minerva_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use minerva_config::AppConfig;
use minerva_core::error::ProviderError;

/// Build the provider described by the configuration.
pub fn build_from_config(config: &AppConfig) -> Result<OpenAiCompatProvider, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key: set api_key in ~/.minerva/config.toml or MINERVA_API_KEY".into(),
        )
    })?;
    OpenAiCompatProvider::new("openai", config.api_url.clone(), api_key)
}
