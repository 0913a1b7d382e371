//! Text-generation provider seam.
//!
//! Some templates want machine-written descriptions or summaries. That
//! capability lives behind [`TextProvider`] so the pipeline never depends
//! on a concrete backend, and the rename/metadata path never calls it at
//! all — a provider outage cannot affect filename or index consistency.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("generation request failed: {0}")]
    Request(String),
}

/// Knobs a caller may pass through to the backend. All optional; a
/// provider applies its own defaults for anything unset.
#[derive(Debug, Clone, Default)]
pub struct TextOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// A source of generated text.
pub trait TextProvider {
    fn generate_text(&self, prompt: &str, options: &TextOptions) -> Result<String, ProviderError>;
}

/// Provider that returns a fixed string. Used in tests and as the
/// offline default.
pub struct StaticProvider {
    text: String,
}

impl StaticProvider {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextProvider for StaticProvider {
    fn generate_text(&self, _prompt: &str, _options: &TextOptions) -> Result<String, ProviderError> {
        Ok(self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_returns_fixed_text() {
        let provider = StaticProvider::new("a summary");
        let out = provider
            .generate_text("ignored", &TextOptions::default())
            .unwrap();
        assert_eq!(out, "a summary");
    }

    #[test]
    fn providers_are_object_safe() {
        let boxed: Box<dyn TextProvider> = Box::new(StaticProvider::new("x"));
        assert!(boxed.generate_text("p", &TextOptions::default()).is_ok());
    }
}
