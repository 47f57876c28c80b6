//! Tipos de erro para o cliente da API Anthropic.
//!
//! Qualquer variante que chega ao pipeline vira um `SynthesisError`; a
//! distinção aqui serve apenas para mensagens e logs mais claros.

use thiserror::Error;

/// Erros ao chamar o endpoint de mensagens da Anthropic.
#[derive(Debug, Error)]
pub enum AnthropicError {
    /// HTTP 429. `retry_after_ms` vem do cabeçalho `retry-after` (padrão 1s).
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Qualquer outro status de erro (401 chave inválida, 529 sobrecarga...).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Falha de rede ou corpo de resposta ilegível.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PipelineError};

    #[test]
    fn rate_limited_display() {
        let err = AnthropicError::RateLimited {
            retry_after_ms: 5000,
        };
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms");
    }

    #[test]
    fn every_variant_becomes_a_synthesis_failure() {
        let err = PipelineError::from(AnthropicError::ApiError {
            status: 529,
            message: "overloaded".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Synthesis);
        assert_eq!(
            err.to_string(),
            "report synthesis failed: API error (status 529): overloaded"
        );
    }
}
