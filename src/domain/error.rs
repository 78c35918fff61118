use std::time::Duration;

use thiserror::Error;

use crate::domain::formats::{OutputKind, TypesetFormat};

/// Category of a conversion failure. Every fallible step of the pipeline
/// reports through this taxonomy; nothing else escapes to the transport
/// layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionErrorKind {
    InvalidInput,
    InvalidOutput,
    EmptySource,
    UnsupportedPair,
    NotAcceptable,
    ValidationFailed,
    EngineFailure,
}

impl ConversionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidOutput => "invalid_output",
            Self::EmptySource => "empty_source",
            Self::UnsupportedPair => "unsupported_pair",
            Self::NotAcceptable => "not_acceptable",
            Self::ValidationFailed => "validation_failed",
            Self::EngineFailure => "engine_failure",
        }
    }
}

/// Tagged conversion failure with an HTTP status hint. `message` is safe to
/// show to the caller; `detail` is internal diagnostics surfaced only in
/// logs.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConversionError {
    kind: ConversionErrorKind,
    message: String,
    detail: Option<String>,
    status_hint: u16,
}

impl ConversionError {
    pub fn invalid_input(token: &str) -> Self {
        Self {
            kind: ConversionErrorKind::InvalidInput,
            message: format!("Invalid input: {token}"),
            detail: None,
            status_hint: 400,
        }
    }

    pub fn invalid_output(token: &str) -> Self {
        Self {
            kind: ConversionErrorKind::InvalidOutput,
            message: format!("Invalid output: {token}"),
            detail: None,
            status_hint: 400,
        }
    }

    pub fn empty_source() -> Self {
        Self {
            kind: ConversionErrorKind::EmptySource,
            message: "Missing or empty source".to_string(),
            detail: None,
            status_hint: 400,
        }
    }

    pub fn unsupported_pair(format: TypesetFormat, output: OutputKind) -> Self {
        Self {
            kind: ConversionErrorKind::UnsupportedPair,
            message: format!(
                "Unsupported conversion: {} to {}",
                format.as_str(),
                output.as_str()
            ),
            detail: None,
            status_hint: 400,
        }
    }

    /// The configured engine only takes process-wide configuration, so a
    /// per-request override cannot be honored and must not be applied by
    /// mutating shared state.
    pub fn unsupported_config() -> Self {
        Self {
            kind: ConversionErrorKind::UnsupportedPair,
            message: "Per-request engine configuration is not supported by the configured engine"
                .to_string(),
            detail: None,
            status_hint: 400,
        }
    }

    pub fn not_acceptable() -> Self {
        Self {
            kind: ConversionErrorKind::NotAcceptable,
            message: "Not acceptable".to_string(),
            detail: None,
            status_hint: 406,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ConversionErrorKind::ValidationFailed,
            message: message.into(),
            detail: None,
            status_hint: 400,
        }
    }

    pub fn invalid_mathml(diagnostic: &str) -> Self {
        Self::validation(format!("Invalid MathML: {}", collapse_newlines(diagnostic)))
    }

    /// Lexical or syntax defect reported by the engine about the source
    /// itself.
    pub fn invalid_source(diagnostic: &str) -> Self {
        Self::validation(format!("Invalid source: {}", collapse_newlines(diagnostic)))
    }

    /// Engine-side fault. The caller sees a generic message; the diagnostic
    /// stays in the logs.
    pub fn engine(detail: impl Into<String>) -> Self {
        Self {
            kind: ConversionErrorKind::EngineFailure,
            message: "Internal server error".to_string(),
            detail: Some(detail.into()),
            status_hint: 500,
        }
    }

    pub fn engine_timeout(limit: Duration) -> Self {
        Self {
            kind: ConversionErrorKind::EngineFailure,
            message: "Conversion timed out".to_string(),
            detail: Some(format!(
                "typesetting engine did not answer within {}s",
                limit.as_secs()
            )),
            status_hint: 504,
        }
    }

    pub fn kind(&self) -> ConversionErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_hint(&self) -> u16 {
        self.status_hint
    }

    /// Best diagnostic available for logging: the internal detail when one
    /// exists, the public message otherwise.
    pub fn log_detail(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.message)
    }
}

/// Engine diagnostics may span lines; responses carry them on one.
pub(crate) fn collapse_newlines(text: &str) -> String {
    text.split(['\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
