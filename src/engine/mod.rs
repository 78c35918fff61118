//! The typesetting engine seam. The conversion pipeline only ever talks to
//! [`TypesetEngine`]; which concrete engine sits behind it is a deployment
//! decision (`[engine] mode` in the configuration).

pub mod katex;
pub mod raster;
pub mod remote;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::error::ConversionError;
use crate::domain::formats::TypesetFormat;

/// Artifacts one dispatch plan needs from a single engine call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WantedArtifacts {
    pub mathml: bool,
    pub svg: bool,
}

/// One typesetting call. `config` is the request-scoped engine
/// configuration, already merged over the process-wide defaults; engines
/// must treat it as an argument of this call only and never store it.
#[derive(Debug, Clone)]
pub struct TypesetJob {
    pub source: String,
    pub format: TypesetFormat,
    pub want: WantedArtifacts,
    pub config: Option<Map<String, Value>>,
}

/// What an engine call produced. `png` is an inline data URL some engines
/// return alongside or instead of the SVG.
#[derive(Debug, Clone, Default)]
pub struct TypesetArtifacts {
    pub mathml: Option<String>,
    pub svg: Option<String>,
    pub png: Option<String>,
}

/// What a concrete engine can do. The dispatcher refuses plans outside of
/// it before any I/O happens.
#[derive(Debug, Clone, Copy)]
pub struct EngineCapabilities {
    /// Can produce MathML output.
    pub mathml: bool,
    /// Can produce SVG output (and therefore PNG via rasterization).
    pub svg: bool,
    /// Can read MathML sources, not just TeX.
    pub mathml_input: bool,
    /// Accepts configuration per call. Engines without this reject
    /// per-request overrides instead of racing on shared settings.
    pub request_config: bool,
}

#[derive(Debug, Error)]
pub enum EngineFault {
    /// The engine rejected the source itself (lexical or syntax defects).
    #[error("invalid source: {}", .diagnostics.join("; "))]
    Rejected { diagnostics: Vec<String> },
    /// The engine ran but failed for a reason it described.
    #[error("{0}")]
    Failed(String),
    /// The engine could not be reached at all.
    #[error("typesetting engine unreachable: {0}")]
    Unreachable(String),
    /// The engine answered without the artifact the plan required.
    #[error("engine response is missing the {0} artifact")]
    MissingArtifact(&'static str),
}

#[async_trait]
pub trait TypesetEngine: Send + Sync {
    fn capabilities(&self) -> EngineCapabilities;

    async fn typeset(&self, job: TypesetJob) -> Result<TypesetArtifacts, EngineFault>;
}

impl From<EngineFault> for ConversionError {
    fn from(fault: EngineFault) -> Self {
        match fault {
            EngineFault::Rejected { diagnostics } => ConversionError::invalid_source(
                diagnostics
                    .first()
                    .map(String::as_str)
                    .unwrap_or("unspecified error"),
            ),
            other => ConversionError::engine(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ConversionErrorKind;

    #[test]
    fn rejections_become_client_errors() {
        let fault = EngineFault::Rejected {
            diagnostics: vec!["Missing close brace\nat end of input".to_string()],
        };
        let error = ConversionError::from(fault);
        assert_eq!(error.kind(), ConversionErrorKind::ValidationFailed);
        assert_eq!(
            error.message(),
            "Invalid source: Missing close brace at end of input"
        );
        assert_eq!(error.status_hint(), 400);
    }

    #[test]
    fn other_faults_become_opaque_engine_failures() {
        for fault in [
            EngineFault::Failed("renderer crashed".to_string()),
            EngineFault::Unreachable("connection refused".to_string()),
            EngineFault::MissingArtifact("svg"),
        ] {
            let error = ConversionError::from(fault);
            assert_eq!(error.kind(), ConversionErrorKind::EngineFailure);
            assert_eq!(error.message(), "Internal server error");
            assert_eq!(error.status_hint(), 500);
        }
    }
}
