use serde_json::{Map, Value};

use crate::domain::error::ConversionError;
use crate::domain::formats::{OutputKind, SourceKind, TypesetFormat};

/// The canonical, validated unit of work. Built once per request by the
/// normalizer (or directly by embedding callers) and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    input: SourceKind,
    inline: bool,
    source: String,
    output: OutputKind,
    width: Option<u32>,
    height: Option<u32>,
    config: Option<Map<String, Value>>,
}

impl ConversionRequest {
    pub fn new(
        input: SourceKind,
        source: impl Into<String>,
        output: OutputKind,
    ) -> Result<Self, ConversionError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(ConversionError::empty_source());
        }
        Ok(Self {
            input,
            inline: false,
            source,
            output,
            width: None,
            height: None,
            config: None,
        })
    }

    /// Select inline TeX mode. Only meaningful for LaTeX input.
    pub fn with_inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    /// Target raster dimensions. Only PNG dispatch reads them.
    pub fn with_dimensions(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Per-request engine configuration, merged over the process-wide
    /// defaults at dispatch time.
    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn input(&self) -> SourceKind {
        self.input
    }

    pub fn inline(&self) -> bool {
        self.inline
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn output(&self) -> OutputKind {
        self.output
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn config(&self) -> Option<&Map<String, Value>> {
        self.config.as_ref()
    }

    pub fn typeset_format(&self) -> TypesetFormat {
        TypesetFormat::resolve(self.input, self.inline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_source_is_rejected() {
        let error = ConversionRequest::new(SourceKind::Latex, "  \n ", OutputKind::Svg)
            .expect_err("blank source must not construct");
        assert_eq!(error.message(), "Missing or empty source");
    }

    #[test]
    fn inline_latex_resolves_to_inline_tex() {
        let request = ConversionRequest::new(SourceKind::Latex, "x^2", OutputKind::Svg)
            .expect("valid request")
            .with_inline(true);
        assert_eq!(request.typeset_format(), TypesetFormat::InlineTex);
    }
}
