use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::application::convert::data_url::DataUrl;
use crate::application::convert::mathml;
use crate::domain::error::ConversionError;
use crate::domain::formats::{OutputKind, TypesetFormat};
use crate::domain::request::ConversionRequest;
use crate::engine::raster;
use crate::engine::{TypesetArtifacts, TypesetEngine, TypesetJob, WantedArtifacts};

/// Converted payload plus the content type it must be served with. PNG is
/// the only binary kind; everything else travels as UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub content_type: String,
    pub body: ConversionBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionBody {
    Text(String),
    Binary(Vec<u8>),
}

impl ConversionBody {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

/// Engine action for one (typeset format, output kind) pair. The match in
/// [`plan`] is total over both enums, so adding a format or output kind
/// without extending the table fails to compile instead of missing at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConversionPlan {
    /// MathML in, MathML out: the source passes through untouched.
    Passthrough,
    /// One engine call producing MathML.
    Mathml,
    /// One engine call producing SVG.
    Svg,
    /// Engine SVG, then the assistive markup is split into its own field.
    SvgAssistive,
    /// Engine SVG, then rasterized to PNG (unless the engine already
    /// returned an inline image).
    SvgRaster,
}

fn plan(format: TypesetFormat, output: OutputKind) -> ConversionPlan {
    use TypesetFormat::{InlineTex, Mathml, Tex};

    match (format, output) {
        (Tex | InlineTex, OutputKind::Mathml) => ConversionPlan::Mathml,
        (Tex | InlineTex, OutputKind::Svg) => ConversionPlan::Svg,
        (Tex | InlineTex, OutputKind::AssistiveSvg) => ConversionPlan::SvgAssistive,
        (Tex | InlineTex, OutputKind::Png) => ConversionPlan::SvgRaster,
        (Mathml, OutputKind::Mathml) => ConversionPlan::Passthrough,
        (Mathml, OutputKind::Svg) => ConversionPlan::Svg,
        (Mathml, OutputKind::AssistiveSvg) => ConversionPlan::SvgAssistive,
        (Mathml, OutputKind::Png) => ConversionPlan::SvgRaster,
    }
}

/// Orchestrates one conversion end to end. Owns the engine handle and the
/// process-wide engine defaults; per-request overrides are merged into a
/// request-scoped copy and never written back.
pub struct ConvertService {
    engine: Arc<dyn TypesetEngine>,
    defaults: Map<String, Value>,
    timeout: Duration,
    max_raster_dimension: u32,
}

impl ConvertService {
    pub fn new(
        engine: Arc<dyn TypesetEngine>,
        defaults: Map<String, Value>,
        timeout: Duration,
        max_raster_dimension: u32,
    ) -> Self {
        Self {
            engine,
            defaults,
            timeout,
            max_raster_dimension,
        }
    }

    pub async fn convert(&self, request: &ConversionRequest) -> Result<Conversion, ConversionError> {
        let started = Instant::now();
        let result = self.dispatch(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(conversion) => {
                counter!("teorema_convert_total", "output" => request.output().as_str())
                    .increment(1);
                let bytes = match &conversion.body {
                    ConversionBody::Text(text) => text.len(),
                    ConversionBody::Binary(bytes) => bytes.len(),
                };
                info!(
                    target: "teorema::convert",
                    op = "convert",
                    result = "ok",
                    input = request.input().as_str(),
                    output = request.output().as_str(),
                    elapsed_ms = elapsed_ms,
                    bytes = bytes,
                    "conversion complete"
                );
            }
            Err(error) => {
                counter!("teorema_convert_errors_total", "kind" => error.kind().as_str())
                    .increment(1);
                warn!(
                    target: "teorema::convert",
                    op = "convert",
                    result = "error",
                    input = request.input().as_str(),
                    output = request.output().as_str(),
                    elapsed_ms = elapsed_ms,
                    kind = error.kind().as_str(),
                    detail = error.log_detail(),
                    "conversion failed"
                );
            }
        }

        result
    }

    async fn dispatch(&self, request: &ConversionRequest) -> Result<Conversion, ConversionError> {
        let format = request.typeset_format();
        let plan = plan(format, request.output());

        if plan == ConversionPlan::Passthrough {
            return Ok(text(OutputKind::Mathml, request.source().to_string()));
        }

        self.check_capabilities(format, plan, request)?;

        if format == TypesetFormat::Mathml {
            mathml::validate(request.source())?;
        }

        match plan {
            ConversionPlan::Passthrough => unreachable!("handled before dispatch"),
            ConversionPlan::Mathml => {
                let artifacts = self
                    .typeset(request, WantedArtifacts { mathml: true, svg: false })
                    .await?;
                let mathml = require(artifacts.mathml, "mathml")?;
                Ok(text(OutputKind::Mathml, mathml))
            }
            ConversionPlan::Svg => {
                let artifacts = self
                    .typeset(request, WantedArtifacts { mathml: false, svg: true })
                    .await?;
                let svg = require(artifacts.svg, "svg")?;
                Ok(text(OutputKind::Svg, svg))
            }
            ConversionPlan::SvgAssistive => {
                let artifacts = self
                    .typeset(request, WantedArtifacts { mathml: false, svg: true })
                    .await?;
                let svg = require(artifacts.svg, "svg")?;
                let (svg, assistive) = split_assistive(&svg);
                let bundle = json!({ "svg": svg, "assistiveML": assistive });
                Ok(text(OutputKind::AssistiveSvg, bundle.to_string()))
            }
            ConversionPlan::SvgRaster => {
                self.check_raster_bounds(request)?;
                let artifacts = self
                    .typeset(request, WantedArtifacts { mathml: false, svg: true })
                    .await?;
                self.materialize_png(request, artifacts).await
            }
        }
    }

    /// Refuse plans the configured engine cannot execute, before any I/O.
    fn check_capabilities(
        &self,
        format: TypesetFormat,
        plan: ConversionPlan,
        request: &ConversionRequest,
    ) -> Result<(), ConversionError> {
        let capabilities = self.engine.capabilities();

        if format == TypesetFormat::Mathml && !capabilities.mathml_input {
            return Err(ConversionError::unsupported_pair(format, request.output()));
        }
        let needs_svg = matches!(
            plan,
            ConversionPlan::Svg | ConversionPlan::SvgAssistive | ConversionPlan::SvgRaster
        );
        if needs_svg && !capabilities.svg {
            return Err(ConversionError::unsupported_pair(format, request.output()));
        }
        if !needs_svg && !capabilities.mathml {
            return Err(ConversionError::unsupported_pair(format, request.output()));
        }
        if request.config().is_some() && !capabilities.request_config {
            return Err(ConversionError::unsupported_config());
        }

        Ok(())
    }

    /// Requested raster dimensions must stay within the configured cap.
    fn check_raster_bounds(&self, request: &ConversionRequest) -> Result<(), ConversionError> {
        for (value, field) in [(request.width(), "width"), (request.height(), "height")] {
            if let Some(value) = value {
                if value > self.max_raster_dimension {
                    return Err(ConversionError::validation(format!(
                        "Invalid {field}: exceeds the maximum of {} pixels",
                        self.max_raster_dimension
                    )));
                }
            }
        }
        Ok(())
    }

    async fn typeset(
        &self,
        request: &ConversionRequest,
        want: WantedArtifacts,
    ) -> Result<TypesetArtifacts, ConversionError> {
        let job = TypesetJob {
            source: request.source().to_string(),
            format: request.typeset_format(),
            want,
            config: self.merged_config(request.config()),
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.engine.typeset(job)).await;
        histogram!("teorema_engine_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(result) => result.map_err(ConversionError::from),
            Err(_) => Err(ConversionError::engine_timeout(self.timeout)),
        }
    }

    /// Build the request-scoped engine configuration: start from the
    /// process-wide defaults and let the request's keys win. The defaults
    /// themselves are never touched.
    fn merged_config(&self, overrides: Option<&Map<String, Value>>) -> Option<Map<String, Value>> {
        match overrides {
            None => (!self.defaults.is_empty()).then(|| self.defaults.clone()),
            Some(overrides) => {
                let mut merged = self.defaults.clone();
                for (key, value) in overrides {
                    merged.insert(key.clone(), value.clone());
                }
                Some(merged)
            }
        }
    }

    /// PNG output: prefer an inline image the engine already produced,
    /// otherwise rasterize the SVG locally.
    async fn materialize_png(
        &self,
        request: &ConversionRequest,
        artifacts: TypesetArtifacts,
    ) -> Result<Conversion, ConversionError> {
        if let Some(raw) = artifacts.png {
            let parsed = DataUrl::parse(&raw).map_err(|err| {
                ConversionError::engine(format!("engine returned an invalid data URL: {err}"))
            })?;
            let bytes = parsed.decode().map_err(|err| {
                ConversionError::engine(format!("engine returned an undecodable image: {err}"))
            })?;
            let content_type = parsed
                .media_type
                .unwrap_or_else(|| OutputKind::Png.content_type().to_string());
            return Ok(Conversion {
                content_type,
                body: ConversionBody::Binary(bytes),
            });
        }

        let svg = require(artifacts.svg, "svg")?;
        let (width, height) = (request.width(), request.height());
        let bytes = tokio::task::spawn_blocking(move || raster::rasterize(&svg, width, height))
            .await
            .map_err(|err| ConversionError::engine(format!("rasterization task aborted: {err}")))?
            .map_err(|err| ConversionError::engine(err.to_string()))?;

        Ok(Conversion {
            content_type: OutputKind::Png.content_type().to_string(),
            body: ConversionBody::Binary(bytes),
        })
    }
}

fn text(kind: OutputKind, payload: String) -> Conversion {
    Conversion {
        content_type: kind.content_type().to_string(),
        body: ConversionBody::Text(payload),
    }
}

fn require(artifact: Option<String>, name: &'static str) -> Result<String, ConversionError> {
    artifact.ok_or_else(|| {
        ConversionError::engine(format!("engine response is missing the {name} artifact"))
    })
}

/// MathJax embeds the screen-reader MathML inside the rendered SVG; peel it
/// into its own field for the assistive bundle. Absent markup yields `None`
/// rather than failing the conversion.
fn split_assistive(svg: &str) -> (String, Option<String>) {
    let Some(start) = svg.find("<mjx-assistive-mml") else {
        return (svg.to_string(), None);
    };
    let close = "</mjx-assistive-mml>";
    let Some(offset) = svg[start..].find(close) else {
        return (svg.to_string(), None);
    };
    let end = start + offset + close.len();

    let mut stripped = String::with_capacity(svg.len() - (end - start));
    stripped.push_str(&svg[..start]);
    stripped.push_str(&svg[end..]);
    (stripped, Some(svg[start..end].to_string()))
}

// The dispatch table itself is pure; everything engine-facing is covered by
// the integration tests with stub engines.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_mathml_to_mathml_passes_through() {
        assert_eq!(
            plan(TypesetFormat::Mathml, OutputKind::Mathml),
            ConversionPlan::Passthrough
        );
        for format in [TypesetFormat::Tex, TypesetFormat::InlineTex] {
            assert_eq!(plan(format, OutputKind::Mathml), ConversionPlan::Mathml);
        }
    }

    #[test]
    fn png_always_goes_through_the_svg_intermediate() {
        for format in [
            TypesetFormat::Tex,
            TypesetFormat::InlineTex,
            TypesetFormat::Mathml,
        ] {
            assert_eq!(plan(format, OutputKind::Png), ConversionPlan::SvgRaster);
        }
    }

    #[test]
    fn assistive_markup_is_split_out() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><g/><mjx-assistive-mml role="presentation"><math><mi>x</mi></math></mjx-assistive-mml></svg>"#;
        let (stripped, assistive) = split_assistive(svg);
        assert_eq!(
            stripped,
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g/></svg>"#
        );
        let assistive = assistive.expect("assistive markup present");
        assert!(assistive.starts_with("<mjx-assistive-mml"));
        assert!(assistive.ends_with("</mjx-assistive-mml>"));
    }

    #[test]
    fn svg_without_assistive_markup_is_untouched() {
        let svg = "<svg><g/></svg>";
        let (stripped, assistive) = split_assistive(svg);
        assert_eq!(stripped, svg);
        assert!(assistive.is_none());
    }
}
