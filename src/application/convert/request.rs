use serde::Deserialize;
use serde_json::{Map, Value};

use crate::application::convert::negotiate::negotiate;
use crate::domain::error::ConversionError;
use crate::domain::formats::{OutputKind, SourceKind};
use crate::domain::request::ConversionRequest;

/// Query-string shape of a conversion request. Everything arrives as text
/// and is coerced here; `type` is the spelling older clients use for
/// `input`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryParams {
    #[serde(alias = "type")]
    pub input: Option<String>,
    pub inline: Option<String>,
    pub source: Option<String>,
    pub output: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

impl QueryParams {
    /// Coerce the decoded query parameters into the canonical request.
    /// `accept` supplies the output kind when the `output` parameter is
    /// absent.
    pub fn into_request(self, accept: Option<&str>) -> Result<ConversionRequest, ConversionError> {
        let width = parse_dimension(self.width, "width")?;
        let height = parse_dimension(self.height, "height")?;
        build(
            self.input,
            matches!(self.inline.as_deref(), Some("1")),
            self.source,
            self.output,
            width,
            height,
            None,
            accept,
        )
    }
}

/// JSON body shape of a conversion request.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BodyParams {
    #[serde(alias = "type")]
    pub input: Option<String>,
    pub inline: Option<bool>,
    pub source: Option<String>,
    pub output: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub config: Option<Map<String, Value>>,
}

impl BodyParams {
    /// Strictly parse a JSON request body. Anything undecodable is a
    /// validation failure, not a transport error.
    pub fn parse(body: &[u8]) -> Result<Self, ConversionError> {
        serde_json::from_slice(body)
            .map_err(|err| ConversionError::validation(format!("Invalid JSON body: {err}")))
    }

    pub fn into_request(self, accept: Option<&str>) -> Result<ConversionRequest, ConversionError> {
        let width = check_dimension(self.width, "width")?;
        let height = check_dimension(self.height, "height")?;
        build(
            self.input,
            self.inline.unwrap_or(false),
            self.source,
            self.output,
            width,
            height,
            self.config,
            accept,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn build(
    input: Option<String>,
    inline: bool,
    source: Option<String>,
    output: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    config: Option<Map<String, Value>>,
    accept: Option<&str>,
) -> Result<ConversionRequest, ConversionError> {
    let source = source.unwrap_or_default();
    if source.trim().is_empty() {
        return Err(ConversionError::empty_source());
    }

    let input_token = input.unwrap_or_default();
    let input = SourceKind::from_token(&input_token)
        .ok_or_else(|| ConversionError::invalid_input(&input_token))?;

    let output = match output {
        Some(token) => {
            OutputKind::from_token(&token).ok_or_else(|| ConversionError::invalid_output(&token))?
        }
        None => negotiate(accept.unwrap_or_default()).ok_or_else(ConversionError::not_acceptable)?,
    };

    let mut request = ConversionRequest::new(input, source, output)?
        .with_inline(inline)
        .with_dimensions(width, height);
    if let Some(config) = config {
        request = request.with_config(config);
    }
    Ok(request)
}

fn parse_dimension(raw: Option<String>, field: &str) -> Result<Option<u32>, ConversionError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ConversionError::validation(format!(
            "Invalid {field}: {raw}"
        ))),
    }
}

fn check_dimension(value: Option<u32>, field: &str) -> Result<Option<u32>, ConversionError> {
    match value {
        Some(0) => Err(ConversionError::validation(format!(
            "Invalid {field}: must be a positive integer"
        ))),
        other => Ok(other),
    }
}
