use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{EngineCapabilities, EngineFault, TypesetArtifacts, TypesetEngine, TypesetJob};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a MathJax-compatible sidecar typesetting service. The sidecar
/// takes the whole job (source, format, wanted artifacts, configuration) in
/// one POST, so per-request configuration is naturally call-scoped.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    client: reqwest::Client,
    url: String,
}

impl RemoteEngine {
    pub fn new(url: impl Into<String>) -> Result<Self, EngineFault> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| EngineFault::Unreachable(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    math: &'a str,
    format: &'a str,
    mml: bool,
    svg: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    mml: Option<String>,
    svg: Option<String>,
    png: Option<String>,
    errors: Option<Vec<String>>,
}

#[async_trait]
impl TypesetEngine for RemoteEngine {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            mathml: true,
            svg: true,
            mathml_input: true,
            request_config: true,
        }
    }

    async fn typeset(&self, job: TypesetJob) -> Result<TypesetArtifacts, EngineFault> {
        let request = WireRequest {
            math: &job.source,
            format: job.format.as_str(),
            mml: job.want.mathml,
            svg: job.want.svg,
            config: job.config.as_ref(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|err| EngineFault::Unreachable(err.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| EngineFault::Failed(format!("undecodable engine response: {err}")))?;

        if !status.is_success() {
            debug!(
                target: "teorema::engine",
                op = "typeset",
                status = status.as_u16(),
                "engine reported a failure"
            );
            return Err(classify_failure(body));
        }

        let decoded: WireResponse = serde_json::from_value(body)
            .map_err(|err| EngineFault::Failed(format!("unexpected engine response shape: {err}")))?;

        if let Some(errors) = decoded.errors {
            if !errors.is_empty() {
                return Err(EngineFault::Rejected { diagnostics: errors });
            }
        }

        Ok(TypesetArtifacts {
            mathml: decoded.mml,
            svg: decoded.svg,
            png: decoded.png,
        })
    }
}

/// The sidecar reports failures in several shapes: a bare JSON string, an
/// array whose first element is the lexical diagnostic, or an object with
/// either an `errors` array or a `message`. Every shape funnels through
/// here; nothing else in the crate interprets engine failures.
fn classify_failure(body: Value) -> EngineFault {
    match body {
        Value::String(text) => EngineFault::Failed(text),
        Value::Array(items) => match items.first() {
            Some(Value::String(_)) => EngineFault::Rejected {
                diagnostics: items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            },
            _ => EngineFault::Failed("typesetting failed".to_string()),
        },
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("errors") {
                let diagnostics: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect();
                if !diagnostics.is_empty() {
                    return EngineFault::Rejected { diagnostics };
                }
            }
            if let Some(Value::String(message)) = map.get("message") {
                return EngineFault::Failed(message.clone());
            }
            EngineFault::Failed("typesetting failed".to_string())
        }
        _ => EngineFault::Failed("typesetting failed".to_string()),
    }
}
