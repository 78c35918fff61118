use async_trait::async_trait;
use katex::{OptsBuilder, OutputType};

use super::{EngineCapabilities, EngineFault, TypesetArtifacts, TypesetEngine, TypesetJob};
use crate::domain::formats::TypesetFormat;

/// In-process engine backed by KaTeX: TeX input only, MathML output only.
/// Useful for deployments that want MathML conversion without running a
/// sidecar. Rendering happens on the blocking pool because KaTeX evaluates
/// synchronously inside an embedded JS engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct KatexEngine;

#[async_trait]
impl TypesetEngine for KatexEngine {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            mathml: true,
            svg: false,
            mathml_input: false,
            // KaTeX options are built per call, but arbitrary MathJax-style
            // configuration maps do not translate to them.
            request_config: false,
        }
    }

    async fn typeset(&self, job: TypesetJob) -> Result<TypesetArtifacts, EngineFault> {
        if job.format == TypesetFormat::Mathml {
            return Err(EngineFault::Failed(
                "KaTeX cannot read MathML sources".to_string(),
            ));
        }

        let display_mode = job.format == TypesetFormat::Tex;
        let source = job.source;
        let mathml =
            tokio::task::spawn_blocking(move || render_mathml(&source, display_mode))
                .await
                .map_err(|err| EngineFault::Failed(format!("render task aborted: {err}")))??;

        Ok(TypesetArtifacts {
            mathml: Some(mathml),
            ..Default::default()
        })
    }
}

fn render_mathml(source: &str, display_mode: bool) -> Result<String, EngineFault> {
    let mut builder = OptsBuilder::default();
    builder.display_mode(display_mode);
    builder.output_type(OutputType::Mathml);

    let opts = builder
        .build()
        .map_err(|err| EngineFault::Failed(format!("failed to build KaTeX options: {err}")))?;

    let rendered = katex::render_with_opts(source, opts).map_err(|err| {
        let message = err.to_string();
        if message.contains("parse error") {
            EngineFault::Rejected {
                diagnostics: vec![message],
            }
        } else {
            EngineFault::Failed(message)
        }
    })?;

    extract_math(&rendered)
        .map(str::to_string)
        .ok_or(EngineFault::MissingArtifact("mathml"))
}

/// KaTeX wraps its MathML in a `<span class="katex">` shell; peel the
/// `<math>` element out of it.
fn extract_math(html: &str) -> Option<&str> {
    let start = html.find("<math")?;
    let end = html[start..].find("</math>")? + "</math>".len();
    html.get(start..start + end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_tex_to_a_math_element() {
        let mathml = render_mathml(r"e^{i \pi} + 1 = 0", true).expect("valid TeX");
        assert!(mathml.starts_with("<math"));
        assert!(mathml.ends_with("</math>"));
    }

    #[test]
    fn parse_errors_are_rejections() {
        let fault = render_mathml(r"\frac{", true).expect_err("unbalanced TeX");
        assert!(matches!(fault, EngineFault::Rejected { .. }));
    }

    #[test]
    fn math_element_is_peeled_from_the_span_shell() {
        let html = r#"<span class="katex"><math xmlns="http://www.w3.org/1998/Math/MathML"><mi>x</mi></math></span>"#;
        assert_eq!(
            extract_math(html),
            Some(r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mi>x</mi></math>"#)
        );
        assert_eq!(extract_math("<span>no math here</span>"), None);
    }
}
