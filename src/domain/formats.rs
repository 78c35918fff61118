use serde::{Deserialize, Serialize};

/// Notation the caller's source text is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Latex,
    Mathml,
}

impl SourceKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "latex" => Some(Self::Latex),
            "mathml" => Some(Self::Mathml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latex => "latex",
            Self::Mathml => "mathml",
        }
    }
}

/// Engine-level input mode describing how source text should be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypesetFormat {
    Tex,
    InlineTex,
    Mathml,
}

impl TypesetFormat {
    /// Derive the typeset format from the request's source kind. The inline
    /// flag only matters for LaTeX; MathML carries its display mode inline.
    pub fn resolve(kind: SourceKind, inline: bool) -> Self {
        match kind {
            SourceKind::Mathml => Self::Mathml,
            SourceKind::Latex if inline => Self::InlineTex,
            SourceKind::Latex => Self::Tex,
        }
    }

    /// Wire name understood by MathJax-compatible engines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tex => "TeX",
            Self::InlineTex => "inline-TeX",
            Self::Mathml => "MathML",
        }
    }
}

/// Requested target representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    Mathml,
    Svg,
    Png,
    AssistiveSvg,
}

impl OutputKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "mathml" => Some(Self::Mathml),
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            // `assistiveSVG` is the spelling older clients send.
            "assistive-svg" | "assistiveSVG" => Some(Self::AssistiveSvg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mathml => "mathml",
            Self::Svg => "svg",
            Self::Png => "png",
            Self::AssistiveSvg => "assistive-svg",
        }
    }

    /// Content type declared on successful responses of this kind. The
    /// assistive bundle is a JSON object wrapping SVG and MathML parts.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Mathml => "application/mathml+xml",
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
            Self::AssistiveSvg => "application/json",
        }
    }
}
