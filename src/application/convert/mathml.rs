use roxmltree::Document;

use crate::domain::error::ConversionError;

/// Well-formedness gate applied to MathML sources before they reach the
/// engine, so structural defects come back as a 400 with the parser's
/// diagnostic instead of an opaque engine failure.
pub(crate) fn validate(source: &str) -> Result<(), ConversionError> {
    let document =
        Document::parse(source).map_err(|err| ConversionError::invalid_mathml(&err.to_string()))?;
    let root = document.root_element();
    if root.tag_name().name() != "math" {
        return Err(ConversionError::invalid_mathml(&format!(
            "expected a <math> root element, found <{}>",
            root.tag_name().name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ConversionErrorKind;

    #[test]
    fn well_formed_mathml_passes() {
        let source = r#"<math xmlns="http://www.w3.org/1998/Math/MathML" display="block"><msup><mi>x</mi><mn>2</mn></msup></math>"#;
        assert!(validate(source).is_ok());
    }

    #[test]
    fn plain_tex_is_rejected_with_prefix() {
        let error = validate("x^2").expect_err("not XML");
        assert_eq!(error.kind(), ConversionErrorKind::ValidationFailed);
        assert!(error.message().starts_with("Invalid MathML: "));
        assert!(!error.message().contains('\n'));
    }

    #[test]
    fn wrong_root_element_is_rejected() {
        let error = validate("<svg><rect/></svg>").expect_err("not MathML");
        assert!(error.message().contains("found <svg>"));
    }

    #[test]
    fn unclosed_markup_is_rejected() {
        let error = validate("<math><mi>x</math>").expect_err("mismatched tags");
        assert!(error.message().starts_with("Invalid MathML: "));
    }
}
