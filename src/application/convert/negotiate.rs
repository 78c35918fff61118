use crate::domain::formats::OutputKind;

/// Media types the gateway can answer with when the caller leaves the
/// output kind to `Accept` negotiation. The assistive bundle is only
/// reachable through an explicit `output` field.
const SUPPORTED: &[(&str, OutputKind)] = &[
    ("application/mathml+xml", OutputKind::Mathml),
    ("image/svg+xml", OutputKind::Svg),
    ("image/png", OutputKind::Png),
];

/// Pick the supported media type with the highest `q=` weight in a single
/// pass. Strict improvement is required, so an exact tie keeps the
/// earlier-seen candidate. Returns `None` when nothing offered is
/// supported.
pub fn negotiate(header: &str) -> Option<OutputKind> {
    let mut accepted = None;
    let mut best = 0.0_f32;

    for candidate in header.split(',') {
        let mut parts = candidate.split(';');
        let media_type = parts.next().unwrap_or("").trim();
        let Some((_, kind)) = SUPPORTED.iter().find(|(name, _)| *name == media_type) else {
            continue;
        };
        let weight = match parts
            .map(str::trim)
            .find_map(|param| param.strip_prefix("q="))
        {
            Some(raw) => match raw.parse::<f32>() {
                Ok(weight) => weight,
                Err(_) => continue,
            },
            None => 1.0,
        };
        if weight > best {
            accepted = Some(*kind);
            best = weight;
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_weight_wins() {
        let kind = negotiate("application/mathml+xml;q=0.5,image/svg+xml;q=0.9");
        assert_eq!(kind, Some(OutputKind::Svg));
    }

    #[test]
    fn missing_weight_defaults_to_one() {
        let kind = negotiate("image/png;q=0.9,image/svg+xml");
        assert_eq!(kind, Some(OutputKind::Svg));
    }

    #[test]
    fn exact_ties_keep_the_first_candidate() {
        let kind = negotiate("image/png;q=0.8,image/svg+xml;q=0.8");
        assert_eq!(kind, Some(OutputKind::Png));
    }

    #[test]
    fn unsupported_media_types_are_skipped() {
        assert_eq!(negotiate("text/html,application/xhtml+xml"), None);
        assert_eq!(negotiate(""), None);
    }

    #[test]
    fn whitespace_around_candidates_is_tolerated() {
        let kind = negotiate("text/html, image/png ;q=0.4, application/mathml+xml; q=0.3");
        assert_eq!(kind, Some(OutputKind::Png));
    }

    #[test]
    fn unparsable_weights_discard_the_candidate() {
        assert_eq!(
            negotiate("image/png;q=abc,image/svg+xml;q=0.1"),
            Some(OutputKind::Svg)
        );
    }

    #[test]
    fn zero_weight_is_never_accepted() {
        assert_eq!(negotiate("image/png;q=0"), None);
    }
}
