//! Prompt template rendering.
//!
//! Prompts may interpolate three placeholder forms:
//! - `{statement}` — the session's confirmed working statement
//! - `{last}` — the most recent accepted answer
//! - `{prior:<step_id>}` — the latest answer recorded at a named step
//!
//! Rendering is total over lint-clean catalogs: lint rejects unknown
//! placeholder names at authoring time, and a placeholder whose context
//! field is unset fails loudly with [`CatalogError::UnrenderedField`]
//! instead of leaking the raw template into the conversation.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::CatalogError;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+(?::[a-z0-9_]+)?)\}").unwrap());

/// Read-only view of the context fields prompts may interpolate.
pub trait PromptContext {
    fn statement(&self) -> Option<&str>;
    fn last_response(&self) -> Option<&str>;
    fn prior(&self, step_id: &str) -> Option<&str>;
}

/// Placeholder names appearing in a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER_REGEX
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Render a step's prompt template against the current context.
pub fn render(
    step_id: &str,
    template: &str,
    ctx: &dyn PromptContext,
) -> Result<String, CatalogError> {
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    for caps in PLACEHOLDER_REGEX.captures_iter(template) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let name = &caps[1];
        out.push_str(&template[cursor..whole.start()]);
        out.push_str(&resolve(step_id, name, ctx)?);
        cursor = whole.end();
    }
    out.push_str(&template[cursor..]);
    Ok(out)
}

fn resolve<'a>(
    step_id: &str,
    name: &str,
    ctx: &'a dyn PromptContext,
) -> Result<&'a str, CatalogError> {
    let unrendered = || CatalogError::UnrenderedField {
        step: step_id.to_string(),
        placeholder: name.to_string(),
    };
    match name {
        "statement" => ctx.statement().ok_or_else(unrendered),
        "last" => ctx.last_response().ok_or_else(unrendered),
        _ => match name.strip_prefix("prior:") {
            Some(prior_step) => ctx.prior(prior_step).ok_or_else(unrendered),
            None => Err(CatalogError::UnknownPlaceholder {
                step: step_id.to_string(),
                placeholder: name.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeContext {
        statement: Option<String>,
        last: Option<String>,
        priors: HashMap<String, String>,
    }

    impl FakeContext {
        fn new() -> Self {
            Self {
                statement: Some("I freeze up in meetings".to_string()),
                last: Some("a tight knot".to_string()),
                priors: HashMap::from([("desired_feeling".to_string(), "calm".to_string())]),
            }
        }
    }

    impl PromptContext for FakeContext {
        fn statement(&self) -> Option<&str> {
            self.statement.as_deref()
        }

        fn last_response(&self) -> Option<&str> {
            self.last.as_deref()
        }

        fn prior(&self, step_id: &str) -> Option<&str> {
            self.priors.get(step_id).map(String::as_str)
        }
    }

    #[test]
    fn test_render_interpolates_statement() {
        let out = render(
            "body_sense",
            "Feel the problem '{statement}'. What does it feel like?",
            &FakeContext::new(),
        )
        .unwrap();
        assert_eq!(
            out,
            "Feel the problem 'I freeze up in meetings'. What does it feel like?"
        );
    }

    #[test]
    fn test_render_interpolates_last_and_prior() {
        let out = render(
            "x",
            "Feel '{last}'. What would '{prior:desired_feeling}' feel like?",
            &FakeContext::new(),
        )
        .unwrap();
        assert_eq!(out, "Feel 'a tight knot'. What would 'calm' feel like?");
    }

    #[test]
    fn test_render_repeats_same_placeholder() {
        let out = render("x", "Feel '{last}'... keep feeling '{last}'.", &FakeContext::new())
            .unwrap();
        assert_eq!(out, "Feel 'a tight knot'... keep feeling 'a tight knot'.");
    }

    #[test]
    fn test_render_passes_plain_text_through() {
        let out = render("x", "What would you rather feel?", &FakeContext::new()).unwrap();
        assert_eq!(out, "What would you rather feel?");
    }

    #[test]
    fn test_render_fails_loudly_on_unset_statement() {
        let mut ctx = FakeContext::new();
        ctx.statement = None;
        let err = render("body_sense", "Feel '{statement}'.", &ctx).unwrap_err();
        match err {
            CatalogError::UnrenderedField { step, placeholder } => {
                assert_eq!(step, "body_sense");
                assert_eq!(placeholder, "statement");
            }
            other => panic!("Expected UnrenderedField, got {other:?}"),
        }
    }

    #[test]
    fn test_render_fails_on_missing_prior() {
        let err = render("x", "Feel '{prior:never_asked}'.", &FakeContext::new()).unwrap_err();
        assert!(matches!(err, CatalogError::UnrenderedField { .. }));
    }

    #[test]
    fn test_render_rejects_unknown_placeholder_name() {
        let err = render("x", "Feel '{statment}'.", &FakeContext::new()).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownPlaceholder { .. }));
    }

    #[test]
    fn test_placeholders_scan() {
        let found = placeholders("Feel '{statement}' and '{last}' and '{prior:goal_feeling}'.");
        assert_eq!(found, vec!["statement", "last", "prior:goal_feeling"]);
    }

    #[test]
    fn test_placeholders_empty_for_plain_text() {
        assert!(placeholders("What would you rather feel?").is_empty());
    }
}
