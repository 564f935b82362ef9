//! Property-based tests for directive parsing

use super::*;
use proptest::prelude::*;

/// Prose that can never contain a directive keyword
fn arb_plain_text() -> impl Strategy<Value = String> {
    "[a-z ,.!?']{0,80}".prop_filter("no keywords", |s| {
        let upper = s.to_uppercase();
        !upper.contains("PASS TO")
            && !upper.contains("REDIRECT")
            && !upper.contains("END CONVERSATION")
    })
}

fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9]{0,10}"
}

proptest! {
    #[test]
    fn plain_text_is_always_respond(text in arb_plain_text()) {
        prop_assert_eq!(parse(&text), Directive::Respond { content: text.clone() });
    }

    #[test]
    fn inline_pass_extracts_target_and_content(
        before in arb_plain_text(),
        name in arb_name(),
        content in "[a-z][a-z ]{0,30}[a-z]",
    ) {
        let text = format!("{before} PASS TO {name}: {content}");
        match parse(&text) {
            Directive::Pass { target, content: parsed, inline } => {
                prop_assert_eq!(target, name.to_lowercase());
                prop_assert_eq!(parsed, content);
                prop_assert!(inline);
            }
            other => prop_assert!(false, "expected pass, got {:?}", other),
        }
    }

    #[test]
    fn pass_target_is_lowercase(name in arb_name()) {
        if let Directive::Pass { target, .. } = parse(&format!("PASS TO {name}")) {
            prop_assert_eq!(target.clone(), target.to_lowercase());
        } else {
            prop_assert!(false, "expected pass");
        }
    }

    #[test]
    fn directive_content_is_never_empty_for_non_empty_input(text in "[A-Za-z :.]{1,60}") {
        let content = match parse(&text) {
            Directive::Respond { content }
            | Directive::Pass { content, .. }
            | Directive::Redirect { content }
            | Directive::End { content } => content,
        };
        prop_assert!(!content.is_empty());
    }

    #[test]
    fn preamble_never_contains_pass_phrase(before in arb_plain_text(), name in arb_name()) {
        let text = format!("{before}\nPASS TO {name}: go");
        let head = preamble(&text);
        prop_assert!(!head.to_uppercase().contains("PASS TO"));
        prop_assert_eq!(head, before.trim());
    }
}
