//! Response tag parsing.
//!
//! Model responses carry their structure in inline tags: `<if_finish>`,
//! `<action>`, `<content>`, plus `<think summary>`/`<think>` pairs for
//! progressive disclosure. This module is a small literal-match parser
//! over those tags; no regular expressions. A response only counts as
//! `Recognized` when its finish decision parses cleanly — everything else
//! is `Unrecognized` and treated as terminal by the loop, so downstream
//! logic never guesses.

use gavel_core::action::ActionDirective;

/// One step of the model's disclosed reasoning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingStep {
    pub summary: Option<String>,
    pub thought: Option<String>,
}

/// The structured reading of one model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// The finish decision parsed cleanly.
    Recognized {
        /// True when the model declared the analysis complete.
        finish: bool,
        /// The requested side effect, if the action tag held a valid
        /// directive.
        action: Option<ActionDirective>,
        /// The body of the content tag, verbatim.
        content: Option<String>,
        /// Disclosed reasoning steps, in order.
        thinking: Vec<ThinkingStep>,
    },
    /// No finish decision (absent tag or an unrecognized value). The loop
    /// returns such responses unchanged.
    Unrecognized { raw: String },
}

/// Parse one model response.
///
/// Tag absence is "no action" / "not finished", never an error. The finish
/// decision is matched case-insensitively after trimming; any value other
/// than `finish`/`continue` makes the whole response `Unrecognized`.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let Some(decision) = tag_content(raw, "if_finish") else {
        return ParsedResponse::Unrecognized {
            raw: raw.to_string(),
        };
    };

    let finish = match decision.trim().to_lowercase().as_str() {
        "finish" => true,
        "continue" => false,
        _ => {
            return ParsedResponse::Unrecognized {
                raw: raw.to_string(),
            };
        }
    };

    ParsedResponse::Recognized {
        finish,
        action: tag_content(raw, "action").and_then(ActionDirective::parse),
        content: content_text(raw).map(str::to_string),
        thinking: thinking_steps(raw),
    }
}

/// The body of the first content tag, verbatim.
pub fn content_text(raw: &str) -> Option<&str> {
    tag_content(raw, "content")
}

/// All disclosed reasoning steps, pairing the i-th summary with the i-th
/// thought. A step may carry only one of the two when the counts differ.
pub fn thinking_steps(raw: &str) -> Vec<ThinkingStep> {
    let summaries = tag_contents(raw, "think summary");
    let thoughts = tag_contents(raw, "think");

    (0..summaries.len().max(thoughts.len()))
        .map(|i| ThinkingStep {
            summary: summaries.get(i).map(|s| s.to_string()),
            thought: thoughts.get(i).map(|s| s.to_string()),
        })
        .collect()
}

/// Content of the first `<name>…</name>` pair, or `None` when the pair is
/// absent or unclosed.
fn tag_content<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = raw.find(&open)? + open.len();
    let len = raw[start..].find(&close)?;
    Some(&raw[start..start + len])
}

/// Contents of every `<name>…</name>` pair, in order of appearance.
fn tag_contents<'a>(raw: &'a str, name: &str) -> Vec<&'a str> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let mut found = Vec::new();
    let mut rest = raw;
    while let Some(idx) = rest.find(&open) {
        let start = idx + open.len();
        let Some(len) = rest[start..].find(&close) else {
            break;
        };
        found.push(&rest[start..start + len]);
        rest = &rest[start + len + close.len()..];
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RESPONSE: &str = "<think summary>check conviction rates</think summary>\n\
        <think>the grouping table should show the trend, query it first</think>\n\
        <action>SQL SELECT * FROM judgement_issue_groups</action>\n\
        <content>Let me look at the overall statistics.</content>\n\
        <if_finish>continue</if_finish>";

    #[test]
    fn parses_a_full_continue_response() {
        let parsed = parse_response(FULL_RESPONSE);
        match parsed {
            ParsedResponse::Recognized {
                finish,
                action,
                content,
                thinking,
            } => {
                assert!(!finish);
                assert_eq!(
                    action,
                    Some(ActionDirective::Sql(
                        "SELECT * FROM judgement_issue_groups".into()
                    ))
                );
                assert_eq!(
                    content.as_deref(),
                    Some("Let me look at the overall statistics.")
                );
                assert_eq!(thinking.len(), 1);
                assert_eq!(
                    thinking[0].summary.as_deref(),
                    Some("check conviction rates")
                );
            }
            ParsedResponse::Unrecognized { .. } => panic!("Expected recognized response"),
        }
    }

    #[test]
    fn finish_decision_is_trimmed_and_case_insensitive() {
        let parsed = parse_response("<if_finish>  FINISH\n</if_finish>");
        assert!(matches!(
            parsed,
            ParsedResponse::Recognized { finish: true, .. }
        ));
    }

    #[test]
    fn missing_if_finish_is_unrecognized() {
        let raw = "<content>done</content>";
        match parse_response(raw) {
            ParsedResponse::Unrecognized { raw: kept } => assert_eq!(kept, raw),
            ParsedResponse::Recognized { .. } => panic!("Expected unrecognized"),
        }
    }

    #[test]
    fn unknown_decision_is_unrecognized() {
        assert!(matches!(
            parse_response("<if_finish>maybe</if_finish>"),
            ParsedResponse::Unrecognized { .. }
        ));
    }

    #[test]
    fn invalid_action_prefix_yields_no_directive() {
        let parsed =
            parse_response("<action>DELETE everything</action><if_finish>continue</if_finish>");
        assert!(matches!(
            parsed,
            ParsedResponse::Recognized { action: None, .. }
        ));
    }

    #[test]
    fn action_body_is_not_trimmed() {
        let parsed =
            parse_response("<action>READ_FILE notes.txt </action><if_finish>continue</if_finish>");
        assert!(matches!(
            parsed,
            ParsedResponse::Recognized {
                action: Some(ActionDirective::ReadFile(ref f)),
                ..
            } if f == "notes.txt "
        ));
    }

    #[test]
    fn content_spans_newlines() {
        let raw = "<content>line one\nline two</content><if_finish>finish</if_finish>";
        assert_eq!(content_text(raw), Some("line one\nline two"));
    }

    #[test]
    fn first_tag_occurrence_wins() {
        let raw = "<if_finish>finish</if_finish><if_finish>continue</if_finish>";
        assert!(matches!(
            parse_response(raw),
            ParsedResponse::Recognized { finish: true, .. }
        ));
    }

    #[test]
    fn unclosed_tag_counts_as_absent() {
        assert!(matches!(
            parse_response("<if_finish>finish"),
            ParsedResponse::Unrecognized { .. }
        ));
        assert_eq!(content_text("<content>never closed"), None);
    }

    #[test]
    fn thinking_pairs_zip_by_index() {
        let raw = "<think summary>a</think summary><think>first</think>\
                   <think summary>b</think summary>";
        let steps = thinking_steps(raw);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].summary.as_deref(), Some("a"));
        assert_eq!(steps[0].thought.as_deref(), Some("first"));
        assert_eq!(steps[1].summary.as_deref(), Some("b"));
        assert_eq!(steps[1].thought, None);
    }

    #[test]
    fn think_summary_does_not_bleed_into_think() {
        let raw = "<think summary>only a summary</think summary>";
        let steps = thinking_steps(raw);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].summary.as_deref(), Some("only a summary"));
        assert_eq!(steps[0].thought, None);
    }

    #[test]
    fn no_tags_means_no_thinking_steps() {
        assert!(thinking_steps("plain text answer").is_empty());
    }
}
