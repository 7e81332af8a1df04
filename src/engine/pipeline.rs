//! Prompt pipelines — the closed set of suggestion categories.
//!
//! [`Pipeline`] is a closed enum: every variant carries its own system
//! instruction, user-prompt template, and deterministic fallback suggestion
//! list.  Dispatch is compile-time exhaustive, so an unhandled pipeline
//! cannot slip through; unknown tags are rejected at the string boundary by
//! [`FromStr`](std::str::FromStr).

use std::str::FromStr;

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

const SYSTEM_INTERVIEW: &str = "\
You are a real-time interview coach listening to a live conversation.
Task: suggest concise, natural things the candidate could say or ask next.

Rules:
1. Ground every suggestion in the conversation context provided.
2. Keep each suggestion to one or two sentences.
3. Never invent facts about the candidate's background.
4. Reply with a plain list, one suggestion per line — no commentary.";

const SYSTEM_MEETING: &str = "\
You are a real-time meeting assistant listening to a live discussion.
Task: suggest concise contributions — questions, clarifications, or next
steps — the participant could raise.

Rules:
1. Ground every suggestion in the discussion context provided.
2. Keep each suggestion to one or two sentences.
3. Prefer concrete, actionable phrasing.
4. Reply with a plain list, one suggestion per line — no commentary.";

const SYSTEM_ISSUE_TRACKER: &str = "\
You are an assistant that turns conversation notes into issue-tracker items.
Task: suggest well-formed issue titles with a one-line scope.

Rules:
1. One issue per line, title first, then a colon and the scope.
2. Derive issues only from the context provided.
3. Reply with a plain list — no commentary.";

const SYSTEM_DOCUMENTATION: &str = "\
You are an assistant that turns conversation notes into documentation tasks.
Task: suggest short documentation updates implied by the discussion.

Rules:
1. One suggestion per line naming the doc section and the change.
2. Derive suggestions only from the context provided.
3. Reply with a plain list — no commentary.";

const SYSTEM_CHAT: &str = "\
You are a conversational assistant.
Task: suggest concise, helpful replies the user could send next.

Rules:
1. Ground every suggestion in the conversation context provided.
2. Keep each suggestion to one or two sentences.
3. Reply with a plain list, one suggestion per line — no commentary.";

// ---------------------------------------------------------------------------
// Fallback suggestion lists
// ---------------------------------------------------------------------------
//
// Returned verbatim when validation fails, injection is detected, or every
// provider is exhausted.  Deterministic: same pipeline, same list.

const FALLBACK_INTERVIEW: &[&str] = &[
    "Ask a clarifying question about what success looks like in this role.",
    "Summarize your relevant experience in one or two sentences.",
    "Ask about the team you would be working with day to day.",
    "Request a concrete example of a project you would own first.",
];

const FALLBACK_MEETING: &[&str] = &[
    "Ask whether the group agrees on the next step before moving on.",
    "Summarize the decision made so far to confirm shared understanding.",
    "Ask who owns the follow-up and by when.",
    "Suggest parking open questions and scheduling a follow-up.",
];

const FALLBACK_ISSUE_TRACKER: &[&str] = &[
    "Capture the main problem discussed as a new issue with today's notes.",
    "File a follow-up issue for any unresolved question from this session.",
    "Link related issues so the discussion context is not lost.",
];

const FALLBACK_DOCUMENTATION: &[&str] = &[
    "Note which document sections this discussion made outdated.",
    "Add a short FAQ entry for the most repeated question.",
    "Record the decision and its rationale in the team notes.",
];

const FALLBACK_CHAT: &[&str] = &[
    "Ask a follow-up question to keep the conversation moving.",
    "Restate what you understood so far and ask if that is right.",
    "Offer to continue the topic later if now is a bad time.",
];

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A named, closed prompt-template category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipeline {
    Interview,
    Meeting,
    IssueTracker,
    Documentation,
    Chat,
}

/// The tag named an unknown pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline tag {0:?}")]
pub struct UnknownPipeline(pub String);

impl Pipeline {
    /// Every pipeline, in a stable order.
    pub const ALL: [Pipeline; 5] = [
        Pipeline::Interview,
        Pipeline::Meeting,
        Pipeline::IssueTracker,
        Pipeline::Documentation,
        Pipeline::Chat,
    ];

    /// Stable tag used for persistence and the string-facing API.
    pub fn tag(&self) -> &'static str {
        match self {
            Pipeline::Interview => "interview",
            Pipeline::Meeting => "meeting",
            Pipeline::IssueTracker => "issue-tracker",
            Pipeline::Documentation => "documentation",
            Pipeline::Chat => "chat",
        }
    }

    /// System instruction for this pipeline.
    pub fn system_instruction(&self) -> &'static str {
        match self {
            Pipeline::Interview => SYSTEM_INTERVIEW,
            Pipeline::Meeting => SYSTEM_MEETING,
            Pipeline::IssueTracker => SYSTEM_ISSUE_TRACKER,
            Pipeline::Documentation => SYSTEM_DOCUMENTATION,
            Pipeline::Chat => SYSTEM_CHAT,
        }
    }

    /// Deterministic fallback batch for this pipeline.
    pub fn fallback_suggestions(&self) -> Vec<String> {
        let list = match self {
            Pipeline::Interview => FALLBACK_INTERVIEW,
            Pipeline::Meeting => FALLBACK_MEETING,
            Pipeline::IssueTracker => FALLBACK_ISSUE_TRACKER,
            Pipeline::Documentation => FALLBACK_DOCUMENTATION,
            Pipeline::Chat => FALLBACK_CHAT,
        };
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Build the `(system_msg, user_msg)` pair for a provider call.
    ///
    /// `context` is the redacted conversation text; `enrichment` is the
    /// pre-built profile/session/cache section, when available.
    pub fn build_prompts(&self, context: &str, enrichment: Option<&str>) -> (String, String) {
        let system = self.system_instruction().to_string();

        let mut user = String::with_capacity(context.len() + 512);
        if let Some(extra) = enrichment {
            user.push_str(extra);
            user.push('\n');
        }
        user.push_str("Conversation so far:\n");
        user.push_str(context);
        user.push_str("\n\nSuggestions:\n");

        (system, user)
    }
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Pipeline {
    type Err = UnknownPipeline;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interview" => Ok(Pipeline::Interview),
            "meeting" => Ok(Pipeline::Meeting),
            "issue-tracker" => Ok(Pipeline::IssueTracker),
            "documentation" => Ok(Pipeline::Documentation),
            "chat" => Ok(Pipeline::Chat),
            other => Err(UnknownPipeline(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_from_str() {
        for pipeline in Pipeline::ALL {
            assert_eq!(pipeline.tag().parse::<Pipeline>(), Ok(pipeline));
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = "brainstorm".parse::<Pipeline>().unwrap_err();
        assert_eq!(err, UnknownPipeline("brainstorm".into()));
    }

    #[test]
    fn every_pipeline_has_a_nonempty_fallback_list() {
        for pipeline in Pipeline::ALL {
            let fallback = pipeline.fallback_suggestions();
            assert!(!fallback.is_empty(), "{pipeline} has no fallback");
            assert!(fallback.len() <= 4, "{pipeline} fallback too long");
        }
    }

    #[test]
    fn fallback_lists_are_deterministic() {
        assert_eq!(
            Pipeline::Interview.fallback_suggestions(),
            Pipeline::Interview.fallback_suggestions()
        );
    }

    /// Fallback text must never trip the injection screen it is returned
    /// in place of.
    #[test]
    fn fallback_lists_pass_the_injection_screen() {
        use crate::security::screen_text;
        for pipeline in Pipeline::ALL {
            for item in pipeline.fallback_suggestions() {
                assert_eq!(screen_text(&item), None, "flagged: {item}");
            }
        }
    }

    #[test]
    fn prompts_embed_context_and_cue() {
        let (system, user) =
            Pipeline::Interview.build_prompts("tell me about your experience", None);
        assert!(system.contains("interview coach"));
        assert!(user.contains("tell me about your experience"));
        assert!(user.contains("Suggestions:"));
    }

    #[test]
    fn prompts_embed_enrichment_when_present() {
        let (_, user) = Pipeline::Meeting.build_prompts(
            "we discussed the roadmap",
            Some("Role: engineering manager\n"),
        );
        assert!(user.contains("engineering manager"));
        assert!(user.contains("we discussed the roadmap"));
    }

    #[test]
    fn display_matches_tag() {
        assert_eq!(Pipeline::IssueTracker.to_string(), "issue-tracker");
    }
}
