//! Keyword rule tables and the classifiers built on them.
//!
//! The tables are the single source of truth for keyword-driven mode
//! selection. Both the orchestrator and the fallback synthesizer read them,
//! so a prompt always resolves to the same mode at every call site.

use super::{ChatIntent, Mode, Surface};

/// One ordered classification rule: any needle matching selects `target`.
#[derive(Debug, Clone, Copy)]
pub struct Rule<T: 'static> {
    /// Lowercase substrings; a single hit is enough.
    pub needles: &'static [&'static str],
    /// Outcome when the rule matches.
    pub target: T,
}

/// First-match rule table with a default when nothing matches.
#[derive(Debug, Clone, Copy)]
pub struct RuleTable<T: 'static> {
    pub rules: &'static [Rule<T>],
    pub default: T,
}

impl<T: Copy> RuleTable<T> {
    /// Apply the table to already-normalized text.
    pub fn apply(&self, normalized: &str) -> T {
        self.matching_rule(normalized)
            .map(|rule| rule.target)
            .unwrap_or(self.default)
    }

    /// The first rule with a needle contained in `normalized`, if any.
    pub fn matching_rule(&self, normalized: &str) -> Option<&'static Rule<T>> {
        self.rules
            .iter()
            .find(|rule| rule.needles.iter().any(|needle| normalized.contains(needle)))
    }
}

pub static SEGMENTATION_RULES: RuleTable<Mode> = RuleTable {
    rules: &[
        Rule {
            needles: &["target audience", "campaign"],
            target: Mode::Campaign,
        },
        Rule {
            needles: &["demographic", "engagement"],
            target: Mode::SegmentEngagement,
        },
    ],
    default: Mode::Behavior,
};

pub static PERFORMANCE_RULES: RuleTable<Mode> = RuleTable {
    rules: &[
        Rule {
            needles: &["engagement", "ctr", "social media"],
            target: Mode::PerformanceEngagement,
        },
        Rule {
            needles: &["roas", "return on ad spend", "return on investment", "roi"],
            target: Mode::Roi,
        },
        Rule {
            needles: &["conversion", "convert", "post-click"],
            target: Mode::Conversion,
        },
    ],
    default: Mode::Roi,
};

pub static CONTENT_RULES: RuleTable<Mode> = RuleTable {
    rules: &[
        Rule {
            needles: &["calendar", "schedule", "posting plan", "weekly plan"],
            target: Mode::Calendar,
        },
        Rule {
            needles: &["format"],
            target: Mode::Formats,
        },
    ],
    default: Mode::Strategy,
};

pub static CHAT_RULES: RuleTable<ChatIntent> = RuleTable {
    rules: &[
        Rule {
            needles: &["performance", "roi", "roas", "conversion", "ctr", "engagement"],
            target: ChatIntent::Performance,
        },
        Rule {
            needles: &["content", "recommend", "suggestion", "campaign", "creative"],
            target: ChatIntent::Content,
        },
        Rule {
            needles: &["segment", "customer", "persona", "audience", "target"],
            target: ChatIntent::Segmentation,
        },
        Rule {
            needles: &["predict", "forecast", "estimate", "expect"],
            target: ChatIntent::Prediction,
        },
    ],
    default: ChatIntent::General,
};

/// Rule table for a surface.
pub fn rules_for(surface: Surface) -> &'static RuleTable<Mode> {
    match surface {
        Surface::Segmentation => &SEGMENTATION_RULES,
        Surface::Performance => &PERFORMANCE_RULES,
        Surface::Content => &CONTENT_RULES,
    }
}

/// Lowercase and trim text before matching.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Classify a prompt into a mode of `surface`. Total and deterministic.
pub fn classify(prompt: &str, surface: Surface) -> Mode {
    rules_for(surface).apply(&normalize(prompt))
}

/// Classify a chat message into an intent. Total and deterministic.
pub fn classify_chat(message: &str) -> ChatIntent {
    CHAT_RULES.apply(&normalize(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segmentation_rule_order() {
        assert_eq!(
            classify("Who is our target audience?", Surface::Segmentation),
            Mode::Campaign
        );
        assert_eq!(
            classify("Split users for the spring campaign", Surface::Segmentation),
            Mode::Campaign
        );
        assert_eq!(
            classify("Break down by demographic", Surface::Segmentation),
            Mode::SegmentEngagement
        );
        // campaign outranks engagement
        assert_eq!(
            classify("campaign engagement clusters", Surface::Segmentation),
            Mode::Campaign
        );
    }

    #[test]
    fn test_segmentation_default() {
        assert_eq!(
            classify(
                "Segment customers based on purchasing behavior patterns.",
                Surface::Segmentation
            ),
            Mode::Behavior
        );
        assert_eq!(classify("", Surface::Segmentation), Mode::Behavior);
    }

    #[test]
    fn test_performance_rule_order() {
        assert_eq!(
            classify("How is our social media doing?", Surface::Performance),
            Mode::PerformanceEngagement
        );
        assert_eq!(
            classify("Which campaigns have the best CTR", Surface::Performance),
            Mode::PerformanceEngagement
        );
        assert_eq!(
            classify("Rank by return on ad spend", Surface::Performance),
            Mode::Roi
        );
        assert_eq!(
            classify("Improve post-click results", Surface::Performance),
            Mode::Conversion
        );
        // roi outranks conversion
        assert_eq!(
            classify("ROI versus conversion", Surface::Performance),
            Mode::Roi
        );
        assert_eq!(classify("anything else", Surface::Performance), Mode::Roi);
    }

    #[test]
    fn test_content_rules() {
        assert_eq!(
            classify("Build me a posting schedule", Surface::Content),
            Mode::Calendar
        );
        assert_eq!(
            classify("Which formats work best?", Surface::Content),
            Mode::Formats
        );
        assert_eq!(
            classify("What should we post?", Surface::Content),
            Mode::Strategy
        );
    }

    #[test]
    fn test_matching_is_case_insensitive_and_trimmed() {
        assert_eq!(
            classify("   TARGET AUDIENCE   ", Surface::Segmentation),
            Mode::Campaign
        );
        assert_eq!(classify("\tRoAs\n", Surface::Performance), Mode::Roi);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let prompts = [
            "Segment customers based on purchasing behavior patterns.",
            "Improve post-click conversion",
            "Plan a weekly plan of posts",
            "",
            "   ",
            "ctr roas conversion",
        ];
        for surface in [Surface::Segmentation, Surface::Performance, Surface::Content] {
            for prompt in prompts {
                assert_eq!(classify(prompt, surface), classify(prompt, surface));
            }
        }
    }

    #[test]
    fn test_classify_always_returns_surface_mode() {
        for surface in [Surface::Segmentation, Surface::Performance, Surface::Content] {
            for prompt in ["engagement", "calendar", "campaign roi", "nothing"] {
                assert_eq!(classify(prompt, surface).surface(), surface);
            }
        }
    }

    #[test]
    fn test_chat_intents() {
        assert_eq!(classify_chat("What's my ROAS?"), ChatIntent::Performance);
        assert_eq!(
            classify_chat("Any creative ideas?"),
            ChatIntent::Content
        );
        assert_eq!(
            classify_chat("Describe my customer personas"),
            ChatIntent::Segmentation
        );
        assert_eq!(
            classify_chat("Can you forecast next month?"),
            ChatIntent::Prediction
        );
        assert_eq!(classify_chat("hello there"), ChatIntent::General);
        // performance outranks content
        assert_eq!(
            classify_chat("campaign performance"),
            ChatIntent::Performance
        );
    }

    #[test]
    fn test_matching_rule_reports_winner() {
        let rule = PERFORMANCE_RULES.matching_rule("ctr and roas").unwrap();
        assert_eq!(rule.target, Mode::PerformanceEngagement);
        assert!(PERFORMANCE_RULES.matching_rule("nothing").is_none());
    }
}
