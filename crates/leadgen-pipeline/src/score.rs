//! Additive rule-based lead scoring.

use std::sync::LazyLock;

use leadgen_core::{CandidateLead, Platform};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

/// Business-need heuristics for a Reddit post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsAnalysis {
    pub is_business_need: bool,
    pub urgency: Urgency,
    pub budget_mentioned: bool,
    pub contact_info_available: bool,
}

/// Signals from the source record that are not stored on the lead itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSignals {
    pub needs: Option<NeedsAnalysis>,
    pub upvotes: Option<u32>,
    pub comments_count: Option<u32>,
    pub department: Option<String>,
    pub about: Option<String>,
    pub company_has_updates: bool,
}

/// Scores a candidate lead. Implementations must return a value in `[0, 1]`.
pub trait LeadScorer: Send + Sync {
    fn score(&self, lead: &CandidateLead, signals: &SourceSignals) -> f64;
}

static SENIOR_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ceo|cto|cfo|vp|director|head of|founder)\b").expect("valid regex")
});

/// Per-platform base score plus fixed bonuses, capped at 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleScorer;

fn present(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn bonus(condition: bool, amount: f64) -> f64 {
    if condition {
        amount
    } else {
        0.0
    }
}

impl RuleScorer {
    fn website(lead: &CandidateLead) -> f64 {
        0.4 + bonus(present(lead.email.as_ref()), 0.3)
            + bonus(present(lead.title.as_ref()), 0.1)
            + bonus(present(lead.linkedin_url.as_ref()), 0.1)
            + bonus(present(lead.company.as_ref()), 0.1)
    }

    fn reddit(signals: &SourceSignals) -> f64 {
        let mut score = 0.3;
        if let Some(needs) = &signals.needs {
            score += match needs.urgency {
                Urgency::High => 0.3,
                Urgency::Medium => 0.2,
                Urgency::Low => 0.0,
            };
            score += bonus(needs.budget_mentioned, 0.2);
            score += bonus(needs.contact_info_available, 0.2);
        }
        score += bonus(signals.upvotes.is_some_and(|n| n > 10), 0.1);
        score += bonus(signals.comments_count.is_some_and(|n| n > 5), 0.1);
        score
    }

    fn linkedin(lead: &CandidateLead, signals: &SourceSignals) -> f64 {
        let senior = lead
            .title
            .as_deref()
            .is_some_and(|t| SENIOR_TITLE_RE.is_match(t));
        0.6 + bonus(senior, 0.2)
            + bonus(signals.company_has_updates, 0.1)
            + bonus(present(signals.department.as_ref()), 0.05)
            + bonus(
                signals.about.as_deref().is_some_and(|a| a.chars().count() > 50),
                0.05,
            )
    }
}

impl LeadScorer for RuleScorer {
    fn score(&self, lead: &CandidateLead, signals: &SourceSignals) -> f64 {
        let raw = match lead.platform {
            Platform::Website => Self::website(lead),
            Platform::Reddit => Self::reddit(signals),
            Platform::LinkedIn => Self::linkedin(lead, signals),
        };
        raw.clamp(0.0, 1.0)
    }
}
