//! Per-user lead analytics.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{EnrichmentStatus, Lead, Platform};

/// Days covered by [`LeadAnalytics::leads_over_time`].
pub const ANALYTICS_WINDOW_DAYS: i64 = 30;

/// Leads first stored on one UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyLeads {
    pub date: NaiveDate,
    pub leads: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformCount {
    pub platform: Platform,
    pub count: i64,
}

/// Summary of one user's canonical leads across all their campaigns.
///
/// Duplicates are not counted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadAnalytics {
    pub total_leads: i64,
    /// Leads in `qualified`, `contacted`, `nurturing` or `converted`.
    pub qualified_leads: i64,
    pub enriched_leads: i64,
    /// `qualified_leads` as a percentage of `total_leads`; 0 with no leads.
    pub conversion_rate: f64,
    /// Oldest day first; days without leads are omitted.
    pub leads_over_time: Vec<DailyLeads>,
    /// Largest count first.
    pub platform_distribution: Vec<PlatformCount>,
}

impl LeadAnalytics {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn conversion_rate(total_leads: i64, qualified_leads: i64) -> f64 {
        if total_leads <= 0 {
            return 0.0;
        }
        qualified_leads as f64 / total_leads as f64 * 100.0
    }

    /// Tallies `leads` in process. Leads created before `since` count toward
    /// the totals but not the daily series.
    pub fn tally<'a>(leads: impl IntoIterator<Item = &'a Lead>, since: DateTime<Utc>) -> Self {
        let mut total_leads = 0;
        let mut qualified_leads = 0;
        let mut enriched_leads = 0;
        let mut daily: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        let mut platforms: HashMap<Platform, i64> = HashMap::new();

        for lead in leads.into_iter().filter(|l| !l.candidate.is_duplicate) {
            total_leads += 1;
            if lead.status.is_qualified() {
                qualified_leads += 1;
            }
            if lead.enrichment_status == EnrichmentStatus::Enriched {
                enriched_leads += 1;
            }
            if lead.created_at >= since {
                *daily.entry(lead.created_at.date_naive()).or_default() += 1;
            }
            *platforms.entry(lead.candidate.platform).or_default() += 1;
        }

        let mut platform_distribution: Vec<PlatformCount> = platforms
            .into_iter()
            .map(|(platform, count)| PlatformCount { platform, count })
            .collect();
        platform_distribution.sort_by_key(|p| (Reverse(p.count), p.platform.as_str()));

        Self {
            total_leads,
            qualified_leads,
            enriched_leads,
            conversion_rate: Self::conversion_rate(total_leads, qualified_leads),
            leads_over_time: daily
                .into_iter()
                .map(|(date, leads)| DailyLeads { date, leads })
                .collect(),
            platform_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CandidateLead, LeadStatus};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn lead(platform: Platform, created_at: DateTime<Utc>, status: LeadStatus) -> Lead {
        let candidate = CandidateLead {
            email: Some(format!("{}@acme.com", Uuid::new_v4())),
            ..CandidateLead::new(Uuid::new_v4(), None, platform)
        };
        let mut lead = Lead::from_candidate(candidate, created_at);
        lead.status = status;
        lead
    }

    #[test]
    fn tally_counts_canonical_leads_only() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let since = now - Duration::days(ANALYTICS_WINDOW_DAYS);
        let mut enriched = lead(Platform::Reddit, now, LeadStatus::Converted);
        enriched.enrichment_status = EnrichmentStatus::Enriched;
        let mut duplicate = lead(Platform::Reddit, now, LeadStatus::Qualified);
        duplicate.candidate.is_duplicate = true;
        duplicate.candidate.duplicate_of = Some(enriched.id());
        let leads = vec![
            enriched,
            duplicate,
            lead(Platform::Website, now - Duration::days(1), LeadStatus::New),
            lead(Platform::Reddit, now - Duration::days(1), LeadStatus::Disqualified),
            lead(Platform::LinkedIn, now - Duration::days(45), LeadStatus::Contacted),
        ];

        let analytics = LeadAnalytics::tally(&leads, since);

        assert_eq!(analytics.total_leads, 4);
        assert_eq!(analytics.qualified_leads, 2);
        assert_eq!(analytics.enriched_leads, 1);
        assert!((analytics.conversion_rate - 50.0).abs() < 1e-9);
        assert_eq!(
            analytics.leads_over_time,
            vec![
                DailyLeads {
                    date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
                    leads: 2
                },
                DailyLeads {
                    date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
                    leads: 1
                },
            ]
        );
        assert_eq!(
            analytics.platform_distribution,
            vec![
                PlatformCount {
                    platform: Platform::Reddit,
                    count: 2
                },
                PlatformCount {
                    platform: Platform::LinkedIn,
                    count: 1
                },
                PlatformCount {
                    platform: Platform::Website,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn no_leads_means_zero_conversion() {
        let analytics = LeadAnalytics::tally(&[], Utc::now());
        assert_eq!(analytics.total_leads, 0);
        assert!(analytics.conversion_rate.abs() < f64::EPSILON);
        assert!(analytics.leads_over_time.is_empty());
    }
}
