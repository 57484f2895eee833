//! Lead export as CSV or JSON.

use std::fmt::Write as _;

use leadgen_core::{CoreError, Lead, LeadFilter};
use serde::Serialize;
use uuid::Uuid;

use crate::store::LeadStore;
use crate::StoreError;

const EXPORT_PAGE_SIZE: i64 = 500;

const CSV_HEADER: &[&str] = &[
    "name",
    "email",
    "phone",
    "title",
    "company",
    "location",
    "platform",
    "status",
    "enrichment_status",
    "lead_score",
    "source_url",
    "linkedin_url",
    "twitter_handle",
    "campaign_name",
    "created_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "leads.csv",
            ExportFormat::Json => "leads.json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(CoreError::InvalidValue {
                kind: "ExportFormat",
                value: other.to_string(),
            }),
        }
    }
}

/// One exported row.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRow<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub title: Option<&'a str>,
    pub company: Option<&'a str>,
    pub location: Option<&'a str>,
    pub platform: &'static str,
    pub status: &'static str,
    pub enrichment_status: &'static str,
    pub lead_score: f64,
    pub source_url: Option<&'a str>,
    pub linkedin_url: Option<&'a str>,
    pub twitter_handle: Option<&'a str>,
    pub campaign_name: &'a str,
    pub created_at: String,
}

impl<'a> ExportRow<'a> {
    fn new(lead: &'a Lead, campaign_name: &'a str) -> Self {
        let c = &lead.candidate;
        Self {
            name: c.full_name.as_deref(),
            email: c.email.as_deref(),
            phone: c.phone.as_deref(),
            title: c.title.as_deref(),
            company: c.company.as_deref(),
            location: c.location.as_deref(),
            platform: c.platform.as_str(),
            status: lead.status.as_str(),
            enrichment_status: lead.enrichment_status.as_str(),
            lead_score: c.lead_score,
            source_url: c.source_url.as_deref(),
            linkedin_url: c.linkedin_url.as_deref(),
            twitter_handle: c.twitter_handle.as_deref(),
            campaign_name,
            created_at: lead.created_at.to_rfc3339(),
        }
    }

    fn cells(&self) -> [String; 15] {
        let text = |v: Option<&str>| v.unwrap_or_default().to_string();
        [
            text(self.name),
            text(self.email),
            text(self.phone),
            text(self.title),
            text(self.company),
            text(self.location),
            self.platform.to_string(),
            self.status.to_string(),
            self.enrichment_status.to_string(),
            self.lead_score.to_string(),
            text(self.source_url),
            text(self.linkedin_url),
            text(self.twitter_handle),
            self.campaign_name.to_string(),
            self.created_at.clone(),
        ]
    }
}

/// Quotes a cell when it contains a delimiter, quote, or line break.
fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Every non-duplicate lead of a campaign, newest first.
///
/// # Errors
///
/// Returns [`StoreError`] if a page of leads cannot be loaded.
pub async fn campaign_leads<S>(store: &S, campaign_id: Uuid) -> Result<Vec<Lead>, StoreError>
where
    S: LeadStore + ?Sized,
{
    let mut leads = Vec::new();
    let mut offset = 0;
    loop {
        let (page, total) = store
            .query_leads(&LeadFilter {
                campaign_id: Some(campaign_id),
                limit: EXPORT_PAGE_SIZE,
                offset,
                ..LeadFilter::default()
            })
            .await?;
        let fetched = i64::try_from(page.len()).unwrap_or(i64::MAX);
        leads.extend(page.into_iter().filter(|l| !l.candidate.is_duplicate));
        offset += fetched;
        if fetched == 0 || offset >= total {
            break;
        }
    }
    Ok(leads)
}

/// Renders `leads` in `format`. CSV output is empty when there are no leads.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if JSON serialization fails.
pub fn render_leads(
    format: ExportFormat,
    leads: &[Lead],
    campaign_name: &str,
) -> Result<String, serde_json::Error> {
    let rows: Vec<ExportRow<'_>> = leads
        .iter()
        .map(|lead| ExportRow::new(lead, campaign_name))
        .collect();
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(&rows),
        ExportFormat::Csv => {
            if rows.is_empty() {
                return Ok(String::new());
            }
            let mut out = CSV_HEADER.join(",");
            for row in &rows {
                let line = row
                    .cells()
                    .iter()
                    .map(|cell| csv_cell(cell))
                    .collect::<Vec<_>>()
                    .join(",");
                let _ = write!(out, "\n{line}");
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leadgen_core::{CandidateLead, Platform};

    fn lead(name: &str, company: &str) -> Lead {
        let mut c = CandidateLead::new(Uuid::new_v4(), None, Platform::Website);
        c.set_name(name);
        c.company = Some(company.to_string());
        c.lead_score = 0.5;
        Lead::from_candidate(c, Utc::now())
    }

    #[test]
    fn csv_quotes_cells_with_commas_and_quotes() {
        assert_eq!(csv_cell("plain"), "plain");
        assert_eq!(csv_cell("Acme, Inc."), "\"Acme, Inc.\"");
        assert_eq!(csv_cell("the \"best\""), "\"the \"\"best\"\"\"");
    }

    #[test]
    fn csv_has_header_and_one_line_per_lead() {
        let leads = vec![lead("Jane Doe", "Acme, Inc."), lead("Sam Lee", "Initech")];
        let csv = render_leads(ExportFormat::Csv, &leads, "Q3 outreach").unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("name,email,phone,title,company"));
        assert!(lines[1].starts_with("Jane Doe,,,,\"Acme, Inc.\","));
        assert!(lines[2].contains(",website,new,pending,0.5,"));
        assert!(lines[2].contains(",Q3 outreach,"));
    }

    #[test]
    fn empty_csv_export_is_empty() {
        assert_eq!(render_leads(ExportFormat::Csv, &[], "x").unwrap(), "");
    }

    #[test]
    fn json_export_is_an_array_of_rows() {
        let json = render_leads(ExportFormat::Json, &[lead("Jane Doe", "Acme")], "Q3").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["name"], "Jane Doe");
        assert_eq!(value[0]["campaign_name"], "Q3");
        assert_eq!(value[0]["platform"], "website");
    }

    #[test]
    fn format_parses_known_names_only() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
