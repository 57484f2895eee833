//! Raw source records to candidate leads.
//!
//! Web pages go through contact extraction (emails, phones, LinkedIn
//! profile links and "title + name" pairs). Reddit posts only become leads
//! when they read as a business need. LinkedIn records already carry
//! structured people and map across directly.

use std::collections::HashSet;
use std::sync::LazyLock;

use leadgen_core::{CandidateLead, Platform};
use leadgen_scraper::{
    LinkedInCompanyPage, LinkedInSearchPage, RedditPost, ScrapedPage, SourceRecord,
};
use regex::Regex;
use reqwest::Url;
use serde_json::json;
use uuid::Uuid;

use crate::score::{NeedsAnalysis, SourceSignals, Urgency};

/// Longest `source_content` kept on a lead.
const MAX_SOURCE_CONTENT_CHARS: usize = 2000;

const NONE: &[String] = &[];

const FREE_MAIL_PROVIDERS: &[&str] = &["gmail", "yahoo", "hotmail", "outlook", "icloud", "aol"];

const BUSINESS_NEED_KEYWORDS: &[&str] = &[
    "looking for",
    "need help",
    "recommendation",
    "service",
    "hire",
    "budget",
    "quote",
    "freelancer",
    "contractor",
];
const URGENCY_KEYWORDS: &[&str] = &["urgent", "asap", "immediately", "quickly", "soon"];
const BUDGET_KEYWORDS: &[&str] = &["budget", "$", "cost", "price", "pay", "payment"];
const CONTACT_KEYWORDS: &[&str] = &["@", "contact", "dm"];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
});
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b")
        .expect("valid regex")
});
static LINKEDIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?linkedin\.com/in/[\w-]+").expect("valid regex")
});
static TITLE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b((?i:CEO|CTO|CFO|Vice President|President|Director|Manager|VP|Co-Founder|Founder|Head of|Lead))\s*:?\s*([A-Z][a-z]+ [A-Z][a-z]+)",
    )
    .expect("valid regex")
});

/// Campaign and job context the extractor needs.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub campaign_id: Uuid,
    pub job_id: Option<Uuid>,
    /// Campaign search keywords; a Reddit post mentioning one counts as a need.
    pub keywords: &'a [String],
    /// Reddit posts mentioning any of these are dropped.
    pub negative_keywords: &'a [String],
    /// When non-empty, LinkedIn employees must hold one of these titles.
    pub target_titles: &'a [String],
}

impl<'a> ExtractContext<'a> {
    #[must_use]
    pub fn new(campaign_id: Uuid, job_id: Option<Uuid>) -> Self {
        Self {
            campaign_id,
            job_id,
            keywords: NONE,
            negative_keywords: NONE,
            target_titles: NONE,
        }
    }

    fn candidate(&self, platform: Platform) -> CandidateLead {
        CandidateLead::new(self.campaign_id, self.job_id, platform)
    }
}

/// A candidate plus the signals the scorer needs.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub lead: CandidateLead,
    pub signals: SourceSignals,
}

impl Extracted {
    fn plain(lead: CandidateLead) -> Self {
        Self {
            lead,
            signals: SourceSignals::default(),
        }
    }
}

/// Contact details found in free text, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contacts {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub linkedin_urls: Vec<String>,
    /// `(title, name)` pairs such as `("CEO", "Jane Doe")`.
    pub people: Vec<(String, String)>,
}

fn unique_matches(re: &Regex, text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    re.find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|m| seen.insert(m.clone()))
        .collect()
}

#[must_use]
pub fn extract_contacts(text: &str) -> Contacts {
    Contacts {
        emails: unique_matches(&EMAIL_RE, text),
        phones: unique_matches(&PHONE_RE, text),
        linkedin_urls: unique_matches(&LINKEDIN_RE, text),
        people: TITLE_NAME_RE
            .captures_iter(text)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect(),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Business-need heuristics over lowercased post text.
#[must_use]
pub fn analyze_needs(text: &str, campaign_keywords: &[String]) -> NeedsAnalysis {
    let lower = text.to_lowercase();
    let is_business_need = contains_any(&lower, BUSINESS_NEED_KEYWORDS)
        || campaign_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && lower.contains(&k));
    let urgency = if contains_any(&lower, URGENCY_KEYWORDS) {
        Urgency::High
    } else if is_business_need {
        Urgency::Medium
    } else {
        Urgency::Low
    };
    NeedsAnalysis {
        is_business_need,
        urgency,
        budget_mentioned: contains_any(&lower, BUDGET_KEYWORDS),
        contact_info_available: contains_any(&lower, CONTACT_KEYWORDS),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Second-level labels that sit under a country code (`co.uk`, `com.au`).
const SECOND_LEVEL_SUFFIXES: &[&str] = &[
    "co", "com", "org", "net", "ac", "gov", "edu", "ltd", "plc",
];

/// Company name from a host: the label left of the public suffix,
/// capitalized. `acme.com` and `acme.co.uk` both give `Acme`.
fn company_from_host(host: &str) -> Option<String> {
    let mut parts: Vec<&str> = host.split('.').filter(|p| !p.is_empty()).collect();
    let tld = parts.pop()?;
    if parts.is_empty() {
        return Some(capitalize(tld));
    }
    let is_second_level = |label: &str| {
        SECOND_LEVEL_SUFFIXES.contains(&label.to_ascii_lowercase().as_str())
    };
    if tld.len() == 2 && parts.len() > 1 && parts.last().is_some_and(|l| is_second_level(l)) {
        parts.pop();
    }
    parts.last().map(|main| capitalize(main))
}

/// Company name guessed from a URL, e.g. `https://www.acme.com/team` → `Acme`.
#[must_use]
pub fn company_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    company_from_host(parsed.host_str()?)
}

fn is_free_mail(domain: &str) -> bool {
    let domain = domain.to_lowercase();
    FREE_MAIL_PROVIDERS
        .iter()
        .any(|p| domain.split('.').any(|label| label == *p))
}

/// Applies what an email address tells us: a name from a dotted local part,
/// and a company and website from a business domain.
fn apply_email(lead: &mut CandidateLead, email: &str, fallback_company: Option<&str>) {
    lead.email = Some(email.to_string());
    let Some((local, domain)) = email.split_once('@') else {
        return;
    };
    if lead.full_name.is_none() && local.contains('.') {
        let name = local
            .split('.')
            .filter(|s| !s.is_empty())
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ");
        lead.set_name(&name);
    }
    if is_free_mail(domain) {
        if lead.company.is_none() {
            lead.company = fallback_company.map(str::to_string);
        }
    } else {
        lead.company = company_from_host(domain).or_else(|| fallback_company.map(str::to_string));
        lead.website = Some(format!("https://{}", domain.to_lowercase()));
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_SOURCE_CONTENT_CHARS).collect()
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_contact_page(page: &ScrapedPage) -> bool {
    let title = page
        .metadata
        .title
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let path = Url::parse(page.resolved_url())
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();
    title.contains("contact")
        || title.contains("about")
        || path.contains("/contact")
        || path.contains("/about")
}

/// Candidates from one web page, tagged with `platform`.
#[must_use]
pub fn extract_page(page: &ScrapedPage, platform: Platform, ctx: &ExtractContext<'_>) -> Vec<Extracted> {
    let url = page.resolved_url();
    let contacts = extract_contacts(&page.markdown);
    let page_company = non_blank(page.metadata.og_site_name.as_ref())
        .or_else(|| non_blank(page.metadata.title.as_ref()))
        .or_else(|| company_from_url(url));
    let scraped_data = json!({
        "page_title": page.metadata.title,
        "description": page.metadata.description,
    });
    let base = || {
        let mut lead = ctx.candidate(platform);
        lead.source_url = (!url.is_empty()).then(|| url.to_string());
        lead.source_content = Some(truncate(&page.markdown));
        lead.scraped_data = scraped_data.clone();
        lead
    };

    let mut leads = Vec::new();
    if !contacts.people.is_empty() {
        for (i, (title, name)) in contacts.people.iter().enumerate() {
            let mut lead = base();
            lead.set_name(name);
            lead.title = Some(title.clone());
            lead.company.clone_from(&page_company);
            lead.email = contacts.emails.get(i).cloned();
            lead.phone = contacts.phones.get(i).cloned();
            lead.linkedin_url = contacts.linkedin_urls.get(i).cloned();
            leads.push(lead);
        }
    } else if !contacts.emails.is_empty() {
        for (i, email) in contacts.emails.iter().enumerate() {
            let mut lead = base();
            apply_email(&mut lead, email, page_company.as_deref());
            lead.phone = contacts.phones.get(i).cloned();
            lead.linkedin_url = contacts.linkedin_urls.get(i).cloned();
            leads.push(lead);
        }
    } else if is_contact_page(page) {
        let mut lead = base();
        lead.company = non_blank(page.metadata.og_site_name.as_ref());
        lead.website = (!url.is_empty()).then(|| url.to_string());
        lead.source_content = page.metadata.description.clone();
        leads.push(lead);
    }

    leads.into_iter().map(Extracted::plain).collect()
}

fn mentions_any(text: &str, keywords: &[String]) -> bool {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .any(|k| !k.is_empty() && lower.contains(&k))
}

fn extract_reddit_post(post: &RedditPost, ctx: &ExtractContext<'_>) -> Option<Extracted> {
    let text = format!("{}\n{}", post.title, post.content);
    if mentions_any(&text, ctx.negative_keywords) {
        tracing::debug!(url = %post.url, "reddit post matches a negative keyword, skipping");
        return None;
    }
    let needs = analyze_needs(&text, ctx.keywords);
    if !needs.is_business_need {
        return None;
    }

    let contacts = extract_contacts(&post.content);
    let mut lead = ctx.candidate(Platform::Reddit);
    lead.reddit_username.clone_from(&post.author);
    if let Some((title, name)) = contacts.people.first() {
        lead.set_name(name);
        lead.title = Some(title.clone());
    }
    if let Some(email) = contacts.emails.first() {
        apply_email(&mut lead, email, None);
    }
    if lead.full_name.is_none() {
        if let Some(author) = &post.author {
            lead.set_name(author);
        }
    }
    lead.phone = contacts.phones.first().cloned();
    lead.linkedin_url = contacts.linkedin_urls.first().cloned();
    lead.source_url = Some(post.url.clone());
    lead.source_content = Some(truncate(&text));
    lead.scraped_data = json!({
        "subreddit": post.subreddit,
        "post_title": post.title,
        "upvotes": post.upvotes,
        "comments_count": post.comments_count,
        "needs_analysis": needs,
    });

    Some(Extracted {
        lead,
        signals: SourceSignals {
            needs: Some(needs),
            upvotes: post.upvotes,
            comments_count: post.comments_count,
            ..SourceSignals::default()
        },
    })
}

fn title_matches(title: Option<&str>, targets: &[String]) -> bool {
    if targets.is_empty() {
        return true;
    }
    let Some(title) = title else {
        return false;
    };
    let title = title.to_lowercase();
    targets
        .iter()
        .any(|t| !t.trim().is_empty() && title.contains(&t.trim().to_lowercase()))
}

fn extract_linkedin_company(page: &LinkedInCompanyPage, ctx: &ExtractContext<'_>) -> Vec<Extracted> {
    let company = &page.company;
    let has_updates = !company.recent_updates.is_empty();
    page.employees
        .iter()
        .filter(|e| title_matches(e.title.as_deref(), ctx.target_titles))
        .filter_map(|employee| {
            let name = non_blank(employee.full_name.as_ref())?;
            let mut lead = ctx.candidate(Platform::LinkedIn);
            lead.set_name(&name);
            lead.title.clone_from(&employee.title);
            lead.company.clone_from(&company.name);
            lead.company_size.clone_from(&company.size);
            lead.industry.clone_from(&company.industry);
            lead.website.clone_from(&company.website);
            lead.linkedin_url = non_blank(employee.profile_url.as_ref());
            lead.source_url = Some(page.source_url.clone());
            lead.source_content.clone_from(&employee.about);
            lead.scraped_data = json!({
                "company_info": company,
                "department": employee.department,
                "recent_company_updates": company.recent_updates,
            });
            Some(Extracted {
                lead,
                signals: SourceSignals {
                    department: employee.department.clone(),
                    about: employee.about.clone(),
                    company_has_updates: has_updates,
                    ..SourceSignals::default()
                },
            })
        })
        .collect()
}

fn extract_linkedin_search(page: &LinkedInSearchPage, ctx: &ExtractContext<'_>) -> Vec<Extracted> {
    page.profiles
        .iter()
        .filter_map(|profile| {
            let name = non_blank(profile.full_name.as_ref())?;
            let mut lead = ctx.candidate(Platform::LinkedIn);
            lead.set_name(&name);
            lead.title.clone_from(&profile.title);
            lead.company.clone_from(&profile.company);
            lead.location.clone_from(&profile.location);
            lead.linkedin_url = non_blank(profile.profile_url.as_ref());
            lead.source_url = Some(page.source_url.clone());
            lead.scraped_data = json!({
                "search_keyword": page.keyword,
                "about": profile.about,
            });
            Some(Extracted {
                lead,
                signals: SourceSignals {
                    about: profile.about.clone(),
                    ..SourceSignals::default()
                },
            })
        })
        .collect()
}

/// Candidates from one adapter record, in discovery order.
#[must_use]
pub fn extract_record(record: &SourceRecord, ctx: &ExtractContext<'_>) -> Vec<Extracted> {
    match record {
        SourceRecord::WebPage(page) => extract_page(page, Platform::Website, ctx),
        SourceRecord::RedditPost(post) => extract_reddit_post(post, ctx).into_iter().collect(),
        SourceRecord::LinkedInCompany(page) => extract_linkedin_company(page, ctx),
        SourceRecord::LinkedInSearch(page) => extract_linkedin_search(page, ctx),
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
