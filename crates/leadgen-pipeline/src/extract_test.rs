use super::*;
use crate::score::{LeadScorer, RuleScorer};
use leadgen_scraper::{CompanyInfo, Employee, PageMetadata, Profile};

fn ctx() -> ExtractContext<'static> {
    ExtractContext::new(Uuid::nil(), None)
}

fn page(url: &str, markdown: &str) -> ScrapedPage {
    ScrapedPage {
        url: url.to_string(),
        markdown: markdown.to_string(),
        metadata: PageMetadata::default(),
    }
}

fn post(content: &str) -> RedditPost {
    RedditPost {
        url: "https://www.reddit.com/r/saas/comments/abc123/need_a_crm/".into(),
        subreddit: "saas".into(),
        title: "Need a CRM".into(),
        author: Some("founder_jane".into()),
        content: content.to_string(),
        upvotes: Some(14),
        comments_count: None,
    }
}

// ---------------------------------------------------------------------------
// Contact extraction
// ---------------------------------------------------------------------------

#[test]
fn contacts_are_found_in_order() {
    let text = "CEO: Jane Doe (jane@acme.com, 555-123-4567)\n\
                Head of Sales Sam Lee sam@acme.com\n\
                https://www.linkedin.com/in/janedoe";
    let contacts = extract_contacts(text);
    assert_eq!(contacts.emails, vec!["jane@acme.com", "sam@acme.com"]);
    assert_eq!(contacts.phones, vec!["555-123-4567"]);
    assert_eq!(contacts.linkedin_urls, vec!["https://www.linkedin.com/in/janedoe"]);
    assert_eq!(
        contacts.people,
        vec![
            ("CEO".to_string(), "Jane Doe".to_string()),
            ("Head of".to_string(), "Sales Sam".to_string()),
        ]
    );
}

#[test]
fn role_keywords_ignore_case_but_names_do_not() {
    let contacts = extract_contacts("founder Maria Lopez, director bob smith");
    assert_eq!(
        contacts.people,
        vec![("founder".to_string(), "Maria Lopez".to_string())]
    );
}

#[test]
fn repeated_emails_are_collapsed() {
    let contacts = extract_contacts("a@b.io then again a@b.io");
    assert_eq!(contacts.emails, vec!["a@b.io"]);
}

// ---------------------------------------------------------------------------
// Web pages
// ---------------------------------------------------------------------------

#[test]
fn title_name_pairs_zip_positionally() {
    let mut p = page(
        "https://acme.com/team",
        "CEO Jane Doe jane@acme.com\nCTO John Roe john@acme.com",
    );
    p.metadata.og_site_name = Some("Acme Inc".into());
    let out = extract_page(&p, Platform::Website, &ctx());
    assert_eq!(out.len(), 2);
    let jane = &out[0].lead;
    assert_eq!(jane.first_name.as_deref(), Some("Jane"));
    assert_eq!(jane.last_name.as_deref(), Some("Doe"));
    assert_eq!(jane.title.as_deref(), Some("CEO"));
    assert_eq!(jane.email.as_deref(), Some("jane@acme.com"));
    assert_eq!(jane.company.as_deref(), Some("Acme Inc"));
    assert_eq!(out[1].lead.email.as_deref(), Some("john@acme.com"));
    assert_eq!(jane.source_url.as_deref(), Some("https://acme.com/team"));
}

#[test]
fn company_falls_back_to_title_then_domain() {
    let mut p = page("https://www.initech.com/team", "CEO Bill Lumbergh");
    let out = extract_page(&p, Platform::Website, &ctx());
    assert_eq!(out[0].lead.company.as_deref(), Some("Initech"));

    p.metadata.title = Some("Initech Corp".into());
    let out = extract_page(&p, Platform::Website, &ctx());
    assert_eq!(out[0].lead.company.as_deref(), Some("Initech Corp"));
}

#[test]
fn emails_without_names_derive_name_and_company() {
    let p = page(
        "https://acme.com/contact",
        "Write to jane.doe@acme.com or call (555) 123-4567",
    );
    let out = extract_page(&p, Platform::Website, &ctx());
    assert_eq!(out.len(), 1);
    let lead = &out[0].lead;
    assert_eq!(lead.full_name.as_deref(), Some("Jane Doe"));
    assert_eq!(lead.company.as_deref(), Some("Acme"));
    assert_eq!(lead.website.as_deref(), Some("https://acme.com"));
    assert_eq!(lead.phone.as_deref(), Some("(555) 123-4567"));
}

#[test]
fn country_code_second_level_suffix_is_skipped() {
    assert_eq!(company_from_host("acme.co.uk").as_deref(), Some("Acme"));
    assert_eq!(company_from_host("mail.acme.com.au").as_deref(), Some("Acme"));
    assert_eq!(company_from_host("www.acme.com").as_deref(), Some("Acme"));
    assert_eq!(company_from_host("acme.io").as_deref(), Some("Acme"));
    assert_eq!(company_from_host("co.uk").as_deref(), Some("Co"));
    assert_eq!(company_from_host("").as_deref(), None);

    let p = page("https://acme.co.uk/contact", "Write to jane.doe@acme.co.uk");
    let out = extract_page(&p, Platform::Website, &ctx());
    assert_eq!(out[0].lead.company.as_deref(), Some("Acme"));
}

#[test]
fn free_mail_domains_keep_the_page_company() {
    let mut p = page("https://acme.com/contact", "reach jane.doe@gmail.com");
    p.metadata.og_site_name = Some("Acme".into());
    let out = extract_page(&p, Platform::Website, &ctx());
    let lead = &out[0].lead;
    assert_eq!(lead.company.as_deref(), Some("Acme"));
    assert_eq!(lead.website, None);
    assert_eq!(lead.full_name.as_deref(), Some("Jane Doe"));
}

#[test]
fn undotted_local_part_leaves_name_empty() {
    let out = extract_page(
        &page("https://acme.com/contact", "info@acme.com"),
        Platform::Website,
        &ctx(),
    );
    assert_eq!(out[0].lead.full_name, None);
    assert_eq!(out[0].lead.email.as_deref(), Some("info@acme.com"));
}

#[test]
fn contact_page_without_contacts_yields_company_candidate() {
    let mut p = page("https://acme.com/about-us", "We build rockets.");
    p.metadata.og_site_name = Some("Acme".into());
    p.metadata.description = Some("Rockets for everyone".into());
    let out = extract_page(&p, Platform::Website, &ctx());
    assert_eq!(out.len(), 1);
    let lead = &out[0].lead;
    assert_eq!(lead.company.as_deref(), Some("Acme"));
    assert_eq!(lead.website.as_deref(), Some("https://acme.com/about-us"));
    assert_eq!(lead.source_content.as_deref(), Some("Rockets for everyone"));
    assert_eq!(lead.full_name, None);
}

#[test]
fn contact_us_title_alone_scores_in_the_low_band() {
    let mut p = page("https://initech.com/reach", "Fill in the form below.");
    p.metadata.title = Some("Contact Us".into());
    let out = extract_page(&p, Platform::Website, &ctx());
    assert_eq!(out.len(), 1);
    let lead = &out[0].lead;
    assert_eq!(lead.company, None);
    let score = RuleScorer.score(lead, &out[0].signals);
    assert!((0.3..=0.4).contains(&score), "score {score}");
}

#[test]
fn ordinary_page_without_contacts_yields_nothing() {
    let out = extract_page(
        &page("https://acme.com/pricing", "Plans start at $10"),
        Platform::Website,
        &ctx(),
    );
    assert!(out.is_empty());
}

// ---------------------------------------------------------------------------
// Reddit
// ---------------------------------------------------------------------------

#[test]
fn business_need_post_becomes_lead_with_email_identity() {
    let keywords = vec!["need a CRM".to_string()];
    let ctx = ExtractContext {
        keywords: &keywords,
        ..ctx()
    };
    let record = SourceRecord::RedditPost(post(
        "We need a CRM for our team. Reach me at jane.doe@acme.com",
    ));
    let out = extract_record(&record, &ctx);
    assert_eq!(out.len(), 1);
    let lead = &out[0].lead;
    assert_eq!(lead.platform, Platform::Reddit);
    assert_eq!(lead.first_name.as_deref(), Some("Jane"));
    assert_eq!(lead.last_name.as_deref(), Some("Doe"));
    assert_eq!(lead.company.as_deref(), Some("Acme"));
    assert_eq!(lead.reddit_username.as_deref(), Some("founder_jane"));
    let needs = out[0].signals.needs.expect("needs analysis");
    assert!(needs.is_business_need);
    assert!(needs.contact_info_available);
    assert_eq!(out[0].signals.upvotes, Some(14));
}

#[test]
fn post_without_business_need_is_dropped() {
    let record = SourceRecord::RedditPost(RedditPost {
        title: "Show off my setup".into(),
        ..post("Look at my desk")
    });
    assert!(extract_record(&record, &ctx()).is_empty());
}

#[test]
fn negative_keyword_drops_post() {
    let negatives = vec!["Crypto".to_string()];
    let ctx = ExtractContext {
        negative_keywords: &negatives,
        ..ctx()
    };
    let record = SourceRecord::RedditPost(post("Looking for a crypto wallet dev"));
    assert!(extract_record(&record, &ctx).is_empty());
}

#[test]
fn author_is_fallback_name() {
    let record = SourceRecord::RedditPost(post("looking for an agency, dm me"));
    let out = extract_record(&record, &ctx());
    let lead = &out[0].lead;
    assert_eq!(lead.full_name.as_deref(), Some("founder_jane"));
    assert_eq!(lead.email, None);
}

#[test]
fn needs_analysis_grades_urgency() {
    let urgent = analyze_needs("Looking for a designer ASAP, budget $500", &[]);
    assert_eq!(urgent.urgency, Urgency::High);
    assert!(urgent.budget_mentioned);

    let medium = analyze_needs("any recommendation for a lawyer?", &[]);
    assert_eq!(medium.urgency, Urgency::Medium);
    assert!(!medium.budget_mentioned);

    let none = analyze_needs("nice weather today", &[]);
    assert!(!none.is_business_need);
    assert_eq!(none.urgency, Urgency::Low);
}

// ---------------------------------------------------------------------------
// LinkedIn
// ---------------------------------------------------------------------------

fn company_page() -> LinkedInCompanyPage {
    LinkedInCompanyPage {
        source_url: "https://www.linkedin.com/company/acme".into(),
        company: CompanyInfo {
            name: Some("Acme".into()),
            industry: Some("Software".into()),
            size: Some("51-200".into()),
            recent_updates: vec!["Raised a Series B".into()],
            ..CompanyInfo::default()
        },
        employees: vec![
            Employee {
                full_name: Some("Jane Doe".into()),
                title: Some("VP of Sales".into()),
                department: Some("Sales".into()),
                profile_url: Some("https://www.linkedin.com/in/janedoe".into()),
                about: None,
            },
            Employee {
                full_name: Some("Sam Lee".into()),
                title: Some("Software Engineer".into()),
                ..Employee::default()
            },
            Employee {
                full_name: None,
                title: Some("VP Marketing".into()),
                ..Employee::default()
            },
        ],
    }
}

#[test]
fn linkedin_employees_map_to_leads() {
    let out = extract_record(&SourceRecord::LinkedInCompany(company_page()), &ctx());
    assert_eq!(out.len(), 2, "nameless employees are skipped");
    let jane = &out[0].lead;
    assert_eq!(jane.first_name.as_deref(), Some("Jane"));
    assert_eq!(jane.company.as_deref(), Some("Acme"));
    assert_eq!(jane.company_size.as_deref(), Some("51-200"));
    assert_eq!(
        jane.linkedin_url.as_deref(),
        Some("https://www.linkedin.com/in/janedoe")
    );
    assert!(out[0].signals.company_has_updates);
    assert_eq!(out[0].signals.department.as_deref(), Some("Sales"));
}

#[test]
fn target_titles_filter_employees() {
    let titles = vec!["vp".to_string()];
    let ctx = ExtractContext {
        target_titles: &titles,
        ..ctx()
    };
    let out = extract_record(&SourceRecord::LinkedInCompany(company_page()), &ctx);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].lead.full_name.as_deref(), Some("Jane Doe"));
}

#[test]
fn linkedin_search_profiles_map_to_leads() {
    let page = LinkedInSearchPage {
        source_url: "https://www.linkedin.com/search/results/people/?keywords=cto".into(),
        keyword: "cto".into(),
        profiles: vec![Profile {
            full_name: Some("Li Wei Zhang".into()),
            title: Some("CTO".into()),
            company: Some("Initech".into()),
            location: Some("Austin".into()),
            profile_url: None,
            about: Some("Builder".into()),
        }],
    };
    let out = extract_record(&SourceRecord::LinkedInSearch(page), &ctx());
    let lead = &out[0].lead;
    assert_eq!(lead.first_name.as_deref(), Some("Li"));
    assert_eq!(lead.last_name.as_deref(), Some("Wei Zhang"));
    assert_eq!(lead.location.as_deref(), Some("Austin"));
    assert_eq!(lead.scraped_data["search_keyword"], "cto");
}
