//! Alchemy's curated "best web3 grants" article.
//!
//! The page is editorial: each program is a numbered `h2`/`h3` heading with
//! prose paragraphs and an outbound link in the same section. Funding, dates
//! and status are never published there, so every program maps to a rolling,
//! active grant.

use std::sync::OnceLock;

use async_trait::async_trait;
use buidl_core::{
    extract_chains_from_text, normalize_chains, slug, slugify, CanonicalRecord, Foundation,
    GrantRecord, GrantStatus, Source,
};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    element_text, parse_selector, truncate_chars, AdapterError, FetchedPage, ListingTarget,
    MapContext, SourceAdapter,
};

pub const ALCHEMY_GRANTS_URL: &str = "https://www.alchemy.com/best/web3-grants";

const MAX_DESCRIPTION_CHARS: usize = 500;
const MAX_SHORT_DESCRIPTION_CHARS: usize = 200;
const FALLBACK_CHAIN: &str = "Multi-chain";

/// One program heading with the prose and link around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedGrant {
    pub source_id: String,
    pub name: String,
    pub description: Option<String>,
    pub application_url: String,
}

fn numbering_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s*").expect("valid numbering regex"))
}

fn is_program_heading(text: &str) -> bool {
    let lower = text.to_lowercase();
    numbering_regex().is_match(text) || lower.contains("grant") || lower.contains("fund")
}

/// Closest enclosing `<section>`, else the direct parent.
fn heading_scope(heading: ElementRef<'_>) -> Option<ElementRef<'_>> {
    heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "section")
        .or_else(|| heading.parent().and_then(ElementRef::wrap))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlchemyGrantsAdapter;

impl AlchemyGrantsAdapter {
    pub fn new() -> Self {
        Self
    }

    fn read_heading(
        &self,
        index: usize,
        heading: ElementRef<'_>,
        base: &Url,
    ) -> Result<Option<ListedGrant>, AdapterError> {
        let Some(text) = element_text(heading) else {
            return Ok(None);
        };
        if !is_program_heading(&text) {
            return Ok(None);
        }
        let name = numbering_regex().replace(&text, "").trim().to_string();
        let card_err = |reason: &str| AdapterError::Card {
            index,
            reason: format!("{name:?}: {reason}"),
        };
        let source_id = slugify(&name);
        if source_id.is_empty() {
            return Err(card_err("heading has no usable name"));
        }
        let scope = heading_scope(heading).ok_or_else(|| card_err("heading has no container"))?;

        let paragraphs = parse_selector("p")?;
        let prose = scope
            .select(&paragraphs)
            .filter_map(element_text)
            .collect::<Vec<_>>()
            .join(" ");
        let description = Some(truncate_chars(&prose, MAX_DESCRIPTION_CHARS)).filter(|d| !d.is_empty());

        let links = parse_selector("a[href]")?;
        let application_url = scope
            .select(&links)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| base.join(href.trim()).ok())
            .find(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| card_err("no outbound link"))?;

        Ok(Some(ListedGrant {
            source_id,
            name,
            description,
            application_url: application_url.to_string(),
        }))
    }

    pub fn map_listed(&self, grant: &ListedGrant, ctx: &MapContext<'_>) -> GrantRecord {
        let source = Source::AlchemyGrants;
        let chain = extract_chains_from_text(&grant.name)
            .into_iter()
            .next()
            .unwrap_or_else(|| FALLBACK_CHAIN.to_string());
        let chains = normalize_chains(&[chain.as_str()]);
        let foundation = Foundation {
            name: grant.name.split_whitespace().next().unwrap_or(&grant.name).to_string(),
            chain,
            website_url: None,
            logo_url: None,
        };
        let texts = grant.description.iter().collect::<Vec<_>>();

        GrantRecord {
            source,
            source_id: grant.source_id.clone(),
            slug: slug(&grant.name, source.as_str(), &grant.source_id),
            name: grant.name.clone(),
            description: grant.description.clone(),
            short_description: grant
                .description
                .as_deref()
                .map(|d| truncate_chars(d, MAX_SHORT_DESCRIPTION_CHARS)),
            foundation,
            funding: None,
            application_deadline: None,
            program_start_date: None,
            program_end_date: None,
            is_rolling: true,
            chains: chains.chains,
            chain_ids: chains.chain_ids,
            categories: ctx.rules.categorize(&texts, &[]),
            tracks: Vec::new(),
            application_url: Some(grant.application_url.clone()),
            guidelines_url: None,
            logo_url: None,
            status: GrantStatus::Active,
            raw_data: serde_json::to_value(grant).unwrap_or_default(),
            content_hash: String::new(),
            last_scraped_at: ctx.scraped_at,
        }
    }
}

#[async_trait]
impl SourceAdapter for AlchemyGrantsAdapter {
    type Candidate = ListedGrant;

    fn source(&self) -> Source {
        Source::AlchemyGrants
    }

    fn listing_targets(&self) -> Vec<ListingTarget> {
        vec![ListingTarget {
            url: ALCHEMY_GRANTS_URL.to_string(),
        }]
    }

    fn parse_listing(
        &self,
        page: &FetchedPage,
    ) -> Result<Vec<Result<ListedGrant, AdapterError>>, AdapterError> {
        let base = Url::parse(&page.url)
            .map_err(|e| AdapterError::Message(format!("bad page url {}: {e}", page.url)))?;
        let headings = parse_selector("h2, h3")?;
        let document = Html::parse_document(&page.text());
        let found = document
            .select(&headings)
            .enumerate()
            .filter_map(|(index, heading)| self.read_heading(index, heading, &base).transpose())
            .collect::<Vec<_>>();
        if found.is_empty() {
            return Err(AdapterError::Message(format!("no grant headings on {}", page.url)));
        }
        Ok(found)
    }

    fn candidate_id(&self, candidate: &ListedGrant) -> String {
        candidate.source_id.clone()
    }

    fn map_candidate(&self, grant: &ListedGrant, ctx: &MapContext<'_>) -> CanonicalRecord {
        CanonicalRecord::Grant(self.map_listed(grant, ctx)).with_content_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buidl_core::CategoryRules;
    use chrono::Utc;

    const ARTICLE: &str = include_str!("../../../fixtures/alchemy_grants/listing.html");

    fn page(html: &str) -> FetchedPage {
        FetchedPage {
            url: ALCHEMY_GRANTS_URL.into(),
            body: html.as_bytes().to_vec(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn numbered_and_grant_headings_become_programs() {
        let parsed = AlchemyGrantsAdapter::new().parse_listing(&page(ARTICLE)).unwrap();
        let ok = parsed.iter().filter_map(|r| r.as_ref().ok()).collect::<Vec<_>>();
        let names = ok.iter().map(|g| g.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["Solana Foundation Grants", "Arbitrum DAO Grants", "Gitcoin Grants Stack"]
        );
        assert_eq!(ok[0].source_id, "solana-foundation-grants");
        assert_eq!(ok[0].application_url, "https://solana.org/grants");
        assert_eq!(ok[2].application_url, "https://www.alchemy.com/grants/gitcoin");
        assert!(ok[1].description.as_deref().unwrap().contains("governance"));

        let skipped = parsed.iter().filter(|r| r.is_err()).count();
        assert_eq!(skipped, 1, "heading without a link is reported");
    }

    #[test]
    fn listed_grants_map_to_rolling_active_programs() {
        let adapter = AlchemyGrantsAdapter::new();
        let rules = CategoryRules::default();
        let ctx = MapContext { scraped_at: Utc::now(), rules: &rules };
        let parsed = adapter.parse_listing(&page(ARTICLE)).unwrap();
        let grants = parsed.into_iter().filter_map(Result::ok).collect::<Vec<_>>();

        let solana = adapter.map_listed(&grants[0], &ctx);
        assert_eq!(solana.chains, vec!["Solana"]);
        assert_eq!(solana.foundation.name, "Solana");
        assert_eq!(solana.status, GrantStatus::Active);
        assert!(solana.is_rolling);
        assert!(solana.funding.is_none());
        assert_eq!(solana.slug, "solana-foundation-grants-alchemy-grants-solana-f");

        let arbitrum = adapter.map_listed(&grants[1], &ctx);
        assert!(arbitrum.categories.contains(&"dao".to_string()));

        let gitcoin = adapter.map_listed(&grants[2], &ctx);
        assert_eq!(gitcoin.chains, vec!["Multi-chain"]);
        assert!(gitcoin.chain_ids.is_empty());
    }

    #[test]
    fn page_without_headings_is_unreadable() {
        let err = AlchemyGrantsAdapter::new()
            .parse_listing(&page("<html><body><p>Moved.</p></body></html>"))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Message(_)));
    }
}
