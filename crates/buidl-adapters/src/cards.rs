//! Listing-card adapter shared by every hackathon site.
//!
//! Each site is a [`CardProfile`]: selectors for the card and its fields plus
//! the site's id, status and chain conventions. Selector choices are
//! best-effort; a card missing a name or id is skipped, a missing field is
//! `None`.

use std::sync::OnceLock;

use async_trait::async_trait;
use buidl_core::status::StatusTable;
use buidl_core::{
    estimate_window, extract_chains_from_text, is_web3_relevant, lookup_chain, normalize_chains,
    parse_date_range, parse_money, slug, CanonicalRecord, HackathonFormat, HackathonRecord,
    HackathonStatus, Money, Source,
};
use buidl_storage::HttpFetcher;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;
use url::Url;

use crate::{
    element_text, parse_selector, select_all_raw_text, select_first_attr, select_first_text,
    truncate_chars, AdapterContext, AdapterError, FetchedPage, ListingTarget, MapContext,
    SourceAdapter,
};

/// How a card's stable id is read off its link.
#[derive(Debug, Clone, Copy)]
pub enum IdStrategy {
    /// Regex over the URL path; capture groups are joined with `-`.
    PathPattern(&'static str),
    /// First host label under `domain`, e.g. `ethindia.devfolio.co`.
    Subdomain {
        domain: &'static str,
        skip: &'static [&'static str],
    },
}

#[derive(Debug, Clone, Copy)]
pub enum ChainStrategy {
    Fixed(&'static [&'static str]),
    /// Chain badges, chain-like tags and chains named in the text; the
    /// fallback label when nothing is found.
    Detected { fallback: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortDescription {
    None,
    Tagline,
    OrganizedBy,
}

#[derive(Debug, Clone, Copy)]
pub struct CardProfile {
    pub source: Source,
    pub listing_urls: &'static [&'static str],
    pub card: &'static str,
    pub link: &'static str,
    pub id: IdStrategy,
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub dates: Option<&'static str>,
    pub status: Option<&'static str>,
    pub prize: Option<&'static str>,
    pub location: Option<&'static str>,
    pub format: Option<&'static str>,
    pub tags: Option<&'static str>,
    pub chains: Option<&'static str>,
    pub organizer: Option<&'static str>,
    pub logo: Option<&'static str>,
    pub status_table: StatusTable<HackathonStatus>,
    pub chain_strategy: ChainStrategy,
    pub short_description: ShortDescription,
    pub default_categories: &'static [&'static str],
    pub is_official: bool,
    /// Keep only cards that mention a web3 keyword.
    pub web3_only: bool,
    /// Fetch the detail page for dates when the card shows none.
    pub detail_dates: bool,
    /// Drop a `/ko/`-style locale segment from card links.
    pub strip_locale: bool,
}

/// Raw card as read off a listing page; stored verbatim as `raw_data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HackathonCard {
    pub source_id: String,
    pub name: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub date_text: Option<String>,
    pub status_text: Option<String>,
    pub prize_text: Option<String>,
    pub prize: Option<Money>,
    pub location: Option<String>,
    pub format_text: Option<String>,
    pub participants: Option<u32>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub chains: Vec<String>,
    pub organizer: Option<String>,
}

struct CardSelectors {
    card: Selector,
    link: Selector,
    name: Selector,
    description: Option<Selector>,
    dates: Option<Selector>,
    status: Option<Selector>,
    prize: Option<Selector>,
    location: Option<Selector>,
    format: Option<Selector>,
    tags: Option<Selector>,
    chains: Option<Selector>,
    organizer: Option<Selector>,
    logo: Option<Selector>,
}

fn optional(selector: Option<&str>) -> Result<Option<Selector>, AdapterError> {
    selector.map(parse_selector).transpose()
}

impl CardSelectors {
    fn compile(profile: &CardProfile) -> Result<Self, AdapterError> {
        Ok(Self {
            card: parse_selector(profile.card)?,
            link: parse_selector(profile.link)?,
            name: parse_selector(profile.name)?,
            description: optional(profile.description)?,
            dates: optional(profile.dates)?,
            status: optional(profile.status)?,
            prize: optional(profile.prize)?,
            location: optional(profile.location)?,
            format: optional(profile.format)?,
            tags: optional(profile.tags)?,
            chains: optional(profile.chains)?,
            organizer: optional(profile.organizer)?,
            logo: optional(profile.logo)?,
        })
    }
}

fn first_text_in(el: ElementRef<'_>, sel: Option<&Selector>) -> Option<String> {
    sel.and_then(|s| el.select(s).find_map(element_text))
}

fn all_texts_in(el: ElementRef<'_>, sel: Option<&Selector>) -> Vec<String> {
    let Some(sel) = sel else {
        return Vec::new();
    };
    el.select(sel).filter_map(element_text).fold(Vec::new(), |mut acc, text| {
        if !acc.contains(&text) {
            acc.push(text);
        }
        acc
    })
}

fn participants_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)([\d,]+)\+?\s*(?:참가자|participants?|builders?|buidlers?|hackers?|registrations?)")
            .expect("valid participant count regex")
    })
}

fn locale_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(?:ko|en|zh|ja)/").expect("valid locale regex"))
}

pub(crate) fn parse_participants(text: &str) -> Option<u32> {
    let caps = participants_regex().captures(text)?;
    caps[1].replace(',', "").parse().ok()
}

#[derive(Debug, Clone)]
pub struct CardAdapter {
    profile: CardProfile,
    id_pattern: Option<Regex>,
}

impl CardAdapter {
    pub fn new(profile: CardProfile) -> Self {
        let id_pattern = match profile.id {
            IdStrategy::PathPattern(pattern) => {
                Some(Regex::new(pattern).expect("card profile id pattern compiles"))
            }
            IdStrategy::Subdomain { .. } => None,
        };
        Self { profile, id_pattern }
    }

    pub fn profile(&self) -> &CardProfile {
        &self.profile
    }

    fn resolve_link(&self, base: &Url, href: &str) -> Option<Url> {
        let mut url = base.join(href).ok()?;
        url.set_query(None);
        url.set_fragment(None);
        if self.profile.strip_locale {
            let path = locale_regex().replace(url.path(), "/").into_owned();
            url.set_path(&path);
        }
        Some(url)
    }

    fn extract_id(&self, url: &Url) -> Option<String> {
        match self.profile.id {
            IdStrategy::PathPattern(_) => {
                let caps = self.id_pattern.as_ref()?.captures(url.path())?;
                let parts = caps
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>();
                (!parts.is_empty()).then(|| parts.join("-"))
            }
            IdStrategy::Subdomain { domain, skip } => {
                let host = url.host_str()?.to_ascii_lowercase();
                let prefix = host.strip_suffix(domain)?.strip_suffix('.')?;
                let label = prefix.rsplit('.').next()?;
                (!label.is_empty() && !skip.contains(&label)).then(|| label.to_string())
            }
        }
    }

    fn read_card(
        &self,
        index: usize,
        card: ElementRef<'_>,
        base: &Url,
        sel: &CardSelectors,
    ) -> Result<Option<HackathonCard>, AdapterError> {
        let skip = |reason: &str| AdapterError::Card {
            index,
            reason: reason.to_string(),
        };

        let href = card
            .value()
            .attr("href")
            .or_else(|| card.select(&sel.link).find_map(|a| a.value().attr("href")))
            .ok_or_else(|| skip("no link"))?;
        let url = self.resolve_link(base, href).ok_or_else(|| skip("unresolvable link"))?;
        let source_id = self.extract_id(&url).ok_or_else(|| skip("no id in link"))?;
        let name = first_text_in(card, Some(&sel.name)).ok_or_else(|| skip("missing name"))?;

        let card_text = element_text(card).unwrap_or_default();
        let description = first_text_in(card, sel.description.as_ref());
        let organizer = first_text_in(card, sel.organizer.as_ref());
        let tags = all_texts_in(card, sel.tags.as_ref());

        if self.profile.web3_only {
            let haystack = [Some(name.as_str()), description.as_deref(), organizer.as_deref()]
                .into_iter()
                .flatten()
                .chain(tags.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            if !is_web3_relevant(&haystack) {
                debug!(source = %self.profile.source, %source_id, "card is not web3-related");
                return Ok(None);
            }
        }

        let prize_text = first_text_in(card, sel.prize.as_ref());
        let prize = prize_text
            .as_deref()
            .and_then(parse_money)
            .or_else(|| parse_money(&card_text));
        let logo_url = sel
            .logo
            .as_ref()
            .and_then(|s| card.select(s).find_map(|img| img.value().attr("src")))
            .and_then(|src| base.join(src).ok())
            .map(|u| u.to_string());

        Ok(Some(HackathonCard {
            source_id,
            name,
            url: Some(url.to_string()),
            description,
            date_text: first_text_in(card, sel.dates.as_ref()),
            status_text: first_text_in(card, sel.status.as_ref()),
            prize_text,
            prize,
            location: first_text_in(card, sel.location.as_ref()),
            format_text: first_text_in(card, sel.format.as_ref()),
            participants: parse_participants(&card_text),
            logo_url,
            banner_url: None,
            tags,
            chains: all_texts_in(card, sel.chains.as_ref()),
            organizer,
        }))
    }

    fn chains_for(&self, card: &HackathonCard) -> Vec<String> {
        match self.profile.chain_strategy {
            ChainStrategy::Fixed(chains) => chains.iter().map(|c| c.to_string()).collect(),
            ChainStrategy::Detected { fallback } => {
                let prose = [Some(card.name.as_str()), card.description.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                let mut raw = card.chains.clone();
                raw.extend(card.tags.iter().filter(|t| lookup_chain(t).is_some()).cloned());
                raw.extend(extract_chains_from_text(&prose));
                if raw.iter().all(|c| c.trim().is_empty()) {
                    raw = vec![fallback.to_string()];
                }
                raw
            }
        }
    }

    pub fn map_card(&self, card: &HackathonCard, ctx: &MapContext<'_>) -> HackathonRecord {
        let source = self.profile.source;
        let explicit = card
            .status_text
            .as_deref()
            .and_then(|text| self.profile.status_table.classify(text));

        let parsed = card.date_text.as_deref().and_then(parse_date_range);
        let dates_estimated = parsed.is_none();
        let window = parsed.unwrap_or_else(|| {
            estimate_window(
                explicit.unwrap_or(HackathonStatus::Upcoming),
                ctx.scraped_at.date_naive(),
            )
        });
        let (start_date, end_date) = (window.start_utc(), window.end_utc());

        let status = explicit
            .or_else(|| {
                (!dates_estimated).then(|| HackathonStatus::from_dates(start_date, end_date, ctx.scraped_at))
            })
            .unwrap_or(HackathonStatus::Upcoming);

        let chains = normalize_chains(&self.chains_for(card));

        let mut texts = vec![card.name.clone()];
        texts.extend(card.description.clone());
        texts.extend(card.tags.iter().cloned());
        let categories = ctx.rules.categorize(&texts, self.profile.default_categories);

        let short_description = match self.profile.short_description {
            ShortDescription::None => None,
            ShortDescription::Tagline => card.description.as_deref().map(|d| truncate_chars(d, 200)),
            ShortDescription::OrganizedBy => card.organizer.as_ref().map(|o| format!("Organized by {o}")),
        };

        HackathonRecord {
            source,
            source_id: card.source_id.clone(),
            slug: slug(&card.name, source.as_str(), &card.source_id),
            name: card.name.clone(),
            description: card.description.clone(),
            short_description,
            start_date,
            end_date,
            dates_estimated,
            format: HackathonFormat::infer(card.format_text.as_deref(), card.location.as_deref()),
            location: card.location.clone(),
            prize_pool: card.prize.clone(),
            registration_url: card.url.clone(),
            website_url: card.url.clone(),
            logo_url: card.logo_url.clone(),
            banner_url: card.banner_url.clone(),
            participant_count: card.participants,
            chains: chains.chains,
            chain_ids: chains.chain_ids,
            categories,
            themes: card.tags.clone(),
            sponsors: card.organizer.iter().cloned().collect(),
            status,
            is_official: self.profile.is_official,
            raw_data: serde_json::to_value(card).unwrap_or_default(),
            content_hash: String::new(),
            last_scraped_at: ctx.scraped_at,
        }
    }

    /// Reads dates (JSON-LD first, then visible date text), description,
    /// banner and participant count from a detail page.
    pub fn apply_detail_page(&self, mut card: HackathonCard, html: &str) -> Result<HackathonCard, AdapterError> {
        let document = Html::parse_document(html);

        let ld_dates = select_all_raw_text(&document, "script[type='application/ld+json']")?
            .iter()
            .filter_map(|raw| serde_json::from_str::<JsonValue>(raw).ok())
            .find_map(|value| json_ld_dates(&value));
        let visible_dates = select_first_text(
            &document,
            "[class*='date'], [class*='period'], [class*='time'], time",
        )?;
        if let Some(text) = ld_dates.or(visible_dates) {
            card.date_text = Some(text);
        }

        if card.description.is_none() {
            card.description = select_first_text(
                &document,
                "[class*='description'], [class*='about'], .markdown-body",
            )?;
        }
        if card.banner_url.is_none() {
            card.banner_url = select_first_attr(&document, "meta[property='og:image']", "content")?;
        }
        if card.participants.is_none() {
            let body = select_first_text(&document, "body")?.unwrap_or_default();
            card.participants = parse_participants(&body);
        }
        Ok(card)
    }
}

/// `"{startDate} - {endDate}"` from the first JSON-LD node carrying both.
fn json_ld_dates(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Array(items) => items.iter().find_map(json_ld_dates),
        JsonValue::Object(map) => {
            if let (Some(start), Some(end)) = (
                map.get("startDate").and_then(JsonValue::as_str),
                map.get("endDate").and_then(JsonValue::as_str),
            ) {
                return Some(format!("{start} - {end}"));
            }
            map.get("@graph").and_then(json_ld_dates)
        }
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for CardAdapter {
    type Candidate = HackathonCard;

    fn source(&self) -> Source {
        self.profile.source
    }

    fn listing_targets(&self) -> Vec<ListingTarget> {
        self.profile
            .listing_urls
            .iter()
            .map(|url| ListingTarget { url: url.to_string() })
            .collect()
    }

    fn parse_listing(
        &self,
        page: &FetchedPage,
    ) -> Result<Vec<Result<HackathonCard, AdapterError>>, AdapterError> {
        let base = Url::parse(&page.url)
            .map_err(|e| AdapterError::Message(format!("bad page url {}: {e}", page.url)))?;
        let selectors = CardSelectors::compile(&self.profile)?;
        let document = Html::parse_document(&page.text());

        Ok(document
            .select(&selectors.card)
            .enumerate()
            .filter_map(|(index, card)| self.read_card(index, card, &base, &selectors).transpose())
            .collect())
    }

    fn candidate_id(&self, candidate: &HackathonCard) -> String {
        candidate.source_id.clone()
    }

    async fn enrich(
        &self,
        http: &HttpFetcher,
        _ctx: &AdapterContext,
        card: HackathonCard,
    ) -> Result<HackathonCard, AdapterError> {
        if !self.profile.detail_dates {
            return Ok(card);
        }
        let has_dates = card.date_text.as_deref().and_then(parse_date_range).is_some();
        let Some(url) = card.url.clone().filter(|_| !has_dates) else {
            return Ok(card);
        };
        let resp = http.fetch(self.profile.source, &url).await?;
        self.apply_detail_page(card, &resp.text())
    }

    fn map_candidate(&self, card: &HackathonCard, ctx: &MapContext<'_>) -> CanonicalRecord {
        CanonicalRecord::Hackathon(self.map_card(card, ctx)).with_content_hash()
    }
}
