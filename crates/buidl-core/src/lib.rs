//! Canonical hackathon/grant model plus the normalizers every extractor shares.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub mod categories;
pub mod chains;
pub mod dates;
pub mod hash;
pub mod money;
pub mod slug;
pub mod status;

pub use categories::{is_web3_relevant, CategoryRule, CategoryRules, CategoryRulesFile, FALLBACK_CATEGORY};
pub use chains::{extract_chains_from_text, lookup_chain, normalize_chains, ChainInfo, NormalizedChains};
pub use dates::{estimate_window, parse_date_range, DateRange};
pub use hash::{content_hash, sha256_hex, AmountFingerprint, HashInput};
pub use money::parse_money;
pub use slug::{slug, slugify};
pub use status::{StatusRule, StatusTable};

pub const CRATE_NAME: &str = "buidl-core";

/// Upstream catalog a record was scraped from. Part of the identity key, so
/// the wire strings never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Ethglobal,
    Devfolio,
    Dorahacks,
    Akindo,
    Devpost,
    Hackquest,
    Taikai,
    FoundationGrants,
    AlchemyGrants,
}

impl Source {
    pub const ALL: [Source; 9] = [
        Source::Ethglobal,
        Source::Devfolio,
        Source::Dorahacks,
        Source::Akindo,
        Source::Devpost,
        Source::Hackquest,
        Source::Taikai,
        Source::FoundationGrants,
        Source::AlchemyGrants,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Ethglobal => "ethglobal",
            Source::Devfolio => "devfolio",
            Source::Dorahacks => "dorahacks",
            Source::Akindo => "akindo",
            Source::Devpost => "devpost",
            Source::Hackquest => "hackquest",
            Source::Taikai => "taikai",
            Source::FoundationGrants => "foundation_grants",
            Source::AlchemyGrants => "alchemy_grants",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Ethglobal => "ETHGlobal",
            Source::Devfolio => "Devfolio",
            Source::Dorahacks => "DoraHacks",
            Source::Akindo => "Akindo",
            Source::Devpost => "Devpost",
            Source::Hackquest => "HackQuest",
            Source::Taikai => "Taikai",
            Source::FoundationGrants => "Foundation Grants",
            Source::AlchemyGrants => "Alchemy Grants",
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Source::FoundationGrants | Source::AlchemyGrants => EntityKind::Grant,
            _ => EntityKind::Hackathon,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown source: {0}")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Source::ALL
            .into_iter()
            .find(|source| source.as_str() == needle)
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Hackathon,
    Grant,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Hackathon => "hackathon",
            EntityKind::Grant => "grant",
        }
    }

    /// Backing table in the persisted catalog.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Hackathon => "hackathons",
            EntityKind::Grant => "grants",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity type: {0}")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hackathon" | "hackathons" => Ok(EntityKind::Hackathon),
            "grant" | "grants" => Ok(EntityKind::Grant),
            _ => Err(UnknownEntityKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HackathonStatus {
    Upcoming,
    RegistrationOpen,
    Ongoing,
    Judging,
    Completed,
}

impl HackathonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HackathonStatus::Upcoming => "upcoming",
            HackathonStatus::RegistrationOpen => "registration_open",
            HackathonStatus::Ongoing => "ongoing",
            HackathonStatus::Judging => "judging",
            HackathonStatus::Completed => "completed",
        }
    }

    /// Date-derived status: before start is upcoming, inside the window is
    /// ongoing, after the end is completed.
    pub fn from_dates(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            HackathonStatus::Upcoming
        } else if now <= end {
            HackathonStatus::Ongoing
        } else {
            HackathonStatus::Completed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Active,
    Upcoming,
    Closed,
    Paused,
}

impl GrantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantStatus::Active => "active",
            GrantStatus::Upcoming => "upcoming",
            GrantStatus::Closed => "closed",
            GrantStatus::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HackathonFormat {
    #[default]
    Online,
    InPerson,
    Hybrid,
}

impl HackathonFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            HackathonFormat::Online => "online",
            HackathonFormat::InPerson => "in-person",
            HackathonFormat::Hybrid => "hybrid",
        }
    }

    /// Reads an explicit format badge, falling back to the location: a named
    /// place other than "online" means the event is held in person.
    pub fn infer(format_text: Option<&str>, location: Option<&str>) -> Self {
        if let Some(text) = format_text {
            let lower = text.to_lowercase();
            if lower.contains("hybrid") {
                return HackathonFormat::Hybrid;
            }
            if ["in-person", "in person", "offline", "irl"]
                .iter()
                .any(|k| lower.contains(k))
            {
                return HackathonFormat::InPerson;
            }
            if ["online", "virtual", "remote"].iter().any(|k| lower.contains(k)) {
                return HackathonFormat::Online;
            }
        }
        match location.map(|l| l.trim().to_lowercase()) {
            Some(l) if !l.is_empty() && !["online", "virtual", "remote", "global"].contains(&l.as_str()) => {
                HackathonFormat::InPerson
            }
            _ => HackathonFormat::Online,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FundingFormat {
    Fixed,
    Range,
    Negotiable,
    MilestoneBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funding {
    #[serde(default)]
    pub min_amount: Option<f64>,
    #[serde(default)]
    pub max_amount: Option<f64>,
    pub currency: String,
    pub format: FundingFormat,
    #[serde(default)]
    pub total_pool: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Foundation {
    pub name: String,
    pub chain: String,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
}

/// Canonical hackathon row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HackathonRecord {
    pub source: Source,
    pub source_id: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// True when the window was estimated from the status because the
    /// upstream page carried no parseable dates.
    pub dates_estimated: bool,
    pub format: HackathonFormat,
    pub location: Option<String>,
    pub prize_pool: Option<Money>,
    pub registration_url: Option<String>,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub participant_count: Option<u32>,
    pub chains: Vec<String>,
    pub chain_ids: Vec<i64>,
    pub categories: Vec<String>,
    pub themes: Vec<String>,
    pub sponsors: Vec<String>,
    pub status: HackathonStatus,
    pub is_official: bool,
    pub raw_data: JsonValue,
    pub content_hash: String,
    pub last_scraped_at: DateTime<Utc>,
}

impl HackathonRecord {
    pub fn hash_input(&self) -> HashInput<'_> {
        let (start, end) = if self.dates_estimated {
            (None, None)
        } else {
            (Some(self.start_date), Some(self.end_date))
        };
        HashInput {
            name: &self.name,
            description: self.description.as_deref(),
            start,
            end,
            deadline: None,
            amount: self.prize_pool.as_ref().map(AmountFingerprint::from_money),
            status: self.status.as_str(),
            action_url: self.registration_url.as_deref(),
        }
    }
}

/// Canonical grant program row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub source: Source,
    pub source_id: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub foundation: Foundation,
    pub funding: Option<Funding>,
    pub application_deadline: Option<DateTime<Utc>>,
    pub program_start_date: Option<DateTime<Utc>>,
    pub program_end_date: Option<DateTime<Utc>>,
    pub is_rolling: bool,
    pub chains: Vec<String>,
    pub chain_ids: Vec<i64>,
    pub categories: Vec<String>,
    pub tracks: Vec<String>,
    pub application_url: Option<String>,
    pub guidelines_url: Option<String>,
    pub logo_url: Option<String>,
    pub status: GrantStatus,
    pub raw_data: JsonValue,
    pub content_hash: String,
    pub last_scraped_at: DateTime<Utc>,
}

impl GrantRecord {
    pub fn hash_input(&self) -> HashInput<'_> {
        HashInput {
            name: &self.name,
            description: self.description.as_deref(),
            start: self.program_start_date,
            end: self.program_end_date,
            deadline: self.application_deadline,
            amount: self.funding.as_ref().map(AmountFingerprint::from_funding),
            status: self.status.as_str(),
            action_url: self.application_url.as_deref(),
        }
    }
}

/// Either record kind, as handed from a mapper to the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum CanonicalRecord {
    Hackathon(HackathonRecord),
    Grant(GrantRecord),
}

impl CanonicalRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            CanonicalRecord::Hackathon(_) => EntityKind::Hackathon,
            CanonicalRecord::Grant(_) => EntityKind::Grant,
        }
    }

    pub fn source(&self) -> Source {
        match self {
            CanonicalRecord::Hackathon(h) => h.source,
            CanonicalRecord::Grant(g) => g.source,
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            CanonicalRecord::Hackathon(h) => &h.source_id,
            CanonicalRecord::Grant(g) => &g.source_id,
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            CanonicalRecord::Hackathon(h) => &h.slug,
            CanonicalRecord::Grant(g) => &g.slug,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CanonicalRecord::Hackathon(h) => &h.name,
            CanonicalRecord::Grant(g) => &g.name,
        }
    }

    pub fn content_hash(&self) -> &str {
        match self {
            CanonicalRecord::Hackathon(h) => &h.content_hash,
            CanonicalRecord::Grant(g) => &g.content_hash,
        }
    }

    pub fn chains(&self) -> &[String] {
        match self {
            CanonicalRecord::Hackathon(h) => &h.chains,
            CanonicalRecord::Grant(g) => &g.chains,
        }
    }

    pub fn chain_ids(&self) -> &[i64] {
        match self {
            CanonicalRecord::Hackathon(h) => &h.chain_ids,
            CanonicalRecord::Grant(g) => &g.chain_ids,
        }
    }

    pub fn categories(&self) -> &[String] {
        match self {
            CanonicalRecord::Hackathon(h) => &h.categories,
            CanonicalRecord::Grant(g) => &g.categories,
        }
    }

    pub fn hash_input(&self) -> HashInput<'_> {
        match self {
            CanonicalRecord::Hackathon(h) => h.hash_input(),
            CanonicalRecord::Grant(g) => g.hash_input(),
        }
    }

    /// Recomputes `content_hash` from the significant fields.
    pub fn with_content_hash(mut self) -> Self {
        let hash = content_hash(&self.hash_input());
        match &mut self {
            CanonicalRecord::Hackathon(h) => h.content_hash = hash,
            CanonicalRecord::Grant(g) => g.content_hash = hash,
        }
        self
    }
}
