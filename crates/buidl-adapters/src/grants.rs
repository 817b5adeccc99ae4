//! Curated foundation grant programs, served from a YAML catalog.

use async_trait::async_trait;
use buidl_core::status::GRANTS;
use buidl_core::{
    normalize_chains, slug, CanonicalRecord, Foundation, Funding, GrantRecord, GrantStatus, Source,
};
use buidl_storage::HttpFetcher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AdapterContext, AdapterError, FetchedPage, ListingTarget, MapContext, SourceAdapter};

pub const BUILTIN_CATALOG: &str = include_str!("../../../catalog/foundation_grants.yaml");

/// Listing target that resolves to the catalog held by the adapter.
pub const EMBEDDED_CATALOG_URL: &str = "catalog://foundation_grants";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantCatalog {
    pub foundations: Vec<CatalogFoundation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogFoundation {
    pub name: String,
    pub chain: String,
    pub url: Option<String>,
    pub logo_url: Option<String>,
    #[serde(default)]
    pub grants: Vec<CatalogGrant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogGrant {
    pub name: String,
    /// Stable source id.
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub funding: Option<Funding>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tracks: Vec<String>,
    pub application_url: Option<String>,
    pub guidelines_url: Option<String>,
    pub application_deadline: Option<DateTime<Utc>>,
    pub program_start_date: Option<DateTime<Utc>>,
    pub program_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_rolling: bool,
    pub status: Option<String>,
}

/// One grant program with its owning foundation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantEntry {
    pub foundation: Foundation,
    pub grant: CatalogGrant,
}

#[derive(Debug, Clone)]
pub struct FoundationGrantsAdapter {
    catalog: String,
}

impl FoundationGrantsAdapter {
    pub fn new() -> Self {
        Self::with_catalog(BUILTIN_CATALOG)
    }

    pub fn with_catalog(catalog: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
        }
    }

    pub fn map_entry(&self, entry: &GrantEntry, ctx: &MapContext<'_>) -> GrantRecord {
        let grant = &entry.grant;
        let source = Source::FoundationGrants;
        let chains = normalize_chains(&[entry.foundation.chain.as_str()]);

        let mut texts = grant.categories.clone();
        texts.push(grant.name.clone());
        texts.extend(grant.description.clone());
        let categories = ctx.rules.categorize(&texts, &[]);

        let status = grant
            .status
            .as_deref()
            .and_then(|s| GRANTS.classify(s))
            .unwrap_or(GrantStatus::Active);

        GrantRecord {
            source,
            source_id: grant.slug.clone(),
            slug: slug(&grant.name, source.as_str(), &grant.slug),
            name: grant.name.clone(),
            description: grant.description.clone(),
            short_description: grant.short_description.clone(),
            foundation: entry.foundation.clone(),
            funding: grant.funding.clone(),
            application_deadline: grant.application_deadline,
            program_start_date: grant.program_start_date,
            program_end_date: grant.program_end_date,
            is_rolling: grant.is_rolling,
            chains: chains.chains,
            chain_ids: chains.chain_ids,
            categories,
            tracks: grant.tracks.clone(),
            application_url: grant.application_url.clone(),
            guidelines_url: grant.guidelines_url.clone(),
            logo_url: entry.foundation.logo_url.clone(),
            status,
            raw_data: serde_json::to_value(entry).unwrap_or_default(),
            content_hash: String::new(),
            last_scraped_at: ctx.scraped_at,
        }
    }
}

impl Default for FoundationGrantsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for FoundationGrantsAdapter {
    type Candidate = GrantEntry;

    fn source(&self) -> Source {
        Source::FoundationGrants
    }

    fn listing_targets(&self) -> Vec<ListingTarget> {
        vec![ListingTarget {
            url: EMBEDDED_CATALOG_URL.to_string(),
        }]
    }

    /// The embedded catalog needs no network; any other target is a remote
    /// catalog fetched over HTTP.
    async fn fetch_listing(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        targets: &[ListingTarget],
    ) -> Result<Vec<FetchedPage>, AdapterError> {
        let mut pages = Vec::with_capacity(targets.len());
        for target in targets {
            let body = if target.url == EMBEDDED_CATALOG_URL {
                self.catalog.as_bytes().to_vec()
            } else {
                http.fetch(self.source(), &target.url).await?.body
            };
            pages.push(FetchedPage {
                url: target.url.clone(),
                body,
                fetched_at: ctx.fetched_at,
            });
        }
        Ok(pages)
    }

    fn parse_listing(
        &self,
        page: &FetchedPage,
    ) -> Result<Vec<Result<GrantEntry, AdapterError>>, AdapterError> {
        let catalog: GrantCatalog = serde_yaml::from_slice(&page.body)?;
        let mut index = 0;
        let mut out = Vec::new();
        for foundation in catalog.foundations {
            let owner = Foundation {
                name: foundation.name.clone(),
                chain: foundation.chain.clone(),
                website_url: foundation.url.clone(),
                logo_url: foundation.logo_url.clone(),
            };
            for grant in foundation.grants {
                let entry = if grant.slug.trim().is_empty() || grant.name.trim().is_empty() {
                    Err(AdapterError::Card {
                        index,
                        reason: format!("grant under {} lacks a name or slug", owner.name),
                    })
                } else {
                    Ok(GrantEntry {
                        foundation: owner.clone(),
                        grant,
                    })
                };
                out.push(entry);
                index += 1;
            }
        }
        Ok(out)
    }

    fn candidate_id(&self, candidate: &GrantEntry) -> String {
        candidate.grant.slug.clone()
    }

    fn map_candidate(&self, entry: &GrantEntry, ctx: &MapContext<'_>) -> CanonicalRecord {
        CanonicalRecord::Grant(self.map_entry(entry, ctx)).with_content_hash()
    }
}
