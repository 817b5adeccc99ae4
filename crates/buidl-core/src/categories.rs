//! Keyword-driven category assignment over a fixed vocabulary.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const FALLBACK_CATEGORY: &str = "web3";

const BUILTIN_RULES: &[(&str, &[&str])] = &[
    ("defi", &["defi", "decentralized finance", "finance", "lending", "dex", "amm", "yield", "liquidity"]),
    ("nft", &["nft", "collectible", "digital art", "art"]),
    ("gaming", &["gaming", "gamefi", "game", "play to earn", "p2e"]),
    ("dao", &["dao", "governance"]),
    ("infrastructure", &["infrastructure", "infra", "developer tools", "developer", "tooling", "sdk", "api", "depin"]),
    ("social", &["social", "socialfi", "social network", "community"]),
    ("privacy", &["privacy", "zk", "zero knowledge", "zkp"]),
    ("identity", &["identity", "decentralized identity", "credential", "kyc"]),
    ("payments", &["payment", "stablecoin", "remittance"]),
    ("ai", &["ai", "artificial intelligence", "machine learning", "ml"]),
    ("rwa", &["rwa", "real world asset", "tokenization"]),
    ("security", &["security", "audit", "auditing"]),
    ("education", &["education", "onboarding", "learning"]),
    ("public-goods", &["public goods", "open source", "oss"]),
    ("metaverse", &["metaverse", "virtual world", "vr", "xr"]),
];

/// Keywords that mark a listing as web3-related on general-purpose platforms.
const WEB3_KEYWORDS: &[&str] = &[
    "blockchain", "web3", "crypto", "defi", "nft", "ethereum", "solana", "bitcoin",
    "smart contract", "dapp", "dao", "token", "decentralized", "polygon", "arbitrum",
    "optimism", "cosmos", "polkadot", "near", "sui", "aptos", "hedera", "cardano",
    "avalanche", "bnb", "binance",
];

/// One rule as written in `rules/categories.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub contains_any: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRulesFile {
    pub version: u32,
    #[serde(default)]
    pub rules: Vec<CategoryRule>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    category: String,
    matcher: Regex,
}

/// Compiled category rules. Rule order is output order.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<CompiledRule>,
}

fn keyword_pattern(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"[\s\-]+")
}

impl CategoryRules {
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, regex::Error> {
        let rules = rules
            .into_iter()
            .filter(|rule| !rule.contains_any.is_empty())
            .map(|rule| {
                let alternatives = rule
                    .contains_any
                    .iter()
                    .map(|k| keyword_pattern(k))
                    .collect::<Vec<_>>()
                    .join("|");
                let matcher = Regex::new(&format!(r"(?i)\b(?:{alternatives})s?\b"))?;
                Ok(CompiledRule {
                    category: rule.category,
                    matcher,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    pub fn builtin_rules() -> Vec<CategoryRule> {
        BUILTIN_RULES
            .iter()
            .map(|(category, keywords)| CategoryRule {
                category: category.to_string(),
                contains_any: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect()
    }

    /// Categories whose keywords appear in any of `texts`; may be empty.
    pub fn matches<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| texts.iter().any(|t| rule.matcher.is_match(t.as_ref())))
            .map(|rule| rule.category.clone())
            .fold(Vec::new(), |mut acc, category| {
                if !acc.contains(&category) {
                    acc.push(category);
                }
                acc
            })
    }

    /// Like [`matches`](Self::matches) but never empty: falls back to
    /// `defaults`, then to the single fallback category.
    pub fn categorize<S: AsRef<str>>(&self, texts: &[S], defaults: &[&str]) -> Vec<String> {
        let found = self.matches(texts);
        if !found.is_empty() {
            return found;
        }
        if !defaults.is_empty() {
            return defaults.iter().map(|d| d.to_string()).collect();
        }
        vec![FALLBACK_CATEGORY.to_string()]
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::new(Self::builtin_rules()).expect("builtin category rules compile")
    }
}

fn web3_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternatives = WEB3_KEYWORDS
            .iter()
            .map(|k| keyword_pattern(k))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)\b(?:{alternatives})")).expect("valid web3 keyword regex")
    })
}

pub fn is_web3_relevant(text: &str) -> bool {
    web3_regex().is_match(text)
}
