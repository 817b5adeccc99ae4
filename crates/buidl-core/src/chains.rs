//! Chain name normalization against a static alias table.
//!
//! EVM chains carry their EIP-155 id; non-EVM chains use ids from 900 up.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: i64,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

pub static CHAINS: &[ChainInfo] = &[
    ChainInfo { id: 1, name: "Ethereum", aliases: &["ethereum", "eth", "ethereum mainnet", "mainnet"] },
    ChainInfo { id: 56, name: "BNB Chain", aliases: &["bnb", "bsc", "binance", "binance smart chain", "bnb chain"] },
    ChainInfo { id: 137, name: "Polygon", aliases: &["polygon", "matic", "polygon pos", "polygon mainnet"] },
    ChainInfo { id: 43114, name: "Avalanche", aliases: &["avalanche", "avax", "avalanche c-chain"] },
    ChainInfo { id: 250, name: "Fantom", aliases: &["fantom", "ftm"] },
    ChainInfo { id: 900, name: "Solana", aliases: &["solana", "sol"] },
    ChainInfo { id: 901, name: "NEAR", aliases: &["near", "near protocol"] },
    ChainInfo { id: 902, name: "Sui", aliases: &["sui"] },
    ChainInfo { id: 903, name: "Aptos", aliases: &["aptos", "apt"] },
    ChainInfo { id: 904, name: "Cosmos Hub", aliases: &["cosmos", "atom", "cosmos hub"] },
    ChainInfo { id: 905, name: "Cardano", aliases: &["cardano", "ada"] },
    ChainInfo { id: 10, name: "Optimism", aliases: &["optimism", "op", "op mainnet"] },
    ChainInfo { id: 8453, name: "Base", aliases: &["base", "base mainnet", "coinbase"] },
    ChainInfo { id: 42161, name: "Arbitrum One", aliases: &["arbitrum", "arb", "arbitrum one"] },
    ChainInfo { id: 42170, name: "Arbitrum Nova", aliases: &["arbitrum nova", "nova"] },
    ChainInfo { id: 324, name: "zkSync Era", aliases: &["zksync", "zksync era", "zk sync"] },
    ChainInfo { id: 59144, name: "Linea", aliases: &["linea", "linea mainnet"] },
    ChainInfo { id: 534352, name: "Scroll", aliases: &["scroll"] },
    ChainInfo { id: 1101, name: "Polygon zkEVM", aliases: &["polygon zkevm", "polygon hermez"] },
    ChainInfo { id: 169, name: "Manta Pacific", aliases: &["manta", "manta pacific"] },
    ChainInfo { id: 81457, name: "Blast", aliases: &["blast"] },
];

/// Chains mentioned in prose. Deliberately narrower than the alias table:
/// short aliases like "op" or "sol" are too noisy in free text.
const TEXT_PATTERNS: &[&str] = &[
    r"ethereum",
    r"polygon",
    r"arbitrum",
    r"optimism",
    r"base",
    r"solana",
    r"near",
    r"sui",
    r"aptos",
    r"zksync",
    r"linea",
    r"scroll",
    r"blast",
    r"bnb\s*chain",
    r"avalanche",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedChains {
    pub chains: Vec<String>,
    pub chain_ids: Vec<i64>,
}

pub fn lookup_chain(raw: &str) -> Option<&'static ChainInfo> {
    let key = raw
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    CHAINS.iter().find(|chain| chain.aliases.contains(&key.as_str()))
}

/// Maps raw chain names onto canonical display names, keeping input order.
/// Unrecognized names pass through trimmed and contribute no id; anything
/// that normalizes to an already-emitted name is dropped.
pub fn normalize_chains<S: AsRef<str>>(raw: &[S]) -> NormalizedChains {
    let mut out = NormalizedChains::default();
    for name in raw {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        match lookup_chain(name) {
            Some(chain) => {
                if !out.chain_ids.contains(&chain.id) {
                    out.chains.push(chain.name.to_string());
                    out.chain_ids.push(chain.id);
                }
            }
            None => {
                if !out.chains.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                    out.chains.push(name.to_string());
                }
            }
        }
    }
    out
}

fn text_regexes() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        TEXT_PATTERNS
            .iter()
            .map(|p| Regex::new(&format!(r"(?i)\b{p}\b")).expect("valid chain pattern"))
            .collect()
    })
}

/// Canonical names of chains mentioned in free text, in pattern order.
pub fn extract_chains_from_text(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for re in text_regexes() {
        let Some(m) = re.find(text) else {
            continue;
        };
        let name = lookup_chain(m.as_str())
            .map(|c| c.name.to_string())
            .unwrap_or_else(|| m.as_str().to_string());
        if !found.contains(&name) {
            found.push(name);
        }
    }
    found
}
