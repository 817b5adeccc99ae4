//! Content fingerprints used for change detection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{Funding, Money};

/// The significant fields of a record, in hashing order. Struct field order
/// is the serialization order, so the digest never depends on how the
/// upstream payload was laid out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HashInput<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub amount: Option<AmountFingerprint<'a>>,
    pub status: &'a str,
    pub action_url: Option<&'a str>,
}

/// Prize pool or funding band, flattened to one shape for both record kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmountFingerprint<'a> {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub total: Option<f64>,
    pub currency: &'a str,
}

impl<'a> AmountFingerprint<'a> {
    pub fn from_money(money: &'a Money) -> Self {
        Self {
            min: Some(money.amount),
            max: Some(money.amount),
            total: None,
            currency: &money.currency,
        }
    }

    pub fn from_funding(funding: &'a Funding) -> Self {
        Self {
            min: funding.min_amount,
            max: funding.max_amount,
            total: funding.total_pool,
            currency: &funding.currency,
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn content_hash(input: &HashInput<'_>) -> String {
    let bytes = serde_json::to_vec(input).expect("hash input always serializes");
    sha256_hex(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CanonicalRecord, Foundation, FundingFormat, GrantRecord, GrantStatus, HackathonFormat,
        HackathonRecord, HackathonStatus, Source,
    };
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single().unwrap()
    }

    fn hackathon() -> HackathonRecord {
        HackathonRecord {
            source: Source::Ethglobal,
            source_id: "bangkok".into(),
            slug: "ethglobal-bangkok-ethglobal-bangkok".into(),
            name: "ETHGlobal Bangkok".into(),
            description: Some("Build on Ethereum in Bangkok".into()),
            short_description: None,
            start_date: ts(2026, 11, 15),
            end_date: ts(2026, 11, 17),
            dates_estimated: false,
            format: HackathonFormat::InPerson,
            location: Some("Bangkok".into()),
            prize_pool: Some(Money {
                amount: 500_000.0,
                currency: "USD".into(),
            }),
            registration_url: Some("https://ethglobal.com/events/bangkok".into()),
            website_url: None,
            logo_url: Some("https://ethglobal.com/logo.png".into()),
            banner_url: None,
            participant_count: None,
            chains: vec!["Ethereum".into()],
            chain_ids: vec![1],
            categories: vec!["infrastructure".into()],
            themes: vec![],
            sponsors: vec![],
            status: HackathonStatus::Upcoming,
            is_official: true,
            raw_data: serde_json::json!({"slug": "bangkok"}),
            content_hash: String::new(),
            last_scraped_at: ts(2026, 10, 1),
        }
    }

    fn grant() -> GrantRecord {
        GrantRecord {
            source: Source::FoundationGrants,
            source_id: "ef-grants".into(),
            slug: "ethereum-foundation-grants-foundation-grants-ef-grant".into(),
            name: "Ethereum Foundation Grants".into(),
            description: Some("Core infrastructure grants".into()),
            short_description: None,
            foundation: Foundation {
                name: "Ethereum Foundation".into(),
                chain: "Ethereum".into(),
                website_url: None,
                logo_url: None,
            },
            funding: Some(Funding {
                min_amount: Some(10_000.0),
                max_amount: Some(500_000.0),
                currency: "USD".into(),
                format: FundingFormat::Range,
                total_pool: None,
            }),
            application_deadline: None,
            program_start_date: None,
            program_end_date: None,
            is_rolling: true,
            chains: vec!["Ethereum".into()],
            chain_ids: vec![1],
            categories: vec!["infrastructure".into()],
            tracks: vec![],
            application_url: Some("https://esp.ethereum.foundation/".into()),
            guidelines_url: None,
            logo_url: None,
            status: GrantStatus::Active,
            raw_data: serde_json::json!({}),
            content_hash: String::new(),
            last_scraped_at: ts(2026, 10, 1),
        }
    }

    fn hash_of(h: &HackathonRecord) -> String {
        content_hash(&h.hash_input())
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn hash_is_64_hex_chars_and_deterministic() {
        let a = hash_of(&hackathon());
        let b = hash_of(&hackathon());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn insignificant_fields_do_not_move_the_hash() {
        let base = hash_of(&hackathon());

        let mut h = hackathon();
        h.logo_url = Some("https://cdn.example/other.png".into());
        h.last_scraped_at = ts(2027, 1, 1);
        h.raw_data = serde_json::json!({"anything": ["else"]});
        h.banner_url = Some("https://cdn.example/banner.png".into());
        h.participant_count = Some(900);
        assert_eq!(hash_of(&h), base);
    }

    #[test]
    fn significant_fields_move_the_hash() {
        let base = hash_of(&hackathon());
        let mutations: Vec<Box<dyn Fn(&mut HackathonRecord)>> = vec![
            Box::new(|h: &mut HackathonRecord| h.name.push_str(" 2026")),
            Box::new(|h: &mut HackathonRecord| h.description = Some("changed".into())),
            Box::new(|h: &mut HackathonRecord| h.start_date = ts(2026, 11, 14)),
            Box::new(|h: &mut HackathonRecord| h.end_date = ts(2026, 11, 18)),
            Box::new(|h: &mut HackathonRecord| h.prize_pool.as_mut().unwrap().amount = 750_000.0),
            Box::new(|h: &mut HackathonRecord| h.status = HackathonStatus::Ongoing),
            Box::new(|h: &mut HackathonRecord| h.registration_url = Some("https://ethglobal.com/events/bkk".into())),
        ];
        for mutate in mutations {
            let mut h = hackathon();
            mutate(&mut h);
            assert_ne!(hash_of(&h), base);
        }
    }

    #[test]
    fn estimated_dates_are_left_out_of_the_hash() {
        let mut a = hackathon();
        a.dates_estimated = true;
        let mut b = a.clone();
        b.start_date = ts(2026, 12, 1);
        b.end_date = ts(2026, 12, 30);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn grant_hash_tracks_funding_deadline_and_application_url() {
        let base = content_hash(&grant().hash_input());

        let mut g = grant();
        g.logo_url = Some("https://cdn.example/ef.png".into());
        g.tracks = vec!["Cryptography".into()];
        assert_eq!(content_hash(&g.hash_input()), base);

        let mut g = grant();
        g.funding.as_mut().unwrap().max_amount = Some(600_000.0);
        assert_ne!(content_hash(&g.hash_input()), base);

        let mut g = grant();
        g.application_deadline = Some(ts(2027, 1, 31));
        assert_ne!(content_hash(&g.hash_input()), base);

        let mut g = grant();
        g.application_url = None;
        assert_ne!(content_hash(&g.hash_input()), base);
    }

    #[test]
    fn canonical_record_fills_its_own_hash() {
        let record = CanonicalRecord::Grant(grant()).with_content_hash();
        assert_eq!(record.content_hash(), content_hash(&grant().hash_input()));
    }
}
