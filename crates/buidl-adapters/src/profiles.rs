//! Card profiles for the hackathon sites.

use buidl_core::status::{AKINDO, DEVFOLIO, DEVPOST, DORAHACKS, ENGLISH_BADGES, HACKQUEST};
use buidl_core::Source;

use crate::cards::{CardProfile, ChainStrategy, IdStrategy, ShortDescription};

const MULTI_CHAIN: ChainStrategy = ChainStrategy::Detected {
    fallback: "Multi-chain",
};

pub fn profile_for(source: Source) -> Option<CardProfile> {
    match source {
        Source::Ethglobal => Some(ethglobal()),
        Source::Devfolio => Some(devfolio()),
        Source::Dorahacks => Some(dorahacks()),
        Source::Akindo => Some(akindo()),
        Source::Devpost => Some(devpost()),
        Source::Hackquest => Some(hackquest()),
        Source::Taikai => Some(taikai()),
        Source::FoundationGrants | Source::AlchemyGrants => None,
    }
}

pub fn ethglobal() -> CardProfile {
    CardProfile {
        source: Source::Ethglobal,
        listing_urls: &["https://ethglobal.com/events"],
        card: "article, [data-testid='event-card'], .event-card",
        link: "a[href*='/events/']",
        id: IdStrategy::PathPattern(r"/events/([A-Za-z0-9_-]+)"),
        name: "h2, h3, .event-name, [class*='title']",
        description: None,
        dates: Some("[class*='date'], time, .event-date"),
        status: Some("[class*='status'], [class*='badge']"),
        prize: None,
        location: Some("[class*='location'], .event-location"),
        format: Some("[class*='format']"),
        tags: None,
        chains: None,
        organizer: None,
        logo: Some("img"),
        status_table: ENGLISH_BADGES,
        chain_strategy: ChainStrategy::Fixed(&["Ethereum"]),
        short_description: ShortDescription::None,
        default_categories: &["infrastructure"],
        is_official: true,
        web3_only: false,
        detail_dates: false,
        strip_locale: false,
    }
}

pub fn devfolio() -> CardProfile {
    CardProfile {
        source: Source::Devfolio,
        listing_urls: &["https://devfolio.co/hackathons"],
        card: "[class*='hackathon-card'], [class*='HackathonCard']",
        link: "a[href*='.devfolio.co']",
        id: IdStrategy::Subdomain {
            domain: "devfolio.co",
            skip: &["www", "api", "org", "guide", "assets"],
        },
        name: "h2, h3, h4, [class*='heading'], [class*='title']",
        description: Some("p"),
        dates: Some("[class*='date']"),
        status: Some("[class*='status']"),
        prize: Some("[class*='prize']"),
        location: Some("[class*='location']"),
        format: Some("[class*='mode']"),
        tags: Some("[class*='tag'], [class*='chip']"),
        chains: None,
        organizer: None,
        logo: Some("img"),
        status_table: DEVFOLIO,
        chain_strategy: MULTI_CHAIN,
        short_description: ShortDescription::Tagline,
        default_categories: &[],
        is_official: false,
        web3_only: false,
        detail_dates: false,
        strip_locale: false,
    }
}

pub fn dorahacks() -> CardProfile {
    CardProfile {
        source: Source::Dorahacks,
        listing_urls: &["https://dorahacks.io/hackathon"],
        card: "[class*='hackathon-item'], [class*='hackathon-card']",
        link: "a[href*='/hackathon/']",
        id: IdStrategy::PathPattern(r"/hackathon/([A-Za-z0-9_-]+)"),
        name: "h2, h3, [class*='title'], [class*='name']",
        description: Some("[class*='desc']"),
        dates: Some("[class*='date'], [class*='time']"),
        status: Some("[class*='status']"),
        prize: Some("[class*='prize'], [class*='reward']"),
        location: Some("[class*='location']"),
        format: None,
        tags: Some("[class*='tag']"),
        chains: Some("[class*='chain']"),
        organizer: Some("[class*='organizer'], [class*='host']"),
        logo: Some("img"),
        status_table: DORAHACKS,
        chain_strategy: MULTI_CHAIN,
        short_description: ShortDescription::OrganizedBy,
        default_categories: &[],
        is_official: true,
        web3_only: false,
        detail_dates: true,
        strip_locale: false,
    }
}

/// Wave hacks and classic hackathons share one source; ids carry the kind.
pub fn akindo() -> CardProfile {
    CardProfile {
        source: Source::Akindo,
        listing_urls: &["https://app.akindo.io/wave-hacks", "https://app.akindo.io/hackathons"],
        card: "a[href*='/wave-hacks/'], a[href*='/hackathons/']",
        link: "a[href]",
        id: IdStrategy::PathPattern(r"/(wave-hacks|hackathons)/([A-Za-z0-9_-]+)"),
        name: "h2, h3, h4, [class*='title'], [class*='heading']",
        description: Some("p, [class*='description']"),
        dates: Some("[class*='date'], [class*='period']"),
        status: Some("[class*='status']"),
        prize: None,
        location: None,
        format: None,
        tags: Some("[class*='tag'], [class*='badge']"),
        chains: None,
        organizer: Some("[class*='organizer'], [class*='sponsor']"),
        logo: Some("img"),
        status_table: AKINDO,
        chain_strategy: MULTI_CHAIN,
        short_description: ShortDescription::None,
        default_categories: &[],
        is_official: true,
        web3_only: false,
        detail_dates: false,
        strip_locale: false,
    }
}

/// Devpost is a general platform: three blockchain/web3 searches, then a
/// keyword filter on each tile.
pub fn devpost() -> CardProfile {
    CardProfile {
        source: Source::Devpost,
        listing_urls: &[
            "https://devpost.com/hackathons?challenge_type[]=online&challenge_type[]=in-person&themes[]=Blockchain",
            "https://devpost.com/hackathons?challenge_type[]=online&challenge_type[]=in-person&search=blockchain",
            "https://devpost.com/hackathons?challenge_type[]=online&challenge_type[]=in-person&search=web3",
        ],
        card: ".hackathon-tile",
        link: "a[href*='.devpost.com']",
        id: IdStrategy::Subdomain {
            domain: "devpost.com",
            skip: &["www", "secure", "help", "info", "api"],
        },
        name: "h2, h3, [class*='title'], [class*='name']",
        description: Some("[class*='tagline'], [class*='description']"),
        dates: Some("[class*='submission-period'], [class*='date'], time"),
        status: Some("[class*='status']"),
        prize: Some("[class*='prize']"),
        location: Some("[class*='location']"),
        format: None,
        tags: Some("[class*='theme'], [class*='tag']"),
        chains: None,
        organizer: Some("[class*='host'], [class*='organization'], [class*='organizer']"),
        logo: Some("img"),
        status_table: DEVPOST,
        chain_strategy: MULTI_CHAIN,
        short_description: ShortDescription::Tagline,
        default_categories: &[],
        is_official: false,
        web3_only: true,
        detail_dates: false,
        strip_locale: false,
    }
}

pub fn hackquest() -> CardProfile {
    CardProfile {
        source: Source::Hackquest,
        listing_urls: &["https://www.hackquest.io/en/hackathons"],
        card: "a[href*='/hackathons/']",
        link: "a[href]",
        id: IdStrategy::PathPattern(r"/hackathons/([A-Za-z0-9_-]+)"),
        name: "h2, h3",
        description: Some("p"),
        dates: Some("[class*='date'], [class*='time']"),
        status: Some("[class*='status']"),
        prize: Some("[class*='prize']"),
        location: None,
        format: None,
        tags: Some("[class*='tag']"),
        chains: Some("[class*='ecosystem']"),
        organizer: Some("[class*='host'], [class*='organizer']"),
        logo: Some("img"),
        status_table: HACKQUEST,
        chain_strategy: MULTI_CHAIN,
        short_description: ShortDescription::None,
        default_categories: &[],
        is_official: false,
        web3_only: false,
        detail_dates: false,
        strip_locale: true,
    }
}

pub fn taikai() -> CardProfile {
    CardProfile {
        source: Source::Taikai,
        listing_urls: &["https://taikai.network/hackathons"],
        card: "[class*='hackathon-card'], [class*='challenge-card'], [class*='event-card']",
        link: "a[href*='/hackathons/']",
        id: IdStrategy::PathPattern(r"/hackathons/([A-Za-z0-9_-]+)"),
        name: "h2, h3, h4, [class*='title'], [class*='name']",
        description: None,
        dates: Some("[class*='date'], [class*='period'], time"),
        status: Some("[class*='status']"),
        prize: Some("[class*='prize'], [class*='reward']"),
        location: Some("[class*='location']"),
        format: Some("[class*='format']"),
        tags: None,
        chains: None,
        organizer: None,
        logo: Some("img"),
        status_table: ENGLISH_BADGES,
        chain_strategy: MULTI_CHAIN,
        short_description: ShortDescription::None,
        default_categories: &[],
        is_official: true,
        web3_only: false,
        detail_dates: false,
        strip_locale: false,
    }
}
