//! Free-text status badges mapped onto canonical statuses.
//!
//! Each upstream site (and locale) gets its own ordered table; the first rule
//! with a keyword contained in the badge wins.

use crate::HackathonStatus::{Completed, Judging, Ongoing, RegistrationOpen, Upcoming};
use crate::{GrantStatus, HackathonStatus};

#[derive(Debug, Clone, Copy)]
pub struct StatusRule<S: 'static> {
    pub keywords: &'static [&'static str],
    pub status: S,
}

#[derive(Debug, Clone, Copy)]
pub struct StatusTable<S: 'static> {
    pub name: &'static str,
    pub rules: &'static [StatusRule<S>],
}

impl<S: Copy> StatusTable<S> {
    /// `None` when no rule matches; callers fall back to dates or a default.
    pub fn classify(&self, text: &str) -> Option<S> {
        let lower = text.to_lowercase();
        if lower.trim().is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lower.contains(k)))
            .map(|rule| rule.status)
    }
}

/// Plain English badges used by ETHGlobal and Taikai cards.
pub const ENGLISH_BADGES: StatusTable<HackathonStatus> = StatusTable {
    name: "english",
    rules: &[
        StatusRule { keywords: &["judging", "voting"], status: Judging },
        StatusRule { keywords: &["ended", "closed", "completed", "finished", "past"], status: Completed },
        StatusRule { keywords: &["live", "ongoing", "in progress", "happening now"], status: Ongoing },
        StatusRule { keywords: &["registration open", "apply now", "register", "open"], status: RegistrationOpen },
        StatusRule { keywords: &["upcoming", "coming soon", "soon"], status: Upcoming },
    ],
};

pub const DORAHACKS: StatusTable<HackathonStatus> = StatusTable {
    name: "dorahacks",
    rules: &[
        StatusRule { keywords: &["pre-registration", "pre registration"], status: Upcoming },
        StatusRule { keywords: &["winner announced", "ended"], status: Completed },
        StatusRule { keywords: &["judging", "voting"], status: Judging },
        StatusRule { keywords: &["ongoing", "extended"], status: Ongoing },
        StatusRule { keywords: &["upcoming"], status: Upcoming },
    ],
};

pub const AKINDO: StatusTable<HackathonStatus> = StatusTable {
    name: "akindo",
    rules: &[
        StatusRule { keywords: &["closed", "ended"], status: Completed },
        StatusRule { keywords: &["building", "live", "judging"], status: Ongoing },
        StatusRule { keywords: &["open", "coming soon"], status: RegistrationOpen },
    ],
};

pub const DEVPOST: StatusTable<HackathonStatus> = StatusTable {
    name: "devpost",
    rules: &[
        StatusRule { keywords: &["ended", "closed", "completed"], status: Completed },
        StatusRule { keywords: &["judging"], status: Judging },
        StatusRule { keywords: &["ongoing", "in progress"], status: Ongoing },
        StatusRule { keywords: &["open", "accepting"], status: RegistrationOpen },
        StatusRule { keywords: &["upcoming"], status: Upcoming },
    ],
};

/// Devfolio renders Korean badges for some locales.
pub const DEVFOLIO: StatusTable<HackathonStatus> = StatusTable {
    name: "devfolio",
    rules: &[
        StatusRule { keywords: &["종료", "ended"], status: Completed },
        StatusRule { keywords: &["실시간", "live"], status: Ongoing },
        StatusRule { keywords: &["open", "applications open"], status: RegistrationOpen },
        StatusRule { keywords: &["upcoming", "coming soon"], status: Upcoming },
    ],
};

pub const HACKQUEST: StatusTable<HackathonStatus> = StatusTable {
    name: "hackquest",
    rules: &[
        StatusRule { keywords: &["종료됨", "ended"], status: Completed },
        StatusRule { keywords: &["실시간", "live"], status: Ongoing },
        StatusRule { keywords: &["투표", "voting"], status: Ongoing },
        StatusRule { keywords: &["다가오는", "upcoming"], status: Upcoming },
        StatusRule { keywords: &["등록", "registration", "register", "open"], status: RegistrationOpen },
    ],
};

pub const GRANTS: StatusTable<GrantStatus> = StatusTable {
    name: "grants",
    rules: &[
        StatusRule { keywords: &["paused", "on hold"], status: GrantStatus::Paused },
        StatusRule { keywords: &["closed", "ended", "inactive"], status: GrantStatus::Closed },
        StatusRule { keywords: &["upcoming", "coming soon"], status: GrantStatus::Upcoming },
        StatusRule { keywords: &["active", "open", "accepting", "rolling"], status: GrantStatus::Active },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn korean_and_english_hackquest_badges() {
        assert_eq!(HACKQUEST.classify("실시간"), Some(Ongoing));
        assert_eq!(HACKQUEST.classify("종료됨"), Some(Completed));
        assert_eq!(HACKQUEST.classify("다가오는"), Some(Upcoming));
        assert_eq!(HACKQUEST.classify("Registration Open"), Some(RegistrationOpen));
        assert_eq!(HACKQUEST.classify("LIVE"), Some(Ongoing));
        assert_eq!(HACKQUEST.classify("투표"), Some(Ongoing));
        assert_eq!(DORAHACKS.classify("Voting"), Some(Judging));
    }

    #[test]
    fn first_matching_rule_wins() {
        assert_eq!(DORAHACKS.classify("Pre-registration"), Some(Upcoming));
        assert_eq!(DORAHACKS.classify("Ended · Winner Announced"), Some(Completed));
        assert_eq!(ENGLISH_BADGES.classify("Registration closed"), Some(Completed));
    }

    #[test]
    fn unknown_or_blank_text_has_no_signal() {
        assert_eq!(DEVPOST.classify("Featured"), None);
        assert_eq!(DEVPOST.classify("   "), None);
        assert_eq!(GRANTS.classify("Invite only"), None);
    }

    #[test]
    fn grant_badges() {
        assert_eq!(GRANTS.classify("Accepting applications"), Some(GrantStatus::Active));
        assert_eq!(GRANTS.classify("Round closed"), Some(GrantStatus::Closed));
        assert_eq!(GRANTS.classify("Paused"), Some(GrantStatus::Paused));
    }
}
