//! URL slugs for canonical records: `{name}-{source}-{id}`, all lowercase
//! hyphenated ASCII, stable across re-scrapes of the same listing.

const MAX_NAME_CHARS: usize = 50;
const MAX_ID_CHARS: usize = 8;

/// Lowercase, collapse runs of anything outside `[a-z0-9]` into one hyphen,
/// trim hyphens, cap at 50 characters.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    out.truncate(MAX_NAME_CHARS);
    out.trim_end_matches('-').to_string()
}

/// `slugify(name)-{source}-{source_id[..8]}`. The source/id suffix is what
/// keeps two events with the same name apart.
pub fn slug(name: &str, source: &str, source_id: &str) -> String {
    let id_prefix = source_id.chars().take(MAX_ID_CHARS).collect::<String>();
    let suffix = [slugify(source), slugify(&id_prefix)]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    match slugify(name) {
        base if base.is_empty() => suffix,
        base => format!("{base}-{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_deterministic_and_url_safe() {
        let a = slug("ETHGlobal Bangkok", "ethglobal", "bangkok-2026");
        let b = slug("ETHGlobal Bangkok", "ethglobal", "bangkok-2026");
        assert_eq!(a, b);
        assert_eq!(a, "ethglobal-bangkok-ethglobal-bangkok");
        assert!(a.len() <= 50 + "-ethglobal-".len() + 8);
        assert!(a.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("  Arbitrum STIP (Short-Term Incentive Program) "), "arbitrum-stip-short-term-incentive-program");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("해커톤 Seoul 2026"), "seoul-2026");
    }

    #[test]
    fn long_names_are_capped_at_fifty_chars() {
        let name = "a very long hackathon name that keeps going and going past the limit";
        let s = slugify(name);
        assert!(s.len() <= 50);
        assert!(!s.ends_with('-'));
    }

    #[test]
    fn underscores_in_source_become_hyphens() {
        let s = slug("Polkadot Treasury", "foundation_grants", "polkadot-treasury");
        assert_eq!(s, "polkadot-treasury-foundation-grants-polkadot");
    }
}
