use std::sync::OnceLock;

use regex::Regex;

use crate::Money;

fn symbol_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$\s*(\d[\d,]*(?:\.\d+)?)\s*([km]\b)?").expect("valid dollar amount regex")
    })
}

fn code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*([kKmM]\b)?\s*([A-Z]{2,5})\b").expect("valid coded amount regex")
    })
}

fn scaled(number: &str, suffix: Option<&str>) -> Option<f64> {
    let value = number.replace(',', "").parse::<f64>().ok()?;
    let factor = match suffix.map(|s| s.to_ascii_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some(value * factor)
}

/// Pulls the first amount out of prize text such as `"$50,000"`,
/// `"150,000 USD"`, `"10K USDC"` or `"$1.5M in prizes"`.
pub fn parse_money(text: &str) -> Option<Money> {
    if let Some(caps) = code_regex().captures(text) {
        let amount = scaled(&caps[1], caps.get(2).map(|m| m.as_str()))?;
        if amount > 0.0 {
            return Some(Money {
                amount,
                currency: caps[3].to_string(),
            });
        }
    }
    let caps = symbol_regex().captures(text)?;
    let amount = scaled(&caps[1], caps.get(2).map(|m| m.as_str()))?;
    (amount > 0.0).then(|| Money {
        amount,
        currency: "USD".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(amount: f64, currency: &str) -> Option<Money> {
        Some(Money {
            amount,
            currency: currency.to_string(),
        })
    }

    #[test]
    fn parses_common_prize_shapes() {
        assert_eq!(parse_money("150,000 USD"), money(150_000.0, "USD"));
        assert_eq!(parse_money("$50,000"), money(50_000.0, "USD"));
        assert_eq!(parse_money("10,000 USDC in prizes"), money(10_000.0, "USDC"));
        assert_eq!(parse_money("$1.5M"), money(1_500_000.0, "USD"));
        assert_eq!(parse_money("Prize pool 25K ARB"), money(25_000.0, "ARB"));
    }

    #[test]
    fn rejects_text_without_amounts() {
        assert_eq!(parse_money("Swag and glory"), None);
        assert_eq!(parse_money("$0"), None);
    }
}
