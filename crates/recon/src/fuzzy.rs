//! Normalized string-similarity scoring over supplier names and product
//! descriptions. Stateless; scores are integers in [0, 100].

/// Default threshold for [`best_match`].
pub const BEST_MATCH_THRESHOLD: u32 = 80;

/// Minimum score for two supplier names to be considered the same party.
const SUPPLIER_THRESHOLD: u32 = 70;

/// Case-insensitive character-similarity score in [0, 100].
pub fn ratio_score(a: &str, b: &str) -> u32 {
    let score = strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase());
    (score * 100.0).round() as u32
}

/// Case-insensitive, token-order-independent similarity in [0, 100].
///
/// Tokens are sorted alphabetically before scoring, so "blue corn tortillas"
/// and "tortillas, corn (blue)" style reorderings still score high. Used for
/// product descriptions where word order varies between documents.
pub fn token_sort_score(a: &str, b: &str) -> u32 {
    ratio_score(&sort_tokens(a), &sort_tokens(b))
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Match two strings, requiring `threshold`; returns (matched, score).
pub fn match_string(a: &str, b: &str, threshold: u32) -> (bool, u32) {
    if a.is_empty() || b.is_empty() {
        return (false, 0);
    }
    let score = ratio_score(a, b);
    (score >= threshold, score)
}

/// Match supplier names, stripping common legal suffixes first (more lenient
/// than [`match_string`]).
pub fn match_supplier(invoice_supplier: &str, po_supplier: &str) -> (bool, u32) {
    let score = ratio_score(
        &strip_legal_suffixes(invoice_supplier),
        &strip_legal_suffixes(po_supplier),
    );
    (score >= SUPPLIER_THRESHOLD, score)
}

fn strip_legal_suffixes(name: &str) -> String {
    name.to_lowercase()
        .replace("ltd", "")
        .replace("limited", "")
        .replace('.', "")
        .trim()
        .to_string()
}

/// Linear scan for the highest-ratio candidate; `None` unless the best score
/// reaches `threshold`.
pub fn best_match<'a>(
    query: &str,
    candidates: &'a [String],
    threshold: u32,
) -> Option<(&'a str, u32)> {
    let mut best: Option<(&str, u32)> = None;

    for candidate in candidates {
        let score = ratio_score(query, candidate);
        if best.is_none() || score > best.unwrap().1 {
            best = Some((candidate, score));
        }
    }

    best.filter(|(_, score)| *score >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_100() {
        assert_eq!(ratio_score("Acme Foods", "Acme Foods"), 100);
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(ratio_score("ACME FOODS", "acme foods"), 100);
    }

    #[test]
    fn disjoint_strings_score_low() {
        assert!(ratio_score("Acme Foods", "Zenith Metals") < 40);
    }

    #[test]
    fn token_sort_ignores_word_order() {
        let a = "organic blue corn tortillas";
        let b = "tortillas corn blue organic";
        assert_eq!(token_sort_score(a, b), 100);
        assert!(ratio_score(a, b) < 100);
    }

    #[test]
    fn match_string_rejects_empty_input() {
        assert_eq!(match_string("", "Acme", 80), (false, 0));
        assert_eq!(match_string("Acme", "", 80), (false, 0));
    }

    #[test]
    fn supplier_match_strips_legal_suffixes() {
        let (matched, score) = match_supplier("Fresh Farm Produce Ltd.", "Fresh Farm Produce");
        assert!(matched, "suffix-only difference should match, score {score}");
        assert_eq!(score, 100);
    }

    #[test]
    fn supplier_match_rejects_different_companies() {
        let (matched, _) = match_supplier("Fresh Farm Produce Ltd", "Global Steel Supplies Ltd");
        assert!(!matched);
    }

    #[test]
    fn best_match_picks_highest_scorer() {
        let candidates = vec![
            "Fresh Farm Produce".to_string(),
            "Fresh Foods".to_string(),
            "Farm Supplies".to_string(),
        ];
        let (name, score) = best_match("Fresh Farm Produce Ltd", &candidates, 80).unwrap();
        assert_eq!(name, "Fresh Farm Produce");
        assert!(score >= 80);
    }

    #[test]
    fn best_match_none_below_threshold() {
        let candidates = vec!["Zenith Metals".to_string()];
        assert!(best_match("Fresh Farm Produce", &candidates, 80).is_none());
    }

    #[test]
    fn best_match_none_for_empty_candidates() {
        assert!(best_match("anything", &[], 80).is_none());
    }
}
