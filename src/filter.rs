//! The four-stage filter engine. Stages run in declared order (state,
//! numbers, labels, strings), each consuming only the survivors of the
//! previous one; a stage whose directive is absent is skipped.

use crate::config::{FilterSpec, NumberToken, SignedToken};
use crate::error::Result;
use crate::models::{Feature, FeatureState};

/// Reduce the fetched record set to the subset matching the spec.
/// The strings/numbers precondition is re-checked here so the engine
/// never silently ignores a strings filter.
pub fn apply(records: Vec<Feature>, spec: &FilterSpec) -> Result<Vec<Feature>> {
    spec.validate()?;

    let records = filter_state(records, spec.state);
    let records = match &spec.numbers {
        Some(tokens) => filter_numbers(records, tokens),
        None => records,
    };
    let records = match &spec.labels {
        Some(tokens) => filter_labels(records, tokens),
        None => records,
    };
    let records = match &spec.strings {
        Some(tokens) => filter_strings(records, tokens),
        None => records,
    };
    Ok(records)
}

fn filter_state(records: Vec<Feature>, state: FeatureState) -> Vec<Feature> {
    records.into_iter().filter(|r| r.state == state).collect()
}

/// Union of token matches. An `all` token anywhere in the list makes
/// the stage a no-op; no other token is consulted.
fn filter_numbers(records: Vec<Feature>, tokens: &[NumberToken]) -> Vec<Feature> {
    if tokens.iter().any(|t| matches!(t, NumberToken::All)) {
        return records;
    }
    records
        .into_iter()
        .filter(|r| tokens.iter().any(|t| t.matches(r.number)))
        .collect()
}

struct SignedSets<'a> {
    all: bool,
    includes: Vec<&'a str>,
    excludes: Vec<&'a str>,
}

/// One pass over the tokens into explicit include/exclude sets.
fn resolve_signed(tokens: &[SignedToken]) -> SignedSets<'_> {
    let mut sets = SignedSets {
        all: false,
        includes: Vec::new(),
        excludes: Vec::new(),
    };
    for token in tokens {
        match token {
            SignedToken::All => sets.all = true,
            SignedToken::Include(name) => sets.includes.push(name),
            SignedToken::Exclude(name) => sets.excludes.push(name),
        }
    }
    sets
}

/// A record survives iff it carries every included label and none of
/// the excluded ones. A record with no labels passes only when there
/// are no inclusion tokens.
fn filter_labels(records: Vec<Feature>, tokens: &[SignedToken]) -> Vec<Feature> {
    let sets = resolve_signed(tokens);
    if sets.all {
        return records;
    }
    records
        .into_iter()
        .filter(|r| {
            sets.includes.iter().all(|name| r.has_label(name))
                && !sets.excludes.iter().any(|name| r.has_label(name))
        })
        .collect()
}

/// Case-insensitive substring match over title and body combined, with
/// the same signed AND semantics as labels.
fn filter_strings(records: Vec<Feature>, tokens: &[SignedToken]) -> Vec<Feature> {
    let sets = resolve_signed(tokens);
    if sets.all {
        return records;
    }
    records
        .into_iter()
        .filter(|r| {
            let text = r.searchable_text().to_lowercase();
            sets.includes
                .iter()
                .all(|needle| text.contains(&needle.to_lowercase()))
                && !sets
                    .excludes
                    .iter()
                    .any(|needle| text.contains(&needle.to_lowercase()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterSpec, NumberToken, SignedToken};
    use crate::error::Error;
    use crate::models::Label;
    use chrono::{TimeZone, Utc};

    fn record(number: u64, state: FeatureState, labels: &[&str], title: &str, body: &str) -> Feature {
        Feature {
            number,
            state,
            title: title.to_string(),
            body: if body.is_empty() {
                None
            } else {
                Some(body.to_string())
            },
            labels: labels
                .iter()
                .map(|n| Label {
                    name: n.to_string(),
                })
                .collect(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            closed_at: None,
        }
    }

    fn open_records(numbers: &[u64]) -> Vec<Feature> {
        numbers
            .iter()
            .map(|n| record(*n, FeatureState::Open, &[], "t", ""))
            .collect()
    }

    fn numbers_of(records: &[Feature]) -> Vec<u64> {
        records.iter().map(|r| r.number).collect()
    }

    fn spec(
        numbers: Option<Vec<NumberToken>>,
        labels: Option<Vec<SignedToken>>,
        strings: Option<Vec<SignedToken>>,
    ) -> FilterSpec {
        FilterSpec {
            state: FeatureState::Open,
            numbers,
            labels,
            strings,
        }
    }

    #[test]
    fn state_stage_runs_first() {
        let records = vec![
            record(1, FeatureState::Open, &[], "t", ""),
            record(2, FeatureState::Closed, &[], "t", ""),
            record(3, FeatureState::Open, &[], "t", ""),
        ];
        let out = apply(records, &spec(None, None, None)).unwrap();
        assert_eq!(numbers_of(&out), vec![1, 3]);
    }

    #[test]
    fn numbers_all_is_a_noop_at_any_position() {
        let records = open_records(&[1, 2, 3, 4, 5]);
        let tokens = vec![NumberToken::Single(2), NumberToken::All, NumberToken::Single(9)];
        let out = apply(records, &spec(Some(tokens), None, None)).unwrap();
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn numbers_union_of_single_and_range() {
        // Spec case: {1..5} with [2, 4-5] yields exactly {2, 4, 5}.
        let records = open_records(&[1, 2, 3, 4, 5]);
        let tokens = vec![NumberToken::Single(2), NumberToken::Range(4, 5)];
        let out = apply(records, &spec(Some(tokens), None, None)).unwrap();
        assert_eq!(numbers_of(&out), vec![2, 4, 5]);
    }

    #[test]
    fn numbers_union_is_order_independent() {
        let tokens_a = vec![NumberToken::Range(4, 5), NumberToken::Single(2)];
        let tokens_b = vec![NumberToken::Single(2), NumberToken::Range(4, 5)];
        let out_a = apply(open_records(&[1, 2, 3, 4, 5]), &spec(Some(tokens_a), None, None)).unwrap();
        let out_b = apply(open_records(&[1, 2, 3, 4, 5]), &spec(Some(tokens_b), None, None)).unwrap();
        assert_eq!(numbers_of(&out_a), numbers_of(&out_b));
    }

    #[test]
    fn numbers_tokens_matching_nothing_are_not_errors() {
        let records = open_records(&[1, 2]);
        let tokens = vec![NumberToken::Single(999), NumberToken::Range(50, 60)];
        let out = apply(records, &spec(Some(tokens), None, None)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn label_inclusions_and_exclusions_combine_with_and() {
        // Spec case: ["-bug", "enhancement"] keeps only R2.
        let records = vec![
            record(1, FeatureState::Open, &["bug"], "t", ""),
            record(2, FeatureState::Open, &["enhancement"], "t", ""),
            record(3, FeatureState::Open, &["enhancement", "bug"], "t", ""),
            record(4, FeatureState::Open, &[], "t", ""),
        ];
        let tokens = vec![
            SignedToken::Exclude("bug".into()),
            SignedToken::Include("enhancement".into()),
        ];
        let out = apply(records, &spec(None, Some(tokens), None)).unwrap();
        assert_eq!(numbers_of(&out), vec![2]);
    }

    #[test]
    fn label_and_is_commutative_but_all_always_short_circuits() {
        let make = || {
            vec![
                record(1, FeatureState::Open, &["bug"], "t", ""),
                record(2, FeatureState::Open, &["enhancement"], "t", ""),
            ]
        };
        let forward = vec![
            SignedToken::Include("enhancement".into()),
            SignedToken::Exclude("bug".into()),
        ];
        let backward = vec![
            SignedToken::Exclude("bug".into()),
            SignedToken::Include("enhancement".into()),
        ];
        assert_eq!(
            numbers_of(&apply(make(), &spec(None, Some(forward), None)).unwrap()),
            numbers_of(&apply(make(), &spec(None, Some(backward), None)).unwrap()),
        );

        let trailing_all = vec![SignedToken::Exclude("bug".into()), SignedToken::All];
        let out = apply(make(), &spec(None, Some(trailing_all), None)).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn unlabeled_records_pass_without_inclusion_tokens() {
        let records = vec![
            record(1, FeatureState::Open, &[], "t", ""),
            record(2, FeatureState::Open, &["wontfix"], "t", ""),
        ];
        let tokens = vec![SignedToken::Exclude("wontfix".into())];
        let out = apply(records, &spec(None, Some(tokens), None)).unwrap();
        assert_eq!(numbers_of(&out), vec![1]);
    }

    #[test]
    fn string_match_is_case_insensitive_substring_over_title_and_body() {
        // Substring (not whole-word) semantics, per the tool's docs.
        let records = vec![
            record(1, FeatureState::Open, &[], "DCPS alignment", "elsewhere"),
            record(2, FeatureState::Open, &[], "unrelated", "notes on dcps drift"),
            record(3, FeatureState::Open, &[], "unrelated", "BT shutter"),
            record(4, FeatureState::Open, &[], "DCPS and BT", ""),
        ];
        let tokens = vec![
            SignedToken::Include("dcps".into()),
            SignedToken::Exclude("BT".into()),
        ];
        let numbers = Some(vec![NumberToken::Range(1, 10)]);
        let out = apply(records, &spec(numbers, None, Some(tokens))).unwrap();
        assert_eq!(numbers_of(&out), vec![1, 2]);
    }

    #[test]
    fn strings_with_all_numbers_is_rejected_before_filtering() {
        let records = open_records(&[1]);
        let s = spec(
            Some(vec![NumberToken::All]),
            None,
            Some(vec![SignedToken::Include("x".into())]),
        );
        assert!(matches!(apply(records, &s), Err(Error::Config(_))));
    }

    #[test]
    fn strings_without_numbers_section_is_allowed() {
        // An omitted numbers section means the stage is skipped, which
        // is a different validation path from an explicit `all` token.
        let records = vec![record(1, FeatureState::Open, &[], "DCPS", "")];
        let s = spec(None, None, Some(vec![SignedToken::Include("dcps".into())]));
        assert_eq!(apply(records, &s).unwrap().len(), 1);
    }

    #[test]
    fn stages_chain_on_survivors_only() {
        let records = vec![
            record(2, FeatureState::Open, &["bug"], "DCPS", ""),
            record(4, FeatureState::Open, &["enhancement"], "DCPS", ""),
            record(5, FeatureState::Closed, &["enhancement"], "DCPS", ""),
            record(9, FeatureState::Open, &["enhancement"], "DCPS", ""),
        ];
        let s = spec(
            Some(vec![NumberToken::Range(1, 5)]),
            Some(vec![SignedToken::Include("enhancement".into())]),
            Some(vec![SignedToken::Include("dcps".into())]),
        );
        // 5 drops at state, 9 at numbers, 2 at labels; 4 survives all.
        let out = apply(records, &s).unwrap();
        assert_eq!(numbers_of(&out), vec![4]);
    }
}
