use std::cmp::Ordering;

use serde::Serialize;

/// Soft line threshold above which candidate ranges are penalized
/// linearly.
pub const RANGE_SOFT_THRESHOLD_LINES: usize = 160;

/// Part of the prompt fingerprint: bump when the ranking contract
/// changes.
pub const RANKING_VERSION: u32 = 1;

/// One ranked bundle candidate with its full score vector.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Candidate {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub search_score: f64,
    pub matched_terms: Vec<String>,
    pub source_query: String,
    pub definition_match: bool,
    pub reference_count_in_range: usize,
    pub min_definition_distance: Option<usize>,
    pub path_name_relevance: usize,
    pub range_size_penalty: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_reference: Option<String>,
}

impl Candidate {
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    #[must_use]
    pub fn compute_range_size_penalty(line_count: usize) -> usize {
        line_count.saturating_sub(RANGE_SOFT_THRESHOLD_LINES)
    }
}

/// The ranking contract, in this exact lexicographic order:
/// definition_match desc, search_score desc, reference_count desc,
/// path_name_relevance desc, matched_terms_count desc,
/// min_definition_distance asc (absent last), range_size_penalty asc,
/// then path asc and start_line asc as final tie-breakers.
#[must_use]
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.definition_match
        .cmp(&a.definition_match)
        .then_with(|| {
            b.search_score
                .partial_cmp(&a.search_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| b.reference_count_in_range.cmp(&a.reference_count_in_range))
        .then_with(|| b.path_name_relevance.cmp(&a.path_name_relevance))
        .then_with(|| b.matched_terms.len().cmp(&a.matched_terms.len()))
        .then_with(|| {
            let a_distance = a.min_definition_distance.unwrap_or(usize::MAX);
            let b_distance = b.min_definition_distance.unwrap_or(usize::MAX);
            a_distance.cmp(&b_distance)
        })
        .then_with(|| a.range_size_penalty.cmp(&b.range_size_penalty))
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.start_line.cmp(&b.start_line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(path: &str, start: usize) -> Candidate {
        Candidate {
            path: path.to_string(),
            start_line: start,
            end_line: start + 10,
            search_score: 1.0,
            matched_terms: vec!["term".to_string()],
            source_query: "q".to_string(),
            definition_match: false,
            reference_count_in_range: 0,
            min_definition_distance: None,
            path_name_relevance: 0,
            range_size_penalty: 0,
            symbol_reference: None,
        }
    }

    #[test]
    fn definition_match_outranks_raw_score() {
        let mut weak = candidate("a.rs", 1);
        weak.definition_match = true;
        weak.search_score = 0.1;
        let mut strong = candidate("b.rs", 1);
        strong.search_score = 9.0;

        assert_eq!(compare_candidates(&weak, &strong), Ordering::Less);
    }

    #[test]
    fn full_tie_falls_back_to_path_and_start_line() {
        let first = candidate("a.rs", 1);
        let second = candidate("a.rs", 40);
        let third = candidate("b.rs", 1);

        let mut all = vec![third.clone(), second.clone(), first.clone()];
        all.sort_by(compare_candidates);
        assert_eq!(all, vec![first, second, third]);
    }

    #[test]
    fn closer_definitions_rank_higher() {
        let mut near = candidate("a.rs", 1);
        near.min_definition_distance = Some(2);
        let mut far = candidate("a.rs", 50);
        far.min_definition_distance = Some(90);
        let absent = candidate("a.rs", 99);

        let mut all = vec![absent.clone(), far.clone(), near.clone()];
        all.sort_by(compare_candidates);
        assert_eq!(all, vec![near, far, absent]);
    }

    #[test]
    fn oversized_ranges_are_penalized() {
        assert_eq!(Candidate::compute_range_size_penalty(100), 0);
        assert_eq!(
            Candidate::compute_range_size_penalty(RANGE_SOFT_THRESHOLD_LINES),
            0
        );
        assert_eq!(
            Candidate::compute_range_size_penalty(RANGE_SOFT_THRESHOLD_LINES + 25),
            25
        );
    }
}
