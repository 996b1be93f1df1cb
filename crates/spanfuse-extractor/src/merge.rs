//! Span merge resolver
//!
//! Reconciles the spans an annotator already attached to a document with
//! candidate spans proposed by a rule matcher:
//! - existing spans always win; an overlapping candidate is dropped
//! - candidates overlapping each other with different labels are resolved
//!   longest-first; same-label overlaps are both kept
//! - the union is deduplicated on `(start, end, label)` and sorted

use spanfuse_core::{ConflictPolicy, MergeConfig, Result, Span};

/// Why a candidate was left out of the merged set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Overlaps a span from the existing set
    OverlapsExisting,
    /// Overlaps a longer (or earlier) candidate that was accepted
    OverlapsCandidate,
}

/// A candidate that lost a conflict, with the span it lost to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedSpan {
    pub span: Span,
    pub conflicts_with: Span,
    pub reason: DropReason,
}

/// Result of a merge with the audit trail of dropped candidates
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Merged, deduplicated spans sorted by `(start, end, label)`
    pub spans: Vec<Span>,
    /// Candidates that were discarded, in candidate sort order
    pub dropped: Vec<DroppedSpan>,
}

/// Merges existing and candidate spans into one set free of label conflicts
#[derive(Debug, Clone, Default)]
pub struct SpanMergeResolver {
    policy: ConflictPolicy,
}

impl SpanMergeResolver {
    /// Create a resolver that drops conflicting candidates quietly
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            policy: config.conflict_policy,
        }
    }

    /// Set the conflict policy
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Merge `candidates` into `existing`, returning the merged spans only
    pub fn merge(&self, existing: &[Span], candidates: &[Span]) -> Result<Vec<Span>> {
        Ok(self.merge_detailed(existing, candidates)?.spans)
    }

    /// Merge `candidates` into `existing`, also reporting dropped candidates.
    ///
    /// `existing` must not contain overlapping spans with different labels;
    /// this is only checked in debug builds. Every span must satisfy
    /// `start < end`.
    pub fn merge_detailed(&self, existing: &[Span], candidates: &[Span]) -> Result<MergeOutcome> {
        for span in existing.iter().chain(candidates) {
            span.check_well_formed()?;
        }

        let mut existing: Vec<Span> = existing.to_vec();
        existing.sort();
        existing.dedup();
        debug_assert!(
            !has_label_conflict(&existing),
            "existing spans must not overlap with different labels"
        );

        let mut candidates: Vec<Span> = candidates.to_vec();
        candidates.sort();
        candidates.dedup();

        let mut dropped = Vec::new();
        let survivors = self.filter_against_existing(&existing, candidates, &mut dropped);
        let accepted = self.resolve_candidate_conflicts(survivors, &mut dropped);

        let mut spans = existing;
        spans.extend(accepted);
        // Stable sort keeps existing spans ahead of equal candidates
        spans.sort();
        spans.dedup();

        tracing::debug!(
            "Merged {} spans, dropped {} rule candidates",
            spans.len(),
            dropped.len()
        );

        Ok(MergeOutcome { spans, dropped })
    }

    /// Two-pointer sweep over both inputs sorted by start.
    ///
    /// Existing spans ending at or before `candidate.start` can never overlap
    /// a later candidate, so the cursor only moves forward. The first span
    /// past the cursor overlaps the candidate iff it starts before
    /// `candidate.end`; every span after it starts later still.
    fn filter_against_existing(
        &self,
        existing: &[Span],
        candidates: Vec<Span>,
        dropped: &mut Vec<DroppedSpan>,
    ) -> Vec<Span> {
        let mut survivors = Vec::with_capacity(candidates.len());
        let mut cursor = 0;

        for candidate in candidates {
            // Exact duplicate of an existing span collapses without a conflict
            if existing.binary_search(&candidate).is_ok() {
                continue;
            }
            while cursor < existing.len() && existing[cursor].end <= candidate.start {
                cursor += 1;
            }

            match existing.get(cursor) {
                Some(hit) if hit.start < candidate.end => {
                    self.record_drop(dropped, candidate, hit, DropReason::OverlapsExisting);
                }
                _ => survivors.push(candidate),
            }
        }

        survivors
    }

    /// Longest candidate first; ties broken by `(start, end, label)`.
    ///
    /// Each candidate is checked against every accepted one, so this pass is
    /// quadratic in the number of surviving candidates.
    fn resolve_candidate_conflicts(
        &self,
        mut survivors: Vec<Span>,
        dropped: &mut Vec<DroppedSpan>,
    ) -> Vec<Span> {
        survivors.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut accepted: Vec<Span> = Vec::with_capacity(survivors.len());
        for candidate in survivors {
            match accepted
                .iter()
                .find(|a| a.label != candidate.label && a.overlaps(&candidate))
            {
                Some(winner) => {
                    self.record_drop(dropped, candidate, winner, DropReason::OverlapsCandidate);
                }
                None => accepted.push(candidate),
            }
        }

        accepted
    }

    fn record_drop(
        &self,
        dropped: &mut Vec<DroppedSpan>,
        span: Span,
        winner: &Span,
        reason: DropReason,
    ) {
        match self.policy {
            ConflictPolicy::Drop => {
                tracing::debug!("Dropping {} ({} candidate): conflicts with {}", span, span.source, winner);
            }
            ConflictPolicy::DropAndWarn => {
                tracing::warn!("Dropping {} ({} candidate): conflicts with {}", span, span.source, winner);
            }
        }

        dropped.push(DroppedSpan {
            span,
            conflicts_with: winner.clone(),
            reason,
        });
    }
}

/// True when two spans overlap with different labels
fn has_label_conflict(spans: &[Span]) -> bool {
    spans
        .iter()
        .enumerate()
        .any(|(i, a)| spans[i + 1..].iter().any(|b| a.label != b.label && a.overlaps(b)))
}

/// Merge with the default resolver
pub fn merge(existing: &[Span], candidates: &[Span]) -> Result<Vec<Span>> {
    SpanMergeResolver::new().merge(existing, candidates)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use spanfuse_core::{SpanSource, SpanfuseError};

    fn keys(spans: &[Span]) -> Vec<(usize, usize, &str)> {
        spans
            .iter()
            .map(|s| (s.start, s.end, s.label.as_str()))
            .collect()
    }

    #[test]
    fn test_exact_duplicate_collapses() {
        let merged = merge(&[Span::model(0, 3, "ORG")], &[Span::rule(0, 3, "ORG")]).unwrap();
        assert_eq!(keys(&merged), vec![(0, 3, "ORG")]);
        assert_eq!(merged[0].source, SpanSource::Model);
    }

    #[test]
    fn test_overlap_drops_candidate() {
        let outcome = SpanMergeResolver::new()
            .merge_detailed(&[Span::model(5, 10, "SCHOOL")], &[Span::rule(7, 12, "EVENT")])
            .unwrap();
        assert_eq!(keys(&outcome.spans), vec![(5, 10, "SCHOOL")]);
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].span, Span::rule(7, 12, "EVENT"));
        assert_eq!(outcome.dropped[0].conflicts_with, Span::model(5, 10, "SCHOOL"));
        assert_eq!(outcome.dropped[0].reason, DropReason::OverlapsExisting);
    }

    #[test]
    fn test_duplicate_candidates_collapse() {
        let merged = merge(
            &[],
            &[Span::rule(2, 6, "PRODUCT"), Span::rule(2, 6, "PRODUCT")],
        )
        .unwrap();
        assert_eq!(keys(&merged), vec![(2, 6, "PRODUCT")]);
    }

    #[test]
    fn test_disjoint_spans_kept_and_sorted() {
        let merged = merge(&[Span::model(0, 2, "A")], &[Span::rule(3, 5, "B")]).unwrap();
        assert_eq!(keys(&merged), vec![(0, 2, "A"), (3, 5, "B")]);

        let merged = merge(&[Span::model(3, 5, "B")], &[Span::rule(0, 2, "A")]).unwrap();
        assert_eq!(keys(&merged), vec![(0, 2, "A"), (3, 5, "B")]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge(&[], &[]).unwrap().is_empty());

        let existing = vec![Span::model(4, 6, "B"), Span::model(0, 2, "A")];
        let merged = merge(&existing, &[]).unwrap();
        assert_eq!(keys(&merged), vec![(0, 2, "A"), (4, 6, "B")]);
    }

    #[test]
    fn test_adjacent_spans_do_not_overlap() {
        let merged = merge(&[Span::model(2, 4, "ORG")], &[Span::rule(4, 6, "PRODUCT")]).unwrap();
        assert_eq!(keys(&merged), vec![(2, 4, "ORG"), (4, 6, "PRODUCT")]);
    }

    #[test]
    fn test_candidate_spanning_several_existing() {
        let existing = vec![Span::model(0, 2, "A"), Span::model(6, 8, "B")];
        let outcome = SpanMergeResolver::new()
            .merge_detailed(&existing, &[Span::rule(1, 7, "EVENT"), Span::rule(3, 5, "PRODUCT")])
            .unwrap();
        assert_eq!(
            keys(&outcome.spans),
            vec![(0, 2, "A"), (3, 5, "PRODUCT"), (6, 8, "B")]
        );
        assert_eq!(outcome.dropped[0].conflicts_with, Span::model(0, 2, "A"));
    }

    #[test]
    fn test_candidate_conflicts_prefer_longest() {
        // "Xbox", "Xbox Series", "Xbox Series X" all proposed by the matcher
        let candidates = vec![
            Span::rule(3, 4, "PRODUCT"),
            Span::rule(3, 5, "PRODUCT"),
            Span::rule(3, 6, "PRODUCT"),
            Span::rule(5, 7, "EVENT"),
        ];
        let outcome = SpanMergeResolver::new()
            .merge_detailed(&[], &candidates)
            .unwrap();
        assert_eq!(
            keys(&outcome.spans),
            vec![(3, 4, "PRODUCT"), (3, 5, "PRODUCT"), (3, 6, "PRODUCT")]
        );
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].span, Span::rule(5, 7, "EVENT"));
        assert_eq!(outcome.dropped[0].conflicts_with, Span::rule(3, 6, "PRODUCT"));
        assert_eq!(outcome.dropped[0].reason, DropReason::OverlapsCandidate);
    }

    #[test]
    fn test_same_label_candidate_overlaps_kept() {
        let merged = merge(
            &[],
            &[Span::rule(3, 6, "PRODUCT"), Span::rule(3, 4, "PRODUCT")],
        )
        .unwrap();
        assert_eq!(keys(&merged), vec![(3, 4, "PRODUCT"), (3, 6, "PRODUCT")]);

        // The merged set is itself a valid existing set
        let again = merge(&merged, &[]).unwrap();
        assert_eq!(keys(&again), keys(&merged));
    }

    #[test]
    fn test_duplicate_of_nested_existing_collapses() {
        let existing = [Span::model(0, 10, "ORG"), Span::model(2, 4, "ORG")];
        let outcome = SpanMergeResolver::new()
            .merge_detailed(&existing, &[Span::rule(2, 4, "ORG")])
            .unwrap();
        assert_eq!(keys(&outcome.spans), vec![(0, 10, "ORG"), (2, 4, "ORG")]);
        assert!(outcome.dropped.is_empty());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "existing spans must not overlap")]
    fn test_conflicting_existing_spans_rejected() {
        let _ = merge(&[Span::model(0, 4, "A"), Span::model(2, 6, "B")], &[]);
    }

    #[test]
    fn test_equal_length_conflict_prefers_earliest() {
        let merged = merge(&[], &[Span::rule(2, 4, "B"), Span::rule(1, 3, "A")]).unwrap();
        assert_eq!(keys(&merged), vec![(1, 3, "A")]);
    }

    #[test]
    fn test_malformed_span_fails_fast() {
        let err = merge(&[], &[Span::rule(5, 5, "EVENT")]).unwrap_err();
        assert!(matches!(err, SpanfuseError::MalformedSpan { start: 5, end: 5, .. }));

        let err = merge(&[Span::model(4, 2, "ORG")], &[]).unwrap_err();
        assert!(matches!(err, SpanfuseError::MalformedSpan { .. }));
    }

    #[test]
    fn test_policy_from_config() {
        let config = MergeConfig {
            conflict_policy: ConflictPolicy::DropAndWarn,
        };
        let resolver = SpanMergeResolver::from_config(&config);
        assert_eq!(resolver.policy(), ConflictPolicy::DropAndWarn);

        // Policy changes reporting, never the merged result
        let existing = [Span::model(5, 10, "SCHOOL")];
        let candidates = [Span::rule(7, 12, "EVENT"), Span::rule(12, 13, "EVENT")];
        assert_eq!(
            resolver.merge(&existing, &candidates).unwrap(),
            merge(&existing, &candidates).unwrap()
        );
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    const LABELS: &[&str] = &["A", "B", "ORG", "PRODUCT"];

    /// Disjoint spans laid out left to right with random gaps
    fn existing_strategy() -> impl Strategy<Value = Vec<Span>> {
        prop::collection::vec((0usize..3, 1usize..4, 0usize..LABELS.len()), 0..6).prop_map(
            |parts| {
                let mut cursor = 0;
                parts
                    .into_iter()
                    .map(|(gap, len, label)| {
                        let start = cursor + gap;
                        cursor = start + len;
                        Span::model(start, cursor, LABELS[label])
                    })
                    .collect()
            },
        )
    }

    fn candidates_strategy() -> impl Strategy<Value = Vec<Span>> {
        prop::collection::vec((0usize..25, 1usize..5, 0usize..LABELS.len()), 0..10).prop_map(
            |parts| {
                parts
                    .into_iter()
                    .map(|(start, len, label)| Span::rule(start, start + len, LABELS[label]))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_idempotent(existing in existing_strategy(), candidates in candidates_strategy()) {
            let once = merge(&existing, &candidates).unwrap();
            let twice = merge(&once, &[]).unwrap();
            prop_assert_eq!(keys(&once), keys(&twice));
        }

        #[test]
        fn prop_candidate_order_irrelevant(
            existing in existing_strategy(),
            candidates in candidates_strategy(),
            rotate in 0usize..10,
        ) {
            let expected = merge(&existing, &candidates).unwrap();

            let mut shuffled = candidates.clone();
            shuffled.reverse();
            if !shuffled.is_empty() {
                let by = rotate % shuffled.len();
                shuffled.rotate_left(by);
            }
            let mut existing_reversed = existing.clone();
            existing_reversed.reverse();

            let actual = merge(&existing_reversed, &shuffled).unwrap();
            prop_assert_eq!(keys(&expected), keys(&actual));
        }

        #[test]
        fn prop_existing_wins(existing in existing_strategy(), candidates in candidates_strategy()) {
            let merged = merge(&existing, &candidates).unwrap();
            for span in &existing {
                prop_assert!(merged.contains(span));
            }
            for span in merged.iter().filter(|s| !existing.contains(s)) {
                prop_assert!(existing.iter().all(|e| !e.overlaps(span)));
            }
        }

        #[test]
        fn prop_no_duplicates_or_label_conflicts(
            existing in existing_strategy(),
            candidates in candidates_strategy(),
        ) {
            let merged = merge(&existing, &candidates).unwrap();
            for window in merged.windows(2) {
                prop_assert!(window[0] < window[1]);
            }
            for (i, a) in merged.iter().enumerate() {
                for b in &merged[i + 1..] {
                    prop_assert!(!(a.overlaps(b) && a.label != b.label));
                }
            }
        }

        #[test]
        fn prop_every_candidate_accounted_for(
            existing in existing_strategy(),
            candidates in candidates_strategy(),
        ) {
            let outcome = SpanMergeResolver::new().merge_detailed(&existing, &candidates).unwrap();
            for candidate in &candidates {
                let kept = outcome.spans.contains(candidate);
                let dropped = outcome.dropped.iter().any(|d| &d.span == candidate);
                prop_assert!(kept ^ dropped);
            }
        }
    }
}
