//! Detection correction
//!
//! Raw counts over-report in predictable ways: every DOCX is also a ZIP,
//! office containers carry XML and thumbnails, and a RAR5 header also
//! looks like RAR4 to a loose signature. The four passes here run once on
//! the merged aggregate, in this order:
//!
//! 1. [`apply_deduction`]: `deduct_from` children are subtracted from their parent
//! 2. [`apply_container_hierarchy`]: derived formats are subtracted from the generic container
//! 3. [`apply_container_false_positive_filter`]: embedded-content signatures move to `embedded_counts`
//! 4. [`apply_exclusive_filter`]: mutually exclusive pairs keep one member

use std::collections::{BTreeSet, HashMap};

use crate::config::ContainerPolicy;
use crate::signature::SignatureDefinition;
use crate::stats::ScanStats;

/// Runs all four passes in order.
pub fn run_pipeline(
    stats: &mut ScanStats,
    signatures: &[SignatureDefinition],
    policy: &ContainerPolicy,
) {
    apply_deduction(stats, signatures);
    apply_container_hierarchy(stats, policy);
    apply_container_false_positive_filter(stats, policy);
    apply_exclusive_filter(stats, signatures);
}

/// Subtracts each child's count from its `deduct_from` parent, floored at 0.
///
/// Child counts are read before any subtraction, so chains (A from B, B
/// from C) never propagate: C loses B's raw count, not B's corrected one.
pub fn apply_deduction(stats: &mut ScanStats, signatures: &[SignatureDefinition]) {
    let before = stats.counts.clone();

    for sig in signatures {
        let Some(parent) = sig.deduct_from.as_deref() else {
            continue;
        };
        if parent == sig.name {
            continue;
        }
        let Some(&child_count) = before.get(&sig.name) else {
            continue;
        };
        if let Some(parent_count) = stats.counts.get_mut(parent) {
            *parent_count = parent_count.saturating_sub(child_count);
        }
    }
}

/// Subtracts the derived formats' total from the generic container.
pub fn apply_container_hierarchy(stats: &mut ScanStats, policy: &ContainerPolicy) {
    let derived: u64 = policy.derived.iter().map(|name| stats.count(name)).sum();
    if derived == 0 {
        return;
    }
    if let Some(container) = stats.counts.get_mut(&policy.container) {
        *container = container.saturating_sub(derived);
    }
}

/// Moves commonly-embedded signatures to `embedded_counts` when any derived
/// container format is present.
///
/// Signatures in `policy.thresholded` only move when their count is above
/// `policy.image_threshold`; a couple of images next to a document are
/// counted as standalone files.
pub fn apply_container_false_positive_filter(stats: &mut ScanStats, policy: &ContainerPolicy) {
    if !policy.derived.iter().any(|name| stats.is_present(name)) {
        return;
    }
    for name in &policy.embedded {
        stats.relocate_to_embedded(name);
    }
    for name in &policy.thresholded {
        if stats.count(name) > policy.image_threshold {
            stats.relocate_to_embedded(name);
        }
    }
}

/// Keeps one member of every declared exclusive pair that is fully present.
///
/// The member with strictly greater `priority` stays. On equal priority the
/// name that sorts first stays. Pairs are visited in name order, so the
/// result never depends on signature order.
///
/// The loser's entire bucket is removed, so files that matched only the
/// losing signature are dropped along with the overlapping ones.
pub fn apply_exclusive_filter(stats: &mut ScanStats, signatures: &[SignatureDefinition]) {
    let priorities: HashMap<&str, i32> = signatures
        .iter()
        .map(|s| (s.name.as_str(), s.priority))
        .collect();

    let pairs: BTreeSet<(&str, &str)> = signatures
        .iter()
        .flat_map(|sig| {
            sig.exclusive_with
                .iter()
                .filter(move |other| **other != sig.name)
                .map(move |other| {
                    let (a, b) = (sig.name.as_str(), other.as_str());
                    if a < b { (a, b) } else { (b, a) }
                })
        })
        .collect();

    for (first, second) in pairs {
        if !(stats.is_present(first) && stats.is_present(second)) {
            continue;
        }
        let (Some(&p_first), Some(&p_second)) = (priorities.get(first), priorities.get(second))
        else {
            continue;
        };
        let loser = if p_second > p_first { first } else { second };
        stats.counts.remove(loser);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with(entries: &[(&str, u64)]) -> ScanStats {
        let mut stats = ScanStats::new();
        for (name, n) in entries {
            stats.counts.insert(name.to_string(), *n);
        }
        stats
    }

    #[test]
    fn test_deduction_floors_at_zero() {
        let sigs = [SignatureDefinition::binary("DOC", "D0CF").deducted_from("OLE")];
        let mut stats = stats_with(&[("OLE", 2), ("DOC", 5)]);
        apply_deduction(&mut stats, &sigs);
        assert_eq!(stats.count("OLE"), 0);
        assert_eq!(stats.count("DOC"), 5);
    }

    #[test]
    fn test_deduction_missing_parent_is_noop() {
        let sigs = [SignatureDefinition::binary("DOC", "D0CF").deducted_from("OLE")];
        let mut stats = stats_with(&[("DOC", 3)]);
        apply_deduction(&mut stats, &sigs);
        assert!(!stats.counts.contains_key("OLE"));
        assert_eq!(stats.count("DOC"), 3);
    }

    #[test]
    fn test_deduction_is_not_transitive() {
        let sigs = [
            SignatureDefinition::binary("A", "01").deducted_from("B"),
            SignatureDefinition::binary("B", "02").deducted_from("C"),
        ];
        let mut stats = stats_with(&[("A", 2), ("B", 3), ("C", 10)]);
        apply_deduction(&mut stats, &sigs);
        assert_eq!(stats.count("B"), 1);
        assert_eq!(stats.count("C"), 7);
    }

    #[test]
    fn test_container_hierarchy_subtracts_all_derived() {
        let mut stats = stats_with(&[("ZIP", 10), ("DOCX", 3), ("XLSX", 2)]);
        apply_container_hierarchy(&mut stats, &ContainerPolicy::default());
        assert_eq!(stats.count("ZIP"), 5);
    }

    #[test]
    fn test_false_positive_filter_needs_a_container() {
        let mut stats = stats_with(&[("XML", 4), ("PNG", 9)]);
        apply_container_false_positive_filter(&mut stats, &ContainerPolicy::default());
        assert_eq!(stats.count("XML"), 4);
        assert!(stats.embedded_counts.is_empty());
    }

    #[test]
    fn test_false_positive_filter_image_threshold() {
        let mut stats = stats_with(&[("DOCX", 1), ("XML", 4), ("PNG", 2), ("JPG", 3)]);
        apply_container_false_positive_filter(&mut stats, &ContainerPolicy::default());
        assert_eq!(stats.count("XML"), 0);
        assert_eq!(stats.embedded("XML"), 4);
        assert_eq!(stats.count("PNG"), 2);
        assert_eq!(stats.embedded("JPG"), 3);
        assert_eq!(stats.count("DOCX"), 1);
    }

    #[test]
    fn test_exclusive_filter_prefers_priority() {
        let sigs = [
            SignatureDefinition::binary("RAR4", "526172211A07").exclusive_with("RAR5"),
            SignatureDefinition::binary("RAR5", "526172211A070100").with_priority(10),
        ];
        let mut stats = stats_with(&[("RAR4", 2), ("RAR5", 1)]);
        apply_exclusive_filter(&mut stats, &sigs);
        assert!(!stats.counts.contains_key("RAR4"));
        assert_eq!(stats.count("RAR5"), 1);
    }

    #[test]
    fn test_exclusive_filter_tie_keeps_first_name() {
        let forward = [
            SignatureDefinition::binary("BETA", "02").exclusive_with("ALPHA"),
            SignatureDefinition::binary("ALPHA", "01"),
        ];
        let reverse = [
            SignatureDefinition::binary("ALPHA", "01").exclusive_with("BETA"),
            SignatureDefinition::binary("BETA", "02"),
        ];
        for sigs in [&forward[..], &reverse[..]] {
            let mut stats = stats_with(&[("ALPHA", 1), ("BETA", 1)]);
            apply_exclusive_filter(&mut stats, sigs);
            assert_eq!(stats.count("ALPHA"), 1);
            assert!(!stats.counts.contains_key("BETA"));
        }
    }

    #[test]
    fn test_exclusive_filter_single_member_untouched() {
        let sigs = [
            SignatureDefinition::binary("RAR4", "526172211A07").exclusive_with("RAR5"),
            SignatureDefinition::binary("RAR5", "526172211A070100").with_priority(10),
        ];
        let mut stats = stats_with(&[("RAR4", 2)]);
        let before = stats.clone();
        apply_exclusive_filter(&mut stats, &sigs);
        assert_eq!(stats, before);
    }
}
