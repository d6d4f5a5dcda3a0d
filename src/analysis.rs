//! Vertical (percent-of-revenue) and horizontal (period-over-period)
//! analysis over a built statement tree.
//!
//! Ratio math never emits NaN or infinity: a zero denominator yields 0 and
//! an explicit flag so presentation can tell "0%" from "undefined".

use crate::schema::{AccountNode, HorizontalChange};
use std::collections::BTreeMap;

pub const REVENUE_ROOT_CODE: &str = "4";

/// Annotates every node with its percentage of root revenue for the same
/// period/view. Returns true when revenue was zero, in which case every
/// percentage is a reported 0 rather than a ratio.
pub fn apply_vertical(tree: &mut AccountNode, root_revenue: f64) -> bool {
    let revenue_was_zero = root_revenue == 0.0;
    annotate_vertical(tree, root_revenue, revenue_was_zero);
    revenue_was_zero
}

/// Convenience over `apply_vertical` that reads revenue off the tree's own
/// revenue subtree.
pub fn apply_vertical_from_tree(tree: &mut AccountNode) -> bool {
    let revenue = tree
        .find(REVENUE_ROOT_CODE)
        .map(|n| n.value)
        .unwrap_or(0.0);
    apply_vertical(tree, revenue)
}

fn annotate_vertical(node: &mut AccountNode, revenue: f64, revenue_was_zero: bool) {
    node.vertical_percentage = Some(if revenue_was_zero {
        0.0
    } else if node.code == REVENUE_ROOT_CODE {
        // The revenue root is 100 by definition, not by division.
        100.0
    } else {
        node.value / revenue * 100.0
    });
    for child in &mut node.children {
        annotate_vertical(child, revenue, revenue_was_zero);
    }
}

/// Annotates every node in `current` with its change versus the node of
/// the same code in `comparison`; codes missing on either side count as 0.
/// Returns the codes present only in the comparison tree, with the change
/// a zero current side implies.
pub fn apply_horizontal(
    current: &mut AccountNode,
    comparison: &AccountNode,
) -> Vec<(String, HorizontalChange)> {
    let mut comparison_values: BTreeMap<String, f64> = BTreeMap::new();
    comparison.walk(&mut |n| {
        comparison_values.insert(n.code.clone(), n.value);
    });

    let mut seen = Vec::new();
    annotate_horizontal(current, &comparison_values, &mut seen);

    let seen: std::collections::HashSet<String> = seen.into_iter().collect();
    comparison_values
        .into_iter()
        .filter(|(code, _)| !seen.contains(code))
        .map(|(code, value)| (code, change_between(0.0, value)))
        .collect()
}

fn annotate_horizontal(
    node: &mut AccountNode,
    comparison: &BTreeMap<String, f64>,
    seen: &mut Vec<String>,
) {
    let other = comparison.get(&node.code).copied().unwrap_or(0.0);
    node.horizontal_change = Some(change_between(node.value, other));
    seen.push(node.code.clone());
    for child in &mut node.children {
        annotate_horizontal(child, comparison, seen);
    }
}

pub fn change_between(current: f64, comparison: f64) -> HorizontalChange {
    let variation_absolute = current - comparison;
    let zero_denominator = comparison == 0.0;
    let variation_percentual = if zero_denominator {
        0.0
    } else {
        variation_absolute / comparison * 100.0
    };
    HorizontalChange {
        variation_absolute,
        variation_percentual,
        zero_denominator,
    }
}
