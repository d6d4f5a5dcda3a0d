//! Renders the ledger as a statement tree under one of three analytical
//! bases. Trees are rebuilt from scratch per (period, view); leaf data is
//! shared read-only and never mutated by a view switch.

use crate::aggregation::{bucket_for, SemanticBucket};
use crate::hierarchy::{AccountArena, ArenaNode};
use crate::schema::{AccountNode, AccountRecord, AnalysisView, NodeKind, Period};
use std::collections::BTreeMap;

/// Code used for the synthetic below-the-line financial expense node.
pub const FINANCIAL_LINE_CODE: &str = "F.1";
/// Code used for the synthetic depreciation add-back node.
pub const ADDBACK_LINE_CODE: &str = "F.2";

pub struct StatementBuilder<'a> {
    arena: &'a AccountArena,
    records: BTreeMap<&'a str, &'a AccountRecord>,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(records: &'a [AccountRecord], arena: &'a AccountArena) -> Self {
        let records = records.iter().map(|r| (r.code.as_str(), r)).collect();
        Self { arena, records }
    }

    /// Builds a fresh rooted tree for the period and view. Non-leaf values
    /// are sums of included leaf descendants; leaves excluded by the view
    /// stay visible with their own value but contribute zero upward, and
    /// reappear as synthetic lines below the root's account subtrees.
    pub fn build(&self, period: Period, view: AnalysisView) -> AccountNode {
        let mut children = Vec::new();
        let mut excluded_interest = 0.0;
        let mut excluded_depreciation = 0.0;

        let mut roots: Vec<&ArenaNode> = self.arena.roots().collect();
        roots.sort_by(|a, b| a.code.cmp(&b.code));

        for root in roots {
            let (node, interest, depreciation) = self.build_node(root, period, view);
            excluded_interest += interest;
            excluded_depreciation += depreciation;
            children.push(node);
        }

        // The root totals what the statement shows above the line; the
        // excluded amounts only reappear as synthetic lines below it.
        let value: f64 = children
            .iter()
            .map(|c| if is_excluded(view, c) { 0.0 } else { c.value })
            .sum();

        if view != AnalysisView::Contable && excluded_interest != 0.0 {
            children.push(synthetic_line(
                FINANCIAL_LINE_CODE,
                "Gasto financiero (bajo la línea operativa)",
                excluded_interest,
            ));
        }
        if view == AnalysisView::Caja && excluded_depreciation != 0.0 {
            children.push(synthetic_line(
                ADDBACK_LINE_CODE,
                "Depreciación y amortización (agregada de vuelta)",
                excluded_depreciation,
            ));
        }
        AccountNode {
            code: String::new(),
            name: statement_title(view).to_string(),
            depth: 0,
            value,
            vertical_percentage: None,
            horizontal_change: None,
            children,
            kind: NodeKind::Root,
        }
    }

    /// Returns the node plus the interest and depreciation amounts its
    /// subtree excluded under the view.
    fn build_node(
        &self,
        node: &ArenaNode,
        period: Period,
        view: AnalysisView,
    ) -> (AccountNode, f64, f64) {
        if node.is_leaf {
            let raw = self.leaf_value(node, period);
            let bucket = bucket_for(&node.code, &node.name);
            let (interest, depreciation) = match (view, bucket) {
                (AnalysisView::Contable, _) => (0.0, 0.0),
                (_, SemanticBucket::FinancialInterest) => (raw, 0.0),
                (AnalysisView::Caja, SemanticBucket::Depreciation) => (0.0, raw),
                _ => (0.0, 0.0),
            };
            // Excluded leaves keep their face value; exclusion only affects
            // what they feed upward.
            let leaf = AccountNode {
                code: node.code.clone(),
                name: node.name.clone(),
                depth: node.depth,
                value: raw,
                vertical_percentage: None,
                horizontal_change: None,
                children: Vec::new(),
                kind: NodeKind::Leaf,
            };
            return (leaf, interest, depreciation);
        }

        let mut children = Vec::new();
        let mut subtotal = 0.0;
        let mut interest = 0.0;
        let mut depreciation = 0.0;

        let mut child_nodes: Vec<&ArenaNode> = node
            .children
            .iter()
            .map(|&i| self.arena.node(i))
            .collect();
        child_nodes.sort_by(|a, b| a.code.cmp(&b.code));

        for child in child_nodes {
            let (built, i, d) = self.build_node(child, period, view);
            subtotal += if is_excluded(view, &built) { 0.0 } else { built.value };
            interest += i;
            depreciation += d;
            children.push(built);
        }

        let built = AccountNode {
            code: node.code.clone(),
            name: node.name.clone(),
            depth: node.depth,
            value: subtotal,
            vertical_percentage: None,
            horizontal_change: None,
            children,
            kind: NodeKind::Subtotal,
        };
        (built, interest, depreciation)
    }

    fn leaf_value(&self, node: &ArenaNode, period: Period) -> f64 {
        let Some(record) = self.records.get(node.code.as_str()) else {
            return 0.0;
        };
        match period {
            Period::Month(m) => record.value_for(m),
            Period::Annual => record.annual_value(),
        }
    }
}

fn is_excluded(view: AnalysisView, node: &AccountNode) -> bool {
    if node.kind != NodeKind::Leaf {
        return false;
    }
    match (view, bucket_for(&node.code, &node.name)) {
        (AnalysisView::Contable, _) => false,
        (_, SemanticBucket::FinancialInterest) => true,
        (AnalysisView::Caja, SemanticBucket::Depreciation) => true,
        _ => false,
    }
}

fn synthetic_line(code: &str, name: &str, value: f64) -> AccountNode {
    AccountNode {
        code: code.to_string(),
        name: name.to_string(),
        depth: 0,
        value,
        vertical_percentage: None,
        horizontal_change: None,
        children: Vec::new(),
        kind: NodeKind::Subtotal,
    }
}

fn statement_title(view: AnalysisView) -> &'static str {
    match view {
        AnalysisView::Contable => "Estado de Resultados (contable)",
        AnalysisView::Operativo => "Estado de Resultados (operativo)",
        AnalysisView::Caja => "Estado de Resultados (caja)",
    }
}
