//! # P&L Engine
//!
//! A library for turning a flat, dot-coded chart-of-accounts ledger (one
//! row per account, one column per calendar month) into a hierarchical
//! profit-and-loss tree, analytical views, ratio analysis, break-even
//! simulation, and heuristic cost-behavior classification.
//!
//! ## Core Concepts
//!
//! - **Leaf accounts**: codes with no dot-children; the only values ever
//!   summed, which is what prevents double counting
//! - **Views**: contable (standard), operativo (EBIT-oriented) and caja
//!   (EBITDA-oriented) renderings of the same leaves
//! - **Break-even split**: every leaf is revenue (PVU), variable cost
//!   (CVU) or fixed cost (CFT); simulation re-derives the figures from
//!   user deltas without touching the base
//! - **Classification**: an explicit, deterministic, user-triggered pass
//!   combining name semantics, revenue correlation, and chart position
//!
//! ## Example
//!
//! ```rust,ignore
//! use pnl_engine::*;
//!
//! let upload = "4;Ventas;1000;1100\n5.1;Costo de ventas;400;440\n";
//! let ParseOutcome { records, report } = parse_ledger(upload)?;
//!
//! let options = ProcessOptions {
//!     view: AnalysisView::Operativo,
//!     period: Period::Month(Month::Enero),
//!     ..Default::default()
//! };
//! let output = PnlProcessor::process(&records, &options)?;
//! println!("{}", output.tree.to_json()?);
//! ```

pub mod aggregation;
pub mod analysis;
pub mod breakeven;
pub mod classifier;
pub mod error;
pub mod hierarchy;
pub mod ingestion;
pub mod lexicon;
pub mod numbers;
pub mod schema;
pub mod state;
pub mod views;

pub use aggregation::{bucket_for, resolve_behavior, Aggregator, LedgerAggregates, SemanticBucket};
pub use analysis::{apply_horizontal, apply_vertical, apply_vertical_from_tree, change_between};
pub use breakeven::{
    break_even_for_period, compute_break_even, simulate, BreakEvenBucket, BreakEvenFigures,
};
pub use classifier::{CostClassifier, FinancialSnapshot};
pub use error::{PnlError, Result};
pub use hierarchy::{AccountArena, ArenaNode};
pub use ingestion::{parse_ledger, ParseOutcome, ParseReport, RowWarning};
pub use lexicon::{CostLexicon, LexiconMatch};
pub use numbers::{normalize_number, normalize_or_zero};
pub use schema::*;
pub use state::{EngineState, InMemoryStore, StateStore};
pub use views::StatementBuilder;

use log::{debug, info};
use std::collections::BTreeMap;

/// Everything one engine run needs besides the records themselves.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub view: AnalysisView,
    pub period: Period,
    /// When set, every tree node is annotated with its change versus this
    /// period.
    pub comparison_period: Option<Period>,
    /// Per-account behavior overrides (classifier output the caller chose
    /// to apply, or manual picks). Keyed by code.
    pub overrides: BTreeMap<String, CostBehavior>,
    /// When set, the output carries a simulated break-even next to the
    /// base one.
    pub simulation: Option<SimulationParameters>,
    pub lexicon: CostLexicon,
}

#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Rooted statement tree for the active period and view, annotated
    /// with vertical percentages (and horizontal changes when requested).
    pub tree: AccountNode,
    /// Per-month aggregates plus the annual roll-up.
    pub aggregates: LedgerAggregates,
    /// Base break-even figures for the active period.
    pub break_even: BreakEvenFigures,
    /// Break-even under the supplied simulation parameters, if any.
    pub simulated: Option<BreakEvenFigures>,
    /// Revenue for the active period was zero; every vertical percentage
    /// is a reported 0, not a ratio.
    pub revenue_was_zero: bool,
    /// Codes present only in the comparison period, with the change a
    /// zero current side implies.
    pub unmatched_comparison: Vec<(String, HorizontalChange)>,
}

pub struct PnlProcessor;

impl PnlProcessor {
    pub fn process(records: &[AccountRecord], options: &ProcessOptions) -> Result<EngineOutput> {
        let arena = AccountArena::resolve(records);
        if arena.is_empty() {
            return Err(PnlError::EmptyLedger);
        }

        info!(
            "Processing {} accounts ({} leaves) under {:?} view",
            arena.len(),
            arena.leaves().count(),
            options.view
        );

        let aggregator = Aggregator::new(records, &arena, &options.lexicon);
        let aggregates = aggregator.aggregate_all(&options.overrides);

        let builder = StatementBuilder::new(records, &arena);
        let mut tree = builder.build(options.period, options.view);

        let revenue = aggregates
            .for_period(options.period)
            .map(|a| a.ingresos)
            .unwrap_or(0.0);
        let revenue_was_zero = apply_vertical(&mut tree, revenue);
        if revenue_was_zero {
            debug!("Revenue is zero for {:?}; vertical analysis degenerate", options.period);
        }

        let unmatched_comparison = match options.comparison_period {
            Some(comparison) => {
                let baseline = builder.build(comparison, options.view);
                apply_horizontal(&mut tree, &baseline)
            }
            None => Vec::new(),
        };

        let break_even = break_even_for_period(
            records,
            &arena,
            &options.lexicon,
            &options.overrides,
            options.period,
        );
        let simulated = options
            .simulation
            .as_ref()
            .map(|params| simulate(&break_even, params));

        Ok(EngineOutput {
            tree,
            aggregates,
            break_even,
            simulated,
            revenue_was_zero,
            unmatched_comparison,
        })
    }

    /// Ingests raw semicolon-delimited text and processes it in one call.
    /// Row-level problems end up in the report, never as errors.
    pub fn process_text(
        input: &str,
        options: &ProcessOptions,
    ) -> Result<(EngineOutput, ParseReport)> {
        let ParseOutcome { records, report } = parse_ledger(input)?;
        let output = Self::process(&records, options)?;
        Ok((output, report))
    }
}
