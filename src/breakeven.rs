//! Break-even analysis and reversible what-if simulation.
//!
//! Every statement leaf lands in exactly one of three buckets: PVU
//! (revenue, signed, so discounts stay negative), CVU (variable cost,
//! absolute) or CFT (fixed cost, absolute). Leaves that fit no statement
//! line join neither side, the same rule the aggregate's variable/fixed
//! partition applies. Simulation is a pure function of the base figures
//! and the parameters; the base is never touched, so reset means
//! recomputing with zero deltas.

use crate::aggregation::{bucket_for, resolve_behavior, SemanticBucket};
use crate::hierarchy::AccountArena;
use crate::lexicon::CostLexicon;
use crate::schema::{AccountRecord, CostBehavior, Period, SimulationParameters};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The three-way break-even partition of a leaf account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakEvenBucket {
    /// Revenue basis; keeps its signed value.
    Pvu,
    /// Variable cost basis; contributes its absolute value.
    Cvu,
    /// Fixed cost total; contributes its absolute value.
    Cft,
}

/// `None` means the leaf fits no statement line and stays out of the
/// break-even math entirely.
pub fn break_even_bucket(
    overrides: &BTreeMap<String, CostBehavior>,
    lexicon: &CostLexicon,
    code: &str,
    name: &str,
) -> Option<BreakEvenBucket> {
    match bucket_for(code, name) {
        SemanticBucket::Revenue => return Some(BreakEvenBucket::Pvu),
        SemanticBucket::Unassigned => return None,
        _ => {}
    }
    Some(match resolve_behavior(overrides, lexicon, code, name) {
        CostBehavior::Variable | CostBehavior::SemiVariable => BreakEvenBucket::Cvu,
        CostBehavior::Fijo | CostBehavior::Escalonado => BreakEvenBucket::Cft,
    })
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BreakEvenFigures {
    pub ingresos: f64,
    pub costos_variables: f64,
    pub costos_fijos: f64,
    pub margen_contribucion_porc: f64,
    pub punto_equilibrio: f64,
    /// True when the contribution margin was not positive, so the reported
    /// break-even of 0 means "undefined" rather than "free".
    pub margin_not_positive: bool,
}

/// Derives margin and break-even from the three bucket totals.
pub fn compute_break_even(
    ingresos: f64,
    costos_variables: f64,
    costos_fijos: f64,
) -> BreakEvenFigures {
    let margen_contribucion_porc = if ingresos > 0.0 {
        (ingresos - costos_variables) / ingresos
    } else {
        0.0
    };
    let margin_not_positive = margen_contribucion_porc <= 0.0;
    let punto_equilibrio = if margin_not_positive {
        0.0
    } else {
        costos_fijos / margen_contribucion_porc
    };
    BreakEvenFigures {
        ingresos,
        costos_variables,
        costos_fijos,
        margen_contribucion_porc,
        punto_equilibrio,
        margin_not_positive,
    }
}

/// Splits the ledger's leaves into the three buckets for a period and
/// derives the base break-even figures.
pub fn break_even_for_period(
    records: &[AccountRecord],
    arena: &AccountArena,
    lexicon: &CostLexicon,
    overrides: &BTreeMap<String, CostBehavior>,
    period: Period,
) -> BreakEvenFigures {
    let by_code: BTreeMap<&str, &AccountRecord> =
        records.iter().map(|r| (r.code.as_str(), r)).collect();

    let mut ingresos = 0.0;
    let mut costos_variables = 0.0;
    let mut costos_fijos = 0.0;

    for leaf in arena.leaves() {
        let Some(record) = by_code.get(leaf.code.as_str()) else {
            continue;
        };
        let value = match period {
            Period::Month(m) => record.value_for(m),
            Period::Annual => record.annual_value(),
        };
        match break_even_bucket(overrides, lexicon, &leaf.code, &leaf.name) {
            Some(BreakEvenBucket::Pvu) => ingresos += value,
            Some(BreakEvenBucket::Cvu) => costos_variables += value.abs(),
            Some(BreakEvenBucket::Cft) => costos_fijos += value.abs(),
            None => {}
        }
    }

    compute_break_even(ingresos, costos_variables, costos_fijos)
}

/// Applies what-if deltas to base figures without mutating them. Identical
/// inputs always produce identical outputs.
pub fn simulate(base: &BreakEvenFigures, params: &SimulationParameters) -> BreakEvenFigures {
    let sim_ingresos = base.ingresos * (1.0 + params.price_change_pct / 100.0);
    let sim_costos_fijos = base.costos_fijos + params.fixed_cost_delta;

    let base_rate = if base.ingresos != 0.0 {
        base.costos_variables / base.ingresos
    } else {
        0.0
    };
    let sim_rate = base_rate * (1.0 + params.variable_cost_rate_change_pct / 100.0);
    let sim_costos_variables = sim_ingresos * sim_rate;

    compute_break_even(sim_ingresos, sim_costos_variables, sim_costos_fijos)
}
