//! Leaf-only roll-up of the ledger into per-period aggregates.
//!
//! Only leaf accounts are summed. Parent accounts that also carry a
//! directly-entered balance are ignored, which is the double-counting
//! guard the whole statement derivation relies on.

use crate::hierarchy::AccountArena;
use crate::lexicon::{fold, CostLexicon};
use crate::schema::{
    AccountRecord, CostBehavior, Month, Period, PeriodAggregate, MONTHS,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which statement line a leaf feeds, decided by code prefix with a name
/// heuristic for the depreciation/interest add-back bucket. Among the cost
/// prefixes the name heuristic wins: it travels across charts of accounts
/// while the numeric convention does not. Revenue is positional only, so
/// financial income under `4.*` stays in ingresos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticBucket {
    Revenue,
    CostOfSales,
    SellingExpense,
    AdminExpense,
    Depreciation,
    FinancialInterest,
    Unassigned,
}

pub fn bucket_for(code: &str, name: &str) -> SemanticBucket {
    // An account like "4.3 Intereses ganados" is financial income, not an
    // expense to carve out.
    if code == "4" || code.starts_with("4.") {
        return SemanticBucket::Revenue;
    }

    let folded = fold(name);

    if folded.contains("depreciaci")
        || folded.contains("amortizaci")
        || code == "5.2.1.3"
        || code.starts_with("5.2.1.3.")
    {
        return SemanticBucket::Depreciation;
    }
    if folded.contains("interes") || folded.contains("financier") {
        return SemanticBucket::FinancialInterest;
    }

    if code == "5.1" || code.starts_with("5.1.") {
        return SemanticBucket::CostOfSales;
    }
    if code == "5.2" || code.starts_with("5.2.") {
        return SemanticBucket::SellingExpense;
    }
    if code == "5.3" || code.starts_with("5.3.") {
        return SemanticBucket::AdminExpense;
    }

    SemanticBucket::Unassigned
}

/// Resolves the variable/fixed behavior of a leaf: explicit override first,
/// then the name lexicon, then a structural default by code prefix.
pub fn resolve_behavior(
    overrides: &BTreeMap<String, CostBehavior>,
    lexicon: &CostLexicon,
    code: &str,
    name: &str,
) -> CostBehavior {
    if let Some(&b) = overrides.get(code) {
        return b;
    }
    if let Some(hit) = lexicon.match_name(name) {
        return hit.behavior;
    }
    // Cost-of-sales leaves track production; everything else defaults flat.
    if code == "5.1" || code.starts_with("5.1.") {
        CostBehavior::Variable
    } else {
        CostBehavior::Fijo
    }
}

/// Monthly aggregates plus the annual roll-up. The annual figures are sums
/// of monthly leaf contributions, never sums of monthly derived ratios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerAggregates {
    pub monthly: BTreeMap<Month, PeriodAggregate>,
    pub annual: PeriodAggregate,
}

impl LedgerAggregates {
    pub fn for_period(&self, period: Period) -> Option<&PeriodAggregate> {
        match period {
            Period::Month(m) => self.monthly.get(&m),
            Period::Annual => Some(&self.annual),
        }
    }
}

pub struct Aggregator<'a> {
    arena: &'a AccountArena,
    records: BTreeMap<&'a str, &'a AccountRecord>,
    lexicon: &'a CostLexicon,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        records: &'a [AccountRecord],
        arena: &'a AccountArena,
        lexicon: &'a CostLexicon,
    ) -> Self {
        let records = records.iter().map(|r| (r.code.as_str(), r)).collect();
        Self {
            arena,
            records,
            lexicon,
        }
    }

    /// Aggregates one period from leaf accounts only.
    pub fn aggregate(
        &self,
        period: Period,
        behaviors: &BTreeMap<String, CostBehavior>,
    ) -> PeriodAggregate {
        let mut agg = PeriodAggregate::default();

        for leaf in self.arena.leaves() {
            let Some(record) = self.records.get(leaf.code.as_str()) else {
                continue;
            };
            let value = match period {
                Period::Month(m) => record.value_for(m),
                Period::Annual => record.annual_value(),
            };

            let bucket = bucket_for(&leaf.code, &leaf.name);
            match bucket {
                SemanticBucket::Revenue => agg.ingresos += value,
                SemanticBucket::CostOfSales => agg.costo_ventas_total += value,
                SemanticBucket::SellingExpense => agg.gastos_ventas_total += value,
                SemanticBucket::AdminExpense => agg.gastos_admin_total += value,
                SemanticBucket::Depreciation => agg.depreciacion += value,
                SemanticBucket::FinancialInterest => agg.interes_financiero += value,
                SemanticBucket::Unassigned => {
                    debug!("Leaf {} ({}) fits no statement line", leaf.code, leaf.name);
                }
            }

            // Orthogonal variable/fixed partition over the cost leaves.
            // Costs always contribute their absolute value here.
            if bucket != SemanticBucket::Revenue && bucket != SemanticBucket::Unassigned {
                match resolve_behavior(behaviors, self.lexicon, &leaf.code, &leaf.name) {
                    CostBehavior::Variable | CostBehavior::SemiVariable => {
                        agg.costos_variables += value.abs()
                    }
                    CostBehavior::Fijo | CostBehavior::Escalonado => {
                        agg.costos_fijos += value.abs()
                    }
                }
            }
        }

        agg.finish();
        agg
    }

    /// Aggregates every month plus the annual total.
    pub fn aggregate_all(&self, behaviors: &BTreeMap<String, CostBehavior>) -> LedgerAggregates {
        let monthly = MONTHS
            .iter()
            .map(|&m| (m, self.aggregate(Period::Month(m), behaviors)))
            .collect();
        let annual = self.aggregate(Period::Annual, behaviors);
        LedgerAggregates { monthly, annual }
    }
}
