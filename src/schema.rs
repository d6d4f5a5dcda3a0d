use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fixed calendar axis of the engine. Upload columns map to these
/// twelve months in order; there is no other time dimension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Month {
    Enero,
    Febrero,
    Marzo,
    Abril,
    Mayo,
    Junio,
    Julio,
    Agosto,
    Septiembre,
    Octubre,
    Noviembre,
    Diciembre,
}

pub const MONTHS: [Month; 12] = [
    Month::Enero,
    Month::Febrero,
    Month::Marzo,
    Month::Abril,
    Month::Mayo,
    Month::Junio,
    Month::Julio,
    Month::Agosto,
    Month::Septiembre,
    Month::Octubre,
    Month::Noviembre,
    Month::Diciembre,
];

impl Month {
    pub fn name(&self) -> &'static str {
        match self {
            Month::Enero => "Enero",
            Month::Febrero => "Febrero",
            Month::Marzo => "Marzo",
            Month::Abril => "Abril",
            Month::Mayo => "Mayo",
            Month::Junio => "Junio",
            Month::Julio => "Julio",
            Month::Agosto => "Agosto",
            Month::Septiembre => "Septiembre",
            Month::Octubre => "Octubre",
            Month::Noviembre => "Noviembre",
            Month::Diciembre => "Diciembre",
        }
    }

    /// 0-based position within the calendar year.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_name(name: &str) -> Option<Month> {
        let lowered = name.trim().to_lowercase();
        MONTHS
            .iter()
            .find(|m| m.name().to_lowercase() == lowered)
            .copied()
    }
}

/// The period an aggregate or statement tree refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum Period {
    Month(Month),
    Annual,
}

impl Default for Period {
    fn default() -> Self {
        Period::Annual
    }
}

/// One ledger line as uploaded: a dot-coded account with a value per month.
/// Immutable once parsed; values are already normalized to plain floats.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountRecord {
    #[schemars(description = "Dot-delimited account code, e.g. '5.1.1.6'. Depth is the number of dot separators.")]
    pub code: String,

    #[schemars(description = "Free-text account name as it appears in the chart of accounts.")]
    pub name: String,

    #[schemars(description = "Normalized monthly balances. Months absent from the map are treated as zero.")]
    pub values: BTreeMap<Month, f64>,
}

impl AccountRecord {
    pub fn value_for(&self, month: Month) -> f64 {
        self.values.get(&month).copied().unwrap_or(0.0)
    }

    pub fn annual_value(&self) -> f64 {
        self.values.values().sum()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AccountRecord)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Leaf,
    Subtotal,
    Root,
}

/// Change of one statement line between two periods.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HorizontalChange {
    pub variation_absolute: f64,
    pub variation_percentual: f64,
    /// True when the comparison value was zero, so the percentage above is
    /// a reported 0 rather than a real ratio.
    pub zero_denominator: bool,
}

/// One node of the rendered statement tree. The root exclusively owns the
/// whole tree; trees are rebuilt per (period, view) and never patched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountNode {
    pub code: String,
    pub name: String,
    pub depth: usize,
    pub value: f64,
    pub vertical_percentage: Option<f64>,
    pub horizontal_change: Option<HorizontalChange>,
    pub children: Vec<AccountNode>,
    pub kind: NodeKind,
}

impl AccountNode {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Depth-first walk over the node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a AccountNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn find(&self, code: &str) -> Option<&AccountNode> {
        if self.code == code {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(code))
    }
}

/// Which analytical basis a statement tree is computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisView {
    /// Standard accounting basis: everything where the chart puts it.
    #[default]
    Contable,
    /// EBIT-oriented: financial interest reported below the operating line.
    Operativo,
    /// EBITDA-oriented: depreciation and amortization added back.
    Caja,
}

/// Aggregated figures for one period. Base buckets are filled from leaf
/// accounts only; derived lines are computed once by `finish`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub ingresos: f64,
    pub costos_variables: f64,
    pub costos_fijos: f64,
    pub costo_ventas_total: f64,
    pub gastos_admin_total: f64,
    pub gastos_ventas_total: f64,
    pub depreciacion: f64,
    pub interes_financiero: f64,

    pub utilidad_bruta: f64,
    pub gastos_operativos: f64,
    pub utilidad_neta: f64,
    pub ebitda: f64,
    pub punto_equilibrio: f64,
}

impl PeriodAggregate {
    /// Computes every derived line from the base buckets. Depreciation and
    /// financial interest are both add-backs regardless of stored sign.
    pub fn finish(&mut self) {
        self.utilidad_bruta = self.ingresos - self.costo_ventas_total;
        self.gastos_operativos = self.gastos_admin_total + self.gastos_ventas_total;
        self.utilidad_neta = self.utilidad_bruta - self.gastos_operativos;
        self.ebitda = self.utilidad_neta + self.depreciacion.abs() + self.interes_financiero.abs();

        let margen = self.margen_contribucion_porc();
        self.punto_equilibrio = if margen > 0.0 {
            self.costos_fijos / margen
        } else {
            0.0
        };
    }

    /// Contribution margin as a 0..1 fraction; 0 when there is no revenue.
    pub fn margen_contribucion_porc(&self) -> f64 {
        if self.ingresos > 0.0 {
            (self.ingresos - self.costos_variables) / self.ingresos
        } else {
            0.0
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// The cost-behavior label the classifier assigns to a leaf account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum CostBehavior {
    #[schemars(description = "Moves proportionally with revenue (raw materials, sales commissions, freight)")]
    Variable,

    #[schemars(description = "Stays flat regardless of activity level (rent, insurance, base salaries)")]
    Fijo,

    #[schemars(description = "A fixed floor plus a usage-driven component (utilities, maintenance)")]
    SemiVariable,

    #[schemars(description = "Flat within a capacity band, then jumps when the band is exceeded (supervision, warehouse leases)")]
    Escalonado,
}

/// Independent signal scores behind a classification, each in 0..1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalScores {
    pub semantic: f64,
    pub behavioral: f64,
    pub structural: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classification: CostBehavior,
    pub confidence: f64,
    pub signals: SignalScores,
}

impl ClassificationResult {
    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::from_confidence(self.confidence)
    }
}

/// Downstream routing of a classification by its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// >= 0.85: safe to auto-apply.
    High,
    /// 0.60..0.85: flag for review.
    Medium,
    /// < 0.60: requires manual classification.
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.85 {
            ConfidenceBand::High
        } else if confidence >= 0.60 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// What-if deltas for the break-even simulator. Pure input: applying them
/// never touches the base aggregate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
pub struct SimulationParameters {
    #[schemars(description = "Percentage change applied to revenue, e.g. 10.0 for +10%.")]
    pub price_change_pct: f64,

    #[schemars(description = "Absolute amount added to total fixed costs (may be negative).")]
    pub fixed_cost_delta: f64,

    #[schemars(description = "Percentage change applied to the variable-cost rate (variable costs / revenue).")]
    pub variable_cost_rate_change_pct: f64,
}
