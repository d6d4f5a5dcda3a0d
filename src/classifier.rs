//! Cost-behavior classification from three independent signals.
//!
//! Semantic (name lexicon), behavioral (how the account's monthly changes
//! track revenue's) and structural (where the code sits in the chart)
//! scores are combined into one label plus an explainable confidence.
//! Classification is explicit and idempotent: it never runs on data load,
//! a snapshot must be set first, and identical inputs always produce the
//! identical result.

use crate::aggregation::{bucket_for, SemanticBucket};
use crate::error::{PnlError, Result};
use crate::hierarchy::AccountArena;
use crate::lexicon::CostLexicon;
use crate::schema::{
    AccountRecord, ClassificationResult, CostBehavior, SignalScores, MONTHS,
};
use log::debug;
use std::collections::BTreeMap;

const WEIGHT_SEMANTIC: f64 = 0.45;
const WEIGHT_BEHAVIORAL: f64 = 0.35;
const WEIGHT_STRUCTURAL: f64 = 0.20;

/// An exact, single-category lexicon hit decides on its own.
const SEMANTIC_DECISIVE: f64 = 0.9;
/// A behavioral vote this strong blocks the semantic cascade.
const BEHAVIORAL_VETO: f64 = 0.8;

/// Monthly series the behavioral signal correlates against. Built once
/// from the resolved ledger and handed to the classifier.
#[derive(Debug, Clone)]
pub struct FinancialSnapshot {
    revenue: [f64; 12],
    series: BTreeMap<String, [f64; 12]>,
}

impl FinancialSnapshot {
    pub fn from_ledger(records: &[AccountRecord], arena: &AccountArena) -> Self {
        let by_code: BTreeMap<&str, &AccountRecord> =
            records.iter().map(|r| (r.code.as_str(), r)).collect();

        let mut revenue = [0.0; 12];
        let mut series = BTreeMap::new();

        for leaf in arena.leaves() {
            let Some(record) = by_code.get(leaf.code.as_str()) else {
                continue;
            };
            let mut months = [0.0; 12];
            for (i, m) in MONTHS.iter().enumerate() {
                months[i] = record.value_for(*m);
            }
            if bucket_for(&leaf.code, &leaf.name) == SemanticBucket::Revenue {
                for (i, v) in months.iter().enumerate() {
                    revenue[i] += v;
                }
            }
            series.insert(leaf.code.clone(), months);
        }

        Self { revenue, series }
    }
}

/// One signal's opinion: a label (or an abstention) and how strongly it
/// is held, in 0..1.
#[derive(Debug, Clone, Copy)]
struct SignalVote {
    label: Option<CostBehavior>,
    strength: f64,
}

impl SignalVote {
    fn abstain() -> Self {
        Self {
            label: None,
            strength: 0.0,
        }
    }

    fn agrees_with(&self, behavior: CostBehavior) -> bool {
        self.label == Some(behavior)
    }
}

pub struct CostClassifier {
    lexicon: CostLexicon,
    snapshot: Option<FinancialSnapshot>,
    cache: BTreeMap<String, ClassificationResult>,
}

impl Default for CostClassifier {
    fn default() -> Self {
        Self::new(CostLexicon::default())
    }
}

impl CostClassifier {
    pub fn new(lexicon: CostLexicon) -> Self {
        Self {
            lexicon,
            snapshot: None,
            cache: BTreeMap::new(),
        }
    }

    /// Installs the financial snapshot classification runs against and
    /// drops any cached results from a previous snapshot.
    pub fn set_financial_data(&mut self, snapshot: FinancialSnapshot) {
        self.snapshot = Some(snapshot);
        self.cache.clear();
    }

    pub fn has_financial_data(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Pins a manual classification for one account. Overrides carry full
    /// confidence and survive until the snapshot is replaced.
    pub fn apply_override(&mut self, code: &str, behavior: CostBehavior) {
        self.cache.insert(
            code.to_string(),
            ClassificationResult {
                classification: behavior,
                confidence: 1.0,
                signals: SignalScores {
                    semantic: 0.0,
                    behavioral: 0.0,
                    structural: 0.0,
                },
            },
        );
    }

    pub fn classify(&mut self, code: &str, name: &str) -> Result<ClassificationResult> {
        let snapshot = self.snapshot.as_ref().ok_or_else(|| {
            PnlError::ClassifierNotConfigured(
                "set_financial_data must be called before classify".to_string(),
            )
        })?;

        if let Some(cached) = self.cache.get(code) {
            return Ok(cached.clone());
        }

        let semantic = semantic_signal(&self.lexicon, name);
        let behavioral = behavioral_signal(snapshot, code);
        let structural = structural_signal(code);

        let result = combine(semantic, behavioral, structural);
        debug!(
            "Classified {} ({}) as {:?} with confidence {:.2}",
            code, name, result.classification, result.confidence
        );
        self.cache.insert(code.to_string(), result.clone());
        Ok(result)
    }

    /// Deterministic batch wrapper over `classify`.
    pub fn classify_accounts(
        &mut self,
        accounts: &[(String, String)],
    ) -> Result<BTreeMap<String, ClassificationResult>> {
        let mut results = BTreeMap::new();
        for (code, name) in accounts {
            results.insert(code.clone(), self.classify(code, name)?);
        }
        Ok(results)
    }
}

fn semantic_signal(lexicon: &CostLexicon, name: &str) -> SignalVote {
    match lexicon.match_name(name) {
        Some(hit) => SignalVote {
            label: Some(hit.behavior),
            strength: hit.score,
        },
        None => SignalVote::abstain(),
    }
}

/// Depth and code-prefix prior: deep cost-of-sales leaves track
/// production, administrative and selling branches default flat.
fn structural_signal(code: &str) -> SignalVote {
    if code == "5.1" || code.starts_with("5.1.") {
        let depth = code.matches('.').count();
        SignalVote {
            label: Some(CostBehavior::Variable),
            strength: 0.45 + 0.05 * depth.min(4) as f64,
        }
    } else if code.starts_with("5.2") || code.starts_with("5.3") {
        SignalVote {
            label: Some(CostBehavior::Fijo),
            strength: 0.55,
        }
    } else {
        SignalVote::abstain()
    }
}

fn behavioral_signal(snapshot: &FinancialSnapshot, code: &str) -> SignalVote {
    let Some(series) = snapshot.series.get(code) else {
        return SignalVote::abstain();
    };
    if series.iter().all(|&v| v == 0.0) {
        return SignalVote::abstain();
    }

    // Near-constant series are fixed regardless of revenue shape.
    if let Some(cv) = coefficient_of_variation(series) {
        if cv < 0.05 {
            return SignalVote {
                label: Some(CostBehavior::Fijo),
                strength: 0.9,
            };
        }
    }

    if let Some(strength) = stepped_strength(series) {
        return SignalVote {
            label: Some(CostBehavior::Escalonado),
            strength,
        };
    }

    match correlation_with_revenue(series, &snapshot.revenue) {
        Some(r) if r >= 0.75 => SignalVote {
            label: Some(CostBehavior::Variable),
            strength: r.min(1.0),
        },
        Some(r) if r.abs() < 0.25 => SignalVote {
            label: Some(CostBehavior::Fijo),
            strength: 0.6,
        },
        Some(_) => SignalVote {
            label: Some(CostBehavior::SemiVariable),
            strength: 0.55,
        },
        None => SignalVote::abstain(),
    }
}

/// Std-dev over mean across the months where the account is active.
fn coefficient_of_variation(series: &[f64; 12]) -> Option<f64> {
    let active: Vec<f64> = series.iter().copied().filter(|v| *v != 0.0).collect();
    if active.len() < 3 {
        return None;
    }
    let n = active.len() as f64;
    let mean = active.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return None;
    }
    let var = active.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt() / mean.abs())
}

/// Detects a piecewise-flat series with at least one jump of 25% or more
/// of the running level. Returns the vote strength when the shape fits.
fn stepped_strength(series: &[f64; 12]) -> Option<f64> {
    let active: Vec<f64> = series.iter().copied().filter(|v| *v != 0.0).collect();
    if active.len() < 4 {
        return None;
    }

    let mut jumps = 0usize;
    let mut flats = 0usize;
    for pair in active.windows(2) {
        let level = pair[0].abs();
        let delta = (pair[1] - pair[0]).abs();
        if delta >= 0.25 * level {
            jumps += 1;
        } else if delta <= 0.02 * level {
            flats += 1;
        }
    }

    let transitions = active.len() - 1;
    if jumps >= 1 && jumps <= 2 && flats * 10 >= transitions * 6 {
        Some((0.7 + 0.1 * jumps as f64).min(0.9))
    } else {
        None
    }
}

/// Pearson correlation of month-over-month deltas against revenue's,
/// restricted to transitions where revenue is active on both sides.
/// Fewer than 3 usable observations means the signal abstains.
fn correlation_with_revenue(series: &[f64; 12], revenue: &[f64; 12]) -> Option<f64> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 1..12 {
        if revenue[i - 1] == 0.0 && revenue[i] == 0.0 {
            continue;
        }
        xs.push(revenue[i] - revenue[i - 1]);
        ys.push(series[i] - series[i - 1]);
    }
    if xs.len() < 3 {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Weighted combination with a priority cascade: a decisive semantic hit
/// wins outright unless the behavioral signal strongly contradicts it.
fn combine(semantic: SignalVote, behavioral: SignalVote, structural: SignalVote) -> ClassificationResult {
    let signals = SignalScores {
        semantic: semantic.strength,
        behavioral: behavioral.strength,
        structural: structural.strength,
    };

    if let Some(label) = semantic.label {
        let vetoed = behavioral.label.is_some()
            && !behavioral.agrees_with(label)
            && behavioral.strength >= BEHAVIORAL_VETO;
        if semantic.strength >= SEMANTIC_DECISIVE && !vetoed {
            let mut confidence: f64 = 0.85;
            if behavioral.agrees_with(label) {
                confidence += 0.10;
            }
            if structural.agrees_with(label) {
                confidence += 0.05;
            }
            return ClassificationResult {
                classification: label,
                confidence: confidence.min(1.0),
                signals,
            };
        }
    }

    // Fixed label order keeps ties deterministic.
    let order = [
        CostBehavior::Variable,
        CostBehavior::Fijo,
        CostBehavior::SemiVariable,
        CostBehavior::Escalonado,
    ];
    let mut scores: BTreeMap<usize, f64> = BTreeMap::new();
    let mut voted_weight = 0.0;
    for (vote, weight) in [
        (semantic, WEIGHT_SEMANTIC),
        (behavioral, WEIGHT_BEHAVIORAL),
        (structural, WEIGHT_STRUCTURAL),
    ] {
        if let Some(label) = vote.label {
            let idx = order.iter().position(|b| *b == label).unwrap();
            *scores.entry(idx).or_default() += weight * vote.strength;
            voted_weight += weight;
        }
    }

    if scores.is_empty() {
        // Nothing to go on: flag for manual classification.
        return ClassificationResult {
            classification: CostBehavior::SemiVariable,
            confidence: 0.0,
            signals,
        };
    }

    let total: f64 = scores.values().sum();
    let (&winner_idx, &winner_score) = scores
        .iter()
        .max_by(|a, b| {
            a.1.partial_cmp(b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.0.cmp(a.0))
        })
        .unwrap();

    // Share of the vote, damped by how much of the total signal weight
    // actually voted.
    let confidence = (winner_score / total) * voted_weight.sqrt();

    ClassificationResult {
        classification: order[winner_idx],
        confidence: confidence.clamp(0.0, 1.0),
        signals,
    }
}
