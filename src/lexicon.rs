//! Name-based cost-behavior lexicon.
//!
//! The term lists are plain data so deployments can extend them per chart
//! of accounts without code changes: load a JSON document with the same
//! shape as [`CostLexicon`] and hand it to the classifier.

use crate::error::{PnlError, Result};
use crate::schema::CostBehavior;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CostLexicon {
    #[schemars(description = "Terms indicating costs that move with revenue (raw materials, commissions, freight).")]
    pub variable: Vec<String>,

    #[schemars(description = "Terms indicating flat recurring costs (rent, insurance, base salaries).")]
    pub fijo: Vec<String>,

    #[schemars(description = "Terms indicating a fixed floor plus usage (utilities, maintenance).")]
    pub semi_variable: Vec<String>,

    #[schemars(description = "Terms indicating capacity-band costs that jump in steps (supervision, warehousing).")]
    pub escalonado: Vec<String>,
}

/// A lexicon hit: which behavior the name points at and how decisive the
/// match is (1.0 only when exactly one category matched).
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconMatch {
    pub behavior: CostBehavior,
    pub score: f64,
    pub term: String,
}

impl Default for CostLexicon {
    fn default() -> Self {
        let list = |terms: &[&str]| terms.iter().map(|t| t.to_string()).collect();
        Self {
            variable: list(&[
                "materia prima",
                "materiales",
                "insumo",
                "mercaderia",
                "flete",
                "comision",
                "embalaje",
                "empaque",
                "combustible",
                "destajo",
            ]),
            fijo: list(&[
                "arriendo",
                "alquiler",
                "renta",
                "seguro",
                "sueldo",
                "salario",
                "honorario",
                "suscripcion",
                "licencia",
                "vigilancia",
                "depreciaci",
                "amortizaci",
                "interes",
            ]),
            semi_variable: list(&[
                "energia",
                "electricidad",
                "agua",
                "telefono",
                "internet",
                "mantenimiento",
                "reparacion",
                "servicios publicos",
            ]),
            escalonado: list(&[
                "supervision",
                "supervisor",
                "bodega",
                "almacen",
                "turno",
            ]),
        }
    }
}

impl CostLexicon {
    pub fn from_json(json: &str) -> Result<Self> {
        let lexicon: CostLexicon = serde_json::from_str(json)?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    pub fn validate(&self) -> Result<()> {
        let total = self.variable.len()
            + self.fijo.len()
            + self.semi_variable.len()
            + self.escalonado.len();
        if total == 0 {
            return Err(PnlError::InvalidLexicon(
                "lexicon contains no terms".to_string(),
            ));
        }
        for term in self.all_terms().map(|(t, _)| t) {
            if term.trim().is_empty() {
                return Err(PnlError::InvalidLexicon(
                    "lexicon contains an empty term".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CostLexicon)
    }

    fn all_terms(&self) -> impl Iterator<Item = (&String, CostBehavior)> {
        self.variable
            .iter()
            .map(|t| (t, CostBehavior::Variable))
            .chain(self.fijo.iter().map(|t| (t, CostBehavior::Fijo)))
            .chain(
                self.semi_variable
                    .iter()
                    .map(|t| (t, CostBehavior::SemiVariable)),
            )
            .chain(
                self.escalonado
                    .iter()
                    .map(|t| (t, CostBehavior::Escalonado)),
            )
    }

    /// Case- and accent-insensitive substring lookup. When terms from more
    /// than one category match, the longest term wins with a reduced score.
    pub fn match_name(&self, name: &str) -> Option<LexiconMatch> {
        let folded = fold(name);

        let mut hits: Vec<(&String, CostBehavior)> = self
            .all_terms()
            .filter(|(term, _)| folded.contains(fold(term).as_str()))
            .collect();
        if hits.is_empty() {
            return None;
        }
        hits.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));

        let categories: std::collections::HashSet<CostBehavior> =
            hits.iter().map(|(_, b)| *b).collect();
        let (term, behavior) = hits[0];
        let score = if categories.len() == 1 { 1.0 } else { 0.7 };

        Some(LexiconMatch {
            behavior,
            score,
            term: term.clone(),
        })
    }
}

/// Lowercases and strips Spanish diacritics so "Comisión" matches "comision".
/// Shared with the semantic bucket routing in `aggregation`.
pub(crate) fn fold(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lexicon_matches() {
        let lexicon = CostLexicon::default();

        let m = lexicon.match_name("Materia Prima Directa").unwrap();
        assert_eq!(m.behavior, CostBehavior::Variable);
        assert_eq!(m.score, 1.0);

        let m = lexicon.match_name("Arriendo oficina").unwrap();
        assert_eq!(m.behavior, CostBehavior::Fijo);

        let m = lexicon.match_name("Energía eléctrica planta").unwrap();
        assert_eq!(m.behavior, CostBehavior::SemiVariable);
    }

    #[test]
    fn test_accent_folding() {
        let lexicon = CostLexicon::default();
        let m = lexicon.match_name("Comisión de ventas").unwrap();
        assert_eq!(m.behavior, CostBehavior::Variable);
    }

    #[test]
    fn test_no_match() {
        let lexicon = CostLexicon::default();
        assert!(lexicon.match_name("Cuenta generica 42").is_none());
    }

    #[test]
    fn test_cross_category_hit_reduces_score() {
        let lexicon = CostLexicon::default();
        // "seguro" (fijo) and "flete" (variable) both present
        let m = lexicon.match_name("Seguro de flete").unwrap();
        assert_eq!(m.score, 0.7);
    }

    #[test]
    fn test_from_json_roundtrip() {
        let json = r#"{
            "variable": ["lana"],
            "fijo": ["alquiler"],
            "semi_variable": [],
            "escalonado": []
        }"#;
        let lexicon = CostLexicon::from_json(json).unwrap();
        let m = lexicon.match_name("Compra de lana").unwrap();
        assert_eq!(m.behavior, CostBehavior::Variable);
    }

    #[test]
    fn test_empty_lexicon_rejected() {
        let json = r#"{"variable": [], "fijo": [], "semi_variable": [], "escalonado": []}"#;
        assert!(CostLexicon::from_json(json).is_err());
    }

    #[test]
    fn test_empty_term_rejected() {
        let json = r#"{"variable": [" "], "fijo": [], "semi_variable": [], "escalonado": []}"#;
        assert!(CostLexicon::from_json(json).is_err());
    }
}
