use serde::{Deserialize, Serialize};

use crate::ledger::{
    engine::{KeyRecompute, RecomputeOutcome},
    AggregateRow,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    #[default]
    Nutrition,
    Activity,
}

#[derive(Debug, Deserialize)]
pub struct RecomputeRequest {
    pub date: String,
    pub meal_type: Option<String>,
    #[serde(default)]
    pub kind: SummaryKind,
}

#[derive(Debug, Serialize)]
pub struct RecomputeResponse {
    #[serde(flatten)]
    pub result: KeyRecompute,
    /// Row as it stands after the recompute.
    pub row: Option<AggregateRow>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub keys: usize,
    pub changed: usize,
    pub results: Vec<KeyRecompute>,
}

impl ReconcileResponse {
    pub fn from_results(results: Vec<KeyRecompute>) -> Self {
        let changed = results
            .iter()
            .filter(|r| !matches!(r.outcome, RecomputeOutcome::Unchanged | RecomputeOutcome::Absent))
            .count();
        Self {
            keys: results.len(),
            changed,
            results,
        }
    }
}
