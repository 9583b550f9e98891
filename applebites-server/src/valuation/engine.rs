//! Valuation engine.
//!
//! Runs the five pipeline stages over a single submission payload. The
//! engine is a pure function: no I/O, no shared state, and no failure
//! modes beyond the zero-coercion already applied at the type layer.

use serde::Serialize;

use super::multiples::{grade_multiples, paid_grade_factor, MultipleTriple};
use super::types::{DriverGrades, FinancialInputs, Grade, OwnerAdjustments, Tier};
use crate::naics;

/// Where the selected multiples came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "sector")]
pub enum MultipleSource {
    /// Free-tier grade table (also the paid-tier fallback)
    GradeTable,
    /// Industry base row scaled by the grade factor
    Industry(&'static str),
}

/// One valuation submission, tier and industry included.
#[derive(Debug, Clone, Default)]
pub struct ValuationRequest {
    pub tier: Tier,
    pub naics_code: Option<String>,
    pub financials: FinancialInputs,
    pub adjustments: OwnerAdjustments,
    pub grades: DriverGrades,
}

/// Computed valuation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ValuationOutcome {
    pub base_ebitda: f64,
    pub adjusted_ebitda: f64,
    pub overall_score: Grade,
    pub multiples: MultipleTriple,
    pub multiple_source: MultipleSource,
    pub low_estimate: f64,
    pub mid_estimate: f64,
    pub high_estimate: f64,
}

/// The valuation pipeline.
pub struct ValuationEngine;

impl ValuationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one submission: normalize, adjust, score, select
    /// multiples, and calculate the range.
    pub fn evaluate(&self, request: &ValuationRequest) -> ValuationOutcome {
        let base_ebitda = request.financials.base_ebitda();
        let adjusted_ebitda = base_ebitda + request.adjustments.total();
        let overall_score = request.grades.overall();

        let (multiples, multiple_source) =
            self.select_multiples(request.tier, overall_score, request.naics_code.as_deref());

        ValuationOutcome {
            base_ebitda,
            adjusted_ebitda,
            overall_score,
            multiples,
            multiple_source,
            low_estimate: adjusted_ebitda * multiples.low,
            mid_estimate: adjusted_ebitda * multiples.mid,
            high_estimate: adjusted_ebitda * multiples.high,
        }
    }

    /// Pick the multiple triple for a tier and overall grade.
    ///
    /// Paid tiers consult the NAICS industry table and scale its base row
    /// by the grade factor; unknown or missing codes fall back to the
    /// free-tier grade table.
    fn select_multiples(
        &self,
        tier: Tier,
        grade: Grade,
        naics_code: Option<&str>,
    ) -> (MultipleTriple, MultipleSource) {
        if tier.is_paid() {
            if let Some(sector) = naics_code.and_then(naics::lookup) {
                let scaled = sector.multiples().scaled(paid_grade_factor(grade));
                return (scaled, MultipleSource::Industry(sector.code));
            }
        }
        (grade_multiples(grade), MultipleSource::GradeTable)
    }
}

impl Default for ValuationEngine {
    fn default() -> Self {
        Self::new()
    }
}
