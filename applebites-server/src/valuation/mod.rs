//! Valuation engine for business assessments.
//!
//! Implements the five-stage pipeline that turns raw financial-statement
//! line items and qualitative value-driver grades into a three-point
//! enterprise-value estimate:
//!
//! 1. Normalize line items into base EBITDA
//! 2. Apply owner add-backs to get Adjusted EBITDA
//! 3. Reduce ten value-driver grades into an overall letter score
//! 4. Select low/mid/high multiples (grade table, or industry table on paid tiers)
//! 5. Multiply out the valuation range
//!
//! The pipeline is a pure function over a single submission payload. It
//! performs no I/O and cannot fail: malformed numeric input coerces to
//! zero and missing grades default to C.

pub mod engine;
pub mod multiples;
pub mod types;

pub use engine::{MultipleSource, ValuationEngine, ValuationOutcome, ValuationRequest};
pub use multiples::{grade_multiples, paid_grade_factor, MultipleTriple};
pub use types::{
    DriverGrades, DriverImpact, FinancialInputs, FollowUpIntent, Grade, OwnerAdjustments, Tier,
    ValueDriver, VALUE_DRIVERS,
};
