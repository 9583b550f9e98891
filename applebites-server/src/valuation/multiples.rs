//! Valuation multiple tables.
//!
//! Free-tier assessments price off a fixed grade table; paid tiers price
//! off the NAICS industry table scaled by a grade factor. Both tables are
//! enumerated explicitly so the constants are auditable at a glance.

use serde::{Deserialize, Serialize};

use super::types::Grade;

/// Low/mid/high EBITDA multiples, always in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultipleTriple {
    /// Conservative multiple
    pub low: f64,
    /// Market multiple
    pub mid: f64,
    /// Optimistic multiple
    pub high: f64,
}

impl MultipleTriple {
    pub const fn new(low: f64, mid: f64, high: f64) -> Self {
        Self { low, mid, high }
    }

    /// Scale all three multiples by a factor, preserving order.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            low: self.low * factor,
            mid: self.mid * factor,
            high: self.high * factor,
        }
    }
}

/// Free-tier multiples by overall grade.
///
/// Grade C carries the long-observed 2.5x / 3.5x / 4.5x constants; the
/// other rows shift the triple by 0.75x per grade point with a fixed
/// +/-1.0x spread around the mid.
pub const fn grade_multiples(grade: Grade) -> MultipleTriple {
    match grade {
        Grade::A => MultipleTriple::new(4.00, 5.00, 6.00),
        Grade::B => MultipleTriple::new(3.25, 4.25, 5.25),
        Grade::C => MultipleTriple::new(2.50, 3.50, 4.50),
        Grade::D => MultipleTriple::new(1.75, 2.75, 3.75),
        Grade::F => MultipleTriple::new(1.00, 2.00, 3.00),
    }
}

/// Paid-tier scaling applied to industry base multiples.
///
/// Grade C is 1.0, so a C-graded paid assessment prices exactly at its
/// industry base row.
pub const fn paid_grade_factor(grade: Grade) -> f64 {
    match grade {
        Grade::A => 1.30,
        Grade::B => 1.15,
        Grade::C => 1.00,
        Grade::D => 0.85,
        Grade::F => 0.70,
    }
}
