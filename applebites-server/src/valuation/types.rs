//! Valuation system types.
//!
//! Defines the canonical letter-grade scale, the ten value-driver
//! dimensions, and the lenient financial input payloads consumed by the
//! valuation engine.

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Grades
// ============================================================================

/// Letter grade for a value driver.
///
/// This enum is the single source of truth for the grading scale:
/// A=4, B=3, C=2, D=1, F=0 points, with average buckets
/// >=3.5 A, >=2.5 B, >=1.5 C, >=0.5 D, else F.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    #[default]
    C,
    D,
    F,
}

impl Grade {
    /// Point value on the canonical scale.
    pub const fn points(self) -> f64 {
        match self {
            Self::A => 4.0,
            Self::B => 3.0,
            Self::C => 2.0,
            Self::D => 1.0,
            Self::F => 0.0,
        }
    }

    /// Bucket an average point value back into a letter.
    pub fn from_average(avg: f64) -> Self {
        if avg >= 3.5 {
            Self::A
        } else if avg >= 2.5 {
            Self::B
        } else if avg >= 1.5 {
            Self::C
        } else if avg >= 0.5 {
            Self::D
        } else {
            Self::F
        }
    }

    /// Parse a grade leniently: case-insensitive, surrounding whitespace
    /// ignored, anything unrecognized defaults to C.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Self::A,
            "B" => Self::B,
            "C" => Self::C,
            "D" => Self::D,
            "F" => Self::F,
            _ => Self::C,
        }
    }

    /// Letter as a static string.
    pub const fn letter(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

fn lenient_grade<'de, D>(deserializer: D) -> Result<Grade, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => Grade::parse_lenient(&s),
        // Numbers, bools, arrays, objects, null: all default, never reject
        _ => Grade::default(),
    })
}

// ============================================================================
// Tier and Follow-up
// ============================================================================

/// Product tier an assessment was submitted under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Growth,
    Capital,
}

impl Tier {
    /// Paid tiers consult the industry multiple table.
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Growth | Self::Capital)
    }

    /// Tier name as stored in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Growth => "growth",
            Self::Capital => "capital",
        }
    }

    /// Parse from the database string, defaulting to free.
    pub fn from_db_string(s: &str) -> Self {
        match s {
            "growth" => Self::Growth,
            "capital" => Self::Capital,
            _ => Self::Free,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the submitter intends to do with the valuation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FollowUpIntent {
    #[default]
    Exploring,
    PlanningSale,
    RaisingCapital,
    Benchmarking,
}

impl FollowUpIntent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exploring => "exploring",
            Self::PlanningSale => "planning-sale",
            Self::RaisingCapital => "raising-capital",
            Self::Benchmarking => "benchmarking",
        }
    }

    pub fn from_db_string(s: &str) -> Self {
        match s {
            "planning-sale" => Self::PlanningSale,
            "raising-capital" => Self::RaisingCapital,
            "benchmarking" => Self::Benchmarking,
            _ => Self::Exploring,
        }
    }
}

// ============================================================================
// Value Drivers
// ============================================================================

/// How much a driver is presented as mattering in the wizard UI.
///
/// Impact labels are descriptive metadata only; every driver carries equal
/// weight in the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverImpact {
    High,
    Medium,
}

/// One of the ten qualitative dimensions graded per assessment.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValueDriver {
    /// Stable key used in payloads and storage
    pub key: &'static str,
    /// Human-readable label
    pub label: &'static str,
    /// Presentation-only impact tag
    pub impact: DriverImpact,
}

/// The ten value drivers, in presentation order.
pub const VALUE_DRIVERS: [ValueDriver; 10] = [
    ValueDriver {
        key: "financial_performance",
        label: "Financial Performance",
        impact: DriverImpact::High,
    },
    ValueDriver {
        key: "customer_concentration",
        label: "Customer Concentration",
        impact: DriverImpact::High,
    },
    ValueDriver {
        key: "management_team",
        label: "Management Team",
        impact: DriverImpact::High,
    },
    ValueDriver {
        key: "competitive_position",
        label: "Competitive Position",
        impact: DriverImpact::Medium,
    },
    ValueDriver {
        key: "growth_prospects",
        label: "Growth Prospects",
        impact: DriverImpact::High,
    },
    ValueDriver {
        key: "systems_processes",
        label: "Systems & Processes",
        impact: DriverImpact::Medium,
    },
    ValueDriver {
        key: "asset_quality",
        label: "Asset Quality",
        impact: DriverImpact::Medium,
    },
    ValueDriver {
        key: "industry_outlook",
        label: "Industry Outlook",
        impact: DriverImpact::Medium,
    },
    ValueDriver {
        key: "risk_factors",
        label: "Risk Factors",
        impact: DriverImpact::Medium,
    },
    ValueDriver {
        key: "owner_dependency",
        label: "Owner Dependency",
        impact: DriverImpact::High,
    },
];

/// Grades across the ten value-driver dimensions.
///
/// Any missing or unparseable grade defaults to C.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverGrades {
    #[serde(default, deserialize_with = "lenient_grade")]
    pub financial_performance: Grade,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub customer_concentration: Grade,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub management_team: Grade,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub competitive_position: Grade,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub growth_prospects: Grade,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub systems_processes: Grade,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub asset_quality: Grade,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub industry_outlook: Grade,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub risk_factors: Grade,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub owner_dependency: Grade,
}

impl DriverGrades {
    /// All ten grades keyed by driver, in presentation order.
    pub fn as_pairs(&self) -> [(&'static str, Grade); 10] {
        [
            ("financial_performance", self.financial_performance),
            ("customer_concentration", self.customer_concentration),
            ("management_team", self.management_team),
            ("competitive_position", self.competitive_position),
            ("growth_prospects", self.growth_prospects),
            ("systems_processes", self.systems_processes),
            ("asset_quality", self.asset_quality),
            ("industry_outlook", self.industry_outlook),
            ("risk_factors", self.risk_factors),
            ("owner_dependency", self.owner_dependency),
        ]
    }

    /// Average point value across the ten drivers.
    pub fn average_points(&self) -> f64 {
        let pairs = self.as_pairs();
        let total: f64 = pairs.iter().map(|(_, g)| g.points()).sum();
        total / pairs.len() as f64
    }

    /// Overall letter score.
    pub fn overall(&self) -> Grade {
        Grade::from_average(self.average_points())
    }

    /// Build with the same grade in every dimension.
    pub fn uniform(grade: Grade) -> Self {
        Self {
            financial_performance: grade,
            customer_concentration: grade,
            management_team: grade,
            competitive_position: grade,
            growth_prospects: grade,
            systems_processes: grade,
            asset_quality: grade,
            industry_outlook: grade,
            risk_factors: grade,
            owner_dependency: grade,
        }
    }
}

// ============================================================================
// Financial Inputs
// ============================================================================

/// Lenient deserializer for dollar amounts.
///
/// Accepts a JSON number, a numeric string, a blank string, null, or an
/// absent field; anything non-numeric or non-finite coerces to 0.0.
/// Never fails and never yields NaN.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(coerce_amount(raw.as_ref()))
}

/// Numeric coercion shared by all financial fields.
pub fn coerce_amount(value: Option<&serde_json::Value>) -> f64 {
    let coerced = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if coerced.is_finite() {
        coerced
    } else {
        0.0
    }
}

/// Raw financial-statement line items for EBITDA normalization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FinancialInputs {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub net_income: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub interest: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub taxes: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub depreciation: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amortization: f64,
}

impl FinancialInputs {
    /// Base EBITDA: net income plus interest, taxes, depreciation,
    /// and amortization.
    pub fn base_ebitda(&self) -> f64 {
        self.net_income + self.interest + self.taxes + self.depreciation + self.amortization
    }
}

/// Owner-specific normalizing add-backs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OwnerAdjustments {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub owner_salary: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub personal_expenses: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub one_time_expenses: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub other_adjustments: f64,
}

impl OwnerAdjustments {
    /// Sum of the four add-backs. No caps and no sign restrictions.
    pub fn total(&self) -> f64 {
        self.owner_salary + self.personal_expenses + self.one_time_expenses + self.other_adjustments
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_points() {
        assert_eq!(Grade::A.points(), 4.0);
        assert_eq!(Grade::B.points(), 3.0);
        assert_eq!(Grade::C.points(), 2.0);
        assert_eq!(Grade::D.points(), 1.0);
        assert_eq!(Grade::F.points(), 0.0);
    }

    #[test]
    fn test_grade_buckets() {
        assert_eq!(Grade::from_average(4.0), Grade::A);
        assert_eq!(Grade::from_average(3.5), Grade::A);
        assert_eq!(Grade::from_average(3.49), Grade::B);
        // Exact boundary resolves to the higher letter
        assert_eq!(Grade::from_average(2.5), Grade::B);
        assert_eq!(Grade::from_average(2.0), Grade::C);
        assert_eq!(Grade::from_average(0.5), Grade::D);
        assert_eq!(Grade::from_average(0.49), Grade::F);
        assert_eq!(Grade::from_average(0.0), Grade::F);
    }

    #[test]
    fn test_grade_parse_lenient() {
        assert_eq!(Grade::parse_lenient("A"), Grade::A);
        assert_eq!(Grade::parse_lenient(" b "), Grade::B);
        assert_eq!(Grade::parse_lenient("f"), Grade::F);
        assert_eq!(Grade::parse_lenient(""), Grade::C);
        assert_eq!(Grade::parse_lenient("excellent"), Grade::C);
    }

    #[test]
    fn test_driver_grades_default_all_c() {
        let grades: DriverGrades = serde_json::from_str("{}").unwrap();
        assert_eq!(grades.overall(), Grade::C);
        assert_eq!(grades.average_points(), 2.0);
    }

    #[test]
    fn test_driver_grades_partial_payload() {
        let grades: DriverGrades = serde_json::from_str(
            r#"{ "financial_performance": "A", "owner_dependency": "f", "risk_factors": null }"#,
        )
        .unwrap();
        assert_eq!(grades.financial_performance, Grade::A);
        assert_eq!(grades.owner_dependency, Grade::F);
        assert_eq!(grades.risk_factors, Grade::C);
        assert_eq!(grades.management_team, Grade::C);
    }

    #[test]
    fn test_wrong_typed_grade_defaults_to_c() {
        // A submission must never be rejected over a grade value of the
        // wrong JSON type; it coerces to C like a missing grade does.
        let grades: DriverGrades = serde_json::from_str(
            r#"{
                "financial_performance": 3,
                "management_team": true,
                "growth_prospects": ["A"],
                "asset_quality": { "grade": "A" },
                "owner_dependency": "B"
            }"#,
        )
        .unwrap();
        assert_eq!(grades.financial_performance, Grade::C);
        assert_eq!(grades.management_team, Grade::C);
        assert_eq!(grades.growth_prospects, Grade::C);
        assert_eq!(grades.asset_quality, Grade::C);
        assert_eq!(grades.owner_dependency, Grade::B);
    }

    #[test]
    fn test_lenient_amount_coercion() {
        let inputs: FinancialInputs = serde_json::from_str(
            r#"{
                "net_income": 100000,
                "interest": "5000",
                "taxes": "",
                "depreciation": null,
                "amortization": "not a number"
            }"#,
        )
        .unwrap();
        assert_eq!(inputs.net_income, 100000.0);
        assert_eq!(inputs.interest, 5000.0);
        assert_eq!(inputs.taxes, 0.0);
        assert_eq!(inputs.depreciation, 0.0);
        assert_eq!(inputs.amortization, 0.0);
        assert!(inputs.base_ebitda().is_finite());
    }

    #[test]
    fn test_base_ebitda_never_nan() {
        let inputs: FinancialInputs =
            serde_json::from_str(r#"{ "net_income": "NaN", "interest": "inf" }"#).unwrap();
        assert_eq!(inputs.net_income, 0.0);
        assert_eq!(inputs.interest, 0.0);
        assert!(!inputs.base_ebitda().is_nan());
    }

    #[test]
    fn test_adjustments_total() {
        let adj = OwnerAdjustments {
            owner_salary: 50000.0,
            personal_expenses: -10000.0,
            one_time_expenses: 0.0,
            other_adjustments: 2500.0,
        };
        assert_eq!(adj.total(), 42500.0);
    }

    #[test]
    fn test_tier_round_trip() {
        assert_eq!(Tier::from_db_string("growth"), Tier::Growth);
        assert_eq!(Tier::from_db_string("free"), Tier::Free);
        assert_eq!(Tier::from_db_string("unknown"), Tier::Free);
        assert!(Tier::Capital.is_paid());
        assert!(!Tier::Free.is_paid());
    }

    #[test]
    fn test_ten_drivers() {
        assert_eq!(VALUE_DRIVERS.len(), 10);
        let pairs = DriverGrades::default().as_pairs();
        for (driver, (key, _)) in VALUE_DRIVERS.iter().zip(pairs.iter()) {
            assert_eq!(driver.key, *key);
        }
    }
}
