//! Narrative report generation.
//!
//! Fills the assessment's narrative summary after persistence. The text
//! is a deterministic template over the computed outcome so the same
//! assessment always reads the same way.

use crate::store::Assessment;
use crate::valuation::{Grade, Tier, VALUE_DRIVERS};

/// Generate the narrative summary for a stored assessment.
pub fn generate_narrative(assessment: &Assessment) -> String {
    let mut sections = Vec::new();

    sections.push(format!(
        "{} received an overall value-driver grade of {} with an adjusted EBITDA of {}.",
        assessment.company_name,
        assessment.overall_score,
        format_currency(assessment.adjusted_ebitda),
    ));

    sections.push(format!(
        "Applying a {:.2}x market multiple, the estimated enterprise value ranges from {} (conservative) through {} (market) to {} (optimistic).",
        assessment.valuation_multiple,
        format_currency(assessment.low_estimate),
        format_currency(assessment.mid_estimate),
        format_currency(assessment.high_estimate),
    ));

    sections.push(grade_commentary(assessment.overall_score).to_string());

    let weak = weakest_drivers(assessment);
    if !weak.is_empty() {
        sections.push(format!(
            "The largest opportunities to improve the multiple are: {}.",
            weak.join(", ")
        ));
    }

    if assessment.tier == Tier::Free {
        sections.push(
            "This estimate uses the standard grade-based multiple table; \
             a paid assessment refines it with industry-specific multiples."
                .to_string(),
        );
    }

    sections.join(" ")
}

/// One-sentence read on the overall grade.
fn grade_commentary(grade: Grade) -> &'static str {
    match grade {
        Grade::A => {
            "The business scores in the top band across its value drivers and should command a premium multiple."
        }
        Grade::B => {
            "The business scores above average across its value drivers, supporting a multiple ahead of the market baseline."
        }
        Grade::C => {
            "The business scores in line with the market baseline; targeted driver improvements would lift the multiple."
        }
        Grade::D => {
            "The business scores below average across its value drivers, which compresses the achievable multiple."
        }
        Grade::F => {
            "The business scores in the bottom band across its value drivers; buyers would apply a heavily discounted multiple."
        }
    }
}

/// Labels of the drivers graded D or F, in presentation order.
fn weakest_drivers(assessment: &Assessment) -> Vec<&'static str> {
    assessment
        .grades
        .as_pairs()
        .into_iter()
        .filter(|(_, grade)| matches!(grade, Grade::D | Grade::F))
        .filter_map(|(key, _)| {
            VALUE_DRIVERS
                .iter()
                .find(|driver| driver.key == key)
                .map(|driver| driver.label)
        })
        .collect()
}

/// Whole-dollar display formatting with thousands separators.
fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let rounded = amount.abs().round() as u64;
    let digits = rounded.to_string();

    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
