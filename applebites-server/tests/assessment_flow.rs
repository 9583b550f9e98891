//! Integration tests for the assessment submission flow.
//!
//! Exercises the full path a submission takes server-side: lenient
//! payload deserialization, the valuation pipeline, durable storage with
//! idempotency-key deduplication, and the narrative report step.

use std::sync::Arc;

use applebites_server::report;
use applebites_server::routes::SubmitAssessmentRequest;
use applebites_server::store::{Assessment, AssessmentStore};
use applebites_server::valuation::{
    Grade, Tier, ValuationEngine, ValuationOutcome, ValuationRequest,
};
use chrono::Utc;

/// A realistic wizard payload with the messy value shapes the original
/// form surfaces produce: numeric strings, blanks, missing fields.
const WIZARD_PAYLOAD: &str = r#"{
    "tier": "free",
    "company": {
        "name": "Cedar Creek Landscaping",
        "founded_year": 2011
    },
    "contact": {
        "first_name": "Maria",
        "last_name": "Torres",
        "email": "maria@cedarcreek.example"
    },
    "financials": {
        "net_income": "100000",
        "interest": 5000,
        "taxes": 20000,
        "depreciation": "10000",
        "amortization": ""
    },
    "adjustments": {
        "owner_salary": 50000,
        "personal_expenses": "",
        "one_time_expenses": null
    },
    "grades": {
        "financial_performance": "B",
        "customer_concentration": "c",
        "management_team": "B",
        "owner_dependency": "D"
    },
    "follow_up": "planning-sale"
}"#;

fn evaluate(request: &SubmitAssessmentRequest, tier: Tier) -> ValuationOutcome {
    let engine = ValuationEngine::new();
    engine.evaluate(&ValuationRequest {
        tier,
        naics_code: request.company.naics_code.clone(),
        financials: request.financials,
        adjustments: request.adjustments,
        grades: request.grades,
    })
}

fn to_assessment(
    request: &SubmitAssessmentRequest,
    outcome: &ValuationOutcome,
    idempotency_key: Option<&str>,
) -> Assessment {
    let now = Utc::now();
    Assessment {
        id: uuid::Uuid::new_v4().to_string(),
        tier: request.tier.unwrap_or_default(),
        company_name: request.company.name.clone(),
        naics_code: request.company.naics_code.clone(),
        founded_year: request.company.founded_year,
        first_name: request.contact.first_name.clone(),
        last_name: request.contact.last_name.clone(),
        email: request.contact.email.clone(),
        grades: request.grades,
        base_ebitda: outcome.base_ebitda,
        adjusted_ebitda: outcome.adjusted_ebitda,
        valuation_multiple: outcome.multiples.mid,
        low_estimate: outcome.low_estimate,
        mid_estimate: outcome.mid_estimate,
        high_estimate: outcome.high_estimate,
        overall_score: outcome.overall_score,
        narrative: None,
        follow_up: request.follow_up.unwrap_or_default(),
        session_id: "sess-test".into(),
        idempotency_key: idempotency_key.map(String::from),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_wizard_payload_computes_expected_valuation() {
    let request: SubmitAssessmentRequest = serde_json::from_str(WIZARD_PAYLOAD).unwrap();
    let outcome = evaluate(&request, Tier::Free);

    // base = 100000 + 5000 + 20000 + 10000 + 0
    assert_eq!(outcome.base_ebitda, 135_000.0);
    // adjusted = base + 50000
    assert_eq!(outcome.adjusted_ebitda, 185_000.0);

    // Grades: B, C, B, D plus six defaulted C = average 2.1 -> C
    assert_eq!(outcome.overall_score, Grade::C);
    assert_eq!(outcome.multiples.mid, 3.5);
    assert_eq!(outcome.mid_estimate, 185_000.0 * 3.5);
    assert!(outcome.low_estimate <= outcome.mid_estimate);
    assert!(outcome.mid_estimate <= outcome.high_estimate);
}

#[test]
fn test_submission_persists_and_reads_back() {
    let store = AssessmentStore::in_memory().unwrap();
    let request: SubmitAssessmentRequest = serde_json::from_str(WIZARD_PAYLOAD).unwrap();
    let outcome = evaluate(&request, Tier::Free);

    let (stored, created) = store
        .insert(&to_assessment(&request, &outcome, None))
        .unwrap();
    assert!(created);

    let fetched = store.get(&stored.id).unwrap().unwrap();
    assert_eq!(fetched.company_name, "Cedar Creek Landscaping");
    assert_eq!(fetched.adjusted_ebitda, 185_000.0);
    assert_eq!(fetched.overall_score, Grade::C);
    assert_eq!(fetched.grades, request.grades);
}

#[test]
fn test_duplicate_submission_with_key_returns_same_record() {
    let store = AssessmentStore::in_memory().unwrap();
    let request: SubmitAssessmentRequest = serde_json::from_str(WIZARD_PAYLOAD).unwrap();
    let outcome = evaluate(&request, Tier::Free);

    let (first, created_first) = store
        .insert(&to_assessment(&request, &outcome, Some("dbl-click-1")))
        .unwrap();
    let (second, created_second) = store
        .insert(&to_assessment(&request, &outcome, Some("dbl-click-1")))
        .unwrap();

    assert!(created_first);
    assert!(!created_second);
    assert_eq!(first.id, second.id);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_duplicate_submission_without_key_creates_two_records() {
    // Legacy behavior: no key, no dedupe.
    let store = AssessmentStore::in_memory().unwrap();
    let request: SubmitAssessmentRequest = serde_json::from_str(WIZARD_PAYLOAD).unwrap();
    let outcome = evaluate(&request, Tier::Free);

    let (first, _) = store
        .insert(&to_assessment(&request, &outcome, None))
        .unwrap();
    let (second, _) = store
        .insert(&to_assessment(&request, &outcome, None))
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_report_step_fills_narrative() {
    let store = Arc::new(AssessmentStore::in_memory().unwrap());
    let request: SubmitAssessmentRequest = serde_json::from_str(WIZARD_PAYLOAD).unwrap();
    let outcome = evaluate(&request, Tier::Free);

    let (stored, _) = store
        .insert(&to_assessment(&request, &outcome, None))
        .unwrap();
    assert!(stored.narrative.is_none());

    // Same shape the handler spawns after responding
    let report_store = Arc::clone(&store);
    let subject = stored.clone();
    let task = tokio::spawn(async move {
        let narrative = report::generate_narrative(&subject);
        report_store.set_narrative(&subject.id, &narrative).unwrap();
    });
    task.await.unwrap();

    let updated = store.get(&stored.id).unwrap().unwrap();
    let narrative = updated.narrative.unwrap();
    assert!(narrative.contains("Cedar Creek Landscaping"));
    assert!(narrative.contains("Owner Dependency"));
}

#[test]
fn test_paid_tier_prices_off_industry_row() {
    let mut request: SubmitAssessmentRequest = serde_json::from_str(WIZARD_PAYLOAD).unwrap();
    request.company.naics_code = Some("621210".into());

    let free = evaluate(&request, Tier::Free);
    let paid = evaluate(&request, Tier::Growth);

    // Same adjusted EBITDA, different multiple table
    assert_eq!(free.adjusted_ebitda, paid.adjusted_ebitda);
    assert_ne!(free.multiples.mid, paid.multiples.mid);

    // Grade C would price at the sector base; this C-graded payload does
    let sector = applebites_server::naics::lookup("621210").unwrap();
    assert_eq!(paid.multiples.mid, sector.mid);
}

#[test]
fn test_empty_payload_is_accepted() {
    // The pipeline never rejects input: everything coerces or defaults.
    let request: SubmitAssessmentRequest = serde_json::from_str("{}").unwrap();
    let outcome = evaluate(&request, Tier::Free);

    assert_eq!(outcome.base_ebitda, 0.0);
    assert_eq!(outcome.adjusted_ebitda, 0.0);
    assert_eq!(outcome.overall_score, Grade::C);
    assert_eq!(outcome.low_estimate, 0.0);
}
