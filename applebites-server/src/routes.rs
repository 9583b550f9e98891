//! HTTP routes for the valuation service.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use applebites_common::error::Error;

use crate::export::contact_payload;
use crate::naics;
use crate::report;
use crate::session::SessionContext;
use crate::store::Assessment;
use crate::valuation::{
    DriverGrades, FinancialInputs, FollowUpIntent, OwnerAdjustments, Tier, ValuationRequest,
    VALUE_DRIVERS,
};
use crate::AppState;

/// Header carrying the client-generated idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

// ============================================================================
// Error Mapping
// ============================================================================

/// Handler error carrying a structured JSON body.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(Error::Internal(err.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": status.canonical_reason().unwrap_or("error"),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub naics_code: Option<String>,
    #[serde(default)]
    pub founded_year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// Full submission payload from the wizard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitAssessmentRequest {
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub company: CompanyInfo,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub financials: FinancialInputs,
    #[serde(default)]
    pub adjustments: OwnerAdjustments,
    #[serde(default)]
    pub grades: DriverGrades,
    #[serde(default)]
    pub follow_up: Option<FollowUpIntent>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuery {
    #[serde(default)]
    pub tier: Option<Tier>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct AssessmentsResponse {
    pub assessments: Vec<Assessment>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub stored_assessments: u64,
    pub export_queue_depth: u64,
    pub export_transport: &'static str,
    pub export_enabled: bool,
    pub last_dispatch: Option<crate::export::DispatchSummary>,
}

#[derive(Debug, Serialize)]
pub struct DriversResponse {
    pub drivers: Vec<crate::valuation::ValueDriver>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct IndustriesResponse {
    pub industries: Vec<naics::NaicsSector>,
    pub count: usize,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "applebites-server".to_string(),
    })
}

/// Submit an assessment (tier from query or payload).
pub async fn submit_assessment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubmitQuery>,
    headers: HeaderMap,
    Json(request): Json<SubmitAssessmentRequest>,
) -> Result<(StatusCode, Json<Assessment>), ApiError> {
    let tier = query.tier.or(request.tier).unwrap_or_default();
    process_submission(state, headers, request, tier).await
}

/// Tier alias routes delegate to the shared submission path.
pub async fn submit_free(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SubmitAssessmentRequest>,
) -> Result<(StatusCode, Json<Assessment>), ApiError> {
    process_submission(state, headers, request, Tier::Free).await
}

pub async fn submit_growth(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SubmitAssessmentRequest>,
) -> Result<(StatusCode, Json<Assessment>), ApiError> {
    process_submission(state, headers, request, Tier::Growth).await
}

pub async fn submit_capital(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SubmitAssessmentRequest>,
) -> Result<(StatusCode, Json<Assessment>), ApiError> {
    process_submission(state, headers, request, Tier::Capital).await
}

/// Shared submission path: compute, persist, enqueue export, spawn the
/// report step, respond.
async fn process_submission(
    state: Arc<AppState>,
    headers: HeaderMap,
    request: SubmitAssessmentRequest,
    tier: Tier,
) -> Result<(StatusCode, Json<Assessment>), ApiError> {
    let session = SessionContext::from_headers(&headers);

    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or(request.idempotency_key.clone());

    let valuation = ValuationRequest {
        tier,
        naics_code: request.company.naics_code.clone(),
        financials: request.financials,
        adjustments: request.adjustments,
        grades: request.grades,
    };
    let outcome = state.engine.evaluate(&valuation);

    // Email falls back to the session's visitor identity
    let email = match request.contact.email.trim() {
        "" => session.visitor_email.clone().unwrap_or_default(),
        provided => provided.to_string(),
    };

    let now = Utc::now();
    let assessment = Assessment {
        id: uuid::Uuid::new_v4().to_string(),
        tier,
        company_name: request.company.name.trim().to_string(),
        naics_code: request.company.naics_code,
        founded_year: request.company.founded_year,
        first_name: request.contact.first_name.trim().to_string(),
        last_name: request.contact.last_name.trim().to_string(),
        email,
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
        session_id: session.session_id.clone(),
        idempotency_key,
        created_at: now,
        updated_at: now,
    };

    let (stored, created) = state.store.insert(&assessment).map_err(|e| {
        tracing::error!(error = %e, "Failed to store assessment");
        Error::Internal(format!("failed to store assessment: {}", e))
    })?;

    if created {
        tracing::info!(
            assessment_id = %stored.id,
            tier = %stored.tier,
            overall_score = %stored.overall_score,
            multiple_source = ?outcome.multiple_source,
            session_minted = session.minted,
            "Assessment created"
        );

        if state.config.export.enabled {
            if let Err(e) = state.store.enqueue_export(&stored.id, &contact_payload(&stored)) {
                tracing::error!(assessment_id = %stored.id, error = %e, "Failed to queue CRM export");
            }
        }

        // Narrative report step runs after the response is sent
        let store = Arc::clone(&state.store);
        let report_subject = stored.clone();
        tokio::spawn(async move {
            let narrative = report::generate_narrative(&report_subject);
            if let Err(e) = store.set_narrative(&report_subject.id, &narrative) {
                tracing::error!(assessment_id = %report_subject.id, error = %e, "Report step failed");
            }
        });

        Ok((StatusCode::CREATED, Json(stored)))
    } else {
        tracing::info!(assessment_id = %stored.id, "Duplicate submission returned stored assessment");
        Ok((StatusCode::OK, Json(stored)))
    }
}

/// Fetch one assessment for the results view.
pub async fn get_assessment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Assessment>, ApiError> {
    let assessment = state
        .store
        .get(&id)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load assessment");
            Error::Internal(format!("failed to load assessment: {}", e))
        })?
        .ok_or_else(|| Error::NotFound(format!("assessment {}", id)))?;

    Ok(Json(assessment))
}

/// Recent assessments for the internal console.
pub async fn list_assessments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<AssessmentsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(50).min(200);
    let assessments = state.store.list_recent(limit).map_err(|e| {
        tracing::error!(error = %e, "Failed to list assessments");
        Error::Internal(format!("failed to list assessments: {}", e))
    })?;

    let count = assessments.len();
    Ok(Json(AssessmentsResponse { assessments, count }))
}

/// Operational status snapshot.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let stored_assessments = state.store.count().map_err(|e| {
        tracing::error!(error = %e, "Failed to count assessments");
        Error::Internal(format!("failed to read status: {}", e))
    })?;
    let export_queue_depth = state.store.export_queue_depth().unwrap_or(0);

    Ok(Json(StatusResponse {
        stored_assessments,
        export_queue_depth,
        export_transport: state.dispatcher.transport_kind(),
        export_enabled: state.config.export.enabled,
        last_dispatch: state.dispatcher.last_dispatch(),
    }))
}

/// The ten value-driver definitions for the wizard.
pub async fn list_drivers() -> Json<DriversResponse> {
    Json(DriversResponse {
        drivers: VALUE_DRIVERS.to_vec(),
        count: VALUE_DRIVERS.len(),
    })
}

/// The NAICS sector reference table.
pub async fn list_industries() -> Json<IndustriesResponse> {
    Json(IndustriesResponse {
        industries: naics::SECTORS.to_vec(),
        count: naics::SECTORS.len(),
    })
}

/// Manually trigger an export dispatch pass.
pub async fn flush_exports(
    State(state): State<Arc<AppState>>,
) -> Json<crate::export::DispatchSummary> {
    let summary = state.dispatcher.flush().await;
    Json(summary)
}
