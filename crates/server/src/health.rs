use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use outreach_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Component {
    pub status: Readiness,
    pub detail: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub service: Component,
    pub database: Component,
    pub checked_at: DateTime<Utc>,
}

/// `GET /health`: 200 while the session database answers, 503 otherwise.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db_pool).await
    {
        Ok(_) => Component {
            status: Readiness::Ready,
            detail: "session database reachable".to_owned(),
        },
        Err(error) => Component {
            status: Readiness::Degraded,
            detail: format!("session database unreachable: {error}"),
        },
    };

    let report = HealthReport {
        status: database.status,
        service: Component {
            status: Readiness::Ready,
            detail: "outreach-server accepting requests".to_owned(),
        },
        database,
        checked_at: Utc::now(),
    };
    let code = match report.status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}
