//! JSON routes over the session memory store and the research collaborator.
//!
//! Every failure is answered with `{"error": {...}}` carrying the error kind, a message, the
//! request's correlation id and, for validation failures, the missing field names.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use outreach_core::domain::contact::{ContactRequest, ContactType, ResearchRequest};
use outreach_core::domain::research::ResearchResult;
use outreach_core::domain::session::{MemoryHit, SessionId, SessionMemory};
use outreach_core::errors::{ApplicationError, DomainError, InterfaceClass};
use outreach_core::ports::Researcher;
use outreach_db::SessionMemoryStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SessionMemoryStore>,
    pub researcher: Arc<dyn Researcher>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/research", post(research_lead))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}", get(inspect_session))
        .route("/sessions/{session_id}/research", post(research_session))
        .route("/sessions/{session_id}/questions", post(ask_question))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    pub detail: &'static str,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        let missing_fields = error.missing_fields().to_vec();
        let interface = error.into_interface(correlation_id);
        let status = match interface.class {
            InterfaceClass::BadRequest => StatusCode::BAD_REQUEST,
            InterfaceClass::Conflict => StatusCode::CONFLICT,
            InterfaceClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(
            event_name = "api.request_failed",
            correlation_id,
            kind = interface.kind.as_str(),
            status = status.as_u16(),
            error = %interface.message,
            "request failed"
        );

        Self {
            status,
            body: ErrorBody {
                kind: interface.kind.as_str(),
                detail: interface.class.user_message(),
                message: interface.message,
                correlation_id: interface.correlation_id,
                missing_fields,
            },
        }
    }

    fn session_not_found(session_id: &SessionId, correlation_id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                kind: "not_found",
                message: format!("session `{session_id}` does not exist"),
                detail: "No session exists under that key.",
                correlation_id: correlation_id.to_string(),
                missing_fields: Vec::new(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.body }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct LeadResearchResponse {
    pub session_id: SessionId,
    pub contact: ContactRequest,
    pub research: ResearchResult,
}

#[derive(Debug, Serialize)]
pub struct SessionResearchResponse {
    pub session_id: SessionId,
    pub research: ResearchResult,
}

#[derive(Debug, Deserialize)]
struct SessionResearchBody {
    subject_name: String,
    #[serde(default)]
    subject_email: Option<String>,
    #[serde(default)]
    contact_type: Option<String>,
    #[serde(default)]
    context: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct QuestionBody {
    question: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub session_id: SessionId,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Default, Deserialize)]
struct SessionFilter {
    #[serde(default)]
    query: Option<String>,
}

/// `GET /sessions` answers with every id, or with search hits when `?query=` is given.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SessionList {
    All { sessions: Vec<SessionId> },
    Matching { query: String, hits: Vec<MemoryHit> },
}

fn new_correlation_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApplicationError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        DomainError::InvalidField { field: "body".to_string(), reason: rejection.body_text() }
            .into()
    })
}

fn typed_body<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApplicationError> {
    serde_json::from_value(value).map_err(|error| {
        DomainError::InvalidField { field: "body".to_string(), reason: error.to_string() }.into()
    })
}

/// Validates an inbound contact, researches it and stores the findings under the lead's key.
async fn research_lead(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<LeadResearchResponse> {
    let correlation_id = new_correlation_id();
    let outcome = async {
        let contact = ContactRequest::from_json(&json_body(payload)?)?;
        let session_id = SessionId::for_lead(&contact.contact_name);
        let research = state.researcher.research(&contact.research_request()).await?;
        state.store.store_research(&session_id, research.clone()).await?;
        state.store.remember_sender(&session_id, &contact.sender_profile()).await?;
        Ok::<_, ApplicationError>(LeadResearchResponse { session_id, contact, research })
    }
    .await;

    let response = outcome.map_err(|error| ApiError::from_application(error, &correlation_id))?;
    info!(
        event_name = "api.lead_researched",
        correlation_id = %correlation_id,
        session_id = %response.session_id,
        contact_type = response.contact.contact_type.as_str(),
        "lead researched"
    );
    Ok(Json(response))
}

async fn research_session(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<SessionResearchResponse> {
    let correlation_id = new_correlation_id();
    let outcome = async {
        let session_id = SessionId::parse(&raw_id)?;
        let body: SessionResearchBody = typed_body(json_body(payload)?)?;
        let request = research_request(body)?;
        let research = state.researcher.research(&request).await?;
        state.store.store_research(&session_id, research.clone()).await?;
        Ok::<_, ApplicationError>(SessionResearchResponse { session_id, research })
    }
    .await;

    outcome.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

fn research_request(body: SessionResearchBody) -> Result<ResearchRequest, ApplicationError> {
    let subject_name = body.subject_name.trim();
    if subject_name.is_empty() {
        return Err(DomainError::MissingFields { fields: vec!["subject_name".to_string()] }.into());
    }
    let contact_type = match body.contact_type.as_deref() {
        None => ContactType::default(),
        Some(raw) => ContactType::parse(raw).ok_or_else(|| DomainError::InvalidField {
            field: "contact_type".to_string(),
            reason: format!("`{raw}` is not one of emaillist|company"),
        })?,
    };

    let mut request = ResearchRequest::for_subject(subject_name);
    request.subject_email = body.subject_email.filter(|email| !email.trim().is_empty());
    request.contact_type = contact_type;
    request.context = body
        .context
        .into_iter()
        .map(|(key, value)| (key, value.trim().to_string()))
        .filter(|(_, value)| !value.is_empty())
        .collect();
    Ok(request)
}

async fn ask_question(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<AnswerResponse> {
    let correlation_id = new_correlation_id();
    let outcome = async {
        let session_id = SessionId::parse(&raw_id)?;
        let body: QuestionBody = typed_body(json_body(payload)?)?;
        let answer = state.store.answer_question(&session_id, &body.question).await?;
        Ok::<_, ApplicationError>(AnswerResponse {
            session_id,
            question: body.question.trim().to_string(),
            answer,
        })
    }
    .await;

    outcome.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn list_sessions(
    State(state): State<ApiState>,
    Query(filter): Query<SessionFilter>,
) -> ApiResult<SessionList> {
    let correlation_id = new_correlation_id();
    let listing = match filter.query {
        Some(query) => state.store.search(&query).await.map(|hits| SessionList::Matching {
            query: query.trim().to_string(),
            hits,
        }),
        None => state.store.list_sessions().await.map(|sessions| SessionList::All { sessions }),
    };
    listing.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn inspect_session(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
) -> ApiResult<SessionMemory> {
    let correlation_id = new_correlation_id();
    let session_id = SessionId::parse(&raw_id)
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;

    match state.store.inspect(&session_id).await {
        Ok(Some(memory)) => Ok(Json(memory)),
        Ok(None) => Err(ApiError::session_not_found(&session_id, &correlation_id)),
        Err(error) => Err(ApiError::from_application(error, &correlation_id)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use outreach_core::domain::contact::{ContactType, ResearchRequest};
    use outreach_core::domain::research::{FieldValue, ResearchResult};
    use outreach_core::domain::session::Turn;
    use outreach_core::errors::ApplicationError;
    use outreach_core::ports::{Reasoner, Researcher};
    use outreach_db::{InMemorySessionRepository, SessionMemoryStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::{router, ApiState};

    #[derive(Default)]
    struct StubResearcher {
        unavailable: bool,
        requests: Mutex<Vec<ResearchRequest>>,
    }

    #[async_trait]
    impl Researcher for StubResearcher {
        async fn research(
            &self,
            request: &ResearchRequest,
        ) -> Result<ResearchResult, ApplicationError> {
            self.requests.lock().expect("requests lock").push(request.clone());
            if self.unavailable {
                return Err(ApplicationError::ResearchUnavailable("search timed out".to_string()));
            }
            let fields = BTreeMap::from([(
                "company".to_string(),
                FieldValue::Text("Acme Robotics".to_string()),
            )]);
            Ok(ResearchResult::new(&request.subject_name, "Leads platform engineering.", fields)
                .expect("valid research"))
        }
    }

    struct EchoReasoner;

    #[async_trait]
    impl Reasoner for EchoReasoner {
        async fn answer(
            &self,
            research: &ResearchResult,
            history: &[Turn],
            question: &str,
        ) -> Result<String, ApplicationError> {
            Ok(format!("{} #{}: {question}", research.subject_name(), history.len() + 1))
        }
    }

    fn app(researcher: Arc<StubResearcher>) -> Router {
        let store = SessionMemoryStore::new(
            Arc::new(InMemorySessionRepository::default()),
            Arc::new(EchoReasoner),
        );
        router(ApiState { store: Arc::new(store), researcher })
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, payload)
    }

    fn contact() -> Value {
        json!({
            "contact_name": "Jane",
            "contact_email": "jane@acme.test",
            "career_field": "Data Science",
            "career_description": "Graduate student in ML",
            "contact_type": "company",
            "contact_context": {"recent_project": "Fleet telemetry", "location": "Not specified"}
        })
    }

    #[tokio::test]
    async fn lead_research_reports_every_missing_field_without_researching() {
        let researcher = Arc::new(StubResearcher::default());
        let app = app(researcher.clone());

        let (status, payload) = send(
            &app,
            "POST",
            "/research",
            Some(json!({"contact_name": "Jane", "career_field": "  ", "contact_email": 7})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"]["kind"], "invalid_input");
        assert_eq!(
            payload["error"]["missing_fields"],
            json!(["contact_email", "career_field", "career_description"])
        );
        assert!(payload["error"]["correlation_id"].as_str().expect("id").starts_with("req-"));
        assert!(researcher.requests.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn lead_research_stores_findings_under_the_lead_key() {
        let researcher = Arc::new(StubResearcher::default());
        let app = app(researcher.clone());

        let (status, payload) = send(&app, "POST", "/research", Some(contact())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["session_id"], "lead:jane");
        assert_eq!(payload["research"]["structured_fields"]["company"], "Acme Robotics");

        let requests = researcher.requests.lock().expect("lock").clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].contact_type, ContactType::Company);
        assert_eq!(
            requests[0].context,
            BTreeMap::from([("recent_project".to_string(), "Fleet telemetry".to_string())])
        );

        let (status, listed) = send(&app, "GET", "/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["sessions"], json!(["lead:jane"]));

        let (_, memory) = send(&app, "GET", "/sessions/lead:jane", None).await;
        assert_eq!(memory["sender"]["career_field"], "Data Science");
        assert_eq!(memory["sender"]["career_description"], "Graduate student in ML");
    }

    #[tokio::test]
    async fn unavailable_research_is_surfaced_and_nothing_is_stored() {
        let researcher =
            Arc::new(StubResearcher { unavailable: true, ..StubResearcher::default() });
        let app = app(researcher);

        let (status, payload) = send(&app, "POST", "/research", Some(contact())).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload["error"]["kind"], "research_unavailable");
        let (_, listed) = send(&app, "GET", "/sessions", None).await;
        assert_eq!(listed["sessions"], json!([]));
    }

    #[tokio::test]
    async fn questions_before_research_are_rejected() {
        let app = app(Arc::new(StubResearcher::default()));

        let (status, payload) = send(
            &app,
            "POST",
            "/sessions/lead:jane/questions",
            Some(json!({"question": "Where does Jane work?"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"]["kind"], "no_research");
    }

    #[tokio::test]
    async fn session_research_then_questions_build_turn_history() {
        let app = app(Arc::new(StubResearcher::default()));

        let (status, _) = send(
            &app,
            "POST",
            "/sessions/acme/research",
            Some(json!({"subject_name": "Acme", "contact_type": "company"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, first) = send(
            &app,
            "POST",
            "/sessions/acme/questions",
            Some(json!({"question": "  What do they build?  "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["answer"], "Acme #1: What do they build?");

        let (_, second) = send(
            &app,
            "POST",
            "/sessions/acme/questions",
            Some(json!({"question": "Who leads it?"})),
        )
        .await;
        assert_eq!(second["answer"], "Acme #2: Who leads it?");

        let (status, memory) = send(&app, "GET", "/sessions/acme", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(memory["research"]["subject_name"], "Acme");
        assert_eq!(memory["turn_history"].as_array().expect("history").len(), 2);
        assert_eq!(memory["turn_history"][0]["question"], "What do they build?");
    }

    #[tokio::test]
    async fn session_query_searches_research_and_questions() {
        let app = app(Arc::new(StubResearcher::default()));
        for (session, subject) in [("acme", "Acme"), ("globex", "Globex")] {
            let (status, _) = send(
                &app,
                "POST",
                &format!("/sessions/{session}/research"),
                Some(json!({"subject_name": subject})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let question = json!({"question": "Rivals of Acme?"});
        send(&app, "POST", "/sessions/globex/questions", Some(question)).await;

        let (status, payload) = send(&app, "GET", "/sessions?query=acme", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["query"], "acme");
        assert_eq!(
            payload["hits"],
            json!([
                {"session_id": "acme", "excerpt": "Acme"},
                {"session_id": "globex", "excerpt": "Acme Robotics"},
            ])
        );

        let (_, payload) = send(&app, "GET", "/sessions?query=RIVALS", None).await;
        assert_eq!(payload["hits"], json!([{"session_id": "globex", "excerpt": "Rivals of Acme?"}]));

        let (status, payload) = send(&app, "GET", "/sessions?query=%20", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"]["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn session_research_rejects_unknown_contact_type() {
        let app = app(Arc::new(StubResearcher::default()));

        let (status, payload) = send(
            &app,
            "POST",
            "/sessions/acme/research",
            Some(json!({"subject_name": "Acme", "contact_type": "partner"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"]["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = app(Arc::new(StubResearcher::default()));

        let (status, payload) = send(&app, "GET", "/sessions/nobody", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload["error"]["kind"], "not_found");
    }

    #[tokio::test]
    async fn malformed_json_is_an_invalid_input() {
        let app = app(Arc::new(StubResearcher::default()));
        let request = Request::builder()
            .method("POST")
            .uri("/research")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["error"]["kind"], "invalid_input");
    }
}
