//! HTTP surface over the drop service.
//!
//! | method | path                     | operation        |
//! |--------|--------------------------|------------------|
//! | POST   | `/drops`                 | create           |
//! | GET    | `/drops/:id`             | check            |
//! | DELETE | `/drops/:id`             | delete           |
//! | POST   | `/drops/:id/access`      | request access   |
//! | POST   | `/drops/:id/fetch`       | fetch            |
//! | POST   | `/drops/:id/password`    | verify password  |
//! | POST   | `/drops/:id/download`    | download         |
//! | GET    | `/objects/*key`          | temporary URL    |
//! | GET    | `/health`                | liveness         |
//!
//! The drop service is synchronous, so every call runs on the blocking pool
//! under the configured request timeout. A timed-out call is abandoned before
//! its first write; a call that is already writing is seen through. Errors are `{"error": "<kind>"}` with
//! the status from [`DropError::status_code`].

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use vanish_core::{
    AccessGrant, Deadline, DropError, DropService, Environment, StorageError,
    model::{DropId, DropStatus, FetchOutcome, FetchRequest, NewDrop, ObjectPointer, SessionId, TokenValue},
    storage::{DropStore, ObjectStore},
};

/// Set on object responses whose bytes are still sealed.
pub const SEALED_HEADER: &str = "x-vanish-sealed";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState<E, S, O> {
    service: DropService<E, S, O>,
    request_timeout: Duration,
}

/// Build the router for `service`.
pub fn router<E, S, O>(service: DropService<E, S, O>, request_timeout: Duration) -> Router
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
{
    Router::new()
        .route("/health", get(health))
        .route("/drops", post(create_drop::<E, S, O>))
        .route("/drops/:id", get(check_drop::<E, S, O>).delete(delete_drop::<E, S, O>))
        .route("/drops/:id/access", post(request_access::<E, S, O>))
        .route("/drops/:id/fetch", post(fetch_drop::<E, S, O>))
        .route("/drops/:id/password", post(verify_password::<E, S, O>))
        .route("/drops/:id/download", post(download::<E, S, O>))
        .route("/objects/*key", get(open_object::<E, S, O>))
        .with_state(AppState { service, request_timeout })
}

/// A [`DropError`] on its way to the wire.
#[derive(Debug)]
pub struct ApiError(pub DropError);

impl From<DropError> for ApiError {
    fn from(err: DropError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(DropError::invalid(rejection.body_text()))
    }
}

/// Error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// [`DropError::kind`]
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request refused");
        }
        (status, Json(ErrorBody { error: self.0.kind().to_string() })).into_response()
    }
}

/// Response to a successful create.
#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
    /// Id of the new drop
    pub id: DropId,
}

/// Body of `POST /drops/:id/access`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AccessBody {
    /// Token already held by the caller
    #[serde(default)]
    pub token: Option<TokenValue>,
}

/// Response to an access request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "grant", rename_all = "snake_case")]
pub enum AccessResponse {
    /// A new token
    Minted {
        /// The token
        token: TokenValue,
        /// Its deadline in Unix milliseconds
        expires_at_ms: u64,
    },
    /// The presented token is still good
    AlreadyValid,
}

/// Body of `POST /drops/:id/fetch`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FetchBody {
    /// Token from a previous call
    #[serde(default)]
    pub token: Option<TokenValue>,
    /// Viewer session
    #[serde(default)]
    pub session: Option<SessionId>,
}

/// Body of `POST /drops/:id/password`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordBody {
    /// Candidate password
    pub password: String,
    /// Session to clear on success
    pub session: SessionId,
}

/// Response to a successful password check. A mismatch is answered with
/// `401 invalid_password` instead.
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordVerdict {
    /// Whether the password matched
    pub verified: bool,
}

/// Body of `POST /drops/:id/download`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DownloadBody {
    /// Viewer session
    #[serde(default)]
    pub session: Option<SessionId>,
}

/// Response to a download.
#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    /// One temporary URL per file, in file order
    pub files: Vec<ObjectPointer>,
}

/// Query string of a temporary URL.
#[derive(Debug, Deserialize)]
pub struct PointerQuery {
    /// Deadline in Unix milliseconds
    pub expires: u64,
    /// Hex signature
    pub sig: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_drop<E, S, O>(
    State(state): State<AppState<E, S, O>>,
    body: Result<Json<NewDrop>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), ApiError>
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
{
    let Json(request) = body?;
    let id = run(&state, move |service| service.create_drop(request)).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

async fn check_drop<E, S, O>(
    State(state): State<AppState<E, S, O>>,
    Path(id): Path<String>,
) -> Result<Json<DropStatus>, ApiError>
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
{
    let id: DropId = id.parse()?;
    Ok(Json(run(&state, move |service| service.check_drop(id)).await?))
}

async fn delete_drop<E, S, O>(
    State(state): State<AppState<E, S, O>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
{
    let id: DropId = id.parse()?;
    run(&state, move |service| service.delete_drop(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn request_access<E, S, O>(
    State(state): State<AppState<E, S, O>>,
    Path(id): Path<String>,
    body: Result<Json<AccessBody>, JsonRejection>,
) -> Result<Json<AccessResponse>, ApiError>
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
{
    let id: DropId = id.parse()?;
    let Json(body) = body?;

    let grant = run(&state, move |service| service.request_access(id, body.token.as_ref())).await?;
    Ok(Json(match grant {
        AccessGrant::Minted(token) => {
            AccessResponse::Minted { token: token.token, expires_at_ms: token.expires_at_ms }
        },
        AccessGrant::AlreadyValid => AccessResponse::AlreadyValid,
    }))
}

async fn fetch_drop<E, S, O>(
    State(state): State<AppState<E, S, O>>,
    Path(id): Path<String>,
    body: Result<Json<FetchBody>, JsonRejection>,
) -> Result<Json<FetchOutcome>, ApiError>
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
{
    let drop_id: DropId = id.parse()?;
    let Json(body) = body?;
    let request = FetchRequest { drop_id, token: body.token, session: body.session };

    Ok(Json(run(&state, move |service| service.fetch_drop(request)).await?))
}

async fn verify_password<E, S, O>(
    State(state): State<AppState<E, S, O>>,
    Path(id): Path<String>,
    body: Result<Json<PasswordBody>, JsonRejection>,
) -> Result<Json<PasswordVerdict>, ApiError>
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
{
    let id: DropId = id.parse()?;
    let Json(body) = body?;

    let verified =
        run(&state, move |service| service.verify_password(id, &body.password, body.session))
            .await?;
    if !verified {
        return Err(ApiError(DropError::InvalidPassword));
    }
    Ok(Json(PasswordVerdict { verified }))
}

async fn download<E, S, O>(
    State(state): State<AppState<E, S, O>>,
    Path(id): Path<String>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Result<Json<DownloadResponse>, ApiError>
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
{
    let id: DropId = id.parse()?;
    let Json(body) = body?;

    let files = run(&state, move |service| service.download(id, body.session)).await?;
    Ok(Json(DownloadResponse { files }))
}

async fn open_object<E, S, O>(
    State(state): State<AppState<E, S, O>>,
    Path(key): Path<String>,
    Query(query): Query<PointerQuery>,
) -> Result<Response, ApiError>
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
{
    let body =
        run(&state, move |service| service.open_pointer(&key, query.expires, &query.sig)).await?;

    let mut headers = HeaderMap::new();
    let content_type = if body.sealed {
        HeaderValue::from_static("application/octet-stream")
    } else {
        HeaderValue::from_str(&body.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
    };
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, attachment(&body.name));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if body.sealed {
        headers.insert(HeaderName::from_static(SEALED_HEADER), HeaderValue::from_static("true"));
    }

    Ok((headers, body.bytes).into_response())
}

/// `Content-Disposition` naming the file, with anything unsafe in a quoted
/// header value replaced.
fn attachment(name: &str) -> HeaderValue {
    let safe: String = name
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Run a service call on the blocking pool under the request timeout.
///
/// The call is bound to a [`Deadline`]. If the timeout fires before the call
/// claims it, the request is abandoned and the call writes nothing. If the
/// call is already writing, its result is awaited and returned as usual.
async fn run<E, S, O, T, F>(state: &AppState<E, S, O>, call: F) -> Result<T, ApiError>
where
    E: Environment,
    S: DropStore,
    O: ObjectStore,
    T: Send + 'static,
    F: FnOnce(&DropService<E, S, O>) -> Result<T, DropError> + Send + 'static,
{
    let deadline = Deadline::new(state.request_timeout);
    let service = state.service.under(deadline.clone());
    let mut task = tokio::task::spawn_blocking(move || call(&service));

    let joined = match tokio::time::timeout(state.request_timeout, &mut task).await {
        Ok(joined) => joined,
        Err(_) if deadline.abandon() => {
            let after_ms = deadline.budget_ms();
            tracing::warn!(after_ms, "request timed out");
            return Err(ApiError(DropError::Storage(StorageError::Timeout { after_ms })));
        },
        Err(_) => {
            tracing::debug!("request past its timeout is committing, awaiting result");
            task.await
        },
    };

    match joined {
        Ok(result) => Ok(result?),
        Err(e) => {
            tracing::error!(error = %e, "request task failed");
            Err(ApiError(DropError::Storage(StorageError::Io(e.to_string()))))
        },
    }
}
