//! HTTP API for signing
//!
//! - `GET /health` - Health check with table counts
//! - `POST /signature` - Sign a question/answer bundle
//! - `GET /signature/{id}` - Fetch the answers of an owned signature
//!
//! Every signing route needs `Authorization: Bearer <jwt>`.
//!
//! ```bash
//! curl -X POST -H "Authorization: Bearer $TOKEN" \
//!      -d '[{"question":{"id":"<uuid>","question":"Name?"},"answer":"Ann"}]' \
//!      http://localhost:3000/signature
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::JwtValidator;
use crate::db::SigningDb;
use crate::entities::Question;
use crate::error::LedgerError;
use crate::services::{response, FetchInput, Services, SignInput};

/// One item of the signing body
#[derive(Debug, Deserialize)]
struct AnswerBody {
    question: Option<QuestionBody>,
    #[serde(default)]
    answer: String,
}

#[derive(Debug, Deserialize)]
struct QuestionBody {
    #[serde(default)]
    id: String,
    #[serde(default)]
    question: String,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    db: Arc<SigningDb>,
    jwt: JwtValidator,
    bind_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(
        services: Arc<Services>,
        db: Arc<SigningDb>,
        jwt: JwtValidator,
        bind_addr: SocketAddr,
    ) -> Self {
        Self {
            services,
            db,
            jwt,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), LedgerError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = req.into_body().collect().await?.to_bytes();

        Ok(self.route(&method, &path, authorization.as_deref(), body).await)
    }

    /// Route a request to its handler
    pub async fn route(
        &self,
        method: &Method,
        path: &str,
        authorization: Option<&str>,
        body: Bytes,
    ) -> Response<Full<Bytes>> {
        debug!(method = %method, path = %path, "Incoming request");

        let result = match (method, path) {
            (&Method::GET, "/health") => self.handle_health().await,
            (&Method::POST, "/signature") => self.handle_sign(authorization, body).await,
            (&Method::GET, p) if p.starts_with("/signature/") => {
                let id = p.strip_prefix("/signature/").unwrap_or("");
                self.handle_fetch(authorization, id).await
            }
            _ => return response::route_not_found(),
        };

        match result {
            Ok(response) => response,
            Err(e) => response::from_error(&e),
        }
    }

    /// GET /health
    async fn handle_health(&self) -> Result<Response<Full<Bytes>>, LedgerError> {
        let db = self.db.clone();
        let stats = run_blocking(move || db.stats()).await?;

        Ok(response::ok(&serde_json::json!({
            "status": "ok",
            "users": stats.users,
            "questions": stats.questions,
            "signatures": stats.signatures,
            "answers": stats.answers,
        })))
    }

    /// POST /signature
    async fn handle_sign(
        &self,
        authorization: Option<&str>,
        body: Bytes,
    ) -> Result<Response<Full<Bytes>>, LedgerError> {
        let user = self.jwt.authenticate(authorization)?;

        let items: Vec<AnswerBody> = serde_json::from_slice(&body)
            .map_err(|e| LedgerError::BadRequest(format!("Invalid JSON body: {}", e)))?;

        if items.is_empty() {
            return Err(LedgerError::BadRequest("empty answers".into()));
        }

        let mut questions = BTreeMap::new();
        let mut answers = BTreeMap::new();

        for (i, item) in items.into_iter().enumerate() {
            let question = validate_item(i, item.question, &item.answer)?;
            answers.insert(question.id, item.answer);
            questions.insert(question.id, question);
        }

        let sign = self.services.sign.clone();
        let input = SignInput {
            user,
            questions,
            answers,
        };
        let output = run_blocking(move || sign.sign(input)).await?;

        Ok(response::ok(&output))
    }

    /// GET /signature/{id}
    async fn handle_fetch(
        &self,
        authorization: Option<&str>,
        id: &str,
    ) -> Result<Response<Full<Bytes>>, LedgerError> {
        let user = self.jwt.authenticate(authorization)?;

        let signature = Uuid::parse_str(id)
            .map_err(|e| LedgerError::BadRequest(format!("Invalid signature id '{}': {}", id, e)))?;

        let fetch = self.services.fetch.clone();
        let output = run_blocking(move || fetch.fetch(FetchInput { user, signature })).await?;

        Ok(response::ok(&output))
    }
}

/// Check one body item and build its question
fn validate_item(
    index: usize,
    question: Option<QuestionBody>,
    answer: &str,
) -> Result<Question, LedgerError> {
    let question = question
        .ok_or_else(|| LedgerError::BadRequest(format!("item[{}]: question is required", index)))?;

    let id = Uuid::parse_str(&question.id).map_err(|_| {
        LedgerError::BadRequest(format!("item[{}]: question.id must be a UUID", index))
    })?;

    if question.question.is_empty() {
        return Err(LedgerError::BadRequest(format!(
            "item[{}]: question.question is required",
            index
        )));
    }

    if answer.is_empty() {
        return Err(LedgerError::BadRequest(format!(
            "item[{}]: answer is required",
            index
        )));
    }

    Ok(Question {
        id,
        text: question.question,
    })
}

/// Run a blocking store call off the async runtime
async fn run_blocking<F, T>(f: F) -> Result<T, LedgerError>
where
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LedgerError::Store(format!("Blocking task failed: {}", e)))?
}
