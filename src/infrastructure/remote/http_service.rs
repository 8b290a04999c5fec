//! REST adapter for the recording service

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::ports::{CredentialProvider, ServiceError, SessionService};
use crate::domain::recording::{AudioData, Duration};
use crate::domain::session::{Session, SessionId};

const RECORDINGS: &str = "recordings";

/// FastAPI-style error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// [`SessionService`] over HTTP.
///
/// Every request carries the provider's bearer token. A 401 from any
/// endpoint invalidates the credential before the error is returned.
pub struct HttpSessionService<P: CredentialProvider + ?Sized> {
    base_url: String,
    client: reqwest::Client,
    credentials: Arc<P>,
}

impl<P: CredentialProvider + ?Sized> HttpSessionService<P> {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<P>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout.as_std())
            .build()
            .map_err(|e| ServiceError::RequestFailed(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &P {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn session_path(id: &SessionId, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{RECORDINGS}/{id}/{action}"),
            None => format!("{RECORDINGS}/{id}"),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match self.credentials.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::RequestFailed(e.to_string()))?;
        self.check(response, path).await
    }

    async fn check(&self, response: Response, path: &str) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "service rejected credentials");
            self.credentials.invalidate();
            return Err(ServiceError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!("/{path}")));
        }

        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Api {
            status: status.as_u16(),
            message: error_message(&body, status),
        })
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        response
            .json()
            .await
            .map_err(|e| ServiceError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl<P: CredentialProvider + ?Sized + 'static> SessionService for HttpSessionService<P> {
    async fn create_session(&self) -> Result<Session, ServiceError> {
        let response = self
            .send(self.request(Method::POST, RECORDINGS), RECORDINGS)
            .await?;
        let session: Session = Self::json(response).await?;
        debug!(session = %session.id(), "session created");
        Ok(session)
    }

    async fn upload_chunk(
        &self,
        id: &SessionId,
        sequence_index: u64,
        audio: &AudioData,
    ) -> Result<(), ServiceError> {
        let path = Self::session_path(id, Some("chunks"));
        let mime = audio.mime_type();
        let part = Part::stream_with_length(audio.bytes(), audio.size_bytes() as u64)
            .file_name(format!("chunk_{sequence_index:04}.{}", mime.extension()))
            .mime_str(mime.as_str())
            .map_err(|e| ServiceError::RequestFailed(e.to_string()))?;
        let form = Form::new()
            .text("chunk_index", sequence_index.to_string())
            .part("audio_chunk", part);

        self.send(self.request(Method::POST, &path).multipart(form), &path)
            .await?;
        debug!(index = sequence_index, bytes = audio.size_bytes(), "chunk uploaded");
        Ok(())
    }

    async fn pause_session(&self, id: &SessionId) -> Result<(), ServiceError> {
        let path = Self::session_path(id, Some("pause"));
        self.send(self.request(Method::PATCH, &path), &path).await?;
        Ok(())
    }

    async fn finish_session(&self, id: &SessionId) -> Result<(), ServiceError> {
        let path = Self::session_path(id, Some("finish"));
        self.send(self.request(Method::POST, &path), &path).await?;
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Session, ServiceError> {
        let path = Self::session_path(id, None);
        let response = self.send(self.request(Method::GET, &path), &path).await?;
        Self::json(response).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, ServiceError> {
        let response = self
            .send(self.request(Method::GET, RECORDINGS), RECORDINGS)
            .await?;
        Self::json(response).await
    }
}

/// Best human-readable message from an error response
fn error_message(body: &str, status: StatusCode) -> String {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .map(|detail| match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        });

    match detail {
        Some(detail) => detail,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}
