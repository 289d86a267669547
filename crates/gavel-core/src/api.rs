// Thin REST client for the auction backend.
//
// Only what the live view needs: log in, fetch the event and the viewer's
// team. Every endpoint wraps its payload in `{success, data, message?, error?}`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::model::{AuctionEvent, Team, User};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Rejected(String),

    #[error("response had no data")]
    MissingData,
}

/// Standard response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<T, ApiError> {
        if !self.success {
            let reason = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "request was rejected".to_string());
            return Err(ApiError::Rejected(reason));
        }
        self.data.ok_or(ApiError::MissingData)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /auth/login`. Stores the returned token for later calls.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self.http.post(self.url("/auth/login")).json(&body).send().await?;
        let session: AuthSession = decode(response).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn get_event(&self, id: &str) -> Result<AuctionEvent, ApiError> {
        self.get(&format!("/events/{id}")).await
    }

    pub async fn get_team(&self, id: &str) -> Result<Team, ApiError> {
        self.get(&format!("/teams/{id}")).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!("GET {path}");
        let mut request = self.http.get(self.url(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        decode(request.send().await?).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    match serde_json::from_str::<Envelope<T>>(&text) {
        Ok(envelope) => envelope.into_data(),
        Err(_) if !status.is_success() => Err(ApiError::Status {
            status: status.as_u16(),
            message: text,
        }),
        Err(e) => Err(ApiError::Rejected(format!("unexpected response: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_success_yields_data() {
        let env: Envelope<Team> = serde_json::from_str(
            r#"{"success":true,"data":{"_id":"t1","name":"Kings","remainingBudget":4200}}"#,
        )
        .unwrap();
        let team = env.into_data().unwrap();
        assert_eq!(team.remaining_budget, Some(4200));
    }

    #[test]
    fn envelope_failure_prefers_error_then_message() {
        let env: Envelope<Team> =
            serde_json::from_str(r#"{"success":false,"message":"Event not found"}"#).unwrap();
        match env.into_data() {
            Err(ApiError::Rejected(msg)) => assert_eq!(msg, "Event not found"),
            other => panic!("expected Rejected, got {other:?}"),
        }

        let env: Envelope<Team> =
            serde_json::from_str(r#"{"success":false,"error":"Invalid credentials","message":"x"}"#)
                .unwrap();
        assert_eq!(env.into_data().unwrap_err().to_string(), "Invalid credentials");
    }

    #[test]
    fn event_envelope_parses_settings() {
        let env: Envelope<AuctionEvent> = serde_json::from_str(
            r#"{"success":true,"data":{"_id":"e1","name":"Premier Draft","status":"live","settings":{"bidIncrement":50,"bidTimer":30}}}"#,
        )
        .unwrap();
        let event = env.into_data().unwrap();
        assert_eq!(event.name, "Premier Draft");
        assert_eq!(event.settings.bid_increment, 50);
    }

    #[test]
    fn envelope_success_without_data_is_error() {
        let env: Envelope<Team> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(matches!(env.into_data(), Err(ApiError::MissingData)));
    }

    #[test]
    fn login_payload_parses_user_and_token() {
        let env: Envelope<AuthSession> = serde_json::from_str(
            r#"{"success":true,"data":{"token":"jwt","user":{"_id":"u1","role":"team_owner","teamId":{"_id":"t1"}}}}"#,
        )
        .unwrap();
        let session = env.into_data().unwrap();
        assert_eq!(session.token, "jwt");
        assert_eq!(session.user.team_id.unwrap().id(), "t1");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = ApiClient::new("http://localhost:3000/api/");
        assert_eq!(client.url("/events/e1"), "http://localhost:3000/api/events/e1");
        assert_eq!(client.token(), None);
    }
}
