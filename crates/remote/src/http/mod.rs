use std::env;
use std::time::Duration;

use async_trait::async_trait;
use interview_core::model::{SessionId, SessionSnapshot};
use reqwest::{Client, Response, StatusCode};

use crate::error::RemoteError;
use crate::session::{RoundSubmission, SessionRemote};

mod mapping;

use mapping::StateResponse;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    /// Read `INTERVIEW_API_BASE_URL` and `INTERVIEW_API_TIMEOUT_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("INTERVIEW_API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let timeout = env::var("INTERVIEW_API_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self { base_url, timeout }
    }

    fn endpoint(&self, session: SessionId, path: &str) -> String {
        format!(
            "{}/interview/{session}/{path}",
            self.base_url.trim().trim_end_matches('/')
        )
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// `SessionRemote` backed by the interview REST API.
#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    config: RemoteConfig,
}

impl HttpRemote {
    /// Build a client for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be constructed.
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }
}

fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }
    if status == StatusCode::CONFLICT {
        return Err(RemoteError::Conflict);
    }
    if !status.is_success() {
        return Err(RemoteError::Status {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

#[async_trait]
impl SessionRemote for HttpRemote {
    async fn fetch_state(&self, session: SessionId) -> Result<SessionSnapshot, RemoteError> {
        let url = self.config.endpoint(session, "state");
        let response = check_status(self.client.get(url).send().await?)?;
        let body: StateResponse = response.json().await?;
        let snapshot = body.into_snapshot()?;
        tracing::debug!(%session, status = ?snapshot.status(), "fetched session state");
        Ok(snapshot)
    }

    async fn advance(&self, session: SessionId) -> Result<(), RemoteError> {
        let url = self.config.endpoint(session, "advance");
        check_status(self.client.post(url).send().await?)?;
        Ok(())
    }

    async fn submit_round(
        &self,
        session: SessionId,
        submission: &RoundSubmission,
    ) -> Result<(), RemoteError> {
        let url = self.config.endpoint(session, "submit_round");
        check_status(
            self.client
                .post(url)
                .json(&submission.to_body())
                .send()
                .await?,
        )?;
        Ok(())
    }
}
