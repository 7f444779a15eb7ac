use async_trait::async_trait;
use interview_core::model::{RoundId, SessionId, SessionSnapshot};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RemoteError;

/// Results of a round as sent to `submit_round`.
///
/// Serialises as `{"data": {"type": <round>, ...payload}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSubmission {
    round: RoundId,
    payload: Map<String, Value>,
}

impl RoundSubmission {
    #[must_use]
    pub fn new(round: RoundId) -> Self {
        Self {
            round,
            payload: Map::new(),
        }
    }

    /// Attach a payload field. A `type` key is ignored; the round id owns it.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if key != "type" {
            self.payload.insert(key, value);
        }
        self
    }

    /// Merge an object payload; non-object values are stored under `payload`.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        match payload {
            Value::Object(fields) => {
                for (key, value) in fields {
                    self = self.with_field(key, value);
                }
                self
            }
            Value::Null => self,
            other => self.with_field("payload", other),
        }
    }

    #[must_use]
    pub fn round(&self) -> &RoundId {
        &self.round
    }

    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    #[must_use]
    pub fn is_auto_submitted(&self) -> bool {
        self.payload
            .get("auto_submitted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub(crate) fn to_body(&self) -> SubmitBody<'_> {
        SubmitBody {
            data: SubmitData {
                kind: self.round.as_str(),
                payload: &self.payload,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitBody<'a> {
    data: SubmitData<'a>,
}

#[derive(Debug, Serialize)]
struct SubmitData<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(flatten)]
    payload: &'a Map<String, Value>,
}

/// Contract of the remote session service of record.
///
/// The service owns round ordering; clients only read state and request
/// transitions.
#[async_trait]
pub trait SessionRemote: Send + Sync {
    /// Fetch the authoritative session state.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` for unknown sessions, or transport errors.
    async fn fetch_state(&self, session: SessionId) -> Result<SessionSnapshot, RemoteError>;

    /// Move the server-side round pointer forward.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the request fails.
    async fn advance(&self, session: SessionId) -> Result<(), RemoteError>;

    /// Record the current round's results; the service advances implicitly.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the request fails.
    async fn submit_round(
        &self,
        session: SessionId,
        submission: &RoundSubmission,
    ) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submission_body_flattens_payload_under_data() {
        let submission = RoundSubmission::new(RoundId::new("oa_mcq").unwrap())
            .with_payload(json!({ "answers": { "1": 2 }, "type": "ignored" }))
            .with_field("auto_submitted", json!(true));

        let body = serde_json::to_value(submission.to_body()).unwrap();
        assert_eq!(
            body,
            json!({
                "data": {
                    "type": "oa_mcq",
                    "answers": { "1": 2 },
                    "auto_submitted": true
                }
            })
        );
        assert!(submission.is_auto_submitted());
    }

    #[test]
    fn scalar_payload_is_wrapped() {
        let submission =
            RoundSubmission::new(RoundId::new("tech_1").unwrap()).with_payload(json!("done"));
        assert_eq!(submission.payload().get("payload"), Some(&json!("done")));
        assert!(!submission.is_auto_submitted());
    }
}
