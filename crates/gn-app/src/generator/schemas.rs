use serde::{Deserialize, Deserializer, Serialize};
use gn_core::Provenance;

pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETE: &str = "complete";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmitRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SubmitResponse {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct JobStatusResponse {
    #[serde(default, deserialize_with = "opaque_id_opt")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub thumb_url: Option<String>,
    #[serde(default)]
    pub progress: Option<i64>,
}

/// One status request as seen on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct PollResponse {
    pub code: u16,
    pub body: Option<JobStatusResponse>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Still generating
    Pending,
    /// Finished, with the panorama URL
    Complete { file_url: String },
    /// Finished without a usable result
    Failed { status: Option<String> },
}

impl PollResponse {
    pub const NOT_MODIFIED: u16 = 304;

    pub fn status(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.status.as_deref())
    }

    /// Transient vs terminal. An explicit "complete" wins over a 304.
    pub fn classify(&self) -> PollOutcome {
        match self.status() {
            Some(STATUS_COMPLETE) => {
                match self.body.as_ref().and_then(|b| b.file_url.clone()) {
                    Some(file_url) => PollOutcome::Complete { file_url },
                    None => PollOutcome::Failed { status: Some("complete without file_url".into()) },
                }
            }
            Some(STATUS_PROCESSING) => PollOutcome::Pending,
            _ if self.code == Self::NOT_MODIFIED => PollOutcome::Pending,
            other => PollOutcome::Failed { status: other.map(String::from) },
        }
    }
}

/// A job that reached "complete"
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJob {
    pub id: String,
    pub file_url: String,
    pub title: Option<String>,
    pub thumb_url: Option<String>,
}

impl CompletedJob {
    pub(crate) fn new(id: &str, file_url: String, body: Option<JobStatusResponse>) -> Self {
        let body = body.unwrap_or_default();
        Self {
            id: id.to_string(),
            file_url,
            title: body.title,
            thumb_url: body.thumb_url,
        }
    }

    pub fn provenance(&self) -> Provenance {
        Provenance {
            job_id: Some(self.id.clone()),
            title: self.title.clone(),
            file_url: Some(self.file_url.clone()),
            thumb_url: self.thumb_url.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

fn opaque_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn opaque_id_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(code: u16, status: Option<&str>, file_url: Option<&str>) -> PollResponse {
        PollResponse {
            code,
            body: Some(JobStatusResponse {
                status: status.map(String::from),
                file_url: file_url.map(String::from),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_processing_is_transient() {
        assert_eq!(response(200, Some("processing"), None).classify(), PollOutcome::Pending);
    }

    #[test]
    fn test_not_modified_without_body_is_transient() {
        let poll = PollResponse { code: 304, body: None };
        assert_eq!(poll.classify(), PollOutcome::Pending);
    }

    #[test]
    fn test_complete_wins_over_not_modified() {
        let poll = response(304, Some("complete"), Some("https://cdn.invalid/a.jpg"));
        assert_eq!(poll.classify(), PollOutcome::Complete { file_url: "https://cdn.invalid/a.jpg".into() });
    }

    #[test]
    fn test_other_statuses_are_failures() {
        assert_eq!(
            response(200, Some("failed"), None).classify(),
            PollOutcome::Failed { status: Some("failed".into()) }
        );
        assert_eq!(
            response(200, Some("Complete"), Some("x")).classify(),
            PollOutcome::Failed { status: Some("Complete".into()) }
        );
        assert_eq!(
            PollResponse { code: 500, body: None }.classify(),
            PollOutcome::Failed { status: None }
        );
    }

    #[test]
    fn test_complete_without_url_is_failure() {
        assert!(matches!(response(200, Some("complete"), None).classify(), PollOutcome::Failed { .. }));
    }

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let submitted: SubmitResponse = serde_json::from_str(r#"{"id": 1234, "status": "pending"}"#).unwrap();
        assert_eq!(submitted.id, "1234");

        let status: JobStatusResponse = serde_json::from_str(
            r#"{"id": "8fc0d4bc", "status": "complete", "file_url": "u", "thumb_url": null, "progress": 100}"#,
        ).unwrap();
        assert_eq!(status.id.as_deref(), Some("8fc0d4bc"));
        assert_eq!(status.progress, Some(100));
        assert_eq!(status.thumb_url, None);
    }
}
