//! HTTP-backed history repository.
//!
//! Talks to the history endpoints of the generation service:
//!
//! - `GET /history?project_id=..&requirement_id=..&limit=..`
//! - `POST /save_test_cases`
//! - `PUT /update_test_cases/{id}`
//! - `DELETE /history/{id}`

use async_trait::async_trait;
use casegen_core::config::ClientConfig;
use casegen_core::error::{CasegenError, Result};
use casegen_core::requirement::RequirementRef;
use casegen_core::version::{HistoryRecord, HistoryRepository, RecordContext, VersionId, VersionOrigin};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Repository implementation backed by the service's history API.
#[derive(Clone)]
pub struct HttpHistoryRepository {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
    limit: u32,
}

impl HttpHistoryRepository {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CasegenError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session_cookie: config.session_cookie.clone(),
            limit: config.history_limit,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, id: Option<&VersionId>) -> Result<String> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| CasegenError::data_access(format!("history request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CasegenError::data_access(format!("failed to read history response: {e}")))?;

        if status.is_success() {
            return Ok(body);
        }
        Err(map_status_error(status, &body, id))
    }
}

#[derive(Serialize)]
struct RecordBody<'a> {
    test_cases: &'a str,
    requirements: &'a str,
    project_id: &'a str,
    requirement_id: &'a str,
    requirement_title: &'a str,
    update_type: &'static str,
}

impl<'a> RecordBody<'a> {
    fn new(context: RecordContext<'a>, record: &'a HistoryRecord) -> Self {
        Self {
            test_cases: &record.content,
            requirements: &context.details.description,
            project_id: &context.requirement.project_id,
            requirement_id: &context.requirement.requirement_id,
            requirement_title: record
                .requirement_title
                .as_deref()
                .unwrap_or(&context.details.title),
            update_type: record.origin.as_update_type(),
        }
    }
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<WireRecord>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct WireRecord {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    test_cases: String,
    timestamp: String,
    #[serde(default)]
    update_type: Option<String>,
    #[serde(default)]
    version_number: Option<u64>,
    #[serde(default)]
    requirement_title: Option<String>,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(default, rename = "_id")]
    id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[async_trait]
impl HistoryRepository for HttpHistoryRepository {
    async fn list(&self, requirement: &RequirementRef) -> Result<Vec<HistoryRecord>> {
        let limit = self.limit.to_string();
        let builder = self.client.get(self.url("history")).query(&[
            ("project_id", requirement.project_id.as_str()),
            ("requirement_id", requirement.requirement_id.as_str()),
            ("limit", limit.as_str()),
        ]);

        let body = self.send(builder, None).await?;
        let records = parse_history_response(&body)?;
        tracing::debug!(
            "[HttpHistoryRepository] Listed {} records for {}",
            records.len(),
            requirement
        );
        Ok(records)
    }

    async fn create(
        &self,
        context: RecordContext<'_>,
        record: &HistoryRecord,
    ) -> Result<Option<VersionId>> {
        let builder = self
            .client
            .post(self.url("save_test_cases"))
            .json(&RecordBody::new(context, record));
        let body = self.send(builder, None).await?;

        let reported = serde_json::from_str::<CreateResponse>(&body)
            .ok()
            .and_then(|r| r.id)
            .map(VersionId::new);
        if reported.is_some() {
            return Ok(reported);
        }

        // The service does not echo the new id; find it by content.
        let listed = self.list(context.requirement).await?;
        Ok(listed
            .into_iter()
            .filter(|r| r.content == record.content)
            .max_by_key(|r| r.timestamp)
            .map(|r| r.id))
    }

    async fn update(&self, context: RecordContext<'_>, record: &HistoryRecord) -> Result<()> {
        let builder = self
            .client
            .put(self.url(&format!("update_test_cases/{}", record.id)))
            .json(&RecordBody::new(context, record));
        self.send(builder, Some(&record.id)).await?;
        Ok(())
    }

    async fn delete(&self, id: &VersionId) -> Result<()> {
        let builder = self.client.delete(self.url(&format!("history/{id}")));
        self.send(builder, Some(id)).await?;
        Ok(())
    }
}

fn parse_history_response(body: &str) -> Result<Vec<HistoryRecord>> {
    let response: HistoryResponse = serde_json::from_str(body)?;
    if let Some(error) = response.error {
        return Err(CasegenError::data_access(error));
    }

    response
        .history
        .into_iter()
        .map(|wire| {
            Ok(HistoryRecord {
                timestamp: parse_timestamp(&wire.timestamp)?,
                origin: VersionOrigin::from_update_type(wire.update_type.as_deref()),
                id: VersionId::new(wire.id),
                content: wire.test_cases,
                version_number: wire.version_number,
                requirement_title: wire.requirement_title,
            })
        })
        .collect()
}

/// Parses RFC 3339 timestamps; timestamps without an offset are UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| CasegenError::Serialization {
            format: "timestamp".to_string(),
            message: format!("'{value}': {e}"),
        })
}

/// Maps a non-success status.
///
/// For requests addressing a record, 404 and the service's 400 for ids it
/// cannot parse both mean the record does not exist there.
fn map_status_error(status: StatusCode, body: &str, id: Option<&VersionId>) -> CasegenError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string());

    match id {
        Some(id) if matches!(status, StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST) => {
            CasegenError::not_found("history record", id.as_str())
        }
        _ => CasegenError::data_access(format!("{status}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegen_core::requirement::RequirementDetails;
    use chrono::TimeZone;

    #[test]
    fn test_parse_history_response() {
        let body = r#"{
            "history": [
                {
                    "_id": "65f0c0ffee",
                    "test_cases": "TC-1: login",
                    "timestamp": "2024-03-12T10:15:00.123000+00:00",
                    "update_type": "ai_assistant",
                    "update_source": "AI Assistant",
                    "requirement_title": "Login"
                },
                {
                    "_id": "65f0c0ffef",
                    "test_cases": "TC-1: login (draft)",
                    "timestamp": "2024-03-12T09:00:00"
                }
            ]
        }"#;

        let records = parse_history_response(body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, VersionId::from("65f0c0ffee"));
        assert_eq!(records[0].origin, VersionOrigin::AgentEdit);
        assert_eq!(records[0].requirement_title.as_deref(), Some("Login"));
        assert_eq!(records[1].origin, VersionOrigin::Generated);
        assert_eq!(
            records[1].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 12, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_history_error_field_is_data_access_error() {
        let err = parse_history_response(r#"{"history": [], "error": "db down"}"#).unwrap_err();
        assert_eq!(err, CasegenError::data_access("db down"));
    }

    #[test]
    fn test_unknown_or_invalid_id_maps_to_not_found() {
        let id = VersionId::from("local-uuid");
        let err = map_status_error(
            StatusCode::BAD_REQUEST,
            r#"{"error": "Invalid history ID"}"#,
            Some(&id),
        );
        assert!(err.is_not_found());

        let err = map_status_error(StatusCode::NOT_FOUND, "", Some(&id));
        assert!(err.is_not_found());

        let err = map_status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom", Some(&id));
        assert!(matches!(err, CasegenError::DataAccess(_)));
    }

    #[test]
    fn test_record_body_uses_requirement_context() {
        let requirement = RequirementRef::new("p1", "r1");
        let details = RequirementDetails {
            title: "Login".into(),
            description: "Users can log in".into(),
        };
        let record = HistoryRecord {
            id: VersionId::from("v1"),
            content: "TC-1".into(),
            timestamp: Utc::now(),
            origin: VersionOrigin::ManualEdit,
            version_number: Some(1),
            requirement_title: None,
        };
        let context = RecordContext {
            requirement: &requirement,
            details: &details,
        };

        let json = serde_json::to_value(RecordBody::new(context, &record)).unwrap();

        assert_eq!(json["test_cases"], "TC-1");
        assert_eq!(json["requirements"], "Users can log in");
        assert_eq!(json["requirement_title"], "Login");
        assert_eq!(json["update_type"], "manual_edit");
        assert_eq!(json["requirement_id"], "r1");
    }
}
