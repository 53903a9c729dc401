//! Stateless HTTP request builder and response parser for the TimeTagger API.
//!
//! # Design
//! `TimeTaggerClient` holds only the base URL and API key and carries no
//! mutable state between calls. Each operation is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that consumes
//! an `HttpResponse`. [`BlockingClient`](crate::BlockingClient) glues the two
//! together over a [`Transport`](crate::Transport); hosts with their own HTTP
//! stack can drive the pair directly.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{Record, Setting, UpdateFeed, Updates, WriteResult};
use crate::wire::{
    self, RecordsEnvelope, SettingsEnvelope, UpdatesEnvelope, WireError, WireRecord,
    WireSetting, WriteEnvelope, MAX_TIMESTAMP,
};

const AUTH_HEADER: &str = "authtoken";

/// Synchronous, stateless client for the TimeTagger API.
#[derive(Clone)]
pub struct TimeTaggerClient {
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for TimeTaggerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeTaggerClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TimeTaggerClient {
    /// `base_url` is the API root, e.g. `https://host/timetagger/api/v2/`.
    /// A missing trailing `/` is added.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Self {
            base_url,
            api_key: api_key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Records overlapping `[start, end]`; either bound may be left open.
    pub fn build_fetch_records(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> HttpRequest {
        let start = start.map_or(0, |t| t.timestamp());
        let end = end.map_or(MAX_TIMESTAMP, |t| t.timestamp());
        self.get(&format!("records?timerange={start}-{end}"))
    }

    pub fn build_fetch_settings(&self) -> HttpRequest {
        self.get("settings")
    }

    pub fn build_fetch_updates(&self, since: DateTime<Utc>) -> HttpRequest {
        self.get(&format!("updates?since={}", since.timestamp()))
    }

    pub fn build_update_records(&self, records: &[Record]) -> Result<HttpRequest, ApiError> {
        let body: Vec<WireRecord> = records.iter().map(WireRecord::from_record).collect();
        self.put("records", &body)
    }

    /// Soft delete: every record not yet carrying the `HIDDEN` marker gets it
    /// prepended, then the batch is written like any update.
    pub fn build_delete_records(&self, records: &[Record]) -> Result<HttpRequest, ApiError> {
        let hidden: Vec<Record> = records.iter().cloned().map(Record::hidden).collect();
        self.build_update_records(&hidden)
    }

    pub fn build_update_settings(&self, settings: &[Setting]) -> Result<HttpRequest, ApiError> {
        let body: Vec<WireSetting> = settings.iter().map(WireSetting::from_setting).collect();
        self.put("settings", &body)
    }

    /// Soft-deleted records are included; filtering on
    /// [`Record::is_hidden`] is up to the caller.
    pub fn parse_fetch_records(&self, response: HttpResponse) -> Result<Vec<Record>, ApiError> {
        check_status(&response)?;
        let envelope: RecordsEnvelope = decode(&response)?;
        let records = decode_records(envelope.records, &response)?;
        debug!(count = records.len(), "decoded records");
        Ok(records)
    }

    pub fn parse_fetch_settings(&self, response: HttpResponse) -> Result<Vec<Setting>, ApiError> {
        check_status(&response)?;
        let envelope: SettingsEnvelope = decode(&response)?;
        let settings = decode_settings(envelope.settings, &response)?;
        debug!(count = settings.len(), "decoded settings");
        Ok(settings)
    }

    /// A reset flag of `1` yields [`UpdateFeed::Reset`]; the lists in the body
    /// are ignored in that case.
    pub fn parse_fetch_updates(&self, response: HttpResponse) -> Result<UpdateFeed, ApiError> {
        check_status(&response)?;
        let envelope: UpdatesEnvelope = decode(&response)?;
        let server_time = wire::from_millis(envelope.server_time as i64)
            .map_err(|e| wire_error(e, &response))?;

        if envelope.reset == 1 {
            return Ok(UpdateFeed::Reset { server_time });
        }

        let records = decode_records(envelope.records, &response)?;
        let settings = decode_settings(envelope.settings, &response)?;
        debug!(
            records = records.len(),
            settings = settings.len(),
            "decoded update delta"
        );
        Ok(UpdateFeed::Delta(Updates {
            server_time,
            reset: false,
            records,
            settings,
        }))
    }

    /// Shared by record and setting writes.
    pub fn parse_write_result(&self, response: HttpResponse) -> Result<WriteResult, ApiError> {
        check_status(&response)?;
        let envelope: WriteEnvelope = decode(&response)?;
        let result = WriteResult::from(envelope);
        if !result.is_complete() {
            warn!(
                rejected = result.rejected.len(),
                errors = result.errors.len(),
                "server rejected part of the batch"
            );
        }
        Ok(result)
    }

    fn get(&self, path: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}{path}", self.base_url),
            headers: vec![(AUTH_HEADER.to_string(), self.api_key.clone())],
            body: None,
        }
    }

    fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<HttpRequest, ApiError> {
        let body =
            serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Put,
            url: format!("{}{path}", self.base_url),
            headers: vec![
                (AUTH_HEADER.to_string(), self.api_key.clone()),
                ("content-type".to_string(), "application/json".to_string()),
            ],
            body: Some(body),
        })
    }
}

/// Map any non-2xx status to `ApiError::Transport`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    warn!(status = response.status, "unexpected response status");
    Err(ApiError::Transport {
        status: response.status,
        body: response.body.clone(),
    })
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::Decode {
        message: e.to_string(),
        body: response.body.clone(),
    })
}

fn wire_error(error: WireError, response: &HttpResponse) -> ApiError {
    ApiError::Decode {
        message: error.to_string(),
        body: response.body.clone(),
    }
}

fn decode_records(
    records: Vec<WireRecord>,
    response: &HttpResponse,
) -> Result<Vec<Record>, ApiError> {
    records
        .into_iter()
        .map(|r| r.into_record().map_err(|e| wire_error(e, response)))
        .collect()
}

fn decode_settings(
    settings: Vec<WireSetting>,
    response: &HttpResponse,
) -> Result<Vec<Setting>, ApiError> {
    settings
        .into_iter()
        .map(|s| s.into_setting().map_err(|e| wire_error(e, response)))
        .collect()
}
