//! Blocking client that executes each operation over a [`Transport`].
//!
//! Every call is one HTTP exchange, except a sync that the server answers
//! with a reset: that one follows up with a full records fetch and a full
//! settings fetch, in that order.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::client::TimeTaggerClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Record, Setting, UpdateFeed, Updates, WriteResult};

/// TimeTagger client that performs its own I/O.
///
/// Holds no state besides the immutable base URL, API key and transport, so
/// a shared reference can serve concurrent callers when the transport can.
#[derive(Clone)]
pub struct BlockingClient<T = UreqTransport> {
    client: TimeTaggerClient,
    transport: T,
}

impl BlockingClient<UreqTransport> {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new(config.timeout))
    }
}

impl<T: Transport> BlockingClient<T> {
    pub fn with_transport(config: &ClientConfig, transport: T) -> Self {
        Self {
            client: TimeTaggerClient::new(&config.base_url, &config.api_key),
            transport,
        }
    }

    /// Records overlapping `[start, end]`, soft-deleted ones included.
    /// Open bounds default to the epoch and the far future.
    pub fn fetch_records(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>, ApiError> {
        let response = self
            .transport
            .execute(&self.client.build_fetch_records(start, end))?;
        self.client.parse_fetch_records(response)
    }

    pub fn fetch_settings(&self) -> Result<Vec<Setting>, ApiError> {
        let response = self.transport.execute(&self.client.build_fetch_settings())?;
        self.client.parse_fetch_settings(response)
    }

    /// Changes since `since`. Store the returned `server_time` and pass it
    /// back on the next call.
    pub fn fetch_updates_since(&self, since: DateTime<Utc>) -> Result<Updates, ApiError> {
        let response = self
            .transport
            .execute(&self.client.build_fetch_updates(since))?;
        match self.client.parse_fetch_updates(response)? {
            UpdateFeed::Delta(updates) => Ok(updates),
            UpdateFeed::Reset { server_time } => {
                info!(since = %since, "server requested a reset, fetching everything");
                let records = self.fetch_records(None, None)?;
                let settings = self.fetch_settings()?;
                Ok(Updates {
                    server_time,
                    reset: true,
                    records,
                    settings,
                })
            }
        }
    }

    /// Create or modify records. The server may accept only part of the batch.
    pub fn update_records(&self, records: &[Record]) -> Result<WriteResult, ApiError> {
        let response = self
            .transport
            .execute(&self.client.build_update_records(records)?)?;
        self.client.parse_write_result(response)
    }

    /// Soft delete by prefixing descriptions with `HIDDEN`. There is no hard
    /// delete.
    pub fn delete_records(&self, records: &[Record]) -> Result<WriteResult, ApiError> {
        let response = self
            .transport
            .execute(&self.client.build_delete_records(records)?)?;
        self.client.parse_write_result(response)
    }

    pub fn update_settings(&self, settings: &[Setting]) -> Result<WriteResult, ApiError> {
        let response = self
            .transport
            .execute(&self.client.build_update_settings(settings)?)?;
        self.client.parse_write_result(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request it sees.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<HttpResponse>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn with(responses: &[(u16, &str)]) -> Self {
            let responses = responses
                .iter()
                .map(|(status, body)| HttpResponse {
                    status: *status,
                    headers: Vec::new(),
                    body: body.to_string(),
                })
                .collect();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|r| r.url.clone()).collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.seen.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ApiError::Connection("no scripted response left".into()))
        }
    }

    const RECORDS: &str =
        r##"{"records":[{"key":"r1","t1":100,"t2":340,"ds":"#a","mt":350,"st":351.5}]}"##;
    const SETTINGS: &str = r#"{"settings":[{"key":"s1","value":true,"mt":10,"st":11}]}"#;

    fn config() -> ClientConfig {
        ClientConfig::new("http://tt.local/api/v2", "secret")
    }

    #[test]
    fn reset_triggers_full_resync() {
        let transport = ScriptedTransport::with(&[
            (200, r#"{"server_time":9000,"reset":1,"records":[],"settings":[]}"#),
            (200, RECORDS),
            (200, SETTINGS),
        ]);
        let client = BlockingClient::with_transport(&config(), &transport);
        let since = DateTime::from_timestamp(50, 0).unwrap();
        let updates = client.fetch_updates_since(since).unwrap();

        assert!(updates.reset);
        assert_eq!(updates.server_time.timestamp_millis(), 9000);
        assert_eq!(updates.records[0].tags(), vec!["#a"]);
        assert_eq!(
            transport.urls(),
            vec![
                "http://tt.local/api/v2/updates?since=50",
                "http://tt.local/api/v2/records?timerange=0-253402300799",
                "http://tt.local/api/v2/settings",
            ]
        );

        let direct = ScriptedTransport::with(&[(200, RECORDS), (200, SETTINGS)]);
        let direct_client = BlockingClient::with_transport(&config(), &direct);
        assert_eq!(updates.records, direct_client.fetch_records(None, None).unwrap());
        assert_eq!(updates.settings, direct_client.fetch_settings().unwrap());
    }

    #[test]
    fn delta_is_returned_without_extra_calls() {
        let transport = ScriptedTransport::with(&[(
            200,
            r#"{"server_time":9000,"reset":0,
                "records":[{"key":"r1","t1":100,"t2":100,"mt":1,"st":2}],"settings":[]}"#,
        )]);
        let client = BlockingClient::with_transport(&config(), &transport);
        let updates = client
            .fetch_updates_since(DateTime::from_timestamp(50, 0).unwrap())
            .unwrap();
        assert!(!updates.reset);
        assert_eq!(updates.records.len(), 1);
        assert_eq!(transport.urls().len(), 1);
    }

    #[test]
    fn failed_resync_surfaces_transport_error() {
        let transport = ScriptedTransport::with(&[
            (200, r#"{"server_time":9000,"reset":1}"#),
            (503, "maintenance"),
        ]);
        let client = BlockingClient::with_transport(&config(), &transport);
        let err = client
            .fetch_updates_since(DateTime::<Utc>::UNIX_EPOCH)
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport { status: 503, .. }));
    }

    #[test]
    fn delete_records_sends_marked_batch() {
        let transport =
            ScriptedTransport::with(&[(200, r#"{"accepted":["r1"],"failed":[],"errors":[]}"#)]);
        let client = BlockingClient::with_transport(&config(), &transport);
        let record = Record::running("r1", DateTime::from_timestamp(100, 0).unwrap())
            .with_description("lunch");
        let result = client.delete_records(&[record]).unwrap();
        assert!(result.is_complete());

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, HttpMethod::Put);
        let body: serde_json::Value =
            serde_json::from_str(seen[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body[0]["ds"], "HIDDEN lunch");
    }

    #[test]
    fn update_settings_reports_rejections() {
        let transport = ScriptedTransport::with(&[(
            200,
            r#"{"accepted":[],"failed":["s1"],"errors":["s1: invalid","storage full"]}"#,
        )]);
        let client = BlockingClient::with_transport(&config(), &transport);
        let result = client
            .update_settings(&[Setting::new("s1", serde_json::json!({"a": 1}))])
            .unwrap();
        assert_eq!(result.rejected, vec!["s1"]);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn update_settings_surfaces_server_error() {
        let transport = ScriptedTransport::with(&[(500, "storage offline")]);
        let client = BlockingClient::with_transport(&config(), &transport);
        let err = client
            .update_settings(&[Setting::new("s1", true)])
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Transport { status: 500, ref body } if body == "storage offline"
        ));
        assert_eq!(transport.seen.lock().unwrap()[0].method, HttpMethod::Put);
    }

    #[test]
    fn update_settings_rejects_malformed_result() {
        let transport = ScriptedTransport::with(&[(200, r#"{"accepted":["s1"]}"#)]);
        let client = BlockingClient::with_transport(&config(), &transport);
        let err = client
            .update_settings(&[Setting::new("s1", true)])
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }), "got {err:?}");
    }

    #[test]
    fn connection_failure_is_propagated() {
        let transport = ScriptedTransport::default();
        let client = BlockingClient::with_transport(&config(), &transport);
        let err = client.fetch_settings().unwrap_err();
        assert!(matches!(err, ApiError::Connection(_)));
    }
}
