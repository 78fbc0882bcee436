use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use dqsync_checks::ProfileAttachment;
use dqsync_core::{send_with_retry, truncate_for_error, RetryPolicy};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::types::{
    ActiveOrganizationResponse, CheckInterval, ConfiguredTable, Organization, PingResponse,
    RunResultResponse, TableProfileResponse, Warehouse, WarehouseListResponse,
};
use crate::MonitorSource;

const TOKEN_HEADER: &str = "x-anomalo-token";

/// Connection settings for the monitoring service.
#[derive(Debug, Clone)]
pub struct AnomaloConfig {
    pub host: String,
    pub protocol: String,
    pub api_token: String,
    pub organization_id: Option<u64>,
    pub retry: RetryPolicy,
}

#[derive(Clone)]
pub struct AnomaloClient {
    http: reqwest::Client,
    origin: String,
    api_base: String,
    organization_id: u64,
    retry: RetryPolicy,
}

impl AnomaloClient {
    /// Builds the client, switches organization when one is configured, and
    /// verifies the service answers before any table is touched.
    pub async fn connect(config: AnomaloConfig) -> Result<Self> {
        if config.api_token.trim().is_empty() {
            bail!("ANOMALO_API_SECRET_TOKEN is required; define it in your environment or a .env file");
        }
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("dq-catalog-sync"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            TOKEN_HEADER,
            reqwest::header::HeaderValue::from_str(config.api_token.trim())
                .context("invalid monitoring service token header")?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.retry.request_timeout())
            .build()
            .context("failed to create monitoring service client")?;

        let origin = service_origin(&config.protocol, &config.host);
        let mut client = Self {
            http,
            api_base: format!("{origin}/api/public/v1"),
            origin,
            organization_id: 0,
            retry: config.retry,
        };

        if let Some(organization_id) = config.organization_id {
            let _: Value = client
                .request_json("set active organization", || {
                    client
                        .http
                        .post(format!("{}/set_active_organization", client.api_base))
                        .json(&json!({ "id": organization_id }))
                })
                .await?;
        }

        let ping: PingResponse = client
            .request_json("ping", || {
                client.http.get(format!("{}/ping", client.api_base))
            })
            .await?;
        if !ping.ping {
            bail!(
                "monitoring service at {} is not reachable; check host and token",
                client.origin
            );
        }

        let active: ActiveOrganizationResponse = client
            .request_json("get active organization", || {
                client
                    .http
                    .get(format!("{}/get_active_organization", client.api_base))
            })
            .await?;
        client.organization_id = active.id;
        tracing::info!(
            origin = %client.origin,
            organization_id = client.organization_id,
            "connected to monitoring service"
        );
        Ok(client)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn organization_id(&self) -> u64 {
        self.organization_id
    }

    pub async fn list_organizations(&self) -> Result<Vec<Organization>> {
        self.request_json("list organizations", || {
            self.http.get(format!("{}/organizations", self.api_base))
        })
        .await
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let reply = send_with_retry(&self.retry, operation, request_builder)
            .await
            .with_context(|| format!("monitoring service {operation} request failed"))?;
        if !reply.is_success() {
            bail!(
                "monitoring service {operation} failed with status {}: {}",
                reply.status,
                truncate_for_error(&reply.body, 800)
            );
        }
        serde_json::from_str(&reply.body)
            .with_context(|| format!("failed to decode monitoring service {operation}"))
    }
}

#[async_trait]
impl MonitorSource for AnomaloClient {
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        let response: WarehouseListResponse = self
            .request_json("list warehouses", || {
                self.http.get(format!("{}/list_warehouses", self.api_base))
            })
            .await?;
        Ok(response.warehouses)
    }

    async fn configured_tables(&self, warehouse_id: u64) -> Result<Vec<ConfiguredTable>> {
        let warehouse_value = warehouse_id.to_string();
        self.request_json("list configured tables", || {
            self.http
                .get(format!("{}/configured_tables", self.api_base))
                .query(&[("warehouse_id", warehouse_value.as_str())])
        })
        .await
    }

    async fn latest_check_runs(&self, table_id: u64, since: &str) -> Result<Vec<Value>> {
        let table_value = table_id.to_string();
        let intervals: Vec<CheckInterval> = self
            .request_json("list check intervals", || {
                self.http
                    .get(format!("{}/get_check_intervals", self.api_base))
                    .query(&[("table_id", table_value.as_str()), ("start", since)])
            })
            .await?;
        let Some(job_id) = intervals
            .first()
            .and_then(|interval| interval.latest_run_checks_job_id)
        else {
            tracing::debug!(table_id, since, "no check job run in window");
            return Ok(Vec::new());
        };

        let job_value = job_id.to_string();
        let result: RunResultResponse = self
            .request_json("get run result", || {
                self.http
                    .get(format!("{}/get_run_result", self.api_base))
                    .query(&[("job_id", job_value.as_str())])
            })
            .await?;
        Ok(result.check_runs)
    }

    async fn table_profile(&self, warehouse_id: u64, table_id: u64) -> Result<ProfileAttachment> {
        let warehouse_value = warehouse_id.to_string();
        let table_value = table_id.to_string();
        let response: TableProfileResponse = self
            .request_json("get table profile", || {
                self.http
                    .get(format!("{}/get_table_profile", self.api_base))
                    .query(&[
                        ("warehouse_id", warehouse_value.as_str()),
                        ("table_id", table_value.as_str()),
                    ])
            })
            .await?;
        Ok(ProfileAttachment {
            profile_image_url: response.profile.and_then(|image| image.img_url),
            columns_image_url: response.columns.and_then(|image| image.img_url),
        })
    }

    fn table_url(&self, table_id: u64) -> String {
        format!(
            "{}/dashboard/orgs/{}/tables/{table_id}",
            self.origin, self.organization_id
        )
    }
}

/// `protocol://host` with any scheme or trailing slash on `host` normalized away.
fn service_origin(protocol: &str, host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        return host.to_string();
    }
    let protocol = protocol.trim().trim_end_matches("://");
    let protocol = if protocol.is_empty() { "https" } else { protocol };
    format!("{protocol}://{host}")
}

#[cfg(test)]
mod tests {
    use dqsync_core::RetryPolicy;
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{service_origin, AnomaloClient, AnomaloConfig};
    use crate::MonitorSource;

    fn test_config(server: &MockServer, organization_id: Option<u64>) -> AnomaloConfig {
        AnomaloConfig {
            host: server.base_url(),
            protocol: "http".to_string(),
            api_token: "test-token".to_string(),
            organization_id,
            retry: RetryPolicy {
                request_timeout_ms: 3_000,
                max_attempts: 3,
                base_delay_ms: 1,
            },
        }
    }

    fn mock_handshake(server: &MockServer, organization_id: u64) {
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/public/v1/ping")
                .header("x-anomalo-token", "test-token");
            then.status(200).json_body(json!({"ping": true}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/public/v1/get_active_organization");
            then.status(200).json_body(json!({"id": organization_id}));
        });
    }

    #[test]
    fn unit_service_origin_normalizes_scheme_and_slashes() {
        assert_eq!(
            service_origin("https", "app.anomalo.com/"),
            "https://app.anomalo.com"
        );
        assert_eq!(
            service_origin("", "http://localhost:9000"),
            "http://localhost:9000"
        );
        assert_eq!(
            service_origin("http://", "monitor.local"),
            "http://monitor.local"
        );
    }

    #[tokio::test]
    async fn functional_connect_sets_organization_and_builds_table_url() {
        let server = MockServer::start();
        let switch = server.mock(|when, then| {
            when.method(POST)
                .path("/api/public/v1/set_active_organization")
                .json_body(json!({"id": 7}));
            then.status(200).json_body(json!({"id": 7}));
        });
        mock_handshake(&server, 7);

        let client = AnomaloClient::connect(test_config(&server, Some(7)))
            .await
            .expect("connect");
        switch.assert();
        assert_eq!(client.organization_id(), 7);
        assert_eq!(
            client.table_url(42),
            format!("{}/dashboard/orgs/7/tables/42", server.base_url())
        );
    }

    #[tokio::test]
    async fn regression_connect_fails_when_ping_is_false() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/public/v1/ping");
            then.status(200).json_body(json!({"ping": false}));
        });
        let error = AnomaloClient::connect(test_config(&server, None))
            .await
            .err()
            .expect("unreachable service should fail");
        assert!(error.to_string().contains("not reachable"));
    }

    #[tokio::test]
    async fn regression_connect_rejects_blank_token() {
        let server = MockServer::start();
        let mut config = test_config(&server, None);
        config.api_token = "  ".to_string();
        let error = AnomaloClient::connect(config)
            .await
            .err()
            .expect("blank token should fail");
        assert!(error.to_string().contains("ANOMALO_API_SECRET_TOKEN"));
    }

    #[tokio::test]
    async fn integration_latest_check_runs_follows_latest_job() {
        let server = MockServer::start();
        mock_handshake(&server, 1);
        let intervals = server.mock(|when, then| {
            when.method(GET)
                .path("/api/public/v1/get_check_intervals")
                .query_param("table_id", "42")
                .query_param("start", "2024-05-01");
            then.status(200).json_body(json!([
                {"latest_run_checks_job_id": 900},
                {"latest_run_checks_job_id": 800}
            ]));
        });
        let run_result = server.mock(|when, then| {
            when.method(GET)
                .path("/api/public/v1/get_run_result")
                .query_param("job_id", "900");
            then.status(200).json_body(json!({
                "check_runs": [
                    {"run_config": {"_metadata": {"check_type": "rule"}}, "results": {"success": true}}
                ]
            }));
        });

        let client = AnomaloClient::connect(test_config(&server, None))
            .await
            .expect("connect");
        let runs = client
            .latest_check_runs(42, "2024-05-01")
            .await
            .expect("check runs");
        intervals.assert();
        run_result.assert();
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn functional_latest_check_runs_is_empty_without_interval() {
        let server = MockServer::start();
        mock_handshake(&server, 1);
        server.mock(|when, then| {
            when.method(GET).path("/api/public/v1/get_check_intervals");
            then.status(200).json_body(json!([]));
        });
        let client = AnomaloClient::connect(test_config(&server, None))
            .await
            .expect("connect");
        let runs = client
            .latest_check_runs(42, "2024-05-01")
            .await
            .expect("check runs");
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn integration_list_warehouses_retries_server_errors() {
        let server = MockServer::start();
        mock_handshake(&server, 1);
        let flaky = server.mock(|when, then| {
            when.method(GET).path("/api/public/v1/list_warehouses");
            then.status(503).body("unavailable");
        });

        let client = AnomaloClient::connect(test_config(&server, None))
            .await
            .expect("connect");
        let error = client
            .list_warehouses()
            .await
            .expect_err("persistent 503 should fail");
        flaky.assert_calls(3);
        assert!(error.to_string().contains("status 503"));
    }

    #[tokio::test]
    async fn regression_list_organizations_does_not_retry_client_errors() {
        let server = MockServer::start();
        mock_handshake(&server, 1);
        let forbidden = server.mock(|when, then| {
            when.method(GET).path("/api/public/v1/organizations");
            then.status(403).body("forbidden");
        });

        let client = AnomaloClient::connect(test_config(&server, None))
            .await
            .expect("connect");
        let error = client
            .list_organizations()
            .await
            .expect_err("403 should fail");
        forbidden.assert_calls(1);
        assert!(error.to_string().contains("status 403: forbidden"));
    }

    #[tokio::test]
    async fn regression_undecodable_reply_names_operation() {
        let server = MockServer::start();
        mock_handshake(&server, 1);
        server.mock(|when, then| {
            when.method(GET).path("/api/public/v1/organizations");
            then.status(200).body("not json");
        });

        let client = AnomaloClient::connect(test_config(&server, None))
            .await
            .expect("connect");
        let error = client
            .list_organizations()
            .await
            .expect_err("invalid json should fail");
        assert!(error
            .to_string()
            .contains("failed to decode monitoring service list organizations"));
    }

    #[tokio::test]
    async fn functional_table_profile_maps_image_urls() {
        let server = MockServer::start();
        mock_handshake(&server, 1);
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/public/v1/get_table_profile")
                .query_param("warehouse_id", "3")
                .query_param("table_id", "42");
            then.status(200).json_body(json!({
                "profile": {"img_url": "https://img.test/profile.png"},
                "columns": {}
            }));
        });
        let client = AnomaloClient::connect(test_config(&server, None))
            .await
            .expect("connect");
        let profile = client.table_profile(3, 42).await.expect("profile");
        assert_eq!(
            profile.profile_image_url.as_deref(),
            Some("https://img.test/profile.png")
        );
        assert_eq!(profile.columns_image_url, None);
    }
}
