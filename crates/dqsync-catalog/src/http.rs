//! Retrying HTTP helper shared by the catalog backends.

use dqsync_core::{send_with_retry, truncate_for_error, RetryPolicy, TerminalReply};
use serde::de::DeserializeOwned;

use crate::error::{AssetStage, CatalogError};

const ERROR_BODY_CHARS: usize = 800;

/// Terminal reply of a request after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpReply {
    pub(crate) status: u16,
    pub(crate) body: String,
}

impl HttpReply {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub(crate) fn decode<T: DeserializeOwned>(
        &self,
        stage: AssetStage,
        operation: &str,
    ) -> Result<T, CatalogError> {
        let raw = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(raw).map_err(|error| {
            CatalogError::backend(
                stage,
                operation,
                Some(self.status),
                format!("failed to decode response: {error}"),
            )
        })
    }

    pub(crate) fn into_error(self, stage: AssetStage, operation: &str) -> CatalogError {
        CatalogError::backend(
            stage,
            operation,
            Some(self.status),
            truncate_for_error(&self.body, ERROR_BODY_CHARS),
        )
    }
}

#[derive(Clone)]
pub(crate) struct CatalogHttp {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl CatalogHttp {
    pub(crate) fn new(retry: RetryPolicy) -> Result<Self, CatalogError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("dq-catalog-sync"),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(retry.request_timeout())
            .build()
            .map_err(|error| {
                CatalogError::configuration(format!("failed to create catalog http client: {error}"))
            })?;
        Ok(Self { client, retry })
    }

    /// Sends with retries and returns the terminal reply, successful or not.
    pub(crate) async fn send<F>(
        &self,
        stage: AssetStage,
        operation: &str,
        mut request_builder: F,
    ) -> Result<HttpReply, CatalogError>
    where
        F: FnMut(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let TerminalReply { status, body } =
            send_with_retry(&self.retry, operation, || request_builder(&self.client))
                .await
                .map_err(|error| {
                    CatalogError::backend(stage, operation, None, format!("request failed: {error}"))
                })?;
        Ok(HttpReply { status, body })
    }

    /// Like [`CatalogHttp::send`], but a non-success reply is an error.
    pub(crate) async fn send_ok<F>(
        &self,
        stage: AssetStage,
        operation: &str,
        request_builder: F,
    ) -> Result<HttpReply, CatalogError>
    where
        F: FnMut(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let reply = self.send(stage, operation, request_builder).await?;
        if reply.is_success() {
            Ok(reply)
        } else {
            Err(reply.into_error(stage, operation))
        }
    }
}

/// `https://host` for a bare host, otherwise `scheme://authority` with any path dropped.
pub(crate) fn normalize_root_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (scheme, rest) = raw.split_once("://").unwrap_or(("https", raw));
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{authority}"))
}

#[cfg(test)]
mod tests {
    use dqsync_core::RetryPolicy;
    use httpmock::prelude::*;

    use super::{normalize_root_url, CatalogHttp};
    use crate::error::{AssetStage, CatalogError};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            request_timeout_ms: 3_000,
            max_attempts: 2,
            base_delay_ms: 1,
        }
    }

    #[test]
    fn unit_normalize_root_url_handles_bare_hosts_and_paths() {
        assert_eq!(
            normalize_root_url("contoso.purview.azure.com").as_deref(),
            Some("https://contoso.purview.azure.com")
        );
        assert_eq!(
            normalize_root_url("http://localhost:8080/catalog/api").as_deref(),
            Some("http://localhost:8080")
        );
        assert_eq!(normalize_root_url("  "), None);
        assert_eq!(normalize_root_url("https://"), None);
    }

    #[tokio::test]
    async fn integration_send_retries_then_returns_terminal_reply() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(502).body("bad gateway");
        });
        let http = CatalogHttp::new(fast_retry()).expect("http");
        let reply = http
            .send(AssetStage::ResolveAsset, "get flaky", |client| {
                client.get(server.url("/flaky"))
            })
            .await
            .expect("terminal reply");
        mock.assert_calls(2);
        assert_eq!(reply.status, 502);
        assert!(!reply.is_success());
    }

    #[tokio::test]
    async fn functional_send_ok_maps_client_errors() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/denied");
            then.status(403).body("forbidden");
        });
        let http = CatalogHttp::new(fast_retry()).expect("http");
        let error = http
            .send_ok(AssetStage::ApplyTags, "apply labels", |client| {
                client.post(server.url("/denied"))
            })
            .await
            .expect_err("403 should fail");
        mock.assert_calls(1);
        match error {
            CatalogError::Backend {
                stage,
                status,
                message,
                ..
            } => {
                assert_eq!(stage, AssetStage::ApplyTags);
                assert_eq!(status, Some(403));
                assert_eq!(message, "forbidden");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
