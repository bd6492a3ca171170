//! HTTP client for an external page-auditing service
//!
//! The service renders the page in a headless browser, runs the
//! accessibility rule engine and answers:
//! - `POST {base}/audit` with `{url, wcagLevel, viewport, timeoutMs}`
//!   - 2xx: `{"violations": [RawViolation, ...]}`
//!   - otherwise: `{"error": "...", "kind": "DnsError"?, "statusCode": 404?}`
//! - `GET {base}/health`

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::classify::classify_failure_message;
use super::{AuditOptions, AuditorHealth, PageAuditor};
use crate::error::{AuditFailure, FailureKind};
use crate::models::RawViolationSet;

/// Request body sent to the auditing service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditRequestBody<'a> {
    url: &'a str,
    #[serde(flatten)]
    options: &'a AuditOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct AuditResponseBody {
    #[serde(default)]
    violations: RawViolationSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditErrorBody {
    error: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
}

pub struct HttpPageAuditor {
    http_client: Client,
    api_base: String,
    /// Extra time granted to the HTTP round trip beyond the audit timeout
    grace: Duration,
}

impl HttpPageAuditor {
    pub fn new(api_base: impl Into<String>, grace: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build auditor HTTP client")?;

        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            grace,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn failure_from_error_body(status: reqwest::StatusCode, body: &str) -> AuditFailure {
        match serde_json::from_str::<AuditErrorBody>(body) {
            Ok(err) => {
                let kind = err
                    .kind
                    .as_deref()
                    .and_then(|k| FailureKind::from_parts(k, err.status_code))
                    .unwrap_or_else(|| match err.status_code {
                        Some(code) if code >= 400 => FailureKind::HttpError { status: code },
                        _ => classify_failure_message(&err.error),
                    });
                AuditFailure::new(kind, err.error)
            }
            Err(_) => AuditFailure::new(
                FailureKind::Unknown,
                format!("auditor service error ({}): {}", status, body),
            ),
        }
    }

    fn failure_from_transport(err: reqwest::Error, timeout_ms: u64) -> AuditFailure {
        if err.is_timeout() {
            return AuditFailure::timeout(timeout_ms);
        }
        if err.is_connect() {
            // The auditing service itself is down; that says nothing about the target site
            return AuditFailure::new(
                FailureKind::Unknown,
                format!("auditor service unreachable: {}", err),
            );
        }
        AuditFailure::new(FailureKind::Unknown, format!("auditor request failed: {}", err))
    }
}

#[async_trait]
impl PageAuditor for HttpPageAuditor {
    async fn audit(&self, url: &str, options: &AuditOptions) -> Result<RawViolationSet, AuditFailure> {
        let body = AuditRequestBody { url, options };

        let response = self
            .http_client
            .post(self.endpoint("audit"))
            .timeout(Duration::from_millis(options.timeout_ms) + self.grace)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::failure_from_transport(e, options.timeout_ms))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Self::failure_from_transport(e, options.timeout_ms))?;

        if !status.is_success() {
            return Err(Self::failure_from_error_body(status, &text));
        }

        let parsed: AuditResponseBody = serde_json::from_str(&text).map_err(|e| {
            AuditFailure::new(
                FailureKind::Unknown,
                format!("Failed to parse auditor response: {}", e),
            )
        })?;

        Ok(parsed.violations)
    }

    async fn health_check(&self) -> AuditorHealth {
        match self
            .http_client
            .get(self.endpoint("health"))
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => AuditorHealth {
                healthy: true,
                detail: format!("auditor at {} is healthy", self.api_base),
            },
            Ok(response) => AuditorHealth {
                healthy: false,
                detail: format!("auditor at {} answered {}", self.api_base, response.status()),
            },
            Err(e) => AuditorHealth {
                healthy: false,
                detail: format!("auditor at {} unreachable: {}", self.api_base, e),
            },
        }
    }
}
