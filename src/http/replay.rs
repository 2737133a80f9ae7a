//! reqwest-backed replay channel for access control testing messages.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::GatecheckError;
use crate::scanner::RequestReplay;
use crate::site::{RecordedRequest, RecordedResponse};
use crate::users::UserIdentity;

/// Replays recorded requests over the network. Redirects are never followed
/// because the scan inspects the initial response; recorded identity headers
/// are stripped and replaced with the target identity's session headers.
pub struct ReqwestReplay {
    client: reqwest::Client,
}

impl ReqwestReplay {
    pub fn new(timeout_secs: u64) -> Result<Self, GatecheckError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(false)
            .build()?;
        Ok(Self { client })
    }
}

/// Headers that carry the recorded session's identity and must not leak into
/// the replayed request.
fn is_identity_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("cookie") || name.eq_ignore_ascii_case("authorization")
}

#[async_trait]
impl RequestReplay for ReqwestReplay {
    async fn send(
        &self,
        request: &RecordedRequest,
        identity: Option<&UserIdentity>,
    ) -> Result<RecordedResponse, GatecheckError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            GatecheckError::MalformedMessage(format!("invalid HTTP method: {}", request.method))
        })?;

        let mut builder = self.client.request(method, &request.uri);
        for (name, value) in &request.headers {
            if !is_identity_header(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(user) = identity {
            for (name, value) in &user.session_headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await?;

        debug!(uri = %request.uri, status, "Replayed request");
        Ok(RecordedResponse {
            status,
            headers,
            body,
        })
    }
}
