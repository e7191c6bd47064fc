//! Blocking JSON transport shared by the embedding and completion clients.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{QaError, Result};
use crate::settings::ApiSettings;

/// Authenticated client bound to one API root.
#[derive(Clone)]
pub(crate) struct ApiTransport {
    client: Client,
    base_url: String,
    max_retries: usize,
}

impl ApiTransport {
    pub(crate) fn new(settings: &ApiSettings) -> Result<Self> {
        let api_key = settings.api_key().trim();
        if api_key.is_empty() {
            return Err(QaError::RemoteService("missing OpenAI API key".into()));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {api_key}");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| QaError::RemoteService("invalid OpenAI API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(settings.timeout())
            .default_headers(headers)
            .build()
            .map_err(|err| QaError::remote(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: settings.base_url().trim_end_matches('/').to_string(),
            max_retries: settings.max_retries(),
        })
    }

    /// Posts `body` to `{base_url}/{path}` and decodes the JSON response.
    pub(crate) fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let endpoint = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut attempt = 0usize;
        loop {
            match self.client.post(&endpoint).json(body).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json().map_err(|err| {
                            QaError::remote(format!("failed to parse response from {endpoint}: {err}"))
                        });
                    }
                    let text = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(%status, attempt, %endpoint, "retrying remote request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(QaError::remote(format!(
                        "{endpoint} returned {status}: {text}"
                    )));
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(error = %err, attempt, %endpoint, "retrying remote request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(QaError::remote(format!("failed to call {endpoint}: {err}")));
                }
            }
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}
