//! The `fetch` op: outbound HTTP gated by an origin allowlist.
//!
//! The origin check lives here, on the Rust side of the boundary; the
//! `fetch` shim in `bootstrap.js` is convenience, not trust boundary.
//! Automatic redirects are disabled and each hop is validated by hand:
//! a redirect is followed only when its target origin is identical to the
//! origin of the request being redirected.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use deno_core::anyhow::anyhow;
use deno_core::error::AnyError;
use deno_core::{op2, OpState};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

const MAX_REDIRECT_HOPS: usize = 10;

/// Origins `fetch` may address, pre-normalized by `SandboxConfig`.
/// An empty list disables fetch entirely.
#[derive(Debug, Clone, Default)]
pub struct FetchPolicy {
    allowed_origins: Vec<String>,
}

impl FetchPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    pub fn permits(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        self.allowed_origins.iter().any(|allowed| *allowed == origin)
    }
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub url: String,
    pub body: String,
}

#[op2(async)]
#[serde]
pub async fn op_fetch(
    state: Rc<RefCell<OpState>>,
    #[serde] request: FetchRequest,
) -> Result<FetchResponse, AnyError> {
    let policy = state.borrow().borrow::<FetchPolicy>().clone();
    perform(request, &policy).await
}

async fn perform(request: FetchRequest, policy: &FetchPolicy) -> Result<FetchResponse, AnyError> {
    let mut url =
        Url::parse(&request.url).map_err(|e| anyhow!("invalid URL '{}': {e}", request.url))?;

    if !policy.permits(&url) {
        return Err(anyhow!(
            "origin '{}' is not allowed",
            url.origin().ascii_serialization()
        ));
    }

    let mut method = parse_method(request.method.as_deref())?;
    let mut body = request.body;

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| anyhow!("failed to construct HTTP client: {e}"))?;

    for _hop in 0..MAX_REDIRECT_HOPS {
        log::debug!("fetch {method} {url}");
        let mut builder = client.request(method.clone(), url.clone());
        if let Some(headers) = &request.headers {
            for (name, value) in headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| anyhow!("fetch failed: {e}"))?;
        let status = response.status();

        if status.is_redirection() {
            let Some(location) = response.headers().get("location") else {
                return materialize(response).await;
            };
            let location = location
                .to_str()
                .map_err(|_| anyhow!("redirect location is not valid ASCII"))?;
            let target = url
                .join(location)
                .map_err(|e| anyhow!("invalid redirect target '{location}': {e}"))?;

            if target.origin() != url.origin() {
                return Err(anyhow!(
                    "cross-origin redirect rejected: '{}' -> '{}'",
                    url.origin().ascii_serialization(),
                    target.origin().ascii_serialization()
                ));
            }

            // 307/308 preserve the method and body; everything else
            // degrades to a bodyless GET.
            if !matches!(
                status,
                StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
            ) {
                method = Method::GET;
                body = None;
            }
            url = target;
            continue;
        }

        return materialize(response).await;
    }

    Err(anyhow!("too many redirects (limit {MAX_REDIRECT_HOPS})"))
}

fn parse_method(method: Option<&str>) -> Result<Method, AnyError> {
    let name = method.unwrap_or("GET").to_ascii_uppercase();
    Method::from_bytes(name.as_bytes()).map_err(|_| anyhow!("unsupported HTTP method '{name}'"))
}

/// Drain a terminal response into the wire shape handed back to JS. The
/// body is always fully materialized as a string; there is no streaming.
async fn materialize(response: reqwest::Response) -> Result<FetchResponse, AnyError> {
    let status = response.status();
    let url = response.url().to_string();
    let mut headers = HashMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.to_string(), value.to_string());
        }
    }
    let body = response
        .text()
        .await
        .map_err(|e| anyhow!("failed to read response body: {e}"))?;
    Ok(FetchResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        url,
        body,
    })
}
