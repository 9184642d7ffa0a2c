use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use url::Url;

use crate::{Error, Result};

const USER_AGENT: &str = concat!("scenecast/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// `path` is relative; `base` always ends with a slash (see `config`).
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::Config(format!("Invalid endpoint {}{}: {}", base, path, e)))
}

/// Send `request` and decode the JSON body. Transport errors, non-2xx
/// statuses and undecodable bodies all become `UpstreamFetch`.
/// Errors never include the request URL: API keys travel in the query string.
pub(crate) async fn fetch_json(request: RequestBuilder, what: &str) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::UpstreamFetch(format!("{} request failed: {}", what, e.without_url())))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::UpstreamFetch(format!(
            "{} returned {}: {}",
            what, status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| {
            Error::UpstreamFetch(format!("{} returned invalid JSON: {}", what, e.without_url()))
        })
}
