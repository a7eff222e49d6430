//! Shared HTTP plumbing for the REST clients

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::error::{AvaError, Result};

/// Build a client with a per-request timeout
pub fn create_client(timeout_secs: u64) -> Result<Client> {
  Ok(
    Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()?,
  )
}

/// Turn a non-2xx response into [`AvaError::Http`] carrying the body
pub async fn ensure_success(response: Response) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(AvaError::Http {
    status: status.as_u16(),
    body,
  })
}

/// Check the status, then decode the JSON body
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
  let response = ensure_success(response).await?;
  let text = response.text().await?;
  Ok(serde_json::from_str(&text)?)
}

/// Join a base URL and a path without doubling slashes
pub fn join_url(base: &str, path: &str) -> String {
  format!(
    "{}/{}",
    base.trim_end_matches('/'),
    path.trim_start_matches('/')
  )
}
