//! Accept loop and upstream dialing

use std::net::SocketAddr;
use std::time::Duration;

use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{accept_async, connect_async};
use tracing::{debug, info, warn};

use ava_cancel::{CancellationToken, sleep_or_cancel};
use ava_config::RelayConfig;

use crate::bridge::bridge;
use crate::{RelayError, Result};

const REALTIME_BETA: &str = "realtime=v1";

/// Pause after a failed accept before the next attempt
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Realtime relay bound to one upstream endpoint and key
#[derive(Clone)]
pub struct RelayServer {
  config: RelayConfig,
  api_key: String,
}

impl RelayServer {
  pub fn new(config: RelayConfig, api_key: impl Into<String>) -> Self {
    Self {
      config,
      api_key: api_key.into(),
    }
  }

  /// Build from configuration; the key comes from `relay.api_key_env`
  pub fn from_config(config: &RelayConfig) -> Result<Self> {
    Ok(Self::new(config.clone(), config.api_key()?))
  }

  pub async fn bind(&self) -> Result<TcpListener> {
    Ok(TcpListener::bind(&self.config.listen).await?)
  }

  /// Handshake request for the upstream socket
  pub fn upstream_request(&self) -> Result<Request<()>> {
    let mut request = self.config.upstream_endpoint().into_client_request()?;
    let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
      .map_err(|_| RelayError::InvalidHeader("Authorization"))?;
    let headers = request.headers_mut();
    headers.insert("Authorization", auth);
    headers.insert("OpenAI-Beta", HeaderValue::from_static(REALTIME_BETA));
    Ok(request)
  }

  /// Accept clients until `cancel` fires. Each client gets its own
  /// upstream socket; cancelling also closes live sessions.
  pub async fn serve(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
    let local = listener.local_addr()?;
    info!(%local, upstream = %self.config.upstream_url, "realtime relay listening");

    loop {
      let (stream, peer) = tokio::select! {
        _ = cancel.cancelled() => break,
        accepted = listener.accept() => match accepted {
          Ok(conn) => conn,
          Err(err) => {
            warn!(error = %err, "accept failed");
            if !pause_after_accept_error(&cancel).await {
              break;
            }
            continue;
          }
        },
      };

      let server = self.clone();
      let session_cancel = cancel.child_token();
      tokio::spawn(async move {
        if let Err(err) = server.handle(stream, peer, session_cancel).await {
          warn!(%peer, error = %err, "relay session failed");
        }
      });
    }

    info!("realtime relay stopped");
    Ok(())
  }

  async fn handle(
    &self,
    stream: TcpStream,
    peer: SocketAddr,
    cancel: CancellationToken,
  ) -> Result<()> {
    let mut client = accept_async(stream).await?;
    debug!(%peer, "client connected");

    let upstream = match connect_async(self.upstream_request()?).await {
      Ok((upstream, _response)) => upstream,
      Err(err) => {
        warn!(%peer, error = %err, "upstream connect failed");
        let _ = client
          .send(Message::Close(Some(CloseFrame {
            code: CloseCode::Error,
            reason: "upstream unavailable".into(),
          })))
          .await;
        return Err(err.into());
      }
    };

    let stats = bridge(client, upstream, &self.config.instructions, &cancel).await?;
    info!(
      %peer,
      from_client = stats.from_client,
      from_upstream = stats.from_upstream,
      "client disconnected"
    );
    Ok(())
  }
}

/// False when `cancel` fired during the pause
async fn pause_after_accept_error(cancel: &CancellationToken) -> bool {
  sleep_or_cancel(ACCEPT_RETRY_DELAY, cancel).await.is_ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn upstream_request_carries_model_and_headers() {
    let config = RelayConfig {
      upstream_url: "wss://realtime.test/v1/realtime".to_string(),
      model: "gpt-test".to_string(),
      ..RelayConfig::default()
    };
    let request = RelayServer::new(config, "sk-live").upstream_request().unwrap();

    assert_eq!(request.uri().to_string(), "wss://realtime.test/v1/realtime?model=gpt-test");
    assert_eq!(request.headers()["Authorization"], "Bearer sk-live");
    assert_eq!(request.headers()["OpenAI-Beta"], "realtime=v1");
  }

  #[tokio::test]
  async fn accept_errors_back_off_before_retrying() {
    let cancel = CancellationToken::new();
    let started = std::time::Instant::now();
    assert!(pause_after_accept_error(&cancel).await);
    assert!(started.elapsed() >= ACCEPT_RETRY_DELAY);
  }

  #[tokio::test]
  async fn accept_backoff_ends_on_cancel() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(!pause_after_accept_error(&cancel).await);
  }

  #[test]
  fn rejects_keys_that_are_not_header_safe() {
    let err = RelayServer::new(RelayConfig::default(), "bad\nkey")
      .upstream_request()
      .unwrap_err();
    assert!(matches!(err, RelayError::InvalidHeader("Authorization")));
  }
}
