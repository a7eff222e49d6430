use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, connect_async};

use ava_cancel::CancellationToken;
use ava_config::RelayConfig;
use ava_relay::RelayServer;

struct SeenHandshake {
  uri: String,
  authorization: Option<String>,
  beta: Option<String>,
}

fn header(req: &Request, name: &str) -> Option<String> {
  req
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::to_string)
}

#[tokio::test]
async fn relays_a_realtime_session_end_to_end() {
  // Stand-in for the upstream realtime endpoint
  let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let upstream_addr = upstream.local_addr().unwrap();
  let (seen_tx, seen_rx) = oneshot::channel::<SeenHandshake>();
  let (update_tx, update_rx) = oneshot::channel::<Value>();

  tokio::spawn(async move {
    let (stream, _) = upstream.accept().await.unwrap();
    let record = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
      let _ = seen_tx.send(SeenHandshake {
        uri: req.uri().to_string(),
        authorization: header(req, "authorization"),
        beta: header(req, "openai-beta"),
      });
      Ok(resp)
    };
    let mut ws = accept_hdr_async(stream, record).await.unwrap();

    ws.send(Message::text(
      json!({ "type": "session.created", "session": { "id": "sess_1" } }).to_string(),
    ))
    .await
    .unwrap();

    while let Some(Ok(frame)) = ws.next().await {
      if let Message::Text(text) = frame {
        let value: Value = serde_json::from_str(text.as_str()).unwrap();
        if value["type"] == "session.update" {
          let _ = update_tx.send(value);
          break;
        }
      }
    }
    let _ = ws.close(None).await;
  });

  let config = RelayConfig {
    listen: "127.0.0.1:0".to_string(),
    upstream_url: format!("ws://{upstream_addr}/v1/realtime"),
    model: "gpt-test".to_string(),
    instructions: "Help find care.".to_string(),
    ..RelayConfig::default()
  };
  let server = RelayServer::new(config, "sk-relay");
  let listener = server.bind().await.unwrap();
  let relay_addr = listener.local_addr().unwrap();
  let cancel = CancellationToken::new();
  let serve = tokio::spawn({
    let cancel = cancel.clone();
    async move { server.serve(listener, cancel).await }
  });

  let (mut browser, _) = connect_async(format!("ws://{relay_addr}/")).await.unwrap();

  let first = tokio::time::timeout(Duration::from_secs(5), browser.next())
    .await
    .unwrap();
  match first {
    Some(Ok(Message::Text(text))) => {
      let value: Value = serde_json::from_str(text.as_str()).unwrap();
      assert_eq!(value["type"], "session.created");
    }
    other => panic!("unexpected frame {other:?}"),
  }

  let seen = seen_rx.await.unwrap();
  assert_eq!(seen.uri, "/v1/realtime?model=gpt-test");
  assert_eq!(seen.authorization.as_deref(), Some("Bearer sk-relay"));
  assert_eq!(seen.beta.as_deref(), Some("realtime=v1"));

  let update = tokio::time::timeout(Duration::from_secs(5), update_rx)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(update["session"]["instructions"], "Help find care.");

  // Upstream closes after the update; the browser socket follows
  let closed = tokio::time::timeout(Duration::from_secs(5), async {
    loop {
      match browser.next().await {
        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
        Some(Ok(_)) => continue,
      }
    }
  })
  .await;
  assert!(closed.is_ok());

  cancel.cancel();
  serve.await.unwrap().unwrap();
}
