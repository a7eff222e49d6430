//! Frame pump between one client socket and its upstream socket

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use ava_cancel::CancellationToken;
use ava_protocol::FunctionCallDone;
use ava_protocol::realtime::{is_session_created, session_update};

use crate::{RelayError, Result};

/// Frame counts for one bridged session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BridgeStats {
  /// Data frames forwarded client -> upstream
  pub from_client: u64,
  /// Data frames forwarded upstream -> client
  pub from_upstream: u64,
  pub session_update_sent: bool,
}

enum Side {
  Client,
  Upstream,
}

/// Pump data frames both ways until either side closes or `cancel` fires.
///
/// Text and binary frames are forwarded as-is. Control frames stay on their
/// own hop. After the first upstream `session.created` has reached the
/// client, one `session.update` carrying `instructions` is sent upstream.
pub async fn bridge<C, U>(
  client: C,
  upstream: U,
  instructions: &str,
  cancel: &CancellationToken,
) -> Result<BridgeStats>
where
  C: Stream<Item = std::result::Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
  U: Stream<Item = std::result::Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
  let (mut client_tx, mut client_rx) = client.split();
  let (mut upstream_tx, mut upstream_rx) = upstream.split();
  let mut stats = BridgeStats::default();

  let outcome = async {
    Ok::<_, RelayError>(loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          debug!("relay session cancelled");
          let _ = client_tx.send(close_frame(CloseCode::Away, "relay shutting down")).await;
          let _ = upstream_tx.send(Message::Close(None)).await;
          break None;
        }
        frame = client_rx.next() => match frame {
          Some(Ok(msg @ (Message::Text(_) | Message::Binary(_)))) => {
            upstream_tx.send(msg).await?;
            stats.from_client += 1;
          }
          Some(Ok(Message::Close(frame))) => {
            let _ = upstream_tx.send(Message::Close(frame)).await;
            break Some(Side::Client);
          }
          Some(Ok(_)) => {}
          Some(Err(err)) => {
            debug!(error = %err, "client socket failed");
            let _ = upstream_tx.send(Message::Close(None)).await;
            break Some(Side::Client);
          }
          None => {
            let _ = upstream_tx.send(Message::Close(None)).await;
            break Some(Side::Client);
          }
        },
        frame = upstream_rx.next() => match frame {
          Some(Ok(Message::Text(text))) => {
            observe_upstream(text.as_str());
            let created = !stats.session_update_sent && is_session_created(text.as_str());
            client_tx.send(Message::Text(text)).await?;
            stats.from_upstream += 1;
            if created {
              let update = session_update(instructions).to_string();
              upstream_tx.send(Message::text(update)).await?;
              stats.session_update_sent = true;
              debug!("sent session.update upstream");
            }
          }
          Some(Ok(msg @ Message::Binary(_))) => {
            client_tx.send(msg).await?;
            stats.from_upstream += 1;
          }
          Some(Ok(Message::Close(frame))) => {
            let _ = client_tx.send(Message::Close(frame)).await;
            break Some(Side::Upstream);
          }
          Some(Ok(_)) => {}
          Some(Err(err)) => {
            warn!(error = %err, "upstream socket failed");
            let _ = client_tx.send(close_frame(CloseCode::Error, "upstream error")).await;
            break Some(Side::Upstream);
          }
          None => {
            let _ = client_tx.send(close_frame(CloseCode::Away, "upstream closed")).await;
            break Some(Side::Upstream);
          }
        },
      }
    })
  }
  .await;

  if let Ok(Some(side)) = &outcome {
    debug!(
      closed_by = match side {
        Side::Client => "client",
        Side::Upstream => "upstream",
      },
      "relay session closing"
    );
  }
  // Flushes any queued close replies; the peers may already be gone
  let _ = client_tx.close().await;
  let _ = upstream_tx.close().await;
  outcome.map(|_| stats)
}

fn close_frame(code: CloseCode, reason: &'static str) -> Message {
  Message::Close(Some(CloseFrame {
    code,
    reason: reason.into(),
  }))
}

fn observe_upstream(raw: &str) {
  let Some(call) = FunctionCallDone::parse(raw) else {
    return;
  };
  match call.map_filters() {
    Some(filters) => info!(call_id = %call.call_id, ?filters, "model updated map filters"),
    None => debug!(call_id = %call.call_id, "function call finished"),
  }
}
