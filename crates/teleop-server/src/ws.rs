//! WebSocket transport: one upgraded socket becomes one [`Connection`] on the
//! shared [`Router`].

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use teleop_core::{Connection, MpscChannel, Router};
use teleop_types::{InboundMessage, RelayError, decode, decode_bytes};
use tracing::{debug, info, warn};

/// Pump frames between `socket` and `router` until either side goes away,
/// then report the close exactly once.
pub(crate) async fn relay_socket(socket: WebSocket, router: Arc<Router>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (channel, mut outbound) = MpscChannel::new();
    let mut connection = Connection::new(Arc::new(channel));
    info!(connection = %connection.id(), "new connection");

    loop {
        tokio::select! {
            // ── Router → peer ───────────────────────────────────────────────
            Some(message) = outbound.recv() => {
                match message.to_json() {
                    Ok(json) => {
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(connection = %connection.id(), error = %e, "outbound encode failed"),
                }
            }
            // ── Peer → Router ───────────────────────────────────────────────
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch(&router, &mut connection, decode(text.as_str()));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        dispatch(&router, &mut connection, decode_bytes(&bytes));
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(connection = %connection.id(), error = %e, "ws read error");
                        break;
                    }
                    // Pings are answered by the websocket layer.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!(connection = %connection.id(), "connection closed");
    router.handle_close(connection);
}

fn dispatch(
    router: &Router,
    connection: &mut Connection,
    decoded: Result<InboundMessage, RelayError>,
) {
    match decoded {
        Ok(message) => {
            debug!(connection = %connection.id(), kind = message.kind(), "inbound message");
            router.handle_message(connection, message);
        }
        Err(e) => {
            warn!(connection = %connection.id(), error = %e, "malformed message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teleop_types::OutboundMessage;

    #[tokio::test]
    async fn dispatch_routes_valid_message() {
        let router = Router::default();
        let (channel, mut rx) = MpscChannel::new();
        let mut conn = Connection::new(Arc::new(channel));

        dispatch(
            &router,
            &mut conn,
            decode(r#"{"type":"register_car","carId":"car1","streamUrl":"rtsp://x"}"#),
        );

        assert!(matches!(rx.recv().await, Some(OutboundMessage::Registered(_))));
        assert_eq!(router.stats().vehicles, 1);
    }

    #[tokio::test]
    async fn dispatch_drops_malformed_message() {
        let router = Router::default();
        let (channel, mut rx) = MpscChannel::new();
        let mut conn = Connection::new(Arc::new(channel));

        dispatch(&router, &mut conn, decode("not json at all"));
        dispatch(&router, &mut conn, decode(r#"{"type":"launch_missiles"}"#));

        assert!(rx.try_recv().is_err());
        assert_eq!(router.stats(), Default::default());
        assert!(conn.vehicle_id().is_none());
    }
}
