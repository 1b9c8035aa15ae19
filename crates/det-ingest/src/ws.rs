//! axum WebSocket adapter for the session state machine.

use axum::{
  extract::{
    State,
    ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
  },
  response::Response,
};
use det_core::store::ResultStore;
use tracing::{debug, info};

use crate::{
  AppState,
  session::{self, Frame, Operation, Transport},
};

/// A [`Transport`] over an upgraded axum WebSocket.
pub struct WsTransport {
  socket: WebSocket,
}

impl WsTransport {
  pub fn new(socket: WebSocket) -> Self { Self { socket } }
}

impl Transport for WsTransport {
  type Error = axum::Error;

  async fn recv(&mut self) -> Option<Frame> {
    loop {
      match self.socket.recv().await? {
        Ok(Message::Text(text)) => return Some(Frame::Text(text.as_str().to_owned())),
        Ok(Message::Binary(bytes)) => return Some(Frame::Binary(bytes)),
        Ok(Message::Ping(_) | Message::Pong(_)) => continue,
        Ok(Message::Close(frame)) => {
          debug!(?frame, "client closed the connection");
          return None;
        }
        Err(e) => {
          debug!(error = %e, "websocket receive failed");
          return None;
        }
      }
    }
  }

  async fn send_text(&mut self, text: String) -> Result<(), axum::Error> {
    self.socket.send(Message::Text(text.into())).await
  }

  async fn close(&mut self, code: u16, reason: &'static str) {
    let frame = CloseFrame { code, reason: Utf8Bytes::from_static(reason) };
    if let Err(e) = self.socket.send(Message::Close(Some(frame))).await {
      debug!(error = %e, "close frame not delivered");
    }
  }
}

/// `GET /ws/save_result`
pub async fn save_result<S>(State(state): State<AppState<S>>, ws: WebSocketUpgrade) -> Response
where
  S: ResultStore + 'static,
{
  upgrade(state, ws, Operation::SaveResult)
}

/// `GET /ws/create_user`
pub async fn create_user<S>(State(state): State<AppState<S>>, ws: WebSocketUpgrade) -> Response
where
  S: ResultStore + 'static,
{
  upgrade(state, ws, Operation::CreateUser)
}

fn upgrade<S>(state: AppState<S>, ws: WebSocketUpgrade, op: Operation) -> Response
where
  S: ResultStore + 'static,
{
  ws.max_message_size(state.config.max_message_size)
    .on_upgrade(move |socket| async move {
      info!(operation = ?op, "websocket session opened");
      let mut transport = WsTransport::new(socket);
      match session::run(&state.ingestor, &state.checker, op, &mut transport).await {
        Ok(()) => info!(operation = ?op, "websocket session ended"),
        Err(e) => info!(operation = ?op, error = %e, "websocket session terminated"),
      }
    })
}
