//! The connection session: one authenticated client, many units of work.
//!
//! A session is an explicit state machine driven over a [`Transport`]:
//!
//! ```text
//! AwaitingAuth ─▶ AwaitingMetadata ─▶ ReceivingPayload ─▶ Persisting ─▶ Acknowledging
//!                      ▲                                                     │
//!                      └─────────────────────────────────────────────────────┘
//! ```
//!
//! Any state moves to `Closed` when the client disconnects. Create-user
//! sessions skip `ReceivingPayload`.

mod frame;
#[cfg(test)]
mod tests;

use std::future::Future;

use det_core::{
  CorrelationId, Envelope, ErrorCode, metadata::MetadataMessage, store::ResultStore,
};
use tracing::{Instrument as _, Span, debug, info, info_span, warn};

pub use self::frame::{EOF_SENTINEL, Frame, PayloadFrame};
use crate::{
  auth::{CredentialChecker, Credentials},
  error::Error,
  ingest::Ingestor,
};

/// WebSocket close code sent after a failed authentication.
pub const AUTH_FAILED_CLOSE_CODE: u16 = 1002;

/// A bidirectional message channel to one client.
pub trait Transport: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The next data frame, or `None` once the client has gone away.
  fn recv(&mut self) -> impl Future<Output = Option<Frame>> + Send + '_;

  fn send_text(
    &mut self,
    text: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Close the connection with a protocol close code.
  fn close(
    &mut self,
    code: u16,
    reason: &'static str,
  ) -> impl Future<Output = ()> + Send + '_;
}

/// Which unit of work a session repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  SaveResult,
  CreateUser,
}

impl Operation {
  fn as_str(self) -> &'static str {
    match self {
      Operation::SaveResult => "save_result",
      Operation::CreateUser => "create_user",
    }
  }
}

/// Correlation context of one unit of work.
struct Unit {
  id:   CorrelationId,
  span: Span,
}

impl Unit {
  fn new(op: Operation) -> Self {
    let id = CorrelationId::new();
    let span = info_span!("unit", correlation_id = %id, operation = op.as_str());
    Self { id, span }
  }
}

enum State {
  AwaitingAuth,
  AwaitingMetadata,
  ReceivingPayload { unit: Unit, metadata: MetadataMessage, payload: Vec<u8> },
  Persisting { unit: Unit, metadata: MetadataMessage, payload: Vec<u8> },
  Acknowledging { unit: Unit, envelope: Envelope },
  Closed,
}

/// Drive one client connection until it closes.
///
/// Returns an error only when the session ends for a reason other than the
/// client going away, which today is a failed authentication.
pub async fn run<S, T>(
  ingestor: &Ingestor<S>,
  checker: &CredentialChecker,
  op: Operation,
  transport: &mut T,
) -> Result<(), Error>
where
  S: ResultStore,
  T: Transport,
{
  let mut session = Session { ingestor, checker, op, transport };
  let mut state = State::AwaitingAuth;
  loop {
    state = match state {
      State::Closed => {
        debug!(operation = op.as_str(), "session closed");
        return Ok(());
      }
      State::AwaitingAuth => session.authenticate().await?,
      State::AwaitingMetadata => session.await_metadata().await,
      State::ReceivingPayload { unit, metadata, payload } => {
        session.receive_payload(unit, metadata, payload).await
      }
      State::Persisting { unit, metadata, payload } => {
        session.persist(unit, metadata, payload).await
      }
      State::Acknowledging { unit, envelope } => session.acknowledge(unit, envelope).await,
    };
  }
}

struct Session<'a, S, T> {
  ingestor:  &'a Ingestor<S>,
  checker:   &'a CredentialChecker,
  op:        Operation,
  transport: &'a mut T,
}

impl<S: ResultStore, T: Transport> Session<'_, S, T> {
  async fn authenticate(&mut self) -> Result<State, Error> {
    let Some(frame) = self.transport.recv().await else {
      return Ok(State::Closed);
    };

    let credentials: Credentials = frame_text(frame)
      .and_then(|text| serde_json::from_str(&text).ok())
      .unwrap_or_default();

    let operation = self.op.as_str();
    info!(operation, login = %credentials.username, "session authorization attempt");
    if self.checker.check(&credentials.username, &credentials.password).await {
      return Ok(State::AwaitingMetadata);
    }

    warn!(operation, login = %credentials.username, "session authorization failed");
    let err = Error::AuthenticationFailed;
    if let Ok(text) = err.envelope().to_json()
      && let Err(e) = self.transport.send_text(text).await
    {
      debug!(error = %e, "authentication failure not delivered");
    }
    self.transport.close(AUTH_FAILED_CLOSE_CODE, "authentication failed").await;
    Err(err)
  }

  async fn await_metadata(&mut self) -> State {
    let Some(frame) = self.transport.recv().await else {
      return State::Closed;
    };

    let unit = Unit::new(self.op);
    let metadata = match frame_text(frame).map(|text| MetadataMessage::parse(&text)) {
      Some(Ok(metadata)) => metadata,
      Some(Err(e)) => {
        warn!(parent: &unit.span, error = %e, "metadata not parsed, treating as empty");
        MetadataMessage::empty()
      }
      None => {
        warn!(parent: &unit.span, "metadata frame is not valid UTF-8, treating as empty");
        MetadataMessage::empty()
      }
    };

    match self.op {
      Operation::SaveResult => {
        State::ReceivingPayload { unit, metadata, payload: Vec::new() }
      }
      Operation::CreateUser if metadata.is_empty() => {
        warn!(parent: &unit.span, "create-user metadata missing, unit abandoned");
        State::AwaitingMetadata
      }
      Operation::CreateUser => State::Persisting { unit, metadata, payload: Vec::new() },
    }
  }

  async fn receive_payload(
    &mut self,
    unit: Unit,
    metadata: MetadataMessage,
    mut payload: Vec<u8>,
  ) -> State {
    let Some(frame) = self.transport.recv().await else {
      let err = Error::TransferAborted { received: payload.len() };
      warn!(parent: &unit.span, error = %err, "client disconnected, unit discarded");
      return State::Closed;
    };

    match PayloadFrame::from(frame) {
      PayloadFrame::Chunk(chunk) => {
        payload.extend_from_slice(&chunk);
        State::ReceivingPayload { unit, metadata, payload }
      }
      PayloadFrame::End if payload.is_empty() => {
        State::Acknowledging { unit, envelope: Error::EmptyPayload.envelope() }
      }
      PayloadFrame::End => State::Persisting { unit, metadata, payload },
      PayloadFrame::Unexpected => {
        warn!(parent: &unit.span, received = payload.len(), "text frame during payload transfer");
        State::Acknowledging { unit, envelope: Error::UnexpectedFrame.envelope() }
      }
    }
  }

  async fn persist(&mut self, unit: Unit, metadata: MetadataMessage, payload: Vec<u8>) -> State {
    let ingestor = self.ingestor;
    let id = unit.id;
    let envelope = match self.op {
      Operation::SaveResult => {
        into_envelope(
          ingestor
            .save_result(id, &metadata, &payload)
            .instrument(unit.span.clone())
            .await,
        )
      }
      Operation::CreateUser => {
        into_envelope(
          ingestor
            .create_user(id, &metadata)
            .instrument(unit.span.clone())
            .await,
        )
      }
    };

    State::Acknowledging { unit, envelope }
  }

  async fn acknowledge(&mut self, unit: Unit, envelope: Envelope) -> State {
    let text = match envelope.to_json() {
      Ok(text) => text,
      Err(e) => {
        warn!(parent: &unit.span, error = %e, "acknowledgement not serialisable");
        return State::AwaitingMetadata;
      }
    };

    match self.transport.send_text(text).await {
      Ok(()) => {
        debug!(parent: &unit.span, error_code = envelope.error_code, "acknowledged");
        State::AwaitingMetadata
      }
      Err(e) => {
        debug!(parent: &unit.span, error = %e, "client gone before acknowledgement");
        State::Closed
      }
    }
  }
}

/// Text content of a frame; binary frames are accepted if they are UTF-8.
fn frame_text(frame: Frame) -> Option<String> {
  match frame {
    Frame::Text(text) => Some(text),
    Frame::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok(),
  }
}

fn into_envelope<D: serde::Serialize>(outcome: Result<D, Error>) -> Envelope {
  match outcome {
    Ok(data) => Envelope::success(&data)
      .unwrap_or_else(|e| Envelope::failure(ErrorCode::StoreFailure, e.to_string())),
    Err(e) => e.envelope(),
  }
}
