use bytes::Bytes;

/// The end-of-file marker clients send after the last payload chunk.
pub const EOF_SENTINEL: &[u8] = b"{'eof' : 1}";

/// A data frame received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
  Text(String),
  Binary(Bytes),
}

impl Frame {
  pub fn text(text: impl Into<String>) -> Self { Frame::Text(text.into()) }

  pub fn binary(bytes: impl Into<Bytes>) -> Self { Frame::Binary(bytes.into()) }
}

/// How a frame received while a payload is being transferred is interpreted.
#[derive(Debug, PartialEq, Eq)]
pub enum PayloadFrame {
  /// A zero-length frame or the sentinel.
  End,
  Chunk(Bytes),
  /// Any other text frame.
  Unexpected,
}

impl From<Frame> for PayloadFrame {
  fn from(frame: Frame) -> Self {
    match frame {
      Frame::Binary(b) if b.is_empty() || b.as_ref() == EOF_SENTINEL => PayloadFrame::End,
      Frame::Binary(b) => PayloadFrame::Chunk(b),
      Frame::Text(t) if t.is_empty() || t.as_bytes() == EOF_SENTINEL => PayloadFrame::End,
      Frame::Text(_) => PayloadFrame::Unexpected,
    }
  }
}
