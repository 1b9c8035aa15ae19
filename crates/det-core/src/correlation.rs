//! Per-unit correlation identifiers.

use std::fmt;

use uuid::Uuid;

/// Opaque identifier minted once per unit of work and carried through every
/// call that handles it. Used only to tie log lines together; it is never
/// sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for CorrelationId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for CorrelationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.hyphenated().fmt(f)
  }
}
