//! Session state machine tests over a scripted in-memory transport.

use std::{collections::VecDeque, path::Path, sync::Arc};

use det_core::{Envelope, store::{ResultStore, Table}};
use det_store_sqlite::SqliteStore;
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::sink::FileSink;

// ─── Scripted transport ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("connection closed by peer")]
struct PeerGone;

/// Replays a fixed list of frames, then reports a disconnect.
#[derive(Default)]
struct ScriptedTransport {
  incoming:    VecDeque<Frame>,
  sent:        Vec<String>,
  closed_with: Option<u16>,
  fail_sends:  bool,
}

impl ScriptedTransport {
  fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
    Self { incoming: frames.into_iter().collect(), ..Default::default() }
  }

  fn envelopes(&self) -> Vec<Envelope> {
    self.sent.iter().map(|text| serde_json::from_str(text).unwrap()).collect()
  }
}

impl Transport for ScriptedTransport {
  type Error = PeerGone;

  async fn recv(&mut self) -> Option<Frame> { self.incoming.pop_front() }

  async fn send_text(&mut self, text: String) -> Result<(), PeerGone> {
    if self.fail_sends {
      return Err(PeerGone);
    }
    self.sent.push(text);
    Ok(())
  }

  async fn close(&mut self, code: u16, _reason: &'static str) {
    self.closed_with = Some(code);
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct Harness {
  dir:      TempDir,
  store:    Arc<SqliteStore>,
  ingestor: Ingestor<SqliteStore>,
  checker:  CredentialChecker,
}

impl Harness {
  async fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let ingestor = Ingestor::new(store.clone(), FileSink::new(dir.path()));
    let hash = det_core::user::hash_password("secret").unwrap();
    let checker = CredentialChecker::new("svc", hash);
    Self { dir, store, ingestor, checker }
  }

  async fn run(&self, op: Operation, transport: &mut ScriptedTransport) -> Result<(), Error> {
    run(&self.ingestor, &self.checker, op, transport).await
  }

  fn files(&self) -> Vec<String> { files_in(self.dir.path()) }
}

fn files_in(dir: &Path) -> Vec<String> {
  let mut names: Vec<String> = std::fs::read_dir(dir)
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  names.sort();
  names
}

fn login() -> Frame { Frame::text(r#"{"username": "svc", "password": "secret"}"#) }

const TWO_MATERIALS: &str = r#"[{"mlCode": 0, "coords": [1, 2, 3, 4], "conf": 0.8}, {"mlCode": 1, "coords": [5, 6, 7, 8], "conf": 0.6}]"#;

fn result_metadata(name: &str, materials: &str) -> Frame {
  Frame::text(
    json!({
      "image_file": {"name": format!("C:\\runs\\{name}")},
      "isComplete": true,
      "confidence": 0.9,
      "speedMs": 120,
      "username": "operator",
      "materials": materials,
    })
    .to_string(),
  )
}

fn user_metadata(name: &str, email: &str) -> Frame {
  Frame::text(
    json!({"username": name, "useremail": email, "userpassword": "pw"}).to_string(),
  )
}

fn chunk(bytes: &'static [u8]) -> Frame { Frame::binary(bytes) }

fn end() -> Frame { Frame::binary(EOF_SENTINEL) }

// ─── Authentication ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_authentication_closes_with_1002() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    Frame::text(r#"{"username": "svc", "password": "wrong"}"#),
    result_metadata("a.jpg", "[]"),
  ]);

  let err = h.run(Operation::SaveResult, &mut t).await.unwrap_err();
  assert!(matches!(err, Error::AuthenticationFailed));

  let sent = t.envelopes();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].error_code, 1002);
  assert!(!sent[0].ok);
  assert_eq!(t.closed_with, Some(AUTH_FAILED_CLOSE_CODE));
  // Nothing after the credentials is read.
  assert_eq!(t.incoming.len(), 1);
}

#[tokio::test]
async fn undeliverable_authentication_failure_still_closes() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([Frame::text(r#"{"username": "svc", "password": "nope"}"#)]);
  t.fail_sends = true;

  let err = h.run(Operation::SaveResult, &mut t).await.unwrap_err();
  assert!(matches!(err, Error::AuthenticationFailed));
  assert!(t.sent.is_empty());
  assert_eq!(t.closed_with, Some(AUTH_FAILED_CLOSE_CODE));
}

#[tokio::test]
async fn unparseable_credentials_fail_authentication() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([Frame::text("hello")]);
  assert!(h.run(Operation::CreateUser, &mut t).await.is_err());
  assert_eq!(t.closed_with, Some(1002));
}

#[tokio::test]
async fn disconnect_before_authentication_is_not_an_error() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([]);
  h.run(Operation::SaveResult, &mut t).await.unwrap();
  assert!(t.sent.is_empty());
}

// ─── Save result ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_result_persists_rows_and_file() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    login(),
    result_metadata("frame.jpg", TWO_MATERIALS),
    chunk(b"abc"),
    chunk(b"def"),
    end(),
  ]);

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 1);
  assert!(sent[0].ok);
  assert_eq!(sent[0].error_code, 0);
  assert_eq!(
    sent[0].data,
    json!({"activityId": 1, "fileName": "frame.jpg", "materials": 2, "bytes": 6})
  );

  let activities = h.store.list_activities().await.unwrap();
  assert_eq!(activities.len(), 1);
  assert_eq!(activities[0].image_path, "frame.jpg");
  assert_eq!(activities[0].duration_ms, Some(120));
  assert_eq!(activities[0].username.as_deref(), Some("operator"));
  assert_eq!(h.store.list_materials(1).await.unwrap().len(), 2);

  assert_eq!(h.files(), ["frame.jpg"]);
  assert_eq!(std::fs::read(h.dir.path().join("frame.jpg")).unwrap(), b"abcdef");
}

#[tokio::test]
async fn text_sentinel_and_zero_length_frame_end_the_payload() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    login(),
    result_metadata("one.jpg", "[]"),
    chunk(b"1"),
    Frame::text("{'eof' : 1}"),
    result_metadata("two.jpg", "[]"),
    chunk(b"22"),
    Frame::binary(Vec::new()),
  ]);

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 2);
  assert!(sent.iter().all(|e| e.ok));
  assert_eq!(sent[0].data["activityId"], 1);
  assert_eq!(sent[1].data["activityId"], 2);
  assert_eq!(h.files(), ["one.jpg", "two.jpg"]);
}

#[tokio::test]
async fn zero_length_frame_stops_accumulation_early() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    login(),
    result_metadata("z.jpg", "[]"),
    chunk(b"ab"),
    Frame::binary(Vec::new()),
    chunk(b"cd"),
    chunk(b"ef"),
  ]);

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  // "cd" is read as the next unit's metadata and "ef" as its unfinished
  // payload, which the disconnect discards.
  let sent = t.envelopes();
  assert_eq!(sent.len(), 1);
  assert!(sent[0].ok);
  assert_eq!(sent[0].data["bytes"], 2);
  assert_eq!(std::fs::read(h.dir.path().join("z.jpg")).unwrap(), b"ab");
  assert_eq!(h.store.count_rows(Table::Activity).await.unwrap(), 1);
}

#[tokio::test]
async fn long_image_names_are_saved() {
  let h = Harness::new().await;
  let name = format!("{}.jpg", "a".repeat(230));
  let mut t = ScriptedTransport::new([
    login(),
    result_metadata(&name, "[]"),
    chunk(b"abc"),
    end(),
  ]);

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 1);
  assert!(sent[0].ok, "{:?}", sent[0]);
  assert_eq!(h.files(), [name]);
}

#[tokio::test]
async fn disconnect_mid_transfer_persists_nothing() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    login(),
    result_metadata("frame.jpg", TWO_MATERIALS),
    chunk(b"partial"),
  ]);

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  assert!(t.sent.is_empty());
  assert_eq!(h.store.count_rows(Table::Activity).await.unwrap(), 0);
  assert_eq!(h.store.count_rows(Table::ActivityMaterial).await.unwrap(), 0);
  assert!(h.files().is_empty());
}

#[tokio::test]
async fn malformed_metadata_drains_payload_then_reports() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    login(),
    Frame::text("{not json"),
    chunk(b"ignored"),
    end(),
    result_metadata("ok.jpg", "[]"),
    chunk(b"x"),
    end(),
  ]);

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 2);
  assert_eq!(sent[0].error_code, -400);
  assert!(sent[1].ok);
  assert_eq!(sent[1].data["activityId"], 1);
  assert_eq!(h.files(), ["ok.jpg"]);
}

#[tokio::test]
async fn empty_payload_is_reported_without_persisting() {
  let h = Harness::new().await;
  let mut t =
    ScriptedTransport::new([login(), result_metadata("frame.jpg", TWO_MATERIALS), end()]);

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].error_code, -422);
  assert_eq!(h.store.count_rows(Table::Activity).await.unwrap(), 0);
  assert!(h.files().is_empty());
}

#[tokio::test]
async fn stray_text_frame_ends_the_unit() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    login(),
    result_metadata("frame.jpg", "[]"),
    chunk(b"abc"),
    Frame::text("what?"),
  ]);

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].error_code, -400);
  assert_eq!(h.store.count_rows(Table::Activity).await.unwrap(), 0);
}

#[tokio::test]
async fn store_failure_leaves_no_rows_and_no_file() {
  let h = Harness::new().await;
  // Material class 9 is not seeded, so the transaction fails on its FK.
  let materials = r#"[{"mlCode": 0, "coords": [], "conf": 0.5}, {"mlCode": 9, "coords": [], "conf": 0.5}]"#;
  let mut t = ScriptedTransport::new([
    login(),
    result_metadata("frame.jpg", materials),
    chunk(b"abc"),
    end(),
  ]);

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].error_code, -500);
  assert_eq!(h.store.count_rows(Table::Activity).await.unwrap(), 0);
  assert_eq!(h.store.count_rows(Table::ActivityMaterial).await.unwrap(), 0);
  assert!(h.files().is_empty());
}

#[tokio::test]
async fn failed_acknowledgement_ends_session_quietly() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    login(),
    result_metadata("frame.jpg", "[]"),
    chunk(b"abc"),
    end(),
    result_metadata("never.jpg", "[]"),
  ]);
  t.fail_sends = true;

  h.run(Operation::SaveResult, &mut t).await.unwrap();

  // The unit was persisted before the send failed; nothing after it was read.
  assert_eq!(h.store.count_rows(Table::Activity).await.unwrap(), 1);
  assert_eq!(t.incoming.len(), 1);
}

// ─── Create user ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_user_reports_duplicates_by_field() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    login(),
    user_metadata("ann", "ann@example.com"),
    user_metadata("ann", "other@example.com"),
    user_metadata("anne", "ann@example.com"),
  ]);

  h.run(Operation::CreateUser, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 3);
  assert!(sent[0].ok);
  assert_eq!(sent[0].data, json!({"id": 1, "name": "ann", "email": "ann@example.com"}));
  assert_eq!(sent[1].error_code, -501);
  assert_eq!(sent[2].error_code, -502);
  assert_eq!(h.store.count_rows(Table::User).await.unwrap(), 1);

  let verified = h.store.verify_user("ann@example.com", "pw").await.unwrap();
  assert_eq!(verified.name, "ann");
}

#[tokio::test]
async fn create_user_without_metadata_is_abandoned_silently() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([
    login(),
    Frame::text("garbage"),
    Frame::text("{}"),
    user_metadata("bob", "bob@example.com"),
  ]);

  h.run(Operation::CreateUser, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 1);
  assert!(sent[0].ok);
  assert_eq!(sent[0].data["name"], "bob");
}

#[tokio::test]
async fn create_user_with_missing_fields_is_malformed() {
  let h = Harness::new().await;
  let mut t = ScriptedTransport::new([login(), Frame::text(r#"{"username": "carl"}"#)]);

  h.run(Operation::CreateUser, &mut t).await.unwrap();

  let sent = t.envelopes();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].error_code, -400);
  assert_eq!(h.store.count_rows(Table::User).await.unwrap(), 0);
}
