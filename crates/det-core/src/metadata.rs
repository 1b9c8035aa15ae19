//! Parsing of the metadata text message that opens every unit of work.
//!
//! A [`MetadataMessage`] is the loosely-typed JSON object as received. The
//! typed views ([`ResultMetadata`], [`CreateUserRequest`]) are extracted from
//! it only once the unit is about to be persisted, so a malformed message
//! never stops the session from draining the payload that follows it.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  activity::{DEFAULT_ACTIVITY_CLASS, MaterialDetection, NewActivity},
  user::NewUser,
};

// ─── Raw message ─────────────────────────────────────────────────────────────

/// A metadata message: the original text and its top-level JSON object.
#[derive(Debug, Clone, Default)]
pub struct MetadataMessage {
  text:   String,
  fields: Map<String, Value>,
}

impl MetadataMessage {
  /// Parse `text`, which must hold a JSON object.
  pub fn parse(text: &str) -> Result<Self> {
    match serde_json::from_str::<Value>(text) {
      Ok(Value::Object(fields)) => Ok(Self { text: text.to_owned(), fields }),
      Ok(other) => Err(Error::MalformedMetadata(format!(
        "expected a JSON object, got {}",
        json_kind(&other)
      ))),
      Err(e) => Err(Error::MalformedMetadata(e.to_string())),
    }
  }

  /// The message used in place of one that failed to parse.
  pub fn empty() -> Self { Self::default() }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  /// The message exactly as received.
  pub fn text(&self) -> &str { &self.text }

  fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
    serde_json::from_value(Value::Object(self.fields.clone()))
      .map_err(|e| Error::MalformedMetadata(e.to_string()))
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

// ─── Save-result metadata ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawImageFile {
  name: String,
}

#[derive(Deserialize)]
struct RawMaterial {
  #[serde(rename = "mlCode")]
  ml_code: i64,
  #[serde(default)]
  coords:  Value,
  #[serde(default)]
  conf:    Option<f64>,
}

/// Older clients send `materials` as a JSON-encoded string; newer ones may
/// send the array inline.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMaterials {
  Encoded(String),
  Inline(Vec<RawMaterial>),
}

#[derive(Deserialize)]
struct RawResultMetadata {
  image_file:  RawImageFile,
  #[serde(rename = "isComplete", default)]
  is_complete: Option<bool>,
  #[serde(default)]
  confidence:  Option<f64>,
  #[serde(rename = "speedMs", default)]
  speed_ms:    Option<i64>,
  #[serde(default)]
  username:    Option<String>,
  #[serde(default)]
  materials:   Option<RawMaterials>,
}

/// Typed view of a save-result metadata message.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMetadata {
  /// Basename of `image_file.name`.
  pub image_name:     String,
  pub is_complete:    Option<bool>,
  pub confidence:     Option<f64>,
  pub duration_ms:    Option<i64>,
  pub username:       Option<String>,
  pub materials:      Vec<MaterialDetection>,
  pub result_payload: String,
}

impl ResultMetadata {
  pub fn from_message(message: &MetadataMessage) -> Result<Self> {
    let raw: RawResultMetadata = message.decode()?;

    let image_name = basename(&raw.image_file.name);
    if image_name.is_empty() || image_name == "." || image_name == ".." {
      return Err(Error::MalformedMetadata(format!(
        "image_file.name {:?} has no usable file name",
        raw.image_file.name
      )));
    }

    let materials = match raw.materials {
      None => Vec::new(),
      Some(RawMaterials::Inline(list)) => list,
      Some(RawMaterials::Encoded(text)) => serde_json::from_str(&text)
        .map_err(|e| Error::MalformedMetadata(format!("materials: {e}")))?,
    };

    let materials = materials
      .into_iter()
      .map(|m| MaterialDetection {
        material_class_id: m.ml_code,
        coordinates:       m.coords.to_string(),
        confidence:        m.conf,
      })
      .collect();

    Ok(Self {
      image_name: image_name.to_owned(),
      is_complete: raw.is_complete,
      confidence: raw.confidence,
      duration_ms: raw.speed_ms,
      username: raw.username,
      materials,
      result_payload: message.text().to_owned(),
    })
  }

  /// Split into the activity row and its material rows.
  pub fn into_parts(self) -> (NewActivity, Vec<MaterialDetection>) {
    let activity = NewActivity {
      class_id:       DEFAULT_ACTIVITY_CLASS,
      image_path:     self.image_name,
      is_complete:    self.is_complete,
      confidence:     self.confidence,
      result_payload: self.result_payload,
      duration_ms:    self.duration_ms,
      username:       self.username,
    };
    (activity, self.materials)
  }
}

/// Last path component of a client-side path, for either separator style.
pub fn basename(path: &str) -> &str {
  path.rsplit(['/', '\\']).next().unwrap_or(path)
}

// ─── Create-user metadata ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawCreateUser {
  username:     String,
  useremail:    String,
  userpassword: String,
}

/// Typed view of a create-user metadata message.
#[derive(Clone)]
pub struct CreateUserRequest {
  pub user: NewUser,
}

impl CreateUserRequest {
  pub fn from_message(message: &MetadataMessage) -> Result<Self> {
    let raw: RawCreateUser = message.decode()?;
    if raw.username.trim().is_empty() || raw.useremail.trim().is_empty() {
      return Err(Error::MalformedMetadata(
        "username and useremail must not be blank".to_owned(),
      ));
    }
    Ok(Self {
      user: NewUser {
        name:     raw.username,
        email:    raw.useremail,
        password: raw.userpassword,
      },
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn message(text: &str) -> MetadataMessage {
    MetadataMessage::parse(text).unwrap()
  }

  #[test]
  fn rejects_non_object_json() {
    assert!(matches!(
      MetadataMessage::parse("[1, 2]"),
      Err(Error::MalformedMetadata(_))
    ));
    assert!(matches!(
      MetadataMessage::parse("not json"),
      Err(Error::MalformedMetadata(_))
    ));
  }

  #[test]
  fn parses_full_result_metadata() {
    let text = r#"{
      "image_file": {"name": "C:\\captures\\run-7\\frame_0001.jpg"},
      "isComplete": true,
      "confidence": 0.91,
      "speedMs": 140,
      "username": "operator",
      "materials": "[{\"mlCode\": 0, \"coords\": [1, 2, 3, 4], \"conf\": 0.8}, {\"mlCode\": 1, \"coords\": [5, 6, 7, 8], \"conf\": null}]"
    }"#;
    let meta = ResultMetadata::from_message(&message(text)).unwrap();

    assert_eq!(meta.image_name, "frame_0001.jpg");
    assert_eq!(meta.is_complete, Some(true));
    assert_eq!(meta.duration_ms, Some(140));
    assert_eq!(meta.username.as_deref(), Some("operator"));
    assert_eq!(meta.result_payload, text);
    assert_eq!(meta.materials.len(), 2);
    assert_eq!(meta.materials[0].material_class_id, 0);
    assert_eq!(meta.materials[0].coordinates, "[1,2,3,4]");
    assert_eq!(meta.materials[1].confidence, None);
  }

  #[test]
  fn inline_and_missing_materials() {
    let inline = message(
      r#"{"image_file": {"name": "a/b.png"}, "materials": [{"mlCode": 1, "coords": {"x": 1}}]}"#,
    );
    let meta = ResultMetadata::from_message(&inline).unwrap();
    assert_eq!(meta.materials.len(), 1);
    assert_eq!(meta.materials[0].coordinates, r#"{"x":1}"#);

    let bare = message(r#"{"image_file": {"name": "b.png"}}"#);
    assert!(ResultMetadata::from_message(&bare).unwrap().materials.is_empty());
  }

  #[test]
  fn missing_image_name_is_malformed() {
    let meta = message(r#"{"isComplete": false}"#);
    assert!(matches!(
      ResultMetadata::from_message(&meta),
      Err(Error::MalformedMetadata(_))
    ));
    assert!(ResultMetadata::from_message(&MetadataMessage::empty()).is_err());
  }

  #[test]
  fn directory_like_names_are_rejected() {
    for name in ["runs/", "..", "runs/.."] {
      let text = format!(r#"{{"image_file": {{"name": "{name}"}}}}"#);
      assert!(
        ResultMetadata::from_message(&message(&text)).is_err(),
        "{name} should be rejected"
      );
    }
  }

  #[test]
  fn basename_handles_both_separators() {
    assert_eq!(basename("/srv/runs/x.jpg"), "x.jpg");
    assert_eq!(basename("D:\\runs\\y.jpg"), "y.jpg");
    assert_eq!(basename("z.jpg"), "z.jpg");
  }

  #[test]
  fn create_user_request_requires_all_fields() {
    let ok = message(r#"{"username": "ann", "useremail": "ann@example.com", "userpassword": "pw"}"#);
    let req = CreateUserRequest::from_message(&ok).unwrap();
    assert_eq!(req.user.name, "ann");
    assert_eq!(req.user.email, "ann@example.com");

    let missing = message(r#"{"username": "ann"}"#);
    assert!(CreateUserRequest::from_message(&missing).is_err());
  }
}
