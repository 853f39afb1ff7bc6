//! # Server Records
//!
//! The typed boundary between the media server's free-form responses and the
//! rest of Marquee.
//!
//! ## Ingestion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Response → ServerRecord                           │
//! │                                                                         │
//! │  { "MediaContainer": {            ServerRecord { tag: MediaContainer,   │
//! │      "size": 1,                     attributes: { size: 1 },            │
//! │      "Metadata": [ {          ──►   children: [                         │
//! │         "type": "movie",              ServerRecord { tag: Video,        │
//! │         "title": "Movie A",             title: "Movie A",               │
//! │         "User": { ... },                children: [User, Player, ...]   │
//! │         "Player": { ... }             }                                 │
//! │      } ]                            ]                                   │
//! │  } }                              }                                     │
//! │                                                                         │
//! │  Capitalised object/array members become child records tagged with     │
//! │  their member name. Everything else is kept verbatim as attributes.    │
//! │  The older `_elementType` / `_children` shape is accepted as well.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Record Tag
// =============================================================================

/// Type discriminator of a server record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordTag {
    /// Top-level response wrapper.
    MediaContainer,
    /// Library section or other browsable directory.
    Directory,
    /// Movie, episode or clip.
    Video,
    /// Music track.
    Track,
    /// Photo.
    Photo,
    /// Metadata entry whose kind could not be narrowed.
    Metadata,
    /// A media server known to this one.
    Server,
    /// Account watching a session.
    User,
    /// Device playing a session.
    Player,
    /// Transcoder attached to a session.
    TranscodeSession,
    /// Session descriptor of a playback.
    Session,
    /// Media part descriptor.
    Media,
    /// Anything else, kept by name.
    Other(String),
}

impl RecordTag {
    /// Returns the wire name of this tag.
    pub fn as_str(&self) -> &str {
        match self {
            RecordTag::MediaContainer => "MediaContainer",
            RecordTag::Directory => "Directory",
            RecordTag::Video => "Video",
            RecordTag::Track => "Track",
            RecordTag::Photo => "Photo",
            RecordTag::Metadata => "Metadata",
            RecordTag::Server => "Server",
            RecordTag::User => "User",
            RecordTag::Player => "Player",
            RecordTag::TranscodeSession => "TranscodeSession",
            RecordTag::Session => "Session",
            RecordTag::Media => "Media",
            RecordTag::Other(name) => name,
        }
    }

    /// Resolves the tag of a child element from its member name and body.
    ///
    /// JSON responses file every playable item under `Metadata`; the item's
    /// `type` attribute narrows it back to the element kind.
    fn for_element(name: &str, body: &Value) -> RecordTag {
        if name != "Metadata" {
            return RecordTag::from(name.to_string());
        }

        match body.get("type").and_then(Value::as_str) {
            Some("movie" | "episode" | "clip" | "trailer") => RecordTag::Video,
            Some("track") => RecordTag::Track,
            Some("photo") => RecordTag::Photo,
            _ => RecordTag::Metadata,
        }
    }
}

impl From<String> for RecordTag {
    fn from(name: String) -> Self {
        match name.as_str() {
            "MediaContainer" => RecordTag::MediaContainer,
            "Directory" => RecordTag::Directory,
            "Video" => RecordTag::Video,
            "Track" => RecordTag::Track,
            "Photo" => RecordTag::Photo,
            "Metadata" => RecordTag::Metadata,
            "Server" => RecordTag::Server,
            "User" => RecordTag::User,
            "Player" => RecordTag::Player,
            "TranscodeSession" => RecordTag::TranscodeSession,
            "Session" => RecordTag::Session,
            "Media" => RecordTag::Media,
            _ => RecordTag::Other(name),
        }
    }
}

impl From<RecordTag> for String {
    fn from(tag: RecordTag) -> Self {
        match tag {
            RecordTag::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for RecordTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Server Record
// =============================================================================

/// One record returned by the media server.
///
/// `key`, `ratingKey` and `title` are lifted into typed fields because the
/// digest relies on them; all other members are preserved as-is so the cached
/// copy is the record "verbatim".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Type discriminator.
    #[serde(rename = "_elementType")]
    pub tag: RecordTag,

    /// Path-like key of the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Stable library identifier (library items only).
    #[serde(rename = "ratingKey", default, skip_serializing_if = "Option::is_none")]
    pub rating_key: Option<String>,

    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Nested element records (User, Player, Media, ...).
    #[serde(rename = "_children", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ServerRecord>,

    /// Remaining members, untouched.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ServerRecord {
    /// Creates an empty record with the given tag.
    pub fn new(tag: RecordTag) -> Self {
        ServerRecord {
            tag,
            key: None,
            rating_key: None,
            title: None,
            children: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Sets the key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the rating key.
    pub fn with_rating_key(mut self, rating_key: impl Into<String>) -> Self {
        self.rating_key = Some(rating_key.into());
        self
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Adds a verbatim attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Appends a child record.
    pub fn with_child(mut self, child: ServerRecord) -> Self {
        self.children.push(child);
        self
    }

    /// Builds a record from a JSON object.
    ///
    /// ## Errors
    /// `InvalidRecord` if `value` (or any nested element) is not an object.
    pub fn from_json(tag: RecordTag, value: Value) -> CoreResult<Self> {
        let members = match value {
            Value::Object(members) => members,
            other => {
                return Err(CoreError::InvalidRecord(format!(
                    "expected an object for a {tag} record, got {}",
                    json_kind(&other)
                )))
            }
        };

        let mut record = ServerRecord::new(tag);

        for (name, value) in members {
            match name.as_str() {
                "key" => record.key = scalar_string(&value),
                "ratingKey" => record.rating_key = scalar_string(&value),
                "title" => record.title = scalar_string(&value),
                "_elementType" => {}
                "_children" => match value {
                    Value::Array(items) => {
                        for item in items {
                            let tag = item
                                .get("_elementType")
                                .and_then(Value::as_str)
                                .map(|name| RecordTag::for_element(name, &item))
                                .unwrap_or(RecordTag::Metadata);
                            record.children.push(ServerRecord::from_json(tag, item)?);
                        }
                    }
                    other => {
                        record.attributes.insert(name, other);
                    }
                },
                _ if is_element_name(&name) => match value {
                    Value::Object(_) => {
                        let tag = RecordTag::for_element(&name, &value);
                        record.children.push(ServerRecord::from_json(tag, value)?);
                    }
                    Value::Array(items) if items.iter().all(Value::is_object) => {
                        for item in items {
                            let tag = RecordTag::for_element(&name, &item);
                            record.children.push(ServerRecord::from_json(tag, item)?);
                        }
                    }
                    other => {
                        record.attributes.insert(name, other);
                    }
                },
                _ => {
                    record.attributes.insert(name, value);
                }
            }
        }

        Ok(record)
    }

    /// Returns the first child with the given tag.
    pub fn child(&self, tag: &RecordTag) -> Option<&ServerRecord> {
        self.children.iter().find(|child| &child.tag == tag)
    }

    /// Returns an attribute rendered as a string (strings and numbers only).
    pub fn attribute_str(&self, name: &str) -> Option<String> {
        self.attributes.get(name).and_then(scalar_string)
    }

    /// Returns the title, or a placeholder for untitled records.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("<untitled>")
    }
}

// =============================================================================
// Container Parsing
// =============================================================================

/// Parses a whole query response into its child records.
///
/// Accepts `{"MediaContainer": {...}}` as well as a bare container object.
pub fn parse_container(body: Value) -> CoreResult<Vec<ServerRecord>> {
    let container = match body {
        Value::Object(mut members) => match members.remove("MediaContainer") {
            Some(inner) => inner,
            None => Value::Object(members),
        },
        other => {
            return Err(CoreError::InvalidRecord(format!(
                "response body must be an object, got {}",
                json_kind(&other)
            )))
        }
    };

    let root = ServerRecord::from_json(RecordTag::MediaContainer, container)?;
    Ok(root.children)
}

/// Element members are capitalised (`User`, `Metadata`, `Directory`).
fn is_element_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_round_trip() {
        assert_eq!(RecordTag::from("TranscodeSession".to_string()), RecordTag::TranscodeSession);
        assert_eq!(
            RecordTag::from("Genre".to_string()),
            RecordTag::Other("Genre".to_string())
        );
        assert_eq!(String::from(RecordTag::Other("Genre".into())), "Genre");
        assert_eq!(RecordTag::Player.to_string(), "Player");
    }

    #[test]
    fn test_parse_session_container() {
        let body = json!({
            "MediaContainer": {
                "size": 1,
                "Metadata": [{
                    "type": "movie",
                    "title": "Movie A",
                    "ratingKey": 42,
                    "sessionKey": "7",
                    "User": { "id": "1", "title": "Alice" },
                    "Player": { "title": "Chromecast", "state": "playing" },
                    "TranscodeSession": { "key": "t1", "progress": 12.5 },
                    "Media": [{ "id": 1 }, { "id": 2 }]
                }]
            }
        });

        let records = parse_container(body).unwrap();
        assert_eq!(records.len(), 1);

        let video = &records[0];
        assert_eq!(video.tag, RecordTag::Video);
        assert_eq!(video.title.as_deref(), Some("Movie A"));
        assert_eq!(video.rating_key.as_deref(), Some("42"));
        assert_eq!(video.attribute_str("sessionKey").as_deref(), Some("7"));
        assert_eq!(video.children.len(), 5);
        assert_eq!(
            video.child(&RecordTag::User).and_then(|u| u.title.as_deref()),
            Some("Alice")
        );
        assert_eq!(
            video.child(&RecordTag::TranscodeSession).and_then(|t| t.key.as_deref()),
            Some("t1")
        );
    }

    #[test]
    fn test_parse_legacy_children_shape() {
        let body = json!({
            "_elementType": "MediaContainer",
            "_children": [
                { "_elementType": "Directory", "key": "1", "title": "Movies" },
                { "_elementType": "Directory", "key": "2", "title": "Shows" }
            ]
        });

        let records = parse_container(body).unwrap();
        let keys: Vec<_> = records.iter().filter_map(|r| r.key.as_deref()).collect();
        assert_eq!(keys, vec!["1", "2"]);
        assert!(records.iter().all(|r| r.tag == RecordTag::Directory));
    }

    #[test]
    fn test_empty_container_has_no_records() {
        let records = parse_container(json!({ "MediaContainer": { "size": 0 } })).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_rejects_non_object_body() {
        assert!(matches!(
            parse_container(json!([1, 2, 3])),
            Err(CoreError::InvalidRecord(_))
        ));
        assert!(ServerRecord::from_json(RecordTag::Video, json!("nope")).is_err());
    }

    #[test]
    fn test_scalar_arrays_stay_attributes() {
        let record =
            ServerRecord::from_json(RecordTag::Video, json!({ "Tags": ["a", "b"] })).unwrap();
        assert!(record.children.is_empty());
        assert_eq!(record.attributes.get("Tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_serialized_shape() {
        let record = ServerRecord::new(RecordTag::Video)
            .with_rating_key("42")
            .with_title("Movie A")
            .with_attribute("year", 1999)
            .with_child(ServerRecord::new(RecordTag::User).with_title("Alice"));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["_elementType"], "Video");
        assert_eq!(value["ratingKey"], "42");
        assert_eq!(value["year"], 1999);
        assert_eq!(value["_children"][0]["title"], "Alice");
        assert!(value.get("key").is_none());

        let back: ServerRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
