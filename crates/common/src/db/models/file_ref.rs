//! File reference embedded in `analyses.file_metadata`
//!
//! Serialized in camelCase to match the viewer payloads. Unknown fields the
//! client attaches (page counts, viewer hints) round-trip through the
//! flattened `extra` map, which matters for duplication: only the storage
//! key and etag are rewritten, everything else is preserved verbatim.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub original_filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_etag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FileRef {
    /// Parse a `file_metadata` JSONB column into file references.
    ///
    /// Legacy rows occasionally stored the array as a JSON string; both
    /// shapes are accepted. Anything unparseable yields an empty list.
    pub fn parse_list(value: &serde_json::Value) -> Vec<FileRef> {
        match value {
            serde_json::Value::Array(_) => {
                serde_json::from_value(value.clone()).unwrap_or_default()
            }
            serde_json::Value::String(s) => serde_json::from_str(s).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Render a list of file references back to the JSONB column value
    pub fn to_value(files: &[FileRef]) -> serde_json::Value {
        serde_json::to_value(files).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_case_round_trip() {
        let value = json!([{
            "originalFilename": "report.pdf",
            "storageKey": "u1/a1/report.pdf",
            "storageEtag": "abc123",
            "size": 1024,
            "contentType": "application/pdf",
            "pageCount": 12
        }]);

        let files = FileRef::parse_list(&value);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].original_filename, "report.pdf");
        assert_eq!(files[0].storage_key.as_deref(), Some("u1/a1/report.pdf"));
        // unknown field survives
        assert_eq!(files[0].extra.get("pageCount"), Some(&json!(12)));

        let back = FileRef::to_value(&files);
        assert_eq!(back, value);
    }

    #[test]
    fn test_parse_stringified_array() {
        let value = json!("[{\"originalFilename\":\"a.pdf\"}]");
        let files = FileRef::parse_list(&value);
        assert_eq!(files.len(), 1);
        assert!(files[0].storage_key.is_none());
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(FileRef::parse_list(&json!(42)).is_empty());
        assert!(FileRef::parse_list(&json!("not json")).is_empty());
    }
}
