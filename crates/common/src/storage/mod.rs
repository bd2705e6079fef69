//! Blob storage abstraction
//!
//! Documents live in an S3-compatible object store (R2, MinIO, S3 proper)
//! behind the `BlobStore` trait; tests use the in-memory implementation.
//!
//! Keys are always `{owner_id}/{analysis_id}/{sanitized_filename}` — the
//! key embeds ownership and analysis scoping, which the file-serving path
//! relies on as an access-control mechanism.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use uuid::Uuid;

/// Metadata key for the unsanitized upload filename
const META_ORIGINAL_FILENAME: &str = "original-filename";

/// An object read back from the store
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub original_filename: Option<String>,
    pub etag: Option<String>,
}

/// An object on its way into the store
#[derive(Debug, Clone)]
pub struct PutObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub original_filename: Option<String>,
}

/// Object storage interface: one get, one put, one best-effort delete.
///
/// No retry layer; each call is attempted once and the caller decides
/// whether a failure is fatal (upload) or absorbed (duplication, cleanup).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object; None when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;

    /// Store an object, returning its etag
    async fn put(&self, key: &str, object: PutObject) -> Result<String>;

    /// Delete an object; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build the canonical storage key for a file
pub fn object_key(owner_id: Uuid, analysis_id: Uuid, filename: &str) -> String {
    format!("{}/{}/{}", owner_id, analysis_id, sanitize_filename(filename))
}

/// Split a storage key back into its scoping parts
pub fn parse_object_key(key: &str) -> Option<(Uuid, Uuid, &str)> {
    let mut parts = key.splitn(3, '/');
    let owner_id = Uuid::parse_str(parts.next()?).ok()?;
    let analysis_id = Uuid::parse_str(parts.next()?).ok()?;
    let filename = parts.next()?;
    if filename.is_empty() {
        return None;
    }
    Some((owner_id, analysis_id, filename))
}

/// Build a blob store from configuration
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.provider.as_str() {
        "s3" => Ok(Arc::new(S3BlobStore::new(config).await)),
        "memory" => Ok(Arc::new(MemoryBlobStore::new())),
        other => Err(AppError::Configuration {
            message: format!("Unknown storage provider: {}", other),
        }),
    }
}

/// S3-compatible blob store (R2 and MinIO via `endpoint_url`)
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    pub async fn new(config: &StorageConfig) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(ref endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(AppError::Storage {
                    message: format!("get {}: {}", key, service_err),
                });
            }
        };

        let content_type = output.content_type().map(String::from);
        let etag = output.e_tag().map(String::from);
        let original_filename = output
            .metadata()
            .and_then(|m| m.get(META_ORIGINAL_FILENAME))
            .cloned();

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage {
                message: format!("read body {}: {}", key, e),
            })?
            .into_bytes()
            .to_vec();

        Ok(Some(StoredObject {
            body,
            content_type,
            original_filename,
            etag,
        }))
    }

    async fn put(&self, key: &str, object: PutObject) -> Result<String> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(object.body));

        if let Some(content_type) = object.content_type {
            request = request.content_type(content_type);
        }
        if let Some(original_filename) = object.original_filename {
            request = request.metadata(META_ORIGINAL_FILENAME, original_filename);
        }

        let output = request.send().await.map_err(|e| AppError::Storage {
            message: format!("put {}: {}", key, e.into_service_error()),
        })?;

        Ok(output.e_tag().unwrap_or_default().to_string())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage {
                message: format!("delete {}: {}", key, e.into_service_error()),
            })?;
        Ok(())
    }
}

/// In-memory blob store for tests and local development
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects (test helper)
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, object: PutObject) -> Result<String> {
        let etag = hex::encode(Sha256::digest(&object.body));
        let stored = StoredObject {
            body: object.body,
            content_type: object.content_type,
            original_filename: object.original_filename,
            etag: Some(etag.clone()),
        };
        self.objects.lock().unwrap().insert(key.to_string(), stored);
        Ok(etag)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("my report (v2).pdf"), "my_report__v2_.pdf");
        assert_eq!(sanitize_filename("a/b\\c.pdf"), "a_b_c.pdf");
        assert_eq!(sanitize_filename("résumé.pdf"), "r_sum_.pdf");
    }

    #[test]
    fn test_object_key_round_trip() {
        let owner = Uuid::new_v4();
        let analysis = Uuid::new_v4();
        let key = object_key(owner, analysis, "my file.pdf");

        let (parsed_owner, parsed_analysis, filename) = parse_object_key(&key).unwrap();
        assert_eq!(parsed_owner, owner);
        assert_eq!(parsed_analysis, analysis);
        assert_eq!(filename, "my_file.pdf");
    }

    #[test]
    fn test_parse_object_key_rejects_malformed() {
        assert!(parse_object_key("not-a-uuid/x/y.pdf").is_none());
        assert!(parse_object_key("only-one-segment").is_none());
        let owner = Uuid::new_v4();
        assert!(parse_object_key(&format!("{}/{}/", owner, Uuid::new_v4())).is_none());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryBlobStore::new();
        let etag = store
            .put(
                "u/a/f.pdf",
                PutObject {
                    body: b"pdf bytes".to_vec(),
                    content_type: Some("application/pdf".to_string()),
                    original_filename: Some("f.pdf".to_string()),
                },
            )
            .await
            .unwrap();

        let fetched = store.get("u/a/f.pdf").await.unwrap().unwrap();
        assert_eq!(fetched.body, b"pdf bytes");
        assert_eq!(fetched.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(fetched.etag.as_deref(), Some(etag.as_str()));

        store.delete("u/a/f.pdf").await.unwrap();
        assert!(store.get("u/a/f.pdf").await.unwrap().is_none());
        // Deleting again is fine
        store.delete("u/a/f.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_missing_key() {
        let store = MemoryBlobStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }
}
