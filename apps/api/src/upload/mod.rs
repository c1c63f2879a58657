//! Upload and listing of customer files.
//!
//! Writes go straight to `{customer_id}/{filename}`, replacing whatever was
//! there. Files are written one by one; a failure part-way leaves earlier
//! files in place.

use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;
use crate::storage::keys::{self, validate_segment};
use crate::storage::ObjectStore;

pub mod handlers;

const PROMPT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// One file received from a client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Stores every file under `{customer_id}/{filename}` and returns the keys
/// written, in upload order.
pub async fn upload_files(
    store: &dyn ObjectStore,
    customer_id: &str,
    files: Vec<UploadedFile>,
) -> Result<Vec<String>, AppError> {
    put_files(store, customer_id, files, keys::object_key).await
}

/// Replaces the customer's prompt template.
pub async fn upload_prompt(
    store: &dyn ObjectStore,
    customer_id: &str,
    prompt_text: Bytes,
) -> Result<String, AppError> {
    let customer_id = validate_segment("customer_id", customer_id)?;
    let key = keys::object_key(&customer_id, keys::PROMPT_FILE);
    store
        .put(&key, prompt_text, Some(PROMPT_CONTENT_TYPE))
        .await?;
    info!("Stored prompt template at {key}");
    Ok(key)
}

/// Lists the customer's files relative to their prefix. A customer with no
/// objects yields an empty list.
pub async fn list_files(store: &dyn ObjectStore, customer_id: &str) -> Result<Vec<String>, AppError> {
    let customer_id = validate_segment("customer_id", customer_id)?;
    let prefix = keys::customer_prefix(&customer_id);
    let listed = store.list(&prefix).await?;
    Ok(keys::strip_prefix(listed, &prefix))
}

/// Validates the customer id and every filename before the first write, then
/// writes each file to the key produced by `key_for`.
pub(crate) async fn put_files(
    store: &dyn ObjectStore,
    customer_id: &str,
    files: Vec<UploadedFile>,
    key_for: fn(&str, &str) -> String,
) -> Result<Vec<String>, AppError> {
    let customer_id = validate_segment("customer_id", customer_id)?;
    if files.is_empty() {
        return Err(AppError::Validation("at least one file is required".to_string()));
    }

    let files = files
        .into_iter()
        .map(|f| {
            validate_segment("filename", &f.filename).map(|filename| UploadedFile { filename, ..f })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let key = key_for(&customer_id, &file.filename);
        store
            .put(&key, file.body, file.content_type.as_deref())
            .await?;
        written.push(key);
    }

    info!(
        "Stored {} file(s) for customer {}: {:?}",
        written.len(),
        customer_id,
        written
    );
    Ok(written)
}
