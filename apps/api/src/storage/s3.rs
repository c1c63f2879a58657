use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use crate::config::Config;
use crate::storage::{ObjectStore, StorageError};

/// `ObjectStore` backed by a single S3 (or S3-compatible) bucket.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Constructs an S3 client for AWS, or for MinIO/localstack when
    /// `S3_ENDPOINT` is set.
    pub async fn from_config(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "recommender-static",
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.s3_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        // Custom endpoints rarely support virtual-hosted bucket addressing.
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.s3_endpoint.is_some())
            .build();

        Self::new(Client::from_conf(s3_config), config.s3_bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));

        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }

        req.send().await.map_err(|e| StorageError::Write {
            key: key.to_string(),
            message: e.into_service_error().to_string(),
        })?;

        debug!("Wrote s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_no_such_key() {
                    StorageError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Read {
                        key: key.to_string(),
                        message: err.to_string(),
                    }
                }
            })?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Read {
                key: key.to_string(),
                message: e.to_string(),
            })?
            .into_bytes();

        Ok(body)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = &continuation_token {
                req = req.continuation_token(token);
            }

            let resp = req.send().await.map_err(|e| StorageError::List {
                prefix: prefix.to_string(),
                message: e.into_service_error().to_string(),
            })?;

            keys.extend(resp.contents().iter().filter_map(|o| o.key()).map(String::from));

            match next_page(prefix, resp.is_truncated(), resp.next_continuation_token())? {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(keys)
    }
}

/// Continuation token for the next listing page, `None` on the last page.
/// A truncated page without a token would restart the listing forever.
fn next_page(
    prefix: &str,
    is_truncated: Option<bool>,
    token: Option<&str>,
) -> Result<Option<String>, StorageError> {
    if is_truncated != Some(true) {
        return Ok(None);
    }
    match token {
        Some(token) => Ok(Some(token.to_string())),
        None => Err(StorageError::List {
            prefix: prefix.to_string(),
            message: "truncated listing returned no continuation token".to_string(),
        }),
    }
}
