//! Azure Blob Storage archive store authorized by a container SAS token.

use std::time::Duration;

use async_trait::async_trait;
use coldvault_core::{BlobConfig, ColdVaultResult, ConfigError, StoreKind};
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};

use crate::http::{build_client, check, transport_error};
use crate::traits::ArchiveStore;

const API_VERSION: &str = "2021-08-06";
const STORE: StoreKind = StoreKind::Archive;

/// Archive store writing block blobs into one container.
pub struct AzureBlobArchiveStore {
    client: Client,
    account_url: Url,
    container: String,
    sas_token: SecretString,
}

impl AzureBlobArchiveStore {
    pub fn new(config: &BlobConfig, timeout: Duration) -> ColdVaultResult<Self> {
        let account_url = Url::parse(&config.account_url).map_err(|e| ConfigError::InvalidValue {
            field: "COLDVAULT_BLOB_ACCOUNT_URL".to_string(),
            value: config.account_url.clone(),
            reason: e.to_string(),
        })?;
        if account_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                field: "COLDVAULT_BLOB_ACCOUNT_URL".to_string(),
                value: config.account_url.clone(),
                reason: "not a base URL".to_string(),
            }
            .into());
        }

        Ok(Self {
            client: build_client(STORE, timeout)?,
            account_url,
            container: config.container.clone(),
            sas_token: config.sas_token.clone(),
        })
    }

    /// URL of a blob, with each path segment percent-encoded and the SAS
    /// token appended as the query string.
    fn blob_url(&self, path: &str) -> Url {
        let mut url = self.account_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.push(&self.container);
            segments.extend(path.split('/'));
        }
        let sas = self.sas_token.expose_secret();
        url.set_query((!sas.is_empty()).then_some(sas));
        url
    }
}

impl std::fmt::Debug for AzureBlobArchiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobArchiveStore")
            .field("account_url", &self.account_url.as_str())
            .field("container", &self.container)
            .field("sas_token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl ArchiveStore for AzureBlobArchiveStore {
    fn name(&self) -> &'static str {
        "azure-blob"
    }

    async fn put_blob(&self, path: &str, body: Vec<u8>) -> ColdVaultResult<()> {
        let response = self
            .client
            .put(self.blob_url(path))
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", API_VERSION)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(STORE, e.without_url()))?;
        check(STORE, path, response).await?;
        Ok(())
    }

    async fn get_blob(&self, path: &str) -> ColdVaultResult<Vec<u8>> {
        let response = self
            .client
            .get(self.blob_url(path))
            .header("x-ms-version", API_VERSION)
            .send()
            .await
            .map_err(|e| transport_error(STORE, e.without_url()))?;
        let response = check(STORE, path, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(STORE, e.without_url()))?;
        Ok(bytes.to_vec())
    }
}
