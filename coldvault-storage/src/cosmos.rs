//! Cosmos DB operational store over the REST API.
//!
//! Requests are authorized with the account master key: an HMAC-SHA256 over
//! the verb, resource type, resource link and date, sent in the
//! `authorization` header. Queries are cross-partition and paged with the
//! `x-ms-continuation` token, one page per poll of the record stream.

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use coldvault_core::{
    ColdVaultResult, ConfigError, CosmosConfig, ParameterizedQuery, Record, RecordQuery,
    StoreKind,
};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretSlice};
use serde::Deserialize;
use sha2::Sha256;

use crate::http::{build_client, check, transport_error};
use crate::traits::{OperationalStore, RecordStream};

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2018-12-31";
const RESOURCE_DOCS: &str = "docs";
const STORE: StoreKind = StoreKind::Operational;

/// Operational store backed by a Cosmos DB container.
pub struct CosmosOperationalStore {
    client: Client,
    endpoint: String,
    key: SecretSlice<u8>,
    database: String,
    container: String,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "Documents", default)]
    documents: Vec<serde_json::Value>,
}

struct QueryPage {
    records: Vec<Record>,
    continuation: Option<String>,
}

impl CosmosOperationalStore {
    /// Create a store for the configured account and container.
    ///
    /// Fails when the master key is not valid base64.
    pub fn new(config: &CosmosConfig, page_size: usize, timeout: Duration) -> ColdVaultResult<Self> {
        let key = BASE64
            .decode(config.key.expose_secret().trim())
            .map_err(|e| ConfigError::InvalidValue {
                field: "COLDVAULT_COSMOS_KEY".to_string(),
                value: "[REDACTED]".to_string(),
                reason: format!("master key is not base64: {}", e),
            })?;

        Ok(Self {
            client: build_client(STORE, timeout)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            key: key.into(),
            database: config.database.clone(),
            container: config.container.clone(),
            page_size: page_size.max(1),
        })
    }

    /// Resource link of the container, as signed.
    fn collection_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.container)
    }

    /// Resource link of a document, as signed. The id is not encoded here.
    fn document_link(&self, id: &str) -> String {
        format!("{}/{}/{}", self.collection_link(), RESOURCE_DOCS, id)
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/dbs/{}/colls/{}/docs",
            self.endpoint,
            urlencoding::encode(&self.database),
            urlencoding::encode(&self.container)
        )
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.documents_url(), urlencoding::encode(id))
    }

    /// Start a request carrying the date, version and authorization headers.
    fn signed(&self, method: Method, url: &str, resource_link: &str) -> ColdVaultResult<RequestBuilder> {
        let date = http_date(Utc::now());
        let token = authorization_token(
            self.key.expose_secret(),
            method.as_str(),
            RESOURCE_DOCS,
            resource_link,
            &date,
        )?;

        Ok(self
            .client
            .request(method, url)
            .header("authorization", token)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION))
    }

    async fn query_page(
        &self,
        query: &ParameterizedQuery,
        continuation: Option<&str>,
    ) -> ColdVaultResult<QueryPage> {
        let body = serde_json::to_vec(query)?;
        let mut request = self
            .signed(Method::POST, &self.documents_url(), &self.collection_link())?
            .header("x-ms-documentdb-isquery", "True")
            .header("x-ms-documentdb-query-enablecrosspartition", "True")
            .header("x-ms-max-item-count", self.page_size.to_string())
            .header("Content-Type", "application/query+json")
            .body(body);
        if let Some(token) = continuation {
            request = request.header("x-ms-continuation", token);
        }

        let response = request.send().await.map_err(|e| transport_error(STORE, e))?;
        let response = check(STORE, &self.collection_link(), response).await?;

        let continuation = response
            .headers()
            .get("x-ms-continuation")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| transport_error(STORE, e))?;
        let parsed: QueryResponse = serde_json::from_slice(&bytes)?;

        let records = parsed
            .documents
            .into_iter()
            .map(Record::from_value)
            .collect::<ColdVaultResult<Vec<_>>>()?;

        tracing::debug!(
            records = records.len(),
            has_more = continuation.is_some(),
            "Fetched Cosmos query page"
        );
        Ok(QueryPage {
            records,
            continuation,
        })
    }
}

impl std::fmt::Debug for CosmosOperationalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmosOperationalStore")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("container", &self.container)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// RFC 1123 date as expected in `x-ms-date`.
fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn string_to_sign(verb: &str, resource_type: &str, resource_link: &str, date: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    )
}

/// Master-key authorization header value, already URL-encoded.
fn authorization_token(
    key: &[u8],
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> ColdVaultResult<String> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| ConfigError::InvalidValue {
        field: "COLDVAULT_COSMOS_KEY".to_string(),
        value: "[REDACTED]".to_string(),
        reason: e.to_string(),
    })?;
    mac.update(string_to_sign(verb, resource_type, resource_link, date).as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    let token = format!("type=master&ver=1.0&sig={}", signature);
    Ok(urlencoding::encode(&token).into_owned())
}

fn partition_key_header(partition_key: &str) -> ColdVaultResult<String> {
    Ok(serde_json::to_string(&[partition_key])?)
}

#[async_trait]
impl OperationalStore for CosmosOperationalStore {
    fn name(&self) -> &'static str {
        "cosmos"
    }

    fn query_records<'a>(&'a self, query: &'a RecordQuery) -> RecordStream<'a> {
        Box::pin(stream! {
            let body = query.to_parameterized();
            let mut continuation: Option<String> = None;
            loop {
                let page: ColdVaultResult<QueryPage> =
                    self.query_page(&body, continuation.as_deref()).await;
                match page {
                    Ok(page) => {
                        for record in page.records {
                            yield Ok(record);
                        }
                        match page.continuation {
                            Some(token) => continuation = Some(token),
                            None => break,
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }

    async fn read_record(&self, id: &str, partition_key: &str) -> ColdVaultResult<Record> {
        let response = self
            .signed(Method::GET, &self.document_url(id), &self.document_link(id))?
            .header("x-ms-documentdb-partitionkey", partition_key_header(partition_key)?)
            .send()
            .await
            .map_err(|e| transport_error(STORE, e))?;
        let response = check(STORE, id, response).await?;
        let bytes = response.bytes().await.map_err(|e| transport_error(STORE, e))?;
        Record::from_slice(&bytes)
    }

    async fn delete_record(&self, id: &str, partition_key: &str) -> ColdVaultResult<()> {
        let response = self
            .signed(Method::DELETE, &self.document_url(id), &self.document_link(id))?
            .header("x-ms-documentdb-partitionkey", partition_key_header(partition_key)?)
            .send()
            .await
            .map_err(|e| transport_error(STORE, e))?;
        check(STORE, id, response).await?;
        Ok(())
    }

    async fn upsert_record(&self, record: &Record) -> ColdVaultResult<()> {
        let id = record.id()?;
        let body = record.to_json_bytes()?;
        let response = self
            .signed(Method::POST, &self.documents_url(), &self.collection_link())?
            .header("x-ms-documentdb-is-upsert", "True")
            .header("x-ms-documentdb-partitionkey", partition_key_header(record.partition_key()?)?)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(STORE, e))?;
        check(STORE, id, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use secrecy::SecretString;

    fn config() -> CosmosConfig {
        CosmosConfig {
            endpoint: "https://acct.documents.azure.com/".to_string(),
            key: SecretString::new("Y29sZHZhdWx0LXRlc3Qta2V5".to_string().into()),
            database: "billingdb".to_string(),
            container: "records".to_string(),
        }
    }

    #[test]
    fn test_http_date_format() {
        let now = Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap();
        assert_eq!(http_date(now), "Tue, 01 Oct 2024 12:00:00 GMT");
    }

    #[test]
    fn test_string_to_sign_lowercases_all_but_link() {
        let s = string_to_sign("GET", "docs", "dbs/Billing/colls/Records/docs/R1", "Tue, 01 Oct 2024 12:00:00 GMT");
        assert_eq!(
            s,
            "get\ndocs\ndbs/Billing/colls/Records/docs/R1\ntue, 01 oct 2024 12:00:00 gmt\n\n"
        );
    }

    #[test]
    fn test_authorization_token_matches_known_signature() {
        let token = authorization_token(
            b"coldvault-test-key",
            "GET",
            "docs",
            "dbs/billingdb/colls/records/docs/r1",
            "Tue, 01 Oct 2024 12:00:00 GMT",
        )
        .unwrap();
        assert_eq!(
            token,
            "type%3Dmaster%26ver%3D1.0%26sig%3DyjCs9K5Zg%2FQuxDIWTP5EJqvMyCOTZAaHITcsbA%2BTUT4%3D"
        );
    }

    #[test]
    fn test_urls_encode_ids_but_links_do_not() {
        let store = CosmosOperationalStore::new(&config(), 50, Duration::from_secs(5)).unwrap();
        assert_eq!(
            store.documents_url(),
            "https://acct.documents.azure.com/dbs/billingdb/colls/records/docs"
        );
        assert_eq!(
            store.document_url("inv 1/a"),
            "https://acct.documents.azure.com/dbs/billingdb/colls/records/docs/inv%201%2Fa"
        );
        assert_eq!(
            store.document_link("inv 1/a"),
            "dbs/billingdb/colls/records/docs/inv 1/a"
        );
    }

    #[test]
    fn test_invalid_master_key_is_config_error() {
        let mut bad = config();
        bad.key = SecretString::new("not base64!!".to_string().into());
        let err = CosmosOperationalStore::new(&bad, 50, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, coldvault_core::ColdVaultError::Config(_)));
    }

    #[test]
    fn test_partition_key_header_is_json_array() {
        assert_eq!(partition_key_header("acct-1").unwrap(), r#"["acct-1"]"#);
    }

    #[test]
    fn test_debug_redacts_key() {
        let store = CosmosOperationalStore::new(&config(), 50, Duration::from_secs(5)).unwrap();
        assert!(!format!("{:?}", store).contains("Y29sZHZhdWx0"));
    }

    #[test]
    fn test_query_response_ignores_metadata() {
        let parsed: QueryResponse = serde_json::from_str(
            r#"{"_rid":"x","Documents":[{"id":"r1","partitionKey":"r1","date":"2024-01-01"}],"_count":1}"#,
        )
        .unwrap();
        assert_eq!(parsed.documents.len(), 1);
    }
}
