//! CRM API client.
//!
//! The sync engine talks to the CRM through the [`CrmApi`] trait;
//! [`ZohoClient`] is the production implementation (OAuth
//! refresh-token flow against the regional Zoho endpoints).

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::criteria::Criteria;
use crate::error::{CrmError, CrmResult};
use crate::record::CrmRecord;

/// Maximum records per page on list endpoints.
const PAGE_SIZE: usize = 200;

/// Maximum records per bulk update call.
pub const BULK_UPDATE_LIMIT: usize = 100;

/// Refresh the access token this long before its expiry.
const TOKEN_EXPIRY_BUFFER_MINUTES: i64 = 5;

/// Outcome of one record inside a bulk update response.
#[derive(Debug, Clone)]
pub struct BulkUpdateItem {
    /// CRM record id the item refers to.
    pub id: Option<String>,
    /// Response code (`SUCCESS` on success).
    pub code: String,
    /// Human message for failures.
    pub message: Option<String>,
}

impl BulkUpdateItem {
    /// Whether the CRM accepted this item.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == "SUCCESS"
    }
}

/// Operations the sync paths need from the CRM.
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Fetch all records from a module, following pagination.
    ///
    /// `criteria` filters server-side; `max_records` caps the total.
    async fn get_all_records(
        &self,
        module: &str,
        criteria: Option<&Criteria>,
        max_records: Option<usize>,
    ) -> CrmResult<Vec<CrmRecord>>;

    /// Search a module by email address.
    async fn search_by_email(&self, module: &str, email: &str) -> CrmResult<Vec<CrmRecord>>;

    /// Update fields on a single record.
    async fn update_record(&self, module: &str, record_id: &str, fields: Value) -> CrmResult<()>;

    /// Update up to [`BULK_UPDATE_LIMIT`] records in one call.
    ///
    /// Each entry in `updates` must carry an `id` field. Items
    /// succeed or fail independently.
    async fn bulk_update_records(
        &self,
        module: &str,
        updates: Vec<Value>,
    ) -> CrmResult<Vec<BulkUpdateItem>>;
}

/// Zoho data-center region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZohoRegion {
    Us,
    Eu,
    In,
    Au,
    Jp,
    Cn,
}

impl ZohoRegion {
    /// CRM API base URL for this region.
    #[must_use]
    pub fn api_base(&self) -> &'static str {
        match self {
            ZohoRegion::Us => "https://www.zohoapis.com",
            ZohoRegion::Eu => "https://www.zohoapis.eu",
            ZohoRegion::In => "https://www.zohoapis.in",
            ZohoRegion::Au => "https://www.zohoapis.com.au",
            ZohoRegion::Jp => "https://www.zohoapis.jp",
            ZohoRegion::Cn => "https://www.zohoapis.com.cn",
        }
    }

    /// Accounts (OAuth) base URL for this region.
    #[must_use]
    pub fn auth_base(&self) -> &'static str {
        match self {
            ZohoRegion::Us => "https://accounts.zoho.com",
            ZohoRegion::Eu => "https://accounts.zoho.eu",
            ZohoRegion::In => "https://accounts.zoho.in",
            ZohoRegion::Au => "https://accounts.zoho.com.au",
            ZohoRegion::Jp => "https://accounts.zoho.jp",
            ZohoRegion::Cn => "https://accounts.zoho.com.cn",
        }
    }
}

impl std::str::FromStr for ZohoRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "US" => Ok(ZohoRegion::Us),
            "EU" => Ok(ZohoRegion::Eu),
            "IN" => Ok(ZohoRegion::In),
            "AU" => Ok(ZohoRegion::Au),
            "JP" => Ok(ZohoRegion::Jp),
            "CN" => Ok(ZohoRegion::Cn),
            _ => Err(format!("Unknown Zoho region: {s}")),
        }
    }
}

/// Configuration for [`ZohoClient`].
#[derive(Debug, Clone)]
pub struct ZohoConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Data-center region.
    pub region: ZohoRegion,
    /// Request timeout.
    pub timeout: Duration,
}

impl ZohoConfig {
    /// Read configuration from `ZOHO_*` environment variables.
    pub fn from_env() -> CrmResult<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| CrmError::configuration(format!("{name} is not set")))
        };
        let region = std::env::var("ZOHO_REGION")
            .unwrap_or_else(|_| "US".to_string())
            .parse()
            .map_err(CrmError::configuration)?;

        Ok(Self {
            client_id: var("ZOHO_CLIENT_ID")?,
            client_secret: var("ZOHO_CLIENT_SECRET")?,
            refresh_token: var("ZOHO_REFRESH_TOKEN")?,
            region,
            timeout: Duration::from_secs(30),
        })
    }
}

/// Cached OAuth access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at - ChronoDuration::minutes(TOKEN_EXPIRY_BUFFER_MINUTES)
    }
}

/// Zoho CRM client.
pub struct ZohoClient {
    config: ZohoConfig,
    client: Client,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl std::fmt::Debug for ZohoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZohoClient")
            .field("region", &self.config.region)
            .finish()
    }
}

impl ZohoClient {
    /// Create a client from configuration.
    pub fn new(config: ZohoConfig) -> CrmResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CrmError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Get a valid access token, refreshing when needed.
    ///
    /// Fast path reads the cache; the write lock is only taken when a
    /// refresh is due, with a second validity check under the lock so
    /// concurrent callers refresh once.
    async fn access_token(&self) -> CrmResult<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_valid() {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref() {
            if token.is_valid() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing Zoho access token");
        let url = format!("{}/oauth/v2/token", self.config.region.auth_base());
        let response = self
            .client
            .post(&url)
            .query(&[
                ("refresh_token", self.config.refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| CrmError::auth(format!("Token refresh failed: {e}")))?;

        let body: Value = response.json().await?;
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| CrmError::auth(format!("No access_token in response: {body}")))?
            .to_string();
        let expires_in = body.get("expires_in").and_then(Value::as_i64).unwrap_or(3600);

        let token = CachedToken {
            access_token: access_token.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(expires_in),
        };
        *guard = Some(token);

        Ok(access_token)
    }

    /// Perform an authenticated GET returning the parsed body.
    ///
    /// A 204 means an empty result set, not an error.
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> CrmResult<Option<Value>> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Zoho-oauthtoken {token}"))
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    /// Perform an authenticated PUT with a JSON body.
    async fn put_json(&self, url: &str, body: Value) -> CrmResult<Value> {
        let token = self.access_token().await?;
        let response = self
            .client
            .put(url)
            .header("Authorization", format!("Zoho-oauthtoken {token}"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    fn records_from_body(body: Option<Value>) -> Vec<CrmRecord> {
        body.and_then(|mut v| v.get_mut("data").map(Value::take))
            .and_then(|data| match data {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default()
            .into_iter()
            .map(CrmRecord::from_value)
            .collect()
    }

    fn items_from_body(body: &Value) -> Vec<BulkUpdateItem> {
        body.get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| BulkUpdateItem {
                        id: item
                            .get("details")
                            .and_then(|d| d.get("id"))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        code: item
                            .get("code")
                            .and_then(Value::as_str)
                            .unwrap_or("UNKNOWN")
                            .to_string(),
                        message: item
                            .get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl CrmApi for ZohoClient {
    #[instrument(skip(self, criteria))]
    async fn get_all_records(
        &self,
        module: &str,
        criteria: Option<&Criteria>,
        max_records: Option<usize>,
    ) -> CrmResult<Vec<CrmRecord>> {
        let url = format!("{}/crm/v2/{module}", self.config.region.api_base());
        let criteria_str = criteria.and_then(Criteria::render);

        let mut all_records = Vec::new();
        let mut page = 1usize;

        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ];
            if let Some(ref c) = criteria_str {
                query.push(("criteria", c.clone()));
            }

            let body = self.get_json(&url, &query).await?;
            let more = body
                .as_ref()
                .and_then(|v| v.get("info"))
                .and_then(|info| info.get("more_records"))
                .and_then(Value::as_bool)
                .unwrap_or(false);

            let records = Self::records_from_body(body);
            if records.is_empty() {
                break;
            }
            all_records.extend(records);

            if let Some(max) = max_records {
                if all_records.len() >= max {
                    all_records.truncate(max);
                    break;
                }
            }
            if !more {
                break;
            }
            page += 1;
        }

        debug!(module, count = all_records.len(), "Fetched CRM records");
        Ok(all_records)
    }

    #[instrument(skip(self))]
    async fn search_by_email(&self, module: &str, email: &str) -> CrmResult<Vec<CrmRecord>> {
        let url = format!("{}/crm/v8/{module}/search", self.config.region.api_base());
        let query = vec![
            ("email", email.to_string()),
            ("per_page", PAGE_SIZE.to_string()),
        ];
        let body = self.get_json(&url, &query).await?;
        Ok(Self::records_from_body(body))
    }

    #[instrument(skip(self, fields))]
    async fn update_record(&self, module: &str, record_id: &str, fields: Value) -> CrmResult<()> {
        let url = format!(
            "{}/crm/v2/{module}/{record_id}",
            self.config.region.api_base()
        );
        let body = self.put_json(&url, json!({ "data": [fields] })).await?;

        match Self::items_from_body(&body).into_iter().next() {
            Some(item) if item.is_success() => Ok(()),
            Some(item) => Err(CrmError::api(
                item.code,
                item.message.unwrap_or_else(|| "update rejected".to_string()),
            )),
            None => Err(CrmError::api("EMPTY_RESPONSE", "no data in update response")),
        }
    }

    #[instrument(skip(self, updates))]
    async fn bulk_update_records(
        &self,
        module: &str,
        updates: Vec<Value>,
    ) -> CrmResult<Vec<BulkUpdateItem>> {
        if updates.len() > BULK_UPDATE_LIMIT {
            return Err(CrmError::api(
                "TOO_MANY_RECORDS",
                format!("bulk update is capped at {BULK_UPDATE_LIMIT} records"),
            ));
        }

        let url = format!("{}/crm/v2/{module}", self.config.region.api_base());
        let body = self.put_json(&url, json!({ "data": updates })).await?;
        Ok(Self::items_from_body(&body))
    }
}
