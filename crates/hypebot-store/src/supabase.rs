//! Supabase bot store over PostgREST.
//!
//! Rows live in one table (default `bots`) with columns matching `Bot`.
//! The service role key is sent as both `apikey` and bearer token and is
//! never logged.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use hypebot_core::{Bot, BotId, BotUpdate, NewBot, Pair};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::store::{BotStore, BoxFuture};

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Single-object responses; PostgREST answers 406 when no row matches.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub table: String,
    pub request_timeout: Duration,
}

impl SupabaseConfig {
    /// Read `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY`. `url_override`
    /// wins over the environment when set.
    pub fn from_env(url_override: Option<&str>, table: &str) -> StoreResult<Self> {
        let url = match url_override.filter(|u| !u.trim().is_empty()) {
            Some(url) => url.to_string(),
            None => std::env::var(ENV_SUPABASE_URL)
                .map_err(|_| StoreError::Configuration(format!("{ENV_SUPABASE_URL} is not set")))?,
        };
        let service_role_key = std::env::var(ENV_SUPABASE_SERVICE_ROLE_KEY).map_err(|_| {
            StoreError::Configuration(format!("{ENV_SUPABASE_SERVICE_ROLE_KEY} is not set"))
        })?;
        Ok(Self {
            url,
            service_role_key,
            table: table.to_string(),
            request_timeout: Duration::from_secs(10),
        })
    }
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    name: &'a str,
    pair: &'a Pair,
    desired_direction: Decimal,
}

#[derive(Debug, Serialize)]
struct PatchRow<'a> {
    #[serde(flatten)]
    update: &'a BotUpdate,
    updated_at: chrono::DateTime<Utc>,
}

pub struct SupabaseBotStore {
    http: Client,
    table_url: String,
}

impl SupabaseBotStore {
    pub fn new(config: SupabaseConfig) -> StoreResult<Self> {
        if config.url.trim().is_empty() || config.service_role_key.trim().is_empty() {
            return Err(StoreError::Configuration(
                "Supabase url and service role key are required".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(config.service_role_key.trim())
            .map_err(|_| StoreError::Configuration("service role key is not a valid header".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.service_role_key.trim()))
            .map_err(|_| StoreError::Configuration("service role key is not a valid header".to_string()))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let http = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        let table_url = format!(
            "{}/rest/v1/{}",
            config.url.trim_end_matches('/'),
            config.table
        );
        info!(url = %table_url, "Supabase bot store configured");

        Ok(Self { http, table_url })
    }

    fn row_url(&self, id: BotId) -> String {
        format!("{}?id=eq.{id}", self.table_url)
    }

    async fn check(response: Response, id: Option<BotId>) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if let (Some(id), StatusCode::NOT_ACCEPTABLE) = (id, status) {
            return Err(StoreError::NotFound(id));
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Backend {
            status: status.as_u16(),
            body,
        })
    }
}

impl BotStore for SupabaseBotStore {
    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<Bot>>> {
        Box::pin(async move {
            let response = self
                .http
                .get(format!("{}?select=*&order=created_at.desc", self.table_url))
                .send()
                .await?;
            let bots: Vec<Bot> = Self::check(response, None).await?.json().await?;
            debug!(count = bots.len(), "Listed bots");
            Ok(bots)
        })
    }

    fn get(&self, id: BotId) -> BoxFuture<'_, StoreResult<Bot>> {
        Box::pin(async move {
            let response = self
                .http
                .get(self.row_url(id))
                .query(&[("select", "*")])
                .header(ACCEPT, SINGLE_OBJECT)
                .send()
                .await?;
            Ok(Self::check(response, Some(id)).await?.json().await?)
        })
    }

    fn create(&self, bot: NewBot) -> BoxFuture<'_, StoreResult<Bot>> {
        Box::pin(async move {
            bot.validate()?;
            let row = InsertRow {
                name: bot.name.trim(),
                pair: &bot.pair,
                desired_direction: Decimal::ZERO,
            };
            let response = self
                .http
                .post(&self.table_url)
                .header("Prefer", "return=representation")
                .header(ACCEPT, SINGLE_OBJECT)
                .json(&row)
                .send()
                .await?;
            let created: Bot = Self::check(response, None).await?.json().await?;
            info!(bot_id = %created.id, pair = %created.pair, "Bot created");
            Ok(created)
        })
    }

    fn update(&self, id: BotId, update: BotUpdate) -> BoxFuture<'_, StoreResult<Bot>> {
        Box::pin(async move {
            update.validate()?;
            let row = PatchRow {
                update: &update,
                updated_at: Utc::now(),
            };
            let response = self
                .http
                .patch(self.row_url(id))
                .header("Prefer", "return=representation")
                .header(ACCEPT, SINGLE_OBJECT)
                .json(&row)
                .send()
                .await?;
            Ok(Self::check(response, Some(id)).await?.json().await?)
        })
    }

    fn delete(&self, id: BotId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let response = self
                .http
                .delete(self.row_url(id))
                .header("Prefer", "return=representation")
                .send()
                .await?;
            let deleted: Vec<serde_json::Value> =
                Self::check(response, Some(id)).await?.json().await?;
            if deleted.is_empty() {
                return Err(StoreError::NotFound(id));
            }
            info!(bot_id = %id, "Bot deleted");
            Ok(())
        })
    }
}

impl fmt::Debug for SupabaseBotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseBotStore")
            .field("table_url", &self.table_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(url: &str) -> SupabaseConfig {
        SupabaseConfig {
            url: url.to_string(),
            service_role_key: "service-role-secret".to_string(),
            table: "bots".to_string(),
            request_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_table_url() {
        let store = SupabaseBotStore::new(config("https://abc.supabase.co/")).unwrap();
        assert_eq!(store.table_url, "https://abc.supabase.co/rest/v1/bots");
        assert!(!format!("{:?}", config("x")).contains("service-role-secret"));
    }

    #[test]
    fn test_missing_credentials() {
        let mut cfg = config("https://abc.supabase.co");
        cfg.service_role_key = String::new();
        assert!(matches!(
            SupabaseBotStore::new(cfg),
            Err(StoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_patch_row_flattens_update() {
        let update = BotUpdate::direction(dec!(0.5));
        let row = PatchRow {
            update: &update,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["desired_direction"], "0.5");
        assert!(json.get("name").is_none());
        assert!(json.get("updated_at").is_some());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_http_error() {
        let store = SupabaseBotStore::new(config("http://127.0.0.1:9")).unwrap();
        assert!(matches!(
            store.list().await,
            Err(StoreError::HttpClient(_))
        ));
    }
}
