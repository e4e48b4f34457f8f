// src/provider/http.rs

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::error::ProviderError;
use super::normalize;
use super::types::{SearchQuery, SeriesMetadata, SeriesSummary, TimePoint, VintageQuery};
use super::DataProvider;
use crate::vintages::VintageMap;

pub const DEFAULT_SERVER: &str = "https://api.ceicdata.com/v2";

/// Hard stop for runaway pagination.
const MAX_SEARCH_PAGES: u32 = 50;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub timeout: Duration,
    pub page_size: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            timeout: Duration::from_secs(30),
            page_size: 100,
        }
    }
}

/// CEIC API v2 client holding a session token.
#[derive(Debug, Clone)]
pub struct CeicClient {
    http: Client,
    base: Url,
    token: String,
    options: ClientOptions,
}

fn build_http(options: &ClientOptions) -> Result<Client, ProviderError> {
    Ok(Client::builder().timeout(options.timeout).gzip(true).build()?)
}

impl CeicClient {
    /// Log in with username and password and keep the returned session token.
    #[instrument(level = "info", skip(password, options))]
    pub async fn login(
        server: &str,
        username: &str,
        password: &str,
        options: ClientOptions,
    ) -> Result<Self, ProviderError> {
        let base = Url::parse(server)?;
        let http = build_http(&options)?;
        let url = endpoint(&base, &["login"])?;

        let resp = http
            .post(url.clone())
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!("login rejected ({})", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }

        let body: Value = serde_json::from_str(&resp.text().await?)?;
        let token = ["session", "token"]
            .iter()
            .find_map(|k| {
                body.get(k)
                    .or_else(|| body.get("data").and_then(|d| d.get(k)))
                    .and_then(Value::as_str)
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::Auth("no session token in login response".into()))?
            .to_string();

        info!("logged in");
        Ok(Self {
            http,
            base,
            token,
            options,
        })
    }

    /// Reuse an existing session token.
    pub fn with_token(
        server: &str,
        token: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http: build_http(&options)?,
            base: Url::parse(server)?,
            token: token.into(),
            options,
        })
    }

    async fn get_json_core(&self, url: &Url) -> Result<Value, ProviderError> {
        debug!(path = %url.path(), "GET");
        let resp = self.http.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status,
                url: url.path().to_string(),
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET `segments` with `params`, retrying transient failures with exponential backoff.
    async fn get_json(
        &self,
        segments: &[&str],
        params: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        let mut url = endpoint(&self.base, segments)?;
        {
            let mut q = url.query_pairs_mut();
            for (k, v) in params {
                q.append_pair(k, v);
            }
            q.append_pair("format", "json");
            q.append_pair("token", &self.token);
        }

        let mut attempts = 0;
        loop {
            match self.get_json_core(&url).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempts < self.options.max_retries => {
                    attempts += 1;
                    let backoff = self.options.initial_backoff_ms * 2u64.pow(attempts - 1);
                    warn!(
                        path = %url.path(),
                        attempt = attempts,
                        delay_ms = backoff,
                        error = %e,
                        "Retrying"
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    error!(path = %url.path(), error = %e, "request failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Append path segments to the server base, e.g. `/v2` + `series/1/data`.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ProviderError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ProviderError::Malformed(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl DataProvider for CeicClient {
    #[instrument(level = "debug", skip(self))]
    async fn metadata(&self, series_id: &str) -> Result<SeriesMetadata, ProviderError> {
        let v = self.get_json(&["series", series_id, "metadata"], &[]).await?;
        normalize::metadata(&v)
    }

    #[instrument(level = "debug", skip(self))]
    async fn latest_series(&self, series_id: &str) -> Result<Vec<TimePoint>, ProviderError> {
        let v = self.get_json(&["series", series_id, "data"], &[]).await?;
        normalize::time_points(&v)
    }

    #[instrument(level = "debug", skip(self))]
    async fn vintages(
        &self,
        series_id: &str,
        query: &VintageQuery,
    ) -> Result<VintageMap, ProviderError> {
        let param = match query {
            VintageQuery::StartDate(d) => ("vintages_start_date", d.format("%Y-%m-%d").to_string()),
            VintageQuery::Count(n) => ("vintages_count", n.to_string()),
        };
        let v = self
            .get_json(&["series", series_id, "vintages"], &[param])
            .await?;
        normalize::vintages(&v)
    }

    #[instrument(level = "debug", skip(self), fields(keyword = %query.keyword))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SeriesSummary>, ProviderError> {
        let limit = self.options.page_size.max(1);
        let mut hits = Vec::new();

        for page in 0..MAX_SEARCH_PAGES {
            let offset = page * limit;
            let params = [
                ("keyword", query.keyword.clone()),
                ("frequency", query.frequency.clone()),
                ("geo", query.geo.clone()),
                ("status", query.status.clone()),
                ("with_vintage_enabled_only", "TRUE".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ];
            let v = self.get_json(&["search"], &params).await?;
            let (page_hits, total) = normalize::search_page(&v)?;
            let returned = page_hits.len();
            hits.extend(page_hits);

            let done = returned < limit as usize
                || total.map_or(false, |t| hits.len() as u64 >= t);
            if returned == 0 || done {
                break;
            }
        }

        debug!(count = hits.len(), "search complete");
        Ok(hits)
    }
}
