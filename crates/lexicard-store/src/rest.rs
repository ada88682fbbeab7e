//! REST word store for a PostgREST-style hosted backend.
//!
//! Talks to a `user_words` table whose rows embed the catalog entry from
//! `words` under the `word` key. Row-level security on the backend limits
//! every request to the caller's own rows.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Serialize;
use tracing::instrument;

use lexicard_core::error::StoreError;
use lexicard_core::model::{MasteryLevel, ReviewUpdate, TrackedWord, TrackingId, UserId, WordEntry};
use lexicard_core::traits::WordStore;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const TABLE_PATH: &str = "/rest/v1/user_words";
const SELECT_COLUMNS: &str = "id,user_id,mastery_level,next_review_date,last_reviewed_at,review_count,is_favorited,word:words(id,word,phonetic,definition,part_of_speech,difficulty_level)";

/// Word store backed by a hosted REST API.
pub struct RestStore {
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        api_key: &str,
        access_token: Option<String>,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::Backend(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token,
            client,
        })
    }

    fn url(&self, params: &[(&str, String)]) -> Result<Url, StoreError> {
        Url::parse_with_params(&format!("{}{TABLE_PATH}", self.base_url), params)
            .map_err(|e| StoreError::Backend(format!("invalid base URL {}: {e}", self.base_url)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("authorization", format!("Bearer {bearer}"))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(DEFAULT_TIMEOUT_SECS)
            } else if e.is_connect() {
                StoreError::Network(format!("backend not reachable at {}", self.base_url))
            } else {
                StoreError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status < 400 {
            return Ok(response);
        }

        let message = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(status, "failed to read error response body: {e}");
                String::new()
            }
        };
        Err(match status {
            401 | 403 => StoreError::Unauthorized(message),
            409 => StoreError::Conflict(message),
            _ => StoreError::Api { status, message },
        })
    }

    async fn rows(&self, response: Response) -> Result<Vec<TrackedWord>, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(format!("failed to parse rows: {e}")))
    }

    /// PATCH a single row by tracking id, failing if no row matched.
    ///
    /// With `owner` set the row must also belong to that user.
    async fn patch<B: Serialize + Sync>(
        &self,
        owner: Option<&UserId>,
        id: &TrackingId,
        body: &B,
    ) -> Result<(), StoreError> {
        let mut params = vec![("id", format!("eq.{id}"))];
        if let Some(user) = owner {
            params.push(("user_id", format!("eq.{user}")));
        }
        params.push(("select", "id".to_string()));
        let url = self.url(&params)?;
        let response = self
            .send(
                self.request(Method::PATCH, url)
                    .header("prefer", "return=representation")
                    .json(body),
            )
            .await?;
        let touched: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if touched.is_empty() {
            return Err(StoreError::NotFound(*id));
        }
        Ok(())
    }
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse the total from a `Content-Range` header such as `0-4/5` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.parse().ok()
}

#[derive(Serialize)]
struct NewRow<'a> {
    user_id: &'a UserId,
    word_id: &'a uuid::Uuid,
    mastery_level: MasteryLevel,
    next_review_date: DateTime<Utc>,
}

#[derive(Serialize)]
struct FavoritePatch {
    is_favorited: bool,
}

#[async_trait]
impl WordStore for RestStore {
    fn name(&self) -> &str {
        "rest"
    }

    #[instrument(skip_all, fields(user = %user))]
    async fn fetch_due(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrackedWord>, StoreError> {
        let url = self.url(&[
            ("select", SELECT_COLUMNS.to_string()),
            ("user_id", format!("eq.{user}")),
            ("next_review_date", format!("lte.{}", timestamp(now))),
            ("order", "next_review_date.asc".to_string()),
        ])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        let rows = self.rows(response).await?;
        tracing::debug!(due = rows.len(), "fetched due words");
        Ok(rows)
    }

    #[instrument(skip_all, fields(user = %user))]
    async fn count_due(&self, user: &UserId, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let url = self.url(&[
            ("select", "id".to_string()),
            ("user_id", format!("eq.{user}")),
            ("next_review_date", format!("lte.{}", timestamp(now))),
        ])?;
        let response = self
            .send(self.request(Method::HEAD, url).header("prefer", "count=exact"))
            .await?;
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| StoreError::Serialization("missing or invalid Content-Range".into()))
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn update_review(
        &self,
        id: &TrackingId,
        update: &ReviewUpdate,
    ) -> Result<(), StoreError> {
        self.patch(None, id, update).await
    }

    #[instrument(skip_all, fields(user = %user))]
    async fn list_words(&self, user: &UserId) -> Result<Vec<TrackedWord>, StoreError> {
        let url = self.url(&[
            ("select", SELECT_COLUMNS.to_string()),
            ("user_id", format!("eq.{user}")),
            ("order", "next_review_date.asc".to_string()),
        ])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        self.rows(response).await
    }

    #[instrument(skip_all, fields(user = %user, word = %word.word))]
    async fn add_word(
        &self,
        user: &UserId,
        word: &WordEntry,
        now: DateTime<Utc>,
        first_review_after: chrono::Duration,
    ) -> Result<TrackedWord, StoreError> {
        let url = self.url(&[("select", SELECT_COLUMNS.to_string())])?;
        let body = NewRow {
            user_id: user,
            word_id: &word.id,
            mastery_level: MasteryLevel::MIN,
            next_review_date: now + first_review_after,
        };
        let response = self
            .send(
                self.request(Method::POST, url)
                    .header("prefer", "return=representation")
                    .json(&body),
            )
            .await?;
        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Serialization("insert returned no row".into()))
    }

    #[instrument(skip_all, fields(user = %user, id = %id))]
    async fn set_favorited(
        &self,
        user: &UserId,
        id: &TrackingId,
        favorited: bool,
    ) -> Result<(), StoreError> {
        self.patch(
            Some(user),
            id,
            &FavoritePatch {
                is_favorited: favorited,
            },
        )
        .await
    }

    #[instrument(skip_all, fields(user = %user, id = %id))]
    async fn remove_word(&self, user: &UserId, id: &TrackingId) -> Result<(), StoreError> {
        let url = self.url(&[
            ("id", format!("eq.{id}")),
            ("user_id", format!("eq.{user}")),
            ("select", "id".to_string()),
        ])?;
        let response = self
            .send(
                self.request(Method::DELETE, url)
                    .header("prefer", "return=representation"),
            )
            .await?;
        let deleted: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound(*id));
        }
        Ok(())
    }
}
