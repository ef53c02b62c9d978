use crate::error::{calendar_error, SyncResult};
use chrono::Utc;
use redis::{AsyncCommands, Client as RedisClient};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

/// Redis key holding the OAuth token blob
const TOKEN_KEY: &str = "planicare:google_token";

/// OAuth token cache backed by Redis, refreshing through the Google token
/// endpoint when the stored token has expired.
#[derive(Clone)]
pub struct TokenManager {
    client_id: String,
    client_secret: String,
    client: Client,
    redis: RedisClient,
}

impl TokenManager {
    pub fn new(client_id: String, client_secret: String, redis_url: &str) -> SyncResult<Self> {
        let redis = RedisClient::open(redis_url)
            .map_err(|e| calendar_error(&format!("Failed to create Redis client: {}", e)))?;

        Ok(Self {
            client_id,
            client_secret,
            client: Client::new(),
            redis,
        })
    }

    /// Get a valid access token, refreshing it if expired
    pub async fn access_token(&self) -> SyncResult<String> {
        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| calendar_error(&format!("Failed to connect to Redis: {}", e)))?;

        let token_str: Option<String> = conn
            .get(TOKEN_KEY)
            .await
            .map_err(|e| calendar_error(&format!("Failed to read token from Redis: {}", e)))?;

        let Some(token_str) = token_str else {
            return Err(calendar_error(
                "No token found. Complete the OAuth bootstrap and store the token in Redis.",
            ));
        };

        let token: Value = serde_json::from_str(&token_str)
            .map_err(|e| calendar_error(&format!("Failed to parse token JSON: {}", e)))?;

        if let Some(expiry) = token.get("expires_at").and_then(|v| v.as_i64()) {
            if expiry > Utc::now().timestamp() {
                return extract_access_token(&token);
            }
        }

        let refreshed = self.refresh_token(&token).await?;

        let refreshed_str = serde_json::to_string(&refreshed)
            .map_err(|e| calendar_error(&format!("Failed to serialize token: {}", e)))?;
        conn.set::<_, _, ()>(TOKEN_KEY, refreshed_str)
            .await
            .map_err(|e| calendar_error(&format!("Failed to store refreshed token: {}", e)))?;

        extract_access_token(&refreshed)
    }

    /// Exchange the refresh token for a new access token
    async fn refresh_token(&self, token: &Value) -> SyncResult<Value> {
        let refresh_token = token
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| calendar_error("No refresh token in token data"))?;

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&params)
            .send()
            .await
            .map_err(|e| calendar_error(&format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(calendar_error(&format!(
                "Token refresh failed: HTTP {} - {}",
                status, body
            )));
        }

        let fresh: Value = response
            .json()
            .await
            .map_err(|e| calendar_error(&format!("Failed to parse token response: {}", e)))?;

        let expires_in = fresh.get("expires_in").and_then(|v| v.as_i64()).unwrap_or(3600);
        let access_token = fresh
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| calendar_error("No access token in refresh response"))?;

        info!("Refreshed Google OAuth token");

        Ok(json!({
            "access_token": access_token,
            "refresh_token": refresh_token,
            "expires_at": Utc::now().timestamp() + expires_in - 60,
        }))
    }
}

fn extract_access_token(token: &Value) -> SyncResult<String> {
    token
        .get("access_token")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| calendar_error("No access token available"))
}
