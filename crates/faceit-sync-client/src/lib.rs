// # Faceit Profile Client
//
// This crate provides the Faceit Data API v4 implementation of
// `ProfileClient` for faceit-sync.
//
// ## Behavior
//
// - One HTTP request per call; no retries, caching or background tasks
//   (the scheduler's next pass is the retry)
// - Bearer token authentication with the configured API key
// - HTTP timeout of 10 seconds
// - 404 maps to `Error::NotFound`; every other failure (transport,
//   non-success status, unparsable body) maps to `Error::Upstream`
//
// ## Security Requirements
//
// - The API key NEVER appears in logs or `Debug` output
// - Construction fails fast if the key is empty
//
// ## API Reference
//
// - Lookup by nickname: GET `/players?nickname=<name>`
// - Lookup by id: GET `/players/<player_id>`

use async_trait::async_trait;
use faceit_sync_core::traits::{GameStats, Profile, ProfileClient};
use faceit_sync_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Faceit Data API base URL
pub const FACEIT_API_BASE: &str = "https://open.faceit.com/data/v4";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Player document as returned by the Data API
#[derive(Debug, Deserialize)]
struct PlayerResponse {
    player_id: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    games: HashMap<String, GameResponse>,
}

#[derive(Debug, Deserialize)]
struct GameResponse {
    skill_level: Option<i64>,
}

/// Parse a player document into a profile
///
/// Games without a skill level are dropped: the player has the game
/// attached but no rating for it.
pub fn parse_player(body: &str) -> Result<Profile> {
    let player: PlayerResponse = serde_json::from_str(body)
        .map_err(|e| Error::upstream(format!("Failed to parse player response: {e}")))?;

    if player.player_id.is_empty() {
        return Err(Error::upstream("Player response has an empty player_id"));
    }

    let games = player
        .games
        .into_iter()
        .filter_map(|(game, stats)| stats.skill_level.map(|tier| (game, GameStats { tier })))
        .collect();

    Ok(Profile {
        id: player.player_id,
        nickname: player.nickname,
        games,
    })
}

/// Faceit Data API client
pub struct FaceitClient {
    /// ⚠️ NEVER log this value
    api_key: String,

    /// API base URL (overridable for staging or local mocks)
    base_url: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for FaceitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceitClient")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl FaceitClient {
    /// Create a client against the public Data API
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, FACEIT_API_BASE)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("Faceit API key cannot be empty"));
        }

        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(Error::config(format!(
                "Faceit API base URL must use HTTP or HTTPS: {base_url}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }

    fn player_by_id_url(&self, profile_id: &str) -> String {
        format!("{}/players/{}", self.base_url, profile_id)
    }

    fn players_url(&self) -> String {
        format!("{}/players", self.base_url)
    }

    /// Send a GET request and parse the player document
    async fn get_player(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Profile> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::upstream(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                404 => Error::not_found(what.to_string()),
                401 | 403 => Error::upstream(format!(
                    "Authentication failed: invalid API key or insufficient permissions. Status: {status}"
                )),
                429 => Error::upstream(format!("Rate limit exceeded. Status: {status}")),
                500..=599 => Error::upstream(format!(
                    "Faceit server error (transient): {status} - {body}"
                )),
                _ => Error::upstream(format!("Player lookup failed: {status} - {body}")),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::upstream(format!("Failed to read response body: {e}")))?;

        parse_player(&body)
    }
}

#[async_trait]
impl ProfileClient for FaceitClient {
    async fn fetch_by_username(&self, username: &str) -> Result<Profile> {
        tracing::debug!("Looking up Faceit player by nickname: {}", username);

        let request = self
            .client
            .get(self.players_url())
            .query(&[("nickname", username)]);

        self.get_player(request, &format!("nickname {username}")).await
    }

    async fn fetch_by_id(&self, profile_id: &str) -> Result<Profile> {
        if profile_id.is_empty() || profile_id.contains(['/', '?', '#']) {
            return Err(Error::invalid_input(format!("Invalid profile id: {profile_id}")));
        }

        tracing::debug!("Looking up Faceit player by id: {}", profile_id);

        let request = self.client.get(self.player_by_id_url(profile_id));
        self.get_player(request, &format!("player {profile_id}")).await
    }

    fn client_name(&self) -> &'static str {
        "faceit"
    }
}
