// # Profile Client Trait
//
// Defines the interface for fetching player profiles from the external
// rating service (Faceit).
//
// ## Implementations
//
// - Faceit Data API v4: `faceit-sync-client` crate
//
// ## Usage
//
// ```rust,ignore
// use faceit_sync_core::ProfileClient;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* ProfileClient implementation */;
//
//     let profile = client.fetch_by_username("s1mple").await?;
//     println!("{:?}", profile.tier_for("cs2"));
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-game statistics reported for a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    /// Skill tier (1-10 on Faceit)
    pub tier: i64,
}

/// A profile as reported by the rating service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable profile id
    pub id: String,
    /// Display nickname
    pub nickname: String,
    /// Stats keyed by game name
    pub games: HashMap<String, GameStats>,
}

impl Profile {
    /// Create a profile without any game stats
    pub fn new(id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            games: HashMap::new(),
        }
    }

    /// Add stats for a game
    pub fn with_game(mut self, game: impl Into<String>, tier: i64) -> Self {
        self.games.insert(game.into(), GameStats { tier });
        self
    }

    /// Skill tier for the given game, if the profile plays it
    pub fn tier_for(&self, game: &str) -> Option<i64> {
        self.games.get(game).map(|stats| stats.tier)
    }
}

/// Trait for rating-service clients
///
/// Implementations perform one request per call. They must not retry,
/// cache, or spawn tasks: the scheduler's next pass is the only retry.
///
/// # Errors
///
/// - `Error::NotFound`: the profile does not exist upstream
/// - `Error::Upstream`: non-success status, transport failure or an
///   unparsable body
#[async_trait]
pub trait ProfileClient: Send + Sync {
    /// Fetch a profile by its nickname
    async fn fetch_by_username(&self, username: &str) -> Result<Profile, crate::Error>;

    /// Fetch a profile by its stable id
    async fn fetch_by_id(&self, profile_id: &str) -> Result<Profile, crate::Error>;

    /// Client name (for logging)
    fn client_name(&self) -> &'static str;
}
