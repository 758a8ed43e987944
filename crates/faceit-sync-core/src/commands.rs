//! `link` / `unlink` command handlers
//!
//! Commands mutate the link store on behalf of chat users. The check and
//! the write of a link mutation happen under one lock, so two concurrent
//! `link` calls for the same profile cannot both succeed and a sync pass
//! never observes a half-applied change.
//!
//! Every outcome has a human-readable reply via [`LinkCommands::handle_link`]
//! and [`LinkCommands::handle_unlink`].

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::link::{self, Link};
use crate::traits::{GroupId, LinkStore, Profile, ProfileClient};

/// Usage line for the link command
pub const LINK_USAGE: &str = "❌ Usage: link <username or profile url>";

static PROFILE_URL_RE: OnceLock<Regex> = OnceLock::new();

fn profile_url_re() -> &'static Regex {
    PROFILE_URL_RE.get_or_init(|| {
        Regex::new(r"^https?://(?:www\.)?faceit\.com/[a-z]{2}/players/([^/?#\s]+)/?$").unwrap()
    })
}

/// Extract a Faceit username from a raw argument or a profile URL
///
/// Accepts a bare nickname, a profile URL such as
/// `https://www.faceit.com/en/players/alice`, or either wrapped in the
/// `[URL]...[/URL]` markup some chat clients add.
pub fn extract_username(input: &str) -> Result<String> {
    let mut unwrapped = input.trim();
    unwrapped = unwrapped.strip_prefix("[URL]").unwrap_or(unwrapped);
    unwrapped = unwrapped.strip_suffix("[/URL]").unwrap_or(unwrapped);
    let unwrapped = unwrapped.trim();

    if unwrapped.is_empty() {
        return Err(Error::invalid_input("missing username"));
    }

    if unwrapped.contains("faceit.com") {
        return profile_url_re()
            .captures(unwrapped)
            .and_then(|caps| caps.get(1))
            .map(|name| name.as_str().to_string())
            .ok_or_else(|| Error::invalid_input(format!("not a Faceit profile URL: {unwrapped}")));
    }

    if unwrapped.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(Error::invalid_input(format!("not a valid username: {unwrapped}")));
    }

    Ok(unwrapped.to_string())
}

/// A successful link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedProfile {
    pub link: Link,
    pub nickname: String,
}

/// Handlers for the `link` and `unlink` commands
pub struct LinkCommands {
    profiles: Arc<dyn ProfileClient>,
    links: Arc<dyn LinkStore>,
    game: String,
    unlink_groups: BTreeSet<GroupId>,
    write_lock: Mutex<()>,
}

impl LinkCommands {
    /// Create the command handlers
    pub fn new(
        profiles: Arc<dyn ProfileClient>,
        links: Arc<dyn LinkStore>,
        config: &SyncConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            profiles,
            links,
            game: config.game.clone(),
            unlink_groups: config.unlink_permission_groups.clone(),
            write_lock: Mutex::new(()),
        })
    }

    /// Link the profile named by `input` to `requesting_user`
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: no username could be extracted
    /// - `NotFound` / `Upstream`: the profile lookup failed
    /// - `AlreadyLinked`: the profile already has a link
    /// - `NotGameLinked`: the profile has no data for the tracked game
    /// - `UserAlreadyLinked`: the requesting user is linked to another profile
    pub async fn link(&self, input: &str, requesting_user: &str) -> Result<LinkedProfile> {
        let username = extract_username(input)?;
        let profile = self.profiles.fetch_by_username(&username).await?;

        let _guard = self.write_lock.lock().await;
        let entries = self.links.get_all().await?;
        self.check_linkable(&profile, &entries, requesting_user)?;

        let new_link = Link::new(profile.id.clone(), requesting_user);
        self.links.set(&new_link.key(), requesting_user).await?;

        info!(
            "Linked profile {} ({}) to {}",
            profile.nickname, profile.id, requesting_user
        );

        Ok(LinkedProfile {
            link: new_link,
            nickname: profile.nickname,
        })
    }

    fn check_linkable(
        &self,
        profile: &Profile,
        entries: &std::collections::HashMap<String, String>,
        requesting_user: &str,
    ) -> Result<()> {
        if entries.contains_key(&link::key_for(&profile.id)) {
            return Err(Error::AlreadyLinked(profile.id.clone()));
        }

        if profile.tier_for(&self.game).is_none() {
            return Err(Error::NotGameLinked {
                profile_id: profile.id.clone(),
                game: self.game.clone(),
            });
        }

        if let Some(existing) = link::find_by_local_user(entries, requesting_user) {
            return Err(Error::UserAlreadyLinked {
                local_user_id: requesting_user.to_string(),
                profile_id: existing.profile_id,
            });
        }

        Ok(())
    }

    /// Remove the link held by `target_user`
    ///
    /// Permission is checked before anything else: the invoker must hold at
    /// least one of the configured unlink groups.
    pub async fn unlink(
        &self,
        target_user: &str,
        invoker_groups: &BTreeSet<GroupId>,
    ) -> Result<Link> {
        if self.unlink_groups.is_disjoint(invoker_groups) {
            return Err(Error::permission_denied(
                "invoker holds none of the unlink permission groups",
            ));
        }

        let _guard = self.write_lock.lock().await;
        let entries = self.links.get_all().await?;
        let existing = link::find_by_local_user(&entries, target_user)
            .ok_or_else(|| Error::NotLinked(target_user.to_string()))?;

        self.links.unset(&existing.key()).await?;

        info!(
            "Unlinked {} from profile {}",
            existing.local_user_id, existing.profile_id
        );
        Ok(existing)
    }

    /// Run `link` and render the reply text
    pub async fn handle_link(&self, input: &str, requesting_user: &str) -> String {
        if input.trim().is_empty() {
            return LINK_USAGE.to_string();
        }

        match self.link(input, requesting_user).await {
            Ok(linked) => format!(
                "🔗 Linked Faceit account {} to your account.",
                linked.nickname
            ),
            Err(e) => {
                self.log_failure("link", requesting_user, &e);
                match e {
                    Error::InvalidInput(_) => {
                        "❌ Error: Could not read a Faceit username from that input!".to_string()
                    }
                    Error::NotFound(_) => "❌ Error: Could not resolve the username!".to_string(),
                    Error::Upstream(_) => {
                        "❌ Error: Faceit is not reachable right now, please try again later."
                            .to_string()
                    }
                    Error::AlreadyLinked(_) => {
                        "❌ Error: This Faceit account is already linked!".to_string()
                    }
                    Error::UserAlreadyLinked { .. } => {
                        "❌ Error: Your account is already linked to a Faceit account!".to_string()
                    }
                    Error::NotGameLinked { game, .. } => {
                        format!("❌ Error: This Faceit account has no {game} data!")
                    }
                    _ => "❌ Error: Something went wrong, please try again later.".to_string(),
                }
            }
        }
    }

    /// Run `unlink` and render the reply text
    pub async fn handle_unlink(
        &self,
        target_user: &str,
        invoker_groups: &BTreeSet<GroupId>,
    ) -> String {
        match self.unlink(target_user, invoker_groups).await {
            Ok(removed) => format!(
                "🔗 Unlinked {} (Faceit ID: {}) from Faceit.",
                removed.local_user_id, removed.profile_id
            ),
            Err(e) => {
                self.log_failure("unlink", target_user, &e);
                match e {
                    Error::PermissionDenied(_) => {
                        "❌ Error: You are not allowed to unlink accounts!".to_string()
                    }
                    Error::NotLinked(_) => "❌ Error: This user is not linked!".to_string(),
                    _ => "❌ Error: Something went wrong, please try again later.".to_string(),
                }
            }
        }
    }

    fn log_failure(&self, command: &str, user: &str, error: &Error) {
        match error {
            Error::Upstream(_) | Error::LinkStore(_) | Error::Io(_) | Error::Json(_) | Error::Other(_) => {
                warn!("{} for {} failed: {}", command, user, error)
            }
            _ => debug!("{} for {} rejected: {}", command, user, error),
        }
    }
}
