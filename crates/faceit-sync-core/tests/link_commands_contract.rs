//! Contract Test: Link Commands
//!
//! This test verifies the `link` / `unlink` command handlers.
//!
//! Constraints verified:
//! - A profile is linked to at most one local user, and a user to at most one profile
//! - Rejected commands never mutate the link store
//! - `unlink` checks permission before anything else
//! - Every outcome has a reply

mod common;

use common::*;
use faceit_sync_core::commands::LINK_USAGE;
use faceit_sync_core::traits::LinkStore;
use faceit_sync_core::{Error, GroupId, LinkCommands, MemoryLinkStore, Profile};
use std::sync::Arc;

fn commands(profiles: &StaticProfileClient, links: &MemoryLinkStore) -> LinkCommands {
    LinkCommands::new(Arc::new(profiles.clone()), Arc::new(links.clone()), &test_config())
        .expect("valid configuration")
}

fn admin() -> std::collections::BTreeSet<GroupId> {
    groups(&["admin"])
}

#[tokio::test]
async fn link_stores_profile_for_requesting_user() {
    let profiles = StaticProfileClient::new().with_player("p1", "alice", 6);
    let links = MemoryLinkStore::new();

    let linked = commands(&profiles, &links).link("alice", "u1").await.unwrap();

    assert_eq!(linked.nickname, "alice");
    assert_eq!(linked.link.profile_id, "p1");
    assert_eq!(links.get("profile:p1").await.unwrap(), Some("u1".to_string()));
}

#[tokio::test]
async fn link_accepts_profile_url() {
    let profiles = StaticProfileClient::new().with_player("p1", "alice", 6);
    let links = MemoryLinkStore::new();

    commands(&profiles, &links)
        .link("[URL]https://www.faceit.com/en/players/alice[/URL]", "u1")
        .await
        .unwrap();

    assert_eq!(links.get("profile:p1").await.unwrap(), Some("u1".to_string()));
}

#[tokio::test]
async fn linking_a_linked_profile_is_rejected() {
    let profiles = StaticProfileClient::new().with_player("p1", "alice", 6);
    let links = MemoryLinkStore::with_entries([link_entry("p1", "u1")]);

    let result = commands(&profiles, &links).link("alice", "u2").await;

    assert!(matches!(result, Err(Error::AlreadyLinked(ref id)) if id == "p1"));
    assert_eq!(links.len().await, 1);
    assert_eq!(links.get("profile:p1").await.unwrap(), Some("u1".to_string()));
}

#[tokio::test]
async fn user_with_a_link_cannot_link_another_profile() {
    let profiles = StaticProfileClient::new()
        .with_player("p1", "alice", 6)
        .with_player("p2", "alt", 2);
    let links = MemoryLinkStore::with_entries([link_entry("p1", "u1")]);

    let result = commands(&profiles, &links).link("alt", "u1").await;

    assert!(matches!(
        result,
        Err(Error::UserAlreadyLinked { ref profile_id, .. }) if profile_id == "p1"
    ));
    assert_eq!(links.get("profile:p2").await.unwrap(), None);
}

#[tokio::test]
async fn profile_without_tracked_game_is_rejected() {
    let profiles = StaticProfileClient::new();
    profiles.respond(
        "p1",
        ProfileResponse::Found(Profile::new("p1", "alice").with_game("dota2", 5)),
    );
    let links = MemoryLinkStore::new();

    let result = commands(&profiles, &links).link("alice", "u1").await;

    assert!(matches!(result, Err(Error::NotGameLinked { .. })));
    assert!(links.is_empty().await);
}

#[tokio::test]
async fn unknown_username_is_not_found() {
    let profiles = StaticProfileClient::new();
    let links = MemoryLinkStore::new();
    let commands = commands(&profiles, &links);

    assert!(matches!(commands.link("nobody", "u1").await, Err(Error::NotFound(_))));
    assert_eq!(
        commands.handle_link("nobody", "u1").await,
        "❌ Error: Could not resolve the username!"
    );
    assert!(links.is_empty().await);
}

#[tokio::test]
async fn upstream_failure_has_its_own_reply() {
    let profiles = StaticProfileClient::new();
    profiles.respond_to_username("alice", ProfileResponse::Upstream);
    let links = MemoryLinkStore::new();
    let commands = commands(&profiles, &links);

    assert!(matches!(commands.link("alice", "u1").await, Err(Error::Upstream(_))));
    assert_eq!(
        commands.handle_link("alice", "u1").await,
        "❌ Error: Faceit is not reachable right now, please try again later."
    );
    assert!(links.is_empty().await);
}

#[tokio::test]
async fn invalid_input_never_reaches_the_client() {
    let profiles = StaticProfileClient::new();
    let links = MemoryLinkStore::new();
    let commands = commands(&profiles, &links);

    assert!(matches!(
        commands.link("https://www.faceit.com/en/teams/abc", "u1").await,
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(commands.handle_link("  ", "u1").await, LINK_USAGE);
    assert_eq!(profiles.fetch_by_username_count(), 0);
}

#[tokio::test]
async fn concurrent_links_of_one_profile_admit_a_single_winner() {
    let profiles = StaticProfileClient::new().with_player("p1", "alice", 6);
    let links = MemoryLinkStore::new();
    let commands = Arc::new(commands(&profiles, &links));

    let (first, second) = tokio::join!(
        commands.link("alice", "u1"),
        commands.link("alice", "u2"),
    );

    assert_eq!(
        [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "exactly one link succeeds"
    );
    assert_eq!(links.len().await, 1);
}

#[tokio::test]
async fn unlink_requires_permission_group() {
    let profiles = StaticProfileClient::new();
    let links = MemoryLinkStore::with_entries([link_entry("p1", "u1")]);
    let commands = commands(&profiles, &links);

    let result = commands.unlink("u1", &groups(&["G5", "guest"])).await;

    assert!(matches!(result, Err(Error::PermissionDenied(_))));
    assert_eq!(links.get("profile:p1").await.unwrap(), Some("u1".to_string()));
    assert_eq!(
        commands.handle_unlink("u1", &groups(&[])).await,
        "❌ Error: You are not allowed to unlink accounts!"
    );
}

#[tokio::test]
async fn permission_is_checked_before_link_existence() {
    let profiles = StaticProfileClient::new();
    let links = MemoryLinkStore::new();

    let result = commands(&profiles, &links).unlink("ghost", &groups(&[])).await;

    assert!(matches!(result, Err(Error::PermissionDenied(_))));
}

#[tokio::test]
async fn unlinking_an_unlinked_user_changes_nothing() {
    let profiles = StaticProfileClient::new();
    let links = MemoryLinkStore::with_entries([link_entry("p1", "u1")]);
    let commands = commands(&profiles, &links);

    let result = commands.unlink("u2", &admin()).await;

    assert!(matches!(result, Err(Error::NotLinked(ref user)) if user == "u2"));
    assert_eq!(links.len().await, 1);
    assert_eq!(
        commands.handle_unlink("u2", &admin()).await,
        "❌ Error: This user is not linked!"
    );
}

#[tokio::test]
async fn unlink_removes_the_link() {
    let profiles = StaticProfileClient::new();
    let links = MemoryLinkStore::with_entries([link_entry("p1", "u1"), link_entry("p2", "u2")]);
    let commands = commands(&profiles, &links);

    let removed = commands.unlink("u1", &admin()).await.unwrap();

    assert_eq!(removed.profile_id, "p1");
    assert_eq!(links.get("profile:p1").await.unwrap(), None);
    assert_eq!(links.get("profile:p2").await.unwrap(), Some("u2".to_string()));
}

#[tokio::test]
async fn replies_name_the_accounts() {
    let profiles = StaticProfileClient::new().with_player("p1", "alice", 6);
    let links = MemoryLinkStore::new();
    let commands = commands(&profiles, &links);

    let linked = commands.handle_link("alice", "u1").await;
    assert!(linked.contains("alice"), "link reply names the nickname: {linked}");

    let unlinked = commands.handle_unlink("u1", &admin()).await;
    assert!(unlinked.contains("u1") && unlinked.contains("p1"), "unexpected reply: {unlinked}");

    let relinked_elsewhere = commands.handle_link("alice", "u2").await;
    assert!(relinked_elsewhere.starts_with("🔗"), "profile is free again after unlink");
}
