//! Collaborator traits for the Faceit sync system
//!
//! The core never talks to the rating service, the chat server or storage
//! directly; it goes through these interfaces.
//!
//! - [`ProfileClient`]: Fetch profiles and skill tiers from the rating service
//! - [`UserDirectory`]: Resolve live users on the host chat server
//! - [`LinkStore`]: Key-value mapping of profile links

pub mod profile_client;
pub mod user_directory;
pub mod link_store;

pub use profile_client::{GameStats, Profile, ProfileClient};
pub use user_directory::{GroupId, UserDirectory, UserHandle};
pub use link_store::LinkStore;
