//! Read-only identity directory mapping chat identities to tracker logins.
//!
//! Loaded once from configuration and passed by reference to the components
//! that need it; an identity absent from the table can never drive a remote
//! mutation.

use std::collections::HashMap;

use serde::Deserialize;

/// One configured person: chat identity, display name, and the tracker
/// login they use on each source.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub chat_id: String,
    pub display_name: String,
    #[serde(default)]
    pub tracker_logins: HashMap<String, String>,
}

/// Immutable lookup table over configured identities.
#[derive(Debug, Clone, Default)]
pub struct IdentityDirectory {
    identities: Vec<Identity>,
}

impl IdentityDirectory {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    pub fn by_chat_id(&self, chat_id: &str) -> Option<&Identity> {
        self.identities
            .iter()
            .find(|identity| identity.chat_id == chat_id)
    }

    /// Tracker login the chat identity uses on `source`, if mapped.
    pub fn login_for(&self, chat_id: &str, source: &str) -> Option<&str> {
        self.by_chat_id(chat_id)?
            .tracker_logins
            .get(source)
            .map(String::as_str)
    }

    /// Display name behind a tracker login on `source`. Unmatched logins
    /// resolve to `None`, not an error: the fetch path renders them empty.
    pub fn display_name_for_login(&self, source: &str, login: &str) -> Option<&str> {
        self.identities
            .iter()
            .find(|identity| {
                identity
                    .tracker_logins
                    .get(source)
                    .is_some_and(|mapped| mapped == login)
            })
            .map(|identity| identity.display_name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}
