use crate::config::types::UserConfig;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Runtime user record, immutable once loaded.
#[derive(Clone)]
pub struct UserRecord {
    pub username: String,
    pub expected_address: IpAddr,
    pub secret_message: String,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .field("expected_address", &self.expected_address)
            .field("secret_message", &"***")
            .finish()
    }
}

impl UserRecord {
    pub fn from_config(cfg: &UserConfig) -> Self {
        Self {
            username: cfg.username.clone(),
            expected_address: cfg.address.to_canonical(),
            secret_message: cfg.message.clone(),
        }
    }

    /// Exact match of the connection's source IP against the expected one.
    ///
    /// IPv4-mapped IPv6 peers (dual-stack listeners) compare as their IPv4 form.
    pub fn is_source_allowed(&self, peer: &IpAddr) -> bool {
        peer.to_canonical() == self.expected_address
    }

    /// Message length in characters, as reported by `msglen`.
    pub fn message_len(&self) -> usize {
        self.secret_message.chars().count()
    }
}

/// Username-keyed store of user records.
#[derive(Debug, Default)]
pub struct UserStore {
    users: HashMap<String, Arc<UserRecord>>,
}

impl UserStore {
    /// Build from config entries. Later duplicates replace earlier ones;
    /// config validation rejects duplicates before this point.
    pub fn from_config(users: &[UserConfig]) -> Self {
        let users = users
            .iter()
            .map(|u| (u.username.clone(), Arc::new(UserRecord::from_config(u))))
            .collect();
        Self { users }
    }

    pub fn get(&self, username: &str) -> Option<&Arc<UserRecord>> {
        self.users.get(username)
    }

    pub(crate) fn len(&self) -> usize {
        self.users.len()
    }
}
