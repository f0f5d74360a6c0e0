pub mod user;

use crate::config::types::AppConfig;
use crate::error::CommandError;
use std::net::IpAddr;
use std::sync::Arc;
use user::{UserRecord, UserStore};

/// Read-only username directory shared by every session.
///
/// Loaded once before serving; there is no reload path, so sessions can hold
/// it behind a plain `Arc` without locking.
#[derive(Debug)]
pub struct Directory {
    user_store: UserStore,
}

impl Directory {
    pub fn new(config: &AppConfig) -> Self {
        let user_store = UserStore::from_config(&config.users);
        tracing::info!(users = user_store.len(), "User directory loaded");
        Self { user_store }
    }

    /// Look up `username` and bind it to the connection's source address.
    ///
    /// Fails with `invalid user name` when the name is missing or unknown, and
    /// with `invalid src ip` when `peer` differs from the expected address.
    pub fn authenticate(
        &self,
        username: Option<&str>,
        peer: &IpAddr,
    ) -> Result<Arc<UserRecord>, CommandError> {
        let username = username.ok_or(CommandError::InvalidUserName)?;
        let user = match self.user_store.get(username) {
            Some(u) => u,
            None => {
                tracing::debug!(username = %username, "User not found");
                return Err(CommandError::InvalidUserName);
            }
        };

        if !user.is_source_allowed(peer) {
            tracing::debug!(
                username = %username,
                peer = %peer,
                expected = %user.expected_address,
                "Source address mismatch"
            );
            return Err(CommandError::InvalidSourceIp);
        }

        Ok(user.clone())
    }
}
