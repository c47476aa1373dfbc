//! User registry: registration, admin verification, soft deactivation.

use crate::identity::error::IdentityError;
use crate::identity::types::{normalize_wallet, Identity, Role, User};
use crate::persist::{Backend, PersistError};
use chrono::Utc;
use log::info;
use std::sync::Arc;

pub struct UserRegistry {
    backend: Arc<dyn Backend>,
}

impl UserRegistry {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Register a wallet under a role. Wallet addresses are unique; a second
    /// registration of the same wallet is a validation failure.
    pub async fn register(&self, wallet: &str, role: Role) -> Result<User, IdentityError> {
        let wallet = normalize_wallet(wallet);
        if wallet.is_empty() {
            return Err(IdentityError::Validation(
                "wallet address must be set".to_string(),
            ));
        }

        let user = User::new(&wallet, role);
        match self.backend.insert_user(&user).await {
            Ok(()) => {
                info!("registered {} as {}", user.wallet_address, user.role);
                Ok(user)
            }
            Err(PersistError::DuplicateWallet(w)) => Err(IdentityError::Validation(format!(
                "wallet {} is already registered",
                w
            ))),
            Err(e) => Err(IdentityError::LookupFailed(e)),
        }
    }

    /// Admin-only: mark a user's credentials as checked (or revoke that).
    pub async fn set_verified(
        &self,
        actor: &Identity,
        wallet: &str,
        verified: bool,
    ) -> Result<User, IdentityError> {
        self.require_admin(actor)?;
        let mut user = self.lookup_required(wallet).await?;
        user.verified = verified;
        self.backend.update_user(&user).await?;
        info!(
            "{} set verified={} on {}",
            actor.wallet().unwrap_or("?"),
            verified,
            user.wallet_address
        );
        Ok(user)
    }

    /// Admin-only: soft-deactivate a user. The row stays for audit history.
    pub async fn deactivate(&self, actor: &Identity, wallet: &str) -> Result<User, IdentityError> {
        self.require_admin(actor)?;
        let mut user = self.lookup_required(wallet).await?;
        if user.deactivated_at.is_none() {
            user.deactivated_at = Some(Utc::now().timestamp());
            self.backend.update_user(&user).await?;
        }
        Ok(user)
    }

    fn require_admin(&self, actor: &Identity) -> Result<(), IdentityError> {
        if actor.role() != Some(Role::Admin) {
            return Err(IdentityError::Forbidden("admin role required"));
        }
        Ok(())
    }

    async fn lookup_required(&self, wallet: &str) -> Result<User, IdentityError> {
        let wallet = normalize_wallet(wallet);
        self.backend
            .find_user_by_wallet(&wallet)
            .await?
            .ok_or_else(|| IdentityError::Validation(format!("unknown wallet {}", wallet)))
    }
}
