//! Authentication collaborator.

use vaultkeep_core::{SecretString, UserId};

/// Supplies the signed-in user and, on demand, their master password.
///
/// Login itself happens elsewhere. `master_password` returning `None` means
/// the vault cannot be unlocked right now.
pub trait AuthProvider: Send + Sync {
    fn user_id(&self) -> UserId;

    fn master_password(&self) -> Option<SecretString>;
}

/// An [`AuthProvider`] with fixed credentials.
#[derive(Debug, Clone)]
pub struct StaticAuth {
    user: UserId,
    password: Option<SecretString>,
}

impl StaticAuth {
    pub fn new(user: impl Into<UserId>, password: impl Into<SecretString>) -> Self {
        Self {
            user: user.into(),
            password: Some(password.into()),
        }
    }

    /// A signed-in user whose password is not available.
    pub fn without_password(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            password: None,
        }
    }
}

impl AuthProvider for StaticAuth {
    fn user_id(&self) -> UserId {
        self.user.clone()
    }

    fn master_password(&self) -> Option<SecretString> {
        self.password.clone()
    }
}
