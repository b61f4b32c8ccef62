//! Vault item types.
//!
//! A [`VaultItem`] carries the fields common to every category plus an
//! [`ItemDetails`] tagged union holding the category-specific fields, so a
//! credit card can never carry a login password and vice versa.

use crate::error::Error;
use crate::secret::SecretString;
use crate::types::ItemId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Maximum length of an item name, in characters.
pub const MAX_NAME_LEN: usize = 256;

/// Item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemCategory {
    Login,
    SecureNote,
    CreditCard,
    Identity,
}

impl ItemCategory {
    /// All categories in display order.
    pub const ALL: [ItemCategory; 4] = [
        ItemCategory::Login,
        ItemCategory::SecureNote,
        ItemCategory::CreditCard,
        ItemCategory::Identity,
    ];

    /// Wire name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Login => "login",
            ItemCategory::SecureNote => "secure-note",
            ItemCategory::CreditCard => "credit-card",
            ItemCategory::Identity => "identity",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "login" => Ok(ItemCategory::Login),
            "secure-note" | "note" => Ok(ItemCategory::SecureNote),
            "credit-card" | "card" => Ok(ItemCategory::CreditCard),
            "identity" => Ok(ItemCategory::Identity),
            other => Err(Error::InvalidItem(format!("unknown category '{other}'"))),
        }
    }
}

/// Fields of a login item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<SecretString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Fields of a payment card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardholder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<SecretString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvv: Option<SecretString>,

    /// Expiry as entered, e.g. `08/27`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
}

/// Fields of an identity record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssn: Option<SecretString>,
}

/// Category-specific item content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum ItemDetails {
    Login(LoginFields),
    /// Secure notes keep their body in [`VaultItem::notes`].
    SecureNote,
    CreditCard(CardFields),
    Identity(IdentityFields),
}

impl ItemDetails {
    /// Empty details for a category.
    pub fn empty(category: ItemCategory) -> Self {
        match category {
            ItemCategory::Login => ItemDetails::Login(LoginFields::default()),
            ItemCategory::SecureNote => ItemDetails::SecureNote,
            ItemCategory::CreditCard => ItemDetails::CreditCard(CardFields::default()),
            ItemCategory::Identity => ItemDetails::Identity(IdentityFields::default()),
        }
    }

    /// The category these details belong to.
    pub fn category(&self) -> ItemCategory {
        match self {
            ItemDetails::Login(_) => ItemCategory::Login,
            ItemDetails::SecureNote => ItemCategory::SecureNote,
            ItemDetails::CreditCard(_) => ItemCategory::CreditCard,
            ItemDetails::Identity(_) => ItemCategory::Identity,
        }
    }
}

/// A decrypted vault item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultItem {
    pub id: ItemId,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default)]
    pub favorite: bool,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(flatten)]
    pub details: ItemDetails,

    pub created: DateTime<Utc>,

    pub last_modified: DateTime<Utc>,
}

impl VaultItem {
    /// Materialize a new item under `id`, stamped with `now`.
    pub fn from_new(id: ItemId, new: NewItem, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            notes: new.notes,
            favorite: new.favorite,
            tags: new.tags,
            details: new.details,
            created: now,
            last_modified: now,
        }
    }

    pub fn category(&self) -> ItemCategory {
        self.details.category()
    }

    /// Password of a login item, if any.
    pub fn password(&self) -> Option<&SecretString> {
        match &self.details {
            ItemDetails::Login(login) => login.password.as_ref(),
            _ => None,
        }
    }

    /// Password of a login item when present and non-empty.
    pub fn usable_password(&self) -> Option<&SecretString> {
        self.password().filter(|p| !p.is_empty())
    }

    pub fn username(&self) -> Option<&str> {
        match &self.details {
            ItemDetails::Login(login) => login.username.as_deref(),
            ItemDetails::Identity(identity) => identity.email.as_deref(),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.details {
            ItemDetails::Login(login) => login.url.as_deref(),
            _ => None,
        }
    }

    /// Bump `last_modified`, keeping it strictly increasing even if the
    /// clock has not advanced (or went backwards).
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let floor = self.last_modified + Duration::milliseconds(1);
        self.last_modified = if now > self.last_modified { now } else { floor };
    }

    /// Check the invariants every stored item must satisfy.
    pub fn validate(&self) -> Result<(), Error> {
        validate_name(&self.name)
    }
}

/// Content of an item that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default)]
    pub favorite: bool,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(flatten)]
    pub details: ItemDetails,
}

impl NewItem {
    pub fn new(name: impl Into<String>, details: ItemDetails) -> Self {
        Self {
            name: name.into(),
            notes: None,
            favorite: false,
            tags: BTreeSet::new(),
            details,
        }
    }

    /// A login with the given username and password.
    pub fn login(
        name: impl Into<String>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Self {
        Self::new(
            name,
            ItemDetails::Login(LoginFields {
                username: username.map(str::to_string),
                password: password.map(SecretString::new),
                url: None,
            }),
        )
    }

    /// A secure note with the given body.
    pub fn note(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(name, ItemDetails::SecureNote).with_notes(body)
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.favorite = favorite;
        self
    }

    pub fn category(&self) -> ItemCategory {
        self.details.category()
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_name(&self.name)
    }
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::InvalidItem("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidItem(format!(
            "name exceeds maximum length of {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}
