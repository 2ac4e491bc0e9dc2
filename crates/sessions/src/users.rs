//! Accounts in `users.json`, with salted SHA-256 password digests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use tc_domain::error::{Error, Result};

/// Signup payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// What the API returns about a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl PublicUser {
    /// "First Last", or the username when no name is on file.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    id: String,
    username: String,
    email: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    salt: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct UserStore {
    path: PathBuf,
    // Keyed by normalized username.
    users: RwLock<HashMap<String, UserRecord>>,
}

impl UserStore {
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path)?;
        let path = state_path.join("users.json");
        let users = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "users.json unreadable, starting empty");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };
        Ok(Self { path, users: RwLock::new(users) })
    }

    pub fn count(&self) -> usize {
        self.users.read().len()
    }

    /// Register a user. Username and email are trimmed and lowercased.
    pub fn signup(&self, new: NewUser) -> Result<PublicUser> {
        let username = new.username.trim().to_lowercase();
        let email = new.email.trim().to_lowercase();
        if username.is_empty() || email.is_empty() || new.password.is_empty() {
            return Err(Error::Validation("username, email, and password required".into()));
        }
        let first = new.first_name.trim().to_string();
        let last = new.last_name.trim().to_string();
        if first.is_empty() || last.is_empty() {
            return Err(Error::Validation("firstName and lastName required".into()));
        }

        let record = {
            let mut users = self.users.write();
            if users.values().any(|u| u.email == email) {
                return Err(Error::Conflict("Email already exists".into()));
            }
            if users.contains_key(&username) {
                return Err(Error::Validation("Username already exists".into()));
            }
            let salt = uuid::Uuid::new_v4().simple().to_string();
            let record = UserRecord {
                id: uuid::Uuid::new_v4().simple().to_string(),
                username: username.clone(),
                email,
                first_name: Some(first),
                last_name: Some(last),
                password_hash: digest(&salt, &new.password),
                salt,
                created_at: Utc::now(),
            };
            users.insert(username, record.clone());
            record
        };
        self.flush()?;

        tracing::info!(username = %record.username, "user signed up");
        Ok(record.public())
    }

    pub fn login(&self, username: &str, password: &str) -> Result<PublicUser> {
        let username = username.trim().to_lowercase();
        if username.is_empty() || password.is_empty() {
            return Err(Error::Validation("Username and password required".into()));
        }
        let users = self.users.read();
        let user = users
            .get(&username)
            .ok_or_else(|| Error::Auth("User not found".into()))?;
        let computed = digest(&user.salt, password);
        if !bool::from(computed.as_bytes().ct_eq(user.password_hash.as_bytes())) {
            return Err(Error::Auth("Invalid password".into()));
        }
        Ok(user.public())
    }

    pub fn get(&self, username: &str) -> Option<PublicUser> {
        self.users
            .read()
            .get(&username.trim().to_lowercase())
            .map(UserRecord::public)
    }

    fn flush(&self) -> Result<()> {
        let json = {
            let users = self.users.read();
            serde_json::to_string_pretty(&*users)
                .map_err(|e| Error::Other(format!("serializing users: {e}")))?
        };
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> NewUser {
        NewUser {
            username: " Ana ".into(),
            email: "ANA@example.com".into(),
            password: "pw".into(),
            first_name: "Ana".into(),
            last_name: "Lee".into(),
        }
    }

    #[test]
    fn signup_normalizes_and_login_checks_password() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::new(dir.path()).unwrap();
        let user = store.signup(ana()).unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.display_name(), "Ana Lee");

        let reopened = UserStore::new(dir.path()).unwrap();
        assert_eq!(reopened.login("ANA", "pw").unwrap().username, "ana");
        assert!(matches!(reopened.login("ana", "nope"), Err(Error::Auth(m)) if m == "Invalid password"));
        assert!(matches!(reopened.login("bob", "pw"), Err(Error::Auth(m)) if m == "User not found"));
    }

    #[test]
    fn duplicates_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::new(dir.path()).unwrap();
        store.signup(ana()).unwrap();
        assert!(matches!(store.signup(ana()), Err(Error::Conflict(m)) if m == "Email already exists"));
        let other_email = NewUser { email: "other@example.com".into(), ..ana() };
        assert!(matches!(store.signup(other_email), Err(Error::Validation(m)) if m == "Username already exists"));
    }

    #[test]
    fn all_fields_are_required() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::new(dir.path()).unwrap();
        let no_name = NewUser { last_name: " ".into(), ..ana() };
        assert!(matches!(store.signup(no_name), Err(Error::Validation(_))));
        let no_pw = NewUser { password: String::new(), ..ana() };
        assert!(matches!(store.signup(no_pw), Err(Error::Validation(_))));
    }

    #[test]
    fn digests_are_salted() {
        assert_ne!(digest("a", "pw"), digest("b", "pw"));
        assert_eq!(digest("a", "pw").len(), 64);
    }
}
