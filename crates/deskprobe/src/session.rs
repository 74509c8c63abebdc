//! Session bootstrap by pre-navigation storage injection.
//!
//! The application decides whether a visitor is logged in by reading
//! `auth_token` and `user` from `localStorage` on startup. Writing both keys
//! from a script that runs before any page script skips the login flow
//! entirely.
//!
//! Installation cannot observe storage (there is no document yet), so
//! [`verify`] reads the keys back after the first navigation.

use crate::config::SessionConfig;
use crate::driver::{PageDriver, StorageEntries};
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Storage key holding the bearer token
pub const TOKEN_KEY: &str = "auth_token";

/// Storage key holding the JSON-encoded user
pub const USER_KEY: &str = "user";

/// Window property the init script sets when storage writes throw
pub const SEED_ERROR_FLAG: &str = "__deskprobeSeedError";

/// Client-side session written before the application loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSeed {
    /// Value of `auth_token`
    pub auth_token: String,
    /// Fields of the stored user object
    pub user: Map<String, Value>,
}

impl SessionSeed {
    /// Create a seed for a user name
    #[must_use]
    pub fn new(auth_token: impl Into<String>, username: impl Into<String>) -> Self {
        let mut user = Map::new();
        user.insert("username".to_string(), Value::String(username.into()));
        Self {
            auth_token: auth_token.into(),
            user,
        }
    }

    /// Add a user field
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.user.insert(key.into(), value.into());
        self
    }

    /// Build the seed described by configuration
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        config
            .user_fields
            .iter()
            .fold(Self::new(&config.token, &config.username), |seed, (k, v)| {
                seed.with_field(k.clone(), v.clone())
            })
    }

    /// Reject seeds the application would not accept as a session
    pub fn validate(&self) -> HarnessResult<()> {
        if self.auth_token.trim().is_empty() {
            return Err(HarnessError::bootstrap("auth token is empty"));
        }
        match self.user.get("username") {
            Some(Value::String(name)) if !name.trim().is_empty() => Ok(()),
            _ => Err(HarnessError::bootstrap("user has no username")),
        }
    }

    /// Storage entries in their serialized form
    pub fn entries(&self) -> HarnessResult<StorageEntries> {
        self.validate()?;
        let mut entries = StorageEntries::new();
        entries.insert(TOKEN_KEY.to_string(), self.auth_token.clone());
        entries.insert(
            USER_KEY.to_string(),
            serde_json::to_string(&Value::Object(self.user.clone()))?,
        );
        Ok(entries)
    }
}

/// Script that writes the entries into `localStorage`
///
/// Storage exceptions are recorded on `window` instead of thrown, so a
/// blocked storage never breaks the application's own startup.
pub fn init_script(entries: &StorageEntries) -> HarnessResult<String> {
    let payload = serde_json::to_string(entries)?;
    Ok(format!(
        "(() => {{ try {{ const entries = {payload}; \
         for (const [k, v] of Object.entries(entries)) {{ window.localStorage.setItem(k, v); }} \
         }} catch (e) {{ window.{SEED_ERROR_FLAG} = String(e); }} }})();"
    ))
}

/// Expression reading one key, reporting storage failures as data
pub fn storage_probe_script(key: &str) -> HarnessResult<String> {
    let key = serde_json::to_string(key)?;
    Ok(format!(
        "(() => {{ try {{ return {{ ok: true, value: window.localStorage.getItem({key}), error: null }}; }} \
         catch (e) {{ return {{ ok: false, value: null, \
         error: String(window.{SEED_ERROR_FLAG} || e) }}; }} }})()"
    ))
}

/// Install the seed so it applies to every later navigation of the page
pub async fn seed<P: PageDriver + ?Sized>(page: &P, seed: &SessionSeed) -> HarnessResult<()> {
    let entries = seed.entries()?;
    page.install_storage_seed(&entries).await?;
    debug!(keys = entries.len(), "session seed installed");
    Ok(())
}

/// Confirm the seeded keys are present in the current document
///
/// Must run after the first navigation.
pub async fn verify<P: PageDriver + ?Sized>(page: &P, seed: &SessionSeed) -> HarnessResult<()> {
    for (key, expected) in seed.entries()? {
        match page.read_storage(&key).await? {
            Some(actual) if actual == expected => {}
            Some(_) => {
                return Err(HarnessError::bootstrap(format!(
                    "storage key {key:?} was overwritten before verification"
                )))
            }
            None => {
                return Err(HarnessError::bootstrap(format!(
                    "storage key {key:?} missing after navigation"
                )))
            }
        }
    }
    debug!("session seed verified");
    Ok(())
}
