// Identifiers and identities.
//
// Course and assignment names end up as URL path segments, so they are
// restricted to `[A-Za-z0-9_]` before any network use. The owner and the
// invoking user come from the host's account database.

use std::fmt;
use std::path::Path;

use nix::unistd::{Uid, User};

use crate::error::{ClientError, Result};

/// Returns true when `name` is non-empty and made only of ASCII letters,
/// digits and `_`.
pub fn validate(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// A validated course or assignment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    /// `what` names the role ("course", "assignment") for the error line.
    pub fn parse(what: &str, raw: &str) -> Result<Self> {
        if validate(raw) {
            Ok(Identifier(raw.to_string()))
        } else {
            Err(ClientError::Usage(format!("Invalid {}: {}", what, raw)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of the two account names every request carries.
pub trait IdentityProvider {
    /// Account that owns the installed client binary.
    fn owner(&self) -> Result<String>;
    /// Account running this process.
    fn username(&self) -> Result<String>;
}

/// Resolves identities through the operating system.
#[derive(Debug, Default)]
pub struct SystemIdentity;

impl SystemIdentity {
    fn name_of(uid: Uid) -> Result<String> {
        match User::from_uid(uid) {
            Ok(Some(user)) => Ok(user.name),
            Ok(None) => Err(ClientError::Config(format!("no account for uid {}", uid))),
            Err(e) => Err(ClientError::Config(format!("account lookup for uid {} failed: {}", uid, e))),
        }
    }

    fn owner_of(path: &Path) -> Result<String> {
        use std::os::unix::fs::MetadataExt;

        let meta = std::fs::metadata(path)
            .map_err(|e| ClientError::Config(format!("cannot stat {}: {}", path.display(), e)))?;
        Self::name_of(Uid::from_raw(meta.uid()))
    }
}

impl IdentityProvider for SystemIdentity {
    fn owner(&self) -> Result<String> {
        let exe = std::env::current_exe()
            .map_err(|e| ClientError::Config(format!("cannot locate own executable: {}", e)))?;
        Self::owner_of(&exe)
    }

    fn username(&self) -> Result<String> {
        Self::name_of(Uid::current())
    }
}

/// Fixed identities, handy when the caller already knows both names.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    pub owner: String,
    pub username: String,
}

impl IdentityProvider for StaticIdentity {
    fn owner(&self) -> Result<String> {
        Ok(self.owner.clone())
    }

    fn username(&self) -> Result<String> {
        Ok(self.username.clone())
    }
}
