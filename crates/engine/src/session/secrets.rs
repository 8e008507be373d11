//! File-backed session secrets.
//!
//! Layout under the secrets root:
//!
//! ```text
//! cookies/<name>.json     JSON array of cookies
//! form_auth/<name>.json   JSON object of credentials
//! ```
//!
//! Missing files are skipped; several names are merged in order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use autosuite_core::error_code::{ErrorCode, FlowError};
use autosuite_core::types::JsonMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Secret names are plain file stems; anything path-like is rejected.
static SAFE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._\-]+$").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("invalid secret name '{0}'")]
    InvalidName(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed secret file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<SecretError> for FlowError {
    fn from(err: SecretError) -> Self {
        FlowError::new(ErrorCode::Unknown, err.to_string())
    }
}

/// A cookie as exported by common browser tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "root_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn root_path() -> String {
    "/".to_string()
}

/// Resolves secret names to files under a root directory.
#[derive(Debug, Clone)]
pub struct SecretStore {
    root: PathBuf,
}

impl SecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Merge cookie arrays from every named file.
    ///
    /// Cookies are keyed by `(name, domain, path)`; a later file overrides
    /// an earlier one for the same key.
    pub fn cookies(&self, names: &[String]) -> Result<Vec<CookieSpec>, SecretError> {
        let mut merged: Vec<CookieSpec> = Vec::new();
        let mut positions: HashMap<(String, Option<String>, String), usize> = HashMap::new();

        for name in names {
            let path = self.path_for("cookies", name)?;
            let Some(value) = read_json(&path)? else {
                tracing::info!(path = %path.display(), "Cookie file missing");
                continue;
            };
            let Value::Array(entries) = value else {
                tracing::warn!(path = %path.display(), "Cookie file is not a list, skipping");
                continue;
            };

            for entry in entries {
                let cookie: CookieSpec = serde_json::from_value(entry).map_err(|source| {
                    SecretError::Parse {
                        path: path.clone(),
                        source,
                    }
                })?;
                let key = (cookie.name.clone(), cookie.domain.clone(), cookie.path.clone());
                match positions.get(&key) {
                    Some(&at) => merged[at] = cookie,
                    None => {
                        positions.insert(key, merged.len());
                        merged.push(cookie);
                    }
                }
            }
        }

        tracing::info!(count = merged.len(), "Cookies merged");
        Ok(merged)
    }

    /// Merge credential objects from every named file, last wins.
    pub fn form_auth(&self, names: &[String]) -> Result<JsonMap, SecretError> {
        let mut creds = JsonMap::new();
        for name in names {
            let path = self.path_for("form_auth", name)?;
            match read_json(&path)? {
                Some(Value::Object(map)) => creds.extend(map),
                Some(_) => {
                    tracing::warn!(path = %path.display(), "Form auth file is not an object, skipping");
                }
                None => tracing::info!(path = %path.display(), "Form auth file missing"),
            }
        }
        tracing::info!(keys = ?creds.keys().collect::<Vec<_>>(), "Form auth merged");
        Ok(creds)
    }

    fn path_for(&self, kind: &str, name: &str) -> Result<PathBuf, SecretError> {
        if !SAFE_NAME.is_match(name) {
            return Err(SecretError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(kind).join(format!("{name}.json")))
    }
}

/// Read and parse a JSON file; `None` when it does not exist.
fn read_json(path: &Path) -> Result<Option<Value>, SecretError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SecretError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| SecretError::Parse {
            path: path.to_path_buf(),
            source,
        })
}
