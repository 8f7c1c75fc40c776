use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("failed to read or write code file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed code file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid expiry {value:?} for code {code}")]
    InvalidExpiry { code: String, value: String },
}

/// Store of access codes and their expiries.
///
/// Implementations must be safe to read from many sessions at once.
pub trait CodeRepository: Send + Sync {
    fn get(&self, code: &str) -> Option<DateTime<Utc>>;
    fn put(&self, code: &str, expiry: DateTime<Utc>) -> Result<(), RepositoryError>;
    /// Returns whether the code existed
    fn delete(&self, code: &str) -> Result<bool, RepositoryError>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a stored expiry.
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` taken as UTC, or a bare
/// date meaning midnight UTC.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_expiry(expiry: &DateTime<Utc>) -> String {
    expiry.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Code mapping backed by a JSON object file `{ "CODE": "<ISO-8601>" }`.
///
/// The file is read once on open. Every mutation rewrites it through a
/// sibling temp file and a rename while the write lock is held.
pub struct JsonFileCodeRepository {
    path: PathBuf,
    codes: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl JsonFileCodeRepository {
    /// Load the mapping; a missing file is an empty mapping
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let codes = match std::fs::read(&path) {
            Ok(raw) => decode(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "code file absent, starting empty");
                HashMap::new()
            }
            Err(source) => return Err(RepositoryError::Io { path, source }),
        };

        info!(path = %path.display(), count = codes.len(), "loaded access codes");

        Ok(Self {
            path,
            codes: RwLock::new(codes),
        })
    }

    fn persist(&self, codes: &HashMap<String, DateTime<Utc>>) -> Result<(), RepositoryError> {
        let ordered: BTreeMap<&str, String> = codes
            .iter()
            .map(|(code, expiry)| (code.as_str(), format_expiry(expiry)))
            .collect();
        let body = serde_json::to_vec_pretty(&ordered)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "codes.json".to_string());
        let tmp = self
            .path
            .with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()));

        let io_err = |source| RepositoryError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&body).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

fn decode(raw: &[u8]) -> Result<HashMap<String, DateTime<Utc>>, RepositoryError> {
    let entries: BTreeMap<String, String> = serde_json::from_slice(raw)?;
    entries
        .into_iter()
        .map(|(code, value)| match parse_expiry(&value) {
            Some(expiry) => Ok((code, expiry)),
            None => Err(RepositoryError::InvalidExpiry { code, value }),
        })
        .collect()
}

impl CodeRepository for JsonFileCodeRepository {
    fn get(&self, code: &str) -> Option<DateTime<Utc>> {
        self.codes.read().get(code).copied()
    }

    fn put(&self, code: &str, expiry: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut codes = self.codes.write();
        let previous = codes.insert(code.to_string(), expiry);
        if let Err(e) = self.persist(&codes) {
            match previous {
                Some(old) => codes.insert(code.to_string(), old),
                None => codes.remove(code),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&self, code: &str) -> Result<bool, RepositoryError> {
        let mut codes = self.codes.write();
        let Some(previous) = codes.remove(code) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&codes) {
            codes.insert(code.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    fn len(&self) -> usize {
        self.codes.read().len()
    }
}

/// Code mapping held only in memory
#[derive(Default)]
pub struct InMemoryCodeRepository {
    codes: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryCodeRepository {
    pub fn with_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = (S, DateTime<Utc>)>,
        S: Into<String>,
    {
        Self {
            codes: RwLock::new(codes.into_iter().map(|(c, e)| (c.into(), e)).collect()),
        }
    }
}

impl CodeRepository for InMemoryCodeRepository {
    fn get(&self, code: &str) -> Option<DateTime<Utc>> {
        self.codes.read().get(code).copied()
    }

    fn put(&self, code: &str, expiry: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.codes.write().insert(code.to_string(), expiry);
        Ok(())
    }

    fn delete(&self, code: &str) -> Result<bool, RepositoryError> {
        Ok(self.codes.write().remove(code).is_some())
    }

    fn len(&self) -> usize {
        self.codes.read().len()
    }
}
