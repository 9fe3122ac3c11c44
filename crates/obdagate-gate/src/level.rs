//! Access levels and the persisted level state.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use obdagate_storage::{read_optional, write_atomic, write_lock_for};

/// Ordered clearance tiers. `L0` is the least privileged.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AccessLevel {
    #[default]
    L0,
    L1,
    L2,
    L3,
    L4,
    L5,
    L6,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 7] = [
        AccessLevel::L0,
        AccessLevel::L1,
        AccessLevel::L2,
        AccessLevel::L3,
        AccessLevel::L4,
        AccessLevel::L5,
        AccessLevel::L6,
    ];

    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(rank).ok()?).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            AccessLevel::L0 => "Boolean Queries",
            AccessLevel::L1 => "Simple COUNT Aggregations",
            AccessLevel::L2 => "Full Aggregations (AVG, etc.)",
            AccessLevel::L3 => "Grouped Data",
            AccessLevel::L4 => "Limited Access to Non-Sensitive Data",
            AccessLevel::L5 => "Access to Individual Patient Data",
            AccessLevel::L6 => "Full Access to Data",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.rank())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown access level `{0}` (expected L0..L6)")]
pub struct UnknownLevel(pub String);

impl FromStr for AccessLevel {
    type Err = UnknownLevel;

    /// Accepts `L3`, `3`, `Grouped Data` or `L3 - Grouped Data`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let code = s.split(" - ").next().unwrap_or(s).trim();
        let digits = code.strip_prefix(['L', 'l']).unwrap_or(code);
        if let Some(level) = digits.parse::<u32>().ok().and_then(Self::from_rank) {
            return Ok(level);
        }
        Self::ALL
            .into_iter()
            .find(|l| l.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// How the caller's granted level is determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LevelPolicy {
    /// One shared level for every caller.
    Global,
    /// Each identity has its own level; unknown or anonymous callers get `L0`.
    #[default]
    PerIdentity,
}

impl FromStr for LevelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(LevelPolicy::Global),
            "per-identity" | "per_identity" | "identity" => Ok(LevelPolicy::PerIdentity),
            other => Err(format!("unknown level policy `{other}` (expected global|per-identity)")),
        }
    }
}

/// Persisted level state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelState {
    #[serde(default)]
    pub global: AccessLevel,
    #[serde(default)]
    pub identities: BTreeMap<String, AccessLevel>,
}

impl LevelState {
    pub fn granted(&self, policy: LevelPolicy, identity: Option<&str>) -> AccessLevel {
        match policy {
            LevelPolicy::Global => self.global,
            LevelPolicy::PerIdentity => identity
                .and_then(|id| self.identities.get(id).copied())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LevelStoreError {
    #[error("level store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("level store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON file holding a `LevelState`. A missing file reads as the default
/// state (everyone at `L0`).
///
/// Every handle on the same file shares one write lock, so concurrent `set`
/// calls in a process never lose an update.
#[derive(Debug, Clone)]
pub struct LevelStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LevelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let write_lock = write_lock_for(&path);
        Self { path, write_lock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One read of the whole state.
    pub fn load(&self) -> Result<LevelState, LevelStoreError> {
        let text = read_optional(&self.path).map_err(|source| LevelStoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        match text {
            None => Ok(LevelState::default()),
            Some(text) => serde_json::from_str(&text).map_err(|source| LevelStoreError::Corrupt {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Set the global level, or one identity's level when `identity` is given.
    pub fn set(&self, identity: Option<&str>, level: AccessLevel) -> Result<LevelState, LevelStoreError> {
        let _guard = self.write_lock.lock();
        let mut state = self.load()?;
        match identity {
            Some(id) => {
                state.identities.insert(id.to_string(), level);
            }
            None => state.global = level,
        }
        let json = serde_json::to_vec_pretty(&state).map_err(|source| LevelStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &json).map_err(|source| LevelStoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(identity = ?identity, %level, "access level set");
        Ok(state)
    }
}
