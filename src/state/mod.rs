use std::collections::HashMap;

use rkyv::{Archive, Deserialize, Serialize};

use crate::config::ModuleConfig;
use crate::error::Result;
use crate::hashing::Fingerprint;

#[cfg(test)]
mod tests;

/// Current version of the status record format.
///
/// The tool refuses to load a record with a version higher than this
/// constant.
pub const STATUS_FORMAT_VERSION: u32 = 1;

/// Recorded state of one module after its last successful publish.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatus {
    /// Fingerprint of the working tree that was published.
    ///
    /// Stored as the ISO-8859-1 decoded digest string.
    pub fingerprint: String,

    /// Version marker passed to the publish command.
    pub version: u64,
}

/// The durable record of every module that was ever published successfully.
///
/// Keys are module local paths exactly as configured. Entries are only
/// inserted or replaced, never removed during a run.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Version of the record format.
    pub version: u32,

    pub modules: HashMap<String, ModuleStatus>,
}

impl StatusRecord {
    /// Creates a new empty record with the current format version.
    pub fn new() -> Self {
        Self {
            version: STATUS_FORMAT_VERSION,
            modules: HashMap::new(),
        }
    }

    /// Updates an existing module entry or inserts a new one.
    pub fn upsert(&mut self, local_path: &str, status: ModuleStatus) {
        self.modules.insert(local_path.to_string(), status);
    }

    pub fn get(&self, local_path: &str) -> Option<&ModuleStatus> {
        self.modules.get(local_path)
    }

    /// Mapping of local path to last published fingerprint.
    pub fn fingerprints(&self) -> HashMap<String, Fingerprint> {
        self.modules
            .iter()
            .map(|(path, status)| (path.clone(), Fingerprint::from_stored(&status.fingerprint)))
            .collect()
    }

    /// Highest version marker ever recorded.
    pub fn max_version(&self) -> Option<u64> {
        self.modules.values().map(|status| status.version).max()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// A module together with its last known fingerprint.
///
/// `last_fingerprint` is `None` when the module was never published, which
/// always counts as changed.
#[derive(Debug, Clone)]
pub struct ModuleState<'a> {
    pub module: &'a ModuleConfig,
    pub last_fingerprint: Option<Fingerprint>,
}

/// Durable per-module publish state.
///
/// Exclusively owned by one run. [`StateStore::upsert`] must only be called
/// after the publish of that exact fingerprint succeeded.
pub trait StateStore {
    /// Every recorded fingerprint, keyed by module local path.
    ///
    /// A missing backing store yields an empty mapping.
    fn load_all(&mut self) -> Result<HashMap<String, Fingerprint>>;

    /// Highest version marker recorded so far.
    fn max_version(&self) -> Option<u64>;

    /// Record `status` for `local_path`. Durable once this returns.
    fn upsert(&mut self, local_path: &str, status: ModuleStatus) -> Result<()>;
}
