//! Persisted per-component state behind a small store abstraction.
//!
//! All mutation goes through [`StateStore::update`], an exclusive
//! read-modify-write that replaces the document by rename. Lock markers use
//! directory-creation semantics.

pub mod fs;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

pub use fs::FsStateStore;

use crate::error::StateError;

pub trait StateStore: Send + Sync {
    /// Current document under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<String>, StateError>;

    /// Exclusive read-modify-write. `apply` sees the current document and
    /// returns its replacement; returning an error leaves the document as is.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String, StateError>,
    ) -> Result<(), StateError>;

    fn remove(&self, key: &str) -> Result<(), StateError>;

    /// Atomically create the marker for `topic`, recording `stamp_ms` and
    /// `owner`. The marker becomes visible with its stamp already in place.
    /// `Ok(false)` means a marker already exists.
    fn create_marker(&self, topic: &str, stamp_ms: i64, owner: &str) -> Result<bool, StateError>;

    /// Stamp of an existing marker, `None` when absent.
    fn marker_stamp(&self, topic: &str) -> Result<Option<MarkerStamp>, StateError>;

    /// Remove the marker only while it still carries `owner`'s stamp.
    /// `Ok(false)` means it was already gone or belongs to someone else.
    fn remove_marker(&self, topic: &str, owner: Option<&str>) -> Result<bool, StateError>;
}

/// When and by whom a lock marker was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerStamp {
    pub stamp_ms: i64,
    /// `None` when the stamp could not be read and its age comes from the
    /// marker's modification time.
    pub owner: Option<String>,
}

impl MarkerStamp {
    /// Encoded as `<millis> <owner>`.
    pub fn encode(stamp_ms: i64, owner: &str) -> String {
        format!("{stamp_ms} {owner}")
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (stamp, owner) = raw.trim().split_once(' ')?;
        let owner = owner.trim();
        if owner.is_empty() {
            return None;
        }
        Some(Self {
            stamp_ms: stamp.parse().ok()?,
            owner: Some(owner.to_string()),
        })
    }
}

/// Result of [`update_json`].
#[derive(Debug)]
pub struct Updated<R> {
    pub value: R,
    /// The stored document was unreadable and was replaced by a fresh one.
    pub recovered: bool,
}

/// Typed read. A document that does not parse is reported as corrupted.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> Result<Option<T>, StateError> {
    store
        .read(key)?
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|e| StateError::Corrupted {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

/// Typed read-modify-write. A corrupted document is logged and replaced by
/// `T::default()` before `mutate` runs.
pub fn update_json<T, R>(
    store: &dyn StateStore,
    key: &str,
    mutate: impl FnOnce(&mut T) -> R,
) -> Result<Updated<R>, StateError>
where
    T: Serialize + DeserializeOwned + Default,
{
    let mut mutate = Some(mutate);
    let mut outcome: Option<R> = None;
    let mut recovered = false;

    store.update(key, &mut |current| {
        let mut state = match current.map(serde_json::from_str::<T>) {
            None => T::default(),
            Some(Ok(state)) => state,
            Some(Err(error)) => {
                tracing::warn!(key, %error, "state corrupted, starting fresh");
                recovered = true;
                T::default()
            }
        };
        if let Some(mutate) = mutate.take() {
            outcome = Some(mutate(&mut state));
        }
        serde_json::to_string(&state).map_err(|e| StateError::Encode {
            key: key.to_string(),
            message: e.to_string(),
        })
    })?;

    outcome
        .map(|value| Updated { value, recovered })
        .ok_or_else(|| StateError::Encode {
            key: key.to_string(),
            message: "update callback never ran".into(),
        })
}

/// Stable short hash used to key per-project state.
pub fn stable_key(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    format!("{prefix}-{}", &digest[..16])
}
