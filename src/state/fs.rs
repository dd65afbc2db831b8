use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use super::{MarkerStamp, StateStore};
use crate::config::Config;
use crate::error::StateError;

const STAMP_FILE: &str = "stamp";
/// Per-topic flock files serializing marker removal. Sanitized topics never
/// start with a dot, so this cannot collide with a marker.
const GUARDS_DIR: &str = ".guards";

/// Filesystem-backed store under the process-wide scratch directory.
///
/// Documents live at `<state_dir>/<key>.json`; each update holds an
/// exclusive `flock` on a sidecar `<key>.lock` and replaces the document by
/// renaming a temp file into place. Lock markers are directories under
/// `<lock_dir>/<topic>/` holding a single stamp file; they appear and vanish
/// by rename only.
#[derive(Debug, Clone)]
pub struct FsStateStore {
    state_dir: PathBuf,
    lock_dir: PathBuf,
}

impl FsStateStore {
    pub fn new(state_dir: impl Into<PathBuf>, lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            lock_dir: lock_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.state_dir(), config.lock_dir())
    }

    pub fn document_path(&self, key: &str) -> PathBuf {
        self.state_dir.join(format!("{}.json", sanitize(key)))
    }

    fn marker_dir(&self, topic: &str) -> PathBuf {
        self.lock_dir.join(sanitize(topic))
    }

    fn ensure_dir(dir: &Path, key: &str) -> Result<(), StateError> {
        fs::create_dir_all(dir).map_err(|source| io_error(key, source))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StateError {
    StateError::Io {
        key: key.to_string(),
        source,
    }
}

/// Keys and topics become single path components.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

fn open_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).read(true).write(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

impl StateStore for FsStateStore {
    fn read(&self, key: &str) -> Result<Option<String>, StateError> {
        match fs::read_to_string(self.document_path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String, StateError>,
    ) -> Result<(), StateError> {
        Self::ensure_dir(&self.state_dir, key)?;
        let path = self.document_path(key);
        let lock = open_private(&path.with_extension("lock")).map_err(|e| io_error(key, e))?;
        fs2::FileExt::lock_exclusive(&lock).map_err(|e| io_error(key, e))?;

        let current = self.read(key)?;
        let next = apply(current.as_deref())?;

        let mut tmp = NamedTempFile::new_in(&self.state_dir).map_err(|e| io_error(key, e))?;
        tmp.write_all(next.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| io_error(key, e))?;
        tmp.persist(&path).map_err(|e| io_error(key, e.error))?;

        // Dropping `lock` releases the flock.
        drop(lock);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StateError> {
        match fs::remove_file(self.document_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn create_marker(&self, topic: &str, stamp_ms: i64, owner: &str) -> Result<bool, StateError> {
        Self::ensure_dir(&self.lock_dir, topic)?;
        let dir = self.marker_dir(topic);
        if dir.exists() {
            return Ok(false);
        }

        // Stage the stamped directory, then rename it into place so no
        // reader ever sees a marker without its stamp.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.lock_dir)
            .map_err(|e| io_error(topic, e))?;
        fs::write(
            staging.path().join(STAMP_FILE),
            MarkerStamp::encode(stamp_ms, owner),
        )
        .map_err(|e| io_error(topic, e))?;

        match fs::rename(staging.path(), &dir) {
            Ok(()) => {
                // The staged path is gone; nothing left for the drop to clean.
                let _ = staging.keep();
                Ok(true)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::AlreadyExists | ErrorKind::DirectoryNotEmpty
                ) || dir.exists() =>
            {
                Ok(false)
            }
            Err(e) => Err(io_error(topic, e)),
        }
    }

    fn marker_stamp(&self, topic: &str) -> Result<Option<MarkerStamp>, StateError> {
        let dir = self.marker_dir(topic);
        match fs::read_to_string(dir.join(STAMP_FILE)) {
            Ok(raw) => {
                if let Some(stamp) = MarkerStamp::parse(&raw) {
                    return Ok(Some(stamp));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(topic, e)),
        }

        // Unreadable or missing stamp: age the marker by its mtime.
        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {
                let modified = meta.modified().map_err(|e| io_error(topic, e))?;
                let stamp_ms = DateTime::<Utc>::from(modified).timestamp_millis();
                tracing::debug!(topic, stamp_ms, "lock marker has no usable stamp");
                Ok(Some(MarkerStamp {
                    stamp_ms,
                    owner: None,
                }))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(topic, e)),
        }
    }

    fn remove_marker(&self, topic: &str, owner: Option<&str>) -> Result<bool, StateError> {
        let guards = self.lock_dir.join(GUARDS_DIR);
        Self::ensure_dir(&guards, topic)?;
        let lock = open_private(&guards.join(format!("{}.lock", sanitize(topic))))
            .map_err(|e| io_error(topic, e))?;
        fs2::FileExt::lock_exclusive(&lock).map_err(|e| io_error(topic, e))?;

        let current = self.marker_stamp(topic)?;
        if current.as_ref().is_none_or(|stamp| stamp.owner.as_deref() != owner) {
            return Ok(false);
        }

        // Move the marker out of the way first so the topic frees in one
        // step, then clean up at leisure.
        let trash = self
            .lock_dir
            .join(format!(".trash-{}", uuid::Uuid::new_v4().simple()));
        match fs::rename(self.marker_dir(topic), &trash) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(topic, e)),
        }
        drop(lock);

        if let Err(error) = fs::remove_dir_all(&trash) {
            tracing::debug!(topic, %error, "failed to clean released marker");
        }
        Ok(true)
    }
}
