//! Measurement counter persistence.
//!
//! The counter is stored as a plain decimal number. Saves go to a sibling
//! temporary file which is synced and then renamed over the target, so a
//! crash never leaves a truncated counter behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SessionError};

/// Read a counter written by [`save`].
pub fn load(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| SessionError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    content
        .trim()
        .parse()
        .map_err(|_| SessionError::InvalidCounter {
            path: path.to_path_buf(),
            content,
        })
}

/// Atomically replace the counter file with `counter`.
pub fn save(path: impl AsRef<Path>, counter: u64) -> Result<()> {
    let path = path.as_ref();
    let tmp = tmp_path(path);
    let persist = |source: std::io::Error| SessionError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(&tmp).map_err(persist)?;
    file.write_all(counter.to_string().as_bytes())
        .map_err(persist)?;
    file.sync_all().map_err(persist)?;
    drop(file);
    fs::rename(&tmp, path).map_err(persist)?;

    debug!(?path, counter, "counter saved");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
