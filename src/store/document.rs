use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Reads a JSON document, treating a missing file as `T::default()`.
pub fn load_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => return Err(Error::io(path, err)),
    };
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&data).map_err(|err| Error::json(path, err))
}

/// Replaces `path` with the JSON encoding of `value`.
///
/// The document is written to a sibling `.tmp` file, synced, then renamed
/// over the target, so readers see either the old or the new document.
pub fn write_json_atomic<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let tmp = tmp_path_for(path);
    let data = serde_json::to_vec_pretty(value).map_err(|err| Error::json(path, err))?;
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .map_err(|err| Error::io(&tmp, err))?;
    file.write_all(&data).map_err(|err| Error::io(&tmp, err))?;
    file.sync_all().map_err(|err| Error::io(&tmp, err))?;
    drop(file);
    std::fs::rename(&tmp, path).map_err(|err| Error::io(path, err))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
