use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

/// Writes through a sibling temp file and renames it into place
pub fn write_atomic(path: PathBuf, data: &[u8]) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(tmp, &path)?;
    Ok(path)
}
