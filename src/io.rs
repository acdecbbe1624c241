use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use walkdir::WalkDir;
use crate::{BidsError, Result};


fn io_err(path:&Path) -> impl FnOnce(std::io::Error) -> BidsError + '_ {
    move |source| BidsError::Io{path: path.to_path_buf(), source}
}

/// reads a text file, silently dropping byte sequences that are not valid UTF-8
pub fn read_lossy(path:impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(io_err(path))?;
    let mut s = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        s.push_str(chunk.valid());
    }
    Ok(s)
}

/// Recursively searches `root` for a file called `name`. The shallowest match wins,
/// ties go to the first in name order.
pub fn find_file(root:impl AsRef<Path>, name:&str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by(|a,b| {
            a.file_type().is_dir().cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
}

/// writes `value` as 4-space indented JSON, creating the parent directory if needed
pub fn write_json<T:Serialize>(path:impl AsRef<Path>, value:&T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let f = File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(f);
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    writer.flush().map_err(io_err(path))?;
    Ok(())
}
