//! Capability-scoped file reading for configuration and directory files.

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

fn open_parent_dir(path: &Utf8Path) -> std::io::Result<(Dir, &str)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::other("path must include a file name"))?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Reads a UTF-8 file through a directory capability on its parent.
pub(crate) fn read_to_string(path: &Utf8Path) -> std::io::Result<String> {
    let (dir, file_name) = open_parent_dir(path)?;
    dir.read_to_string(file_name)
}
