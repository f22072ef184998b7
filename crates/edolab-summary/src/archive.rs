//! Deterministic gzip-compressed tarballs of a trial data tree.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use edolab_core::errors::{ErrorInfo, LabError};
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};
use tracing::info;
use walkdir::WalkDir;

fn archive_error(code: &str, path: &Path, err: impl ToString) -> LabError {
    LabError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Packs `src` into a `.tar.gz` at `archive_path`.
///
/// Entries are stored under the directory's own name, walked in file name
/// order, with zeroed timestamps and ownership, so identical trees produce
/// identical archives. Returns the number of files stored.
pub fn archive_dir(src: &Path, archive_path: &Path) -> Result<usize, LabError> {
    let prefix = src
        .file_name()
        .ok_or_else(|| archive_error("archive-source", src, "source has no directory name"))?;
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent).map_err(|err| archive_error("archive-mkdir", parent, err))?;
    }
    let file =
        File::create(archive_path).map_err(|err| archive_error("archive-create", archive_path, err))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);

    let mut files = 0_usize;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(|err| archive_error("archive-walk", src, err))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|err| archive_error("archive-walk", entry.path(), err))?;
        let name = Path::new(prefix).join(relative);
        let mut header = Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        if entry.file_type().is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, &name, std::io::empty())
                .map_err(|err| archive_error("archive-append", entry.path(), err))?;
        } else if entry.file_type().is_file() {
            let data =
                fs::read(entry.path()).map_err(|err| archive_error("archive-read", entry.path(), err))?;
            header.set_entry_type(EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(data.len() as u64);
            builder
                .append_data(&mut header, &name, data.as_slice())
                .map_err(|err| archive_error("archive-append", entry.path(), err))?;
            files += 1;
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|err| archive_error("archive-finish", archive_path, err))?;
    let mut writer = encoder
        .finish()
        .map_err(|err| archive_error("archive-finish", archive_path, err))?;
    writer
        .flush()
        .map_err(|err| archive_error("archive-finish", archive_path, err))?;
    info!(archive = %archive_path.display(), files, "packed data tree");
    Ok(files)
}
