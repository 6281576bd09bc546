//! Zip a directory tree for download.

use std::{
    fs, io,
    io::{Seek, Write},
    path::Path,
};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// Write a zip of every regular file under `dir` into `out` and hand it back.
///
/// Entry names are the file paths relative to `dir`, `/`-separated.
/// Directory entries are not written; the structure is implied by the
/// entry names. Files whose name is in `excluded` are left out at every
/// depth. Blocking; call from `spawn_blocking`.
pub fn write_zip<W: Write + Seek>(dir: &Path, excluded: &[String], out: W) -> io::Result<W> {
    let mut writer = ZipWriter::new(out);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    add_dir(&mut writer, dir, "", excluded, options)?;

    writer.finish().map_err(io::Error::other)
}

/// Spool the archive of `dir` to an anonymous temp file, rewound to the
/// start. Memory use stays flat regardless of the tree size.
pub fn zip_to_tempfile(dir: &Path, excluded: &[String]) -> io::Result<fs::File> {
    let mut file = write_zip(dir, excluded, tempfile::tempfile()?)?;
    file.rewind()?;
    Ok(file)
}

fn add_dir<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    dir: &Path,
    prefix: &str,
    excluded: &[String],
    options: SimpleFileOptions,
) -> io::Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let entry_name = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        // Symlinks are not followed, so a link cannot pull in outside files.
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            add_dir(writer, &entry.path(), &entry_name, excluded, options)?;
        } else if file_type.is_file() {
            if excluded.contains(&name) {
                tracing::debug!(entry = %entry_name, "leaving control file out of archive");
                continue;
            }
            writer
                .start_file(entry_name.as_str(), options)
                .map_err(io::Error::other)?;
            let mut file = fs::File::open(entry.path())?;
            io::copy(&mut file, writer)?;
        } else {
            tracing::debug!(entry = %entry_name, "skipping non-regular file in archive");
        }
    }
    writer.flush()
}
