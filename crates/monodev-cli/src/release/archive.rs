// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Deterministic release archives.
//!
//! Entries are added in sorted order with fixed timestamps and ownership, so
//! packing the same tree twice yields byte-identical archives. Every archive
//! gets a `<archive>.sha256` sidecar.

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use super::fsutil::{archive_path, walk_sorted, Excludes};
use super::ReleaseResult;

/// Packs `src` into a gzipped tarball, entries prefixed with `prefix/`.
pub fn write_tar_gz(src: &Path, prefix: &str, dest: &Path) -> ReleaseResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let files = walk_sorted(src, &Excludes::none())?;

    let encoder = GzEncoder::new(BufWriter::new(File::create(dest)?), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);
    builder.follow_symlinks(true);

    for rel in &files {
        let name = format!("{}/{}", prefix, archive_path(rel));
        builder.append_path_with_name(src.join(rel), name)?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?.flush()?;
    tracing::debug!("Wrote {} ({} files)", dest.display(), files.len());
    Ok(())
}

/// Packs `src` into a zip archive, entries prefixed with `prefix/`.
pub fn write_zip(src: &Path, prefix: &str, dest: &Path) -> ReleaseResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let files = walk_sorted(src, &Excludes::none())?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut zip = zip::ZipWriter::new(BufWriter::new(File::create(dest)?));
    for rel in &files {
        let name = format!("{}/{}", prefix, archive_path(rel));
        zip.start_file(name, options)?;
        let mut file = File::open(src.join(rel))?;
        io::copy(&mut file, &mut zip)?;
    }
    zip.finish()?.flush()?;
    tracing::debug!("Wrote {} ({} files)", dest.display(), files.len());
    Ok(())
}

/// Hex SHA-256 of the file at `path`.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Writes `<path>.sha256` in `sha256sum` format and returns its path.
pub fn write_checksum(path: &Path) -> io::Result<PathBuf> {
    let hash = sha256_file(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut sidecar = path.as_os_str().to_owned();
    sidecar.push(".sha256");
    let sidecar = PathBuf::from(sidecar);
    fs::write(&sidecar, format!("{}  {}\n", hash, file_name))?;
    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn tree(root: &Path) {
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::write(root.join("assets/app.js"), "console.log(1)").unwrap();
    }

    #[test]
    fn test_tar_is_idempotent() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        tree(&src);

        let a = dir.path().join("a.tar.gz");
        let b = dir.path().join("b.tar.gz");
        write_tar_gz(&src, "shop", &a).unwrap();
        // Touch a file so mtimes differ between the runs
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(src.join("index.html"), "<html></html>").unwrap();
        write_tar_gz(&src, "shop", &b).unwrap();

        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }

    #[test]
    fn test_zip_entries_carry_prefix_only() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("deep/nested/clientBundle");
        tree(&src);
        let dest = dir.path().join("bundle.zip");
        write_zip(&src, "clientBundle", &dest).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(
            sorted,
            vec!["clientBundle/assets/app.js", "clientBundle/index.html"]
        );

        let mut content = String::new();
        archive
            .by_name("clientBundle/index.html")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<html></html>");
    }

    #[test]
    fn test_checksum_sidecar() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("x.tar.gz");
        fs::write(&file, b"abc").unwrap();
        let sidecar = write_checksum(&file).unwrap();
        assert_eq!(sidecar, dir.path().join("x.tar.gz.sha256"));
        assert_eq!(
            fs::read_to_string(sidecar).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad  x.tar.gz\n"
        );
    }
}
