//! Tar+gzip bundling of cache entry contents.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tessera_core::{Error, Result};

/// Pack `paths` (resolved against `base_dir`) into a gzip-compressed tar
/// stream. Missing paths are skipped; an entry can legitimately contain a
/// subset of what the pipeline declared.
pub fn pack<W: Write>(writer: W, paths: &[PathBuf], base_dir: &Path) -> Result<()> {
    let encoder = GzEncoder::new(writer, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for p in paths {
        let abs_path = if p.is_absolute() {
            p.clone()
        } else {
            base_dir.join(p)
        };
        if !abs_path.exists() {
            continue;
        }

        let name = if p.is_absolute() {
            p.strip_prefix(base_dir).unwrap_or(p)
        } else {
            p.as_path()
        };

        if abs_path.is_dir() {
            builder
                .append_dir_all(name, &abs_path)
                .map_err(|e| Error::CacheStore(format!("Failed to pack dir: {}", e)))?;
        } else {
            builder
                .append_path_with_name(&abs_path, name)
                .map_err(|e| Error::CacheStore(format!("Failed to pack file: {}", e)))?;
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| Error::CacheStore(format!("Failed to finish tar: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::CacheStore(format!("Failed to finish gzip: {}", e)))?;
    Ok(())
}

/// Unpack an archive produced by [`pack`] into `dest`.
pub fn unpack<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let decoder = GzDecoder::new(reader);
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(dest)
        .map_err(|e| Error::CacheStore(format!("Failed to unpack archive: {}", e)))?;
    Ok(())
}
