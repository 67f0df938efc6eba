use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{InstallError, Result};

/// Outcome of an extraction attempt on a downloaded asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The asset was an archive and its contents now live in this directory.
    Extracted(PathBuf),
    /// The asset is not an archive we recognise; treat it as a raw binary.
    NotAnArchive,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extract `archive` into `dest` if it is a zip or a gzip-compressed tarball.
///
/// Format detection failures yield [`Extraction::NotAnArchive`]. Once a format
/// has been recognised, failures while writing entries are errors.
pub fn extract(archive: &Path, dest: &Path) -> Result<Extraction> {
    let file = File::open(archive).map_err(|e| InstallError::io("open", archive, e))?;

    match zip::ZipArchive::new(file) {
        Ok(mut zip) => {
            debug!(archive = %archive.display(), entries = zip.len(), "Extracting zip archive");
            extract_zip(&mut zip, dest)?;
            return Ok(Extraction::Extracted(dest.to_path_buf()));
        }
        Err(e) => debug!(error = %e, "Not a zip archive"),
    }

    if has_gzip_magic(archive)? {
        debug!(archive = %archive.display(), "Extracting tar.gz archive");
        extract_tar_gz(archive, dest)?;
        return Ok(Extraction::Extracted(dest.to_path_buf()));
    }

    Ok(Extraction::NotAnArchive)
}

fn has_gzip_magic(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| InstallError::io("open", path, e))?;
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(InstallError::io("read", path, e)),
    }
}

fn extract_zip<R: Read + io::Seek>(archive: &mut zip::ZipArchive<R>, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| InstallError::io("create", dest, e))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| InstallError::io("read", dest, io::Error::other(e)))?;
        let outpath = match file.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };

        if file.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| InstallError::io("create", &outpath, e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|e| InstallError::io("create", parent, e))?;
        }
        let mut out = File::create(&outpath).map_err(|e| InstallError::io("create", &outpath, e))?;
        io::copy(&mut file, &mut out).map_err(|e| InstallError::io("write", &outpath, e))?;

        // Preserve executable permission on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))
                    .map_err(|e| InstallError::io("chmod", &outpath, e))?;
            }
        }
    }
    Ok(())
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| InstallError::io("create", dest, e))?;
    let file = File::open(archive).map_err(|e| InstallError::io("open", archive, e))?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(dest)
        .map_err(|e| InstallError::io("unpack", archive, e))
}
