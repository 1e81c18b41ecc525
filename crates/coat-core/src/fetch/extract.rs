//! Zip and gzip-tar extraction
//!
//! Extraction is blocking; callers run it on the blocking pool. A failure
//! part-way through leaves whatever was already written in place.

use crate::error::{CoatError, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tar::Archive;
use zip::ZipArchive;

/// Archive formats the fetcher can unpack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tgz",
        }
    }

    /// Unpack `archive` into `destination`, creating it first
    pub fn extract(&self, archive: &Path, destination: &Path) -> Result<()> {
        fs::create_dir_all(destination)
            .map_err(|e| CoatError::io_at("create directory", destination, e))?;

        let outcome = match self {
            ArchiveFormat::Zip => extract_zip(archive, destination),
            ArchiveFormat::TarGz => extract_tar_gz(archive, destination),
        };

        outcome.map_err(|message| CoatError::Extract {
            archive: archive.display().to_string(),
            destination: destination.to_path_buf(),
            message,
        })
    }
}

fn extract_zip(archive_path: &Path, destination: &Path) -> std::result::Result<(), String> {
    let file = File::open(archive_path).map_err(|e| e.to_string())?;
    let mut archive = ZipArchive::new(file).map_err(|e| e.to_string())?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| e.to_string())?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(format!("unsafe archive entry: {}", entry.name()));
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = destination.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| e.to_string())?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let mut out = File::create(&target).map_err(|e| format!("{}: {}", target.display(), e))?;
        io::copy(&mut entry, &mut out).map_err(|e| format!("{}: {}", target.display(), e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                .map_err(|e| e.to_string())?;
        }
    }

    Ok(())
}

fn extract_tar_gz(archive_path: &Path, destination: &Path) -> std::result::Result<(), String> {
    let file = File::open(archive_path).map_err(|e| e.to_string())?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for item in archive.entries().map_err(|e| e.to_string())? {
        let mut entry = item.map_err(|e| e.to_string())?;
        // unpack_in refuses entries that would escape the destination
        let unpacked = entry.unpack_in(destination).map_err(|e| e.to_string())?;
        if !unpacked {
            let path = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Err(format!("unsafe archive entry: {}", path));
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_archives {
    //! Archive builders shared by tests across the crate

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for (name, content) in files {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer
    }

    pub fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_archives::*;
    use super::*;

    #[test]
    fn test_extract_zip_creates_destination_and_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("t.zip");
        fs::write(
            &archive,
            zip_bytes(&[("package.json", &b"{}"[..]), ("app/app.html", &b"<html></html>"[..])]),
        )
        .unwrap();

        let dest = dir.path().join("out").join("project");
        ArchiveFormat::Zip.extract(&archive, &dest).unwrap();

        assert_eq!(fs::read(dest.join("package.json")).unwrap(), b"{}");
        assert_eq!(
            fs::read_to_string(dest.join("app/app.html")).unwrap(),
            "<html></html>"
        );
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("b.tgz");
        fs::write(&archive, tar_gz_bytes(&[("duffle-linux", &b"ELF"[..])])).unwrap();

        let dest = dir.path().join("dufflebin");
        ArchiveFormat::TarGz.extract(&archive, &dest).unwrap();

        assert_eq!(fs::read(dest.join("duffle-linux")).unwrap(), b"ELF");
    }

    #[test]
    fn test_corrupt_archive_is_extract_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bad.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = ArchiveFormat::Zip
            .extract(&archive, &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, CoatError::Extract { .. }));

        let err = ArchiveFormat::TarGz
            .extract(&archive, &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, CoatError::Extract { .. }));
    }
}
