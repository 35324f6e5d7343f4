//! Volume images - ZIP archives loaded into a drive slot.
//!
//! An image is a ZIP file holding the volume's initial files and an optional
//! `volume.json` manifest describing the volume label, a preferred drive
//! slot, and per-file destination directories. Without a manifest every file
//! lands in the volume root.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::ZipArchive;

use super::fat_driver::DRIVE_COUNT;

/// Errors while loading a volume image.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("drive slot out of range: {0}")]
    BadDrive(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for image loading.
pub type ImageResult<T> = Result<T, ImageError>;

/// File placement entry in a volume manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    /// Name of the file inside the archive.
    pub src: String,
    /// Destination directory on the volume, e.g. `/SAVES`.
    #[serde(default)]
    pub dir: Option<String>,
}

/// Volume manifest schema (`volume.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeManifest {
    #[serde(default)]
    pub label: Option<String>,
    /// Preferred drive slot for this image.
    #[serde(default)]
    pub drive: Option<u8>,
    #[serde(default)]
    pub files: Vec<ImageEntry>,
}

/// A loaded image: manifest plus volume-absolute paths and contents.
#[derive(Debug, Clone)]
pub struct VolumeImage {
    pub manifest: VolumeManifest,
    pub files: Vec<(String, Vec<u8>)>,
}

/// Load a volume image from ZIP data.
pub fn load_image<R: Read + Seek>(reader: R) -> ImageResult<VolumeImage> {
    let mut archive = ZipArchive::new(reader)?;
    let mut contents: Vec<(String, Vec<u8>)> = Vec::new();
    let mut manifest = VolumeManifest::default();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        if name.eq_ignore_ascii_case("volume.json") {
            manifest = serde_json::from_slice(&data)?;
        } else {
            // Nested archive paths flatten to the bare filename; placement
            // is the manifest's job.
            let filename = name.rsplit('/').next().unwrap_or(&name);
            contents.push((filename.to_uppercase(), data));
        }
    }

    if let Some(drive) = manifest.drive {
        if drive >= DRIVE_COUNT {
            return Err(ImageError::BadDrive(drive));
        }
    }

    // Map archive names to their manifest directory, if any.
    let placement: HashMap<String, String> = manifest
        .files
        .iter()
        .filter_map(|entry| {
            entry.dir.as_ref().map(|dir| {
                let dir = dir.trim_end_matches('/');
                (entry.src.to_uppercase(), dir.to_uppercase())
            })
        })
        .collect();

    let files = contents
        .into_iter()
        .map(|(name, data)| {
            let path = match placement.get(&name) {
                Some(dir) if !dir.is_empty() => format!("{}/{}", dir, name),
                _ => format!("/{}", name),
            };
            (path, data)
        })
        .collect();

    Ok(VolumeImage { manifest, files })
}

/// Load a volume image from a file path.
pub fn load_image_from_path(path: &Path) -> ImageResult<VolumeImage> {
    let file = std::fs::File::open(path)?;
    load_image(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn build_zip(with_manifest: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut zip = zip::ZipWriter::new(cursor);

            if with_manifest {
                let manifest = r#"{
                    "label": "GAMEDATA",
                    "drive": 1,
                    "files": [
                        { "src": "SLOT1.SAV", "dir": "/SAVES" },
                        { "src": "README.TXT" }
                    ]
                }"#;
                zip.start_file::<_, ()>("volume.json", Default::default())
                    .unwrap();
                zip.write_all(manifest.as_bytes()).unwrap();
            }

            zip.start_file::<_, ()>("SLOT1.SAV", Default::default())
                .unwrap();
            zip.write_all(&[0xAA; 64]).unwrap();

            zip.start_file::<_, ()>("readme.txt", Default::default())
                .unwrap();
            zip.write_all(b"game data volume").unwrap();

            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_load_with_manifest() {
        let image = load_image(Cursor::new(build_zip(true))).unwrap();

        assert_eq!(image.manifest.label.as_deref(), Some("GAMEDATA"));
        assert_eq!(image.manifest.drive, Some(1));
        assert_eq!(image.files.len(), 2);

        let paths: Vec<&str> = image.files.iter().map(|(p, _)| p.as_str()).collect();
        assert!(paths.contains(&"/SAVES/SLOT1.SAV"));
        assert!(paths.contains(&"/README.TXT"));
    }

    #[test]
    fn test_load_without_manifest_lands_in_root() {
        let image = load_image(Cursor::new(build_zip(false))).unwrap();

        assert!(image.manifest.label.is_none());
        let paths: Vec<&str> = image.files.iter().map(|(p, _)| p.as_str()).collect();
        assert!(paths.contains(&"/SLOT1.SAV"));
        assert!(paths.contains(&"/README.TXT"));
    }

    #[test]
    fn test_bad_drive_slot_rejected() {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut zip = zip::ZipWriter::new(cursor);
            zip.start_file::<_, ()>("volume.json", Default::default())
                .unwrap();
            zip.write_all(br#"{ "drive": 9 }"#).unwrap();
            zip.finish().unwrap();
        }

        assert!(matches!(
            load_image(Cursor::new(buf)),
            Err(ImageError::BadDrive(9))
        ));
    }

    #[test]
    fn test_install_into_driver() {
        use crate::fs::{FatDriver, MemoryFatFs, OpenMode};

        let image = load_image(Cursor::new(build_zip(true))).unwrap();
        let mut fs = MemoryFatFs::new();
        let drive = image.manifest.drive.unwrap_or(0);
        fs.install_image(drive, &image).unwrap();

        // Still unmounted until first open.
        assert!(!fs.is_mounted(drive));
        let fd = fs.open("1:/SAVES/SLOT1.SAV", OpenMode::ReadOnly).unwrap();
        fs.close(fd);
        assert!(fs.is_mounted(drive));
        assert_eq!(fs.file_data(drive, "/SAVES/SLOT1.SAV").unwrap(), [0xAA; 64]);
    }
}
