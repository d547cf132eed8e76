//! This file loads program images from disk.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::constants::MAX_UPLOAD_SIZE;

/// Image loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image '{}' not found", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid size for image '{}' - {len} bytes, maximum is {max}", .path.display())]
    TooLarge {
        path: PathBuf,
        len: u64,
        max: usize,
    },

    #[error("Error reading image '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A program image, small enough to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    path: PathBuf,
    data: Vec<u8>,
}

impl Image {
    /// Load an image.  The size is checked before anything is read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref().to_path_buf();

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ImageError::NotFound(path));
            }
            Err(source) => return Err(ImageError::Read { path, source }),
        };

        if metadata.len() > MAX_UPLOAD_SIZE as u64 {
            return Err(ImageError::TooLarge {
                path,
                len: metadata.len(),
                max: MAX_UPLOAD_SIZE,
            });
        }

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(source) => return Err(ImageError::Read { path, source }),
        };

        // It may have grown since we looked.
        if data.len() > MAX_UPLOAD_SIZE {
            return Err(ImageError::TooLarge {
                path,
                len: data.len() as u64,
                max: MAX_UPLOAD_SIZE,
            });
        }

        debug!("Loaded {} ({} bytes)", path.display(), data.len());
        Ok(Self { path, data })
    }

    /// Create an image from bytes already in memory.
    pub fn from_bytes(name: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self, ImageError> {
        let path = name.into();
        if data.len() > MAX_UPLOAD_SIZE {
            return Err(ImageError::TooLarge {
                path,
                len: data.len() as u64,
                max: MAX_UPLOAD_SIZE,
            });
        }
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn image_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|ii| ii as u8).collect();
        file.write_all(&data).unwrap();
        file
    }

    #[test]
    fn loads_full_size_image() {
        let file = image_file(MAX_UPLOAD_SIZE);
        let image = Image::load(file.path()).unwrap();
        assert_eq!(image.len(), MAX_UPLOAD_SIZE);
        assert_eq!(image.data()[255], 255);
        assert_eq!(image.path(), file.path());
    }

    #[test]
    fn empty_image_is_allowed() {
        let file = image_file(0);
        let image = Image::load(file.path()).unwrap();
        assert!(image.is_empty());
    }

    #[test]
    fn oversize_image_is_rejected() {
        let file = image_file(MAX_UPLOAD_SIZE + 1);
        match Image::load(file.path()) {
            Err(ImageError::TooLarge { len, max, .. }) => {
                assert_eq!(len, MAX_UPLOAD_SIZE as u64 + 1);
                assert_eq!(max, MAX_UPLOAD_SIZE);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
        assert!(Image::from_bytes("mem", vec![0; MAX_UPLOAD_SIZE + 1]).is_err());
    }

    #[test]
    fn missing_image_is_reported() {
        let err = Image::load("/nonexistent/main.bin").unwrap_err();
        assert!(matches!(err, ImageError::NotFound(_)));
        assert_eq!(err.to_string(), "Image '/nonexistent/main.bin' not found");
    }
}
