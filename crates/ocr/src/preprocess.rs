use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::otsu_level;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Intensity used for pixels above the threshold.
pub const WHITE: u8 = 255;
/// Intensity used for pixels at or below the threshold.
pub const BLACK: u8 = 0;

#[derive(Debug, Error)]
pub enum PreprocessError {
    /// Missing file and undecodable file are reported the same way.
    #[error("Image not found or not decodable: {path}: {source}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to write debug artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// A two-level single-channel raster ready for OCR.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    binary: GrayImage,
    threshold: u8,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.binary.width()
    }

    pub fn height(&self) -> u32 {
        self.binary.height()
    }

    /// The cutoff chosen from the intensity histogram.
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.binary
    }

    /// PNG-encode the binary raster for OCR backends that take image bytes.
    pub fn to_png(&self) -> Result<Vec<u8>, PreprocessError> {
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(self.binary.clone())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| PreprocessError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// Where the intermediate images are written for inspection.
#[derive(Debug, Clone)]
pub struct DebugArtifacts {
    pub gray: PathBuf,
    pub binary: PathBuf,
}

/// Decode → grayscale → automatic global threshold.
#[derive(Debug, Clone, Default)]
pub struct ImageNormalizer {
    artifacts: Option<DebugArtifacts>,
}

impl ImageNormalizer {
    pub fn new(artifacts: DebugArtifacts) -> Self {
        Self { artifacts: Some(artifacts) }
    }

    /// A normalizer that keeps everything in memory.
    pub fn without_artifacts() -> Self {
        Self { artifacts: None }
    }

    /// Load an image file and binarize it. Nothing is written to disk unless
    /// the file decodes.
    pub fn normalize(&self, path: &Path) -> Result<NormalizedImage, PreprocessError> {
        let img = image::open(path).map_err(|source| PreprocessError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), width = img.width(), height = img.height(), "Image decoded");
        self.normalize_image(img)
    }

    pub fn normalize_image(&self, img: DynamicImage) -> Result<NormalizedImage, PreprocessError> {
        let gray = img.to_luma8();
        if let Some(a) = &self.artifacts {
            write_artifact(&gray, &a.gray)?;
        }

        let (binary, threshold) = binarize(&gray);
        debug!(threshold, "Otsu threshold computed");
        if let Some(a) = &self.artifacts {
            write_artifact(&binary, &a.binary)?;
        }

        Ok(NormalizedImage { binary, threshold })
    }
}

/// Global bi-modal split: pixels brighter than the Otsu level become white,
/// the rest black.
pub fn binarize(gray: &GrayImage) -> (GrayImage, u8) {
    let level = otsu_level(gray);
    let binary: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            Luma([WHITE])
        } else {
            Luma([BLACK])
        }
    });
    (binary, level)
}

fn write_artifact(img: &GrayImage, path: &Path) -> Result<(), PreprocessError> {
    let artifact_err = |source| PreprocessError::Artifact { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| artifact_err(image::ImageError::IoError(e)))?;
    }
    // Overwrites the previous run's artifact.
    img.save(path).map_err(artifact_err)
}
