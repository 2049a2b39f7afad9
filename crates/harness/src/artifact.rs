//! Screenshot artifact verification
//!
//! The screenshot is the run's only persisted evidence, so it gets checked:
//! the file must exist and decode as a real image. Baseline comparison is
//! optional and only applies to scenarios that name one.

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};

/// Per-channel difference below this is treated as anti-aliasing noise
const PIXEL_TOLERANCE: i32 = 5;

/// Report for one verified screenshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub name: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
}

/// Result of a baseline comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDiff {
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image_path: Option<PathBuf>,
}

/// Configuration for artifact storage
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub screenshot_dir: PathBuf,
    pub baseline_dir: PathBuf,
    pub diff_dir: PathBuf,
    pub threshold: f64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("verification/screenshots"),
            baseline_dir: PathBuf::from("verification/baselines"),
            diff_dir: PathBuf::from("verification/diffs"),
            threshold: 0.5,
        }
    }
}

/// Verifies and compares screenshot artifacts
pub struct ArtifactStore {
    config: ArtifactConfig,
}

impl ArtifactStore {
    pub fn new(config: ArtifactConfig) -> HarnessResult<Self> {
        std::fs::create_dir_all(&config.screenshot_dir)?;
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;
        Ok(Self { config })
    }

    fn screenshot_path(&self, name: &str) -> PathBuf {
        self.config.screenshot_dir.join(format!("{}.png", name))
    }

    fn baseline_path(&self, name: &str) -> PathBuf {
        self.config.baseline_dir.join(format!("{}.png", name))
    }

    /// Verify that a screenshot exists and decodes as a real image
    pub fn verify(&self, name: &str) -> HarnessResult<ArtifactReport> {
        let path = self.screenshot_path(name);

        if !path.exists() {
            return Err(HarnessError::ArtifactMissing(path.display().to_string()));
        }

        let img = image::open(&path).map_err(|e| HarnessError::ArtifactCorrupt {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(HarnessError::ArtifactCorrupt {
                name: name.to_string(),
                reason: "zero-sized image".to_string(),
            });
        }

        let sha256 = hash_file(&path)?;
        debug!("Verified artifact '{}' ({}x{}, {})", name, width, height, &sha256[..12]);

        Ok(ArtifactReport {
            name: name.to_string(),
            path,
            width,
            height,
            sha256,
        })
    }

    /// Compare a screenshot against its baseline
    pub fn compare(&self, name: &str, threshold: Option<f64>) -> HarnessResult<VisualDiff> {
        let threshold = threshold.unwrap_or(self.config.threshold);

        let actual_path = self.screenshot_path(name);
        let baseline_path = self.baseline_path(name);

        if !actual_path.exists() {
            return Err(HarnessError::ArtifactMissing(actual_path.display().to_string()));
        }
        if !baseline_path.exists() {
            return Err(HarnessError::BaselineMissing(
                baseline_path.display().to_string(),
            ));
        }

        // Identical files need no pixel walk
        if hash_file(&actual_path)? == hash_file(&baseline_path)? {
            debug!("Screenshots match exactly (same hash)");
            let img = image::open(&actual_path)?;
            let total = u64::from(img.width()) * u64::from(img.height());
            return Ok(VisualDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: total,
                diff_image_path: None,
            });
        }

        let actual = image::open(&actual_path)?.to_rgba8();
        let baseline = image::open(&baseline_path)?.to_rgba8();

        if actual.dimensions() != baseline.dimensions() {
            warn!(
                "Screenshot dimensions differ: actual {:?} vs baseline {:?}",
                actual.dimensions(),
                baseline.dimensions()
            );
        }

        let (width, height) = actual.dimensions();
        let mut diff_img = RgbaImage::new(width, height);
        let mut diff_pixels = 0u64;
        let total_pixels = u64::from(width) * u64::from(height);

        for y in 0..height.min(baseline.height()) {
            for x in 0..width.min(baseline.width()) {
                let a = actual.get_pixel(x, y);
                let b = baseline.get_pixel(x, y);

                if pixels_differ(a, b) {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                } else {
                    let c = a.channels();
                    diff_img.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                }
            }
        }

        let diff_percent = (diff_pixels as f64 / total_pixels as f64) * 100.0;
        let matches = diff_percent <= threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.config.diff_dir.join(format!("{}-diff.png", name));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual mismatch in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                name, diff_percent, threshold
            );
        }

        Ok(VisualDiff {
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
        })
    }

    /// Promote the current screenshot to baseline
    pub fn update_baseline(&self, name: &str) -> HarnessResult<()> {
        let actual_path = self.screenshot_path(name);
        if !actual_path.exists() {
            return Err(HarnessError::ArtifactMissing(actual_path.display().to_string()));
        }

        std::fs::copy(&actual_path, self.baseline_path(name))?;
        info!("Updated baseline for '{}'", name);
        Ok(())
    }

    /// Names of all stored baselines
    pub fn list_baselines(&self) -> HarnessResult<Vec<String>> {
        let mut baselines = Vec::new();

        for entry in std::fs::read_dir(&self.config.baseline_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(name) = path.file_stem() {
                    baselines.push(name.to_string_lossy().to_string());
                }
            }
        }

        baselines.sort();
        Ok(baselines)
    }
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    let a = a.channels();
    let b = b.channels();

    for i in 0..4 {
        if (i32::from(a[i]) - i32::from(b[i])).abs() > PIXEL_TOLERANCE {
            return true;
        }
    }
    false
}

fn hash_file(path: &Path) -> HarnessResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
