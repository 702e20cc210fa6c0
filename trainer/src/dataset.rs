//! Labelled-directory datasets: one subdirectory of images per class.
use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use common::{imaging, labels::LabelSet};
use rand::{rngs::StdRng, SeedableRng};

use crate::augment::Augmenter;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

pub const LABELS_FILE: &str = "labels.txt";

/// Image files of one class in sorted order.
#[derive(Clone, Debug)]
struct ClassImages {
    label: String,
    files: Vec<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct Dataset {
    labels: LabelSet,
    classes: Vec<ClassImages>,
}

/// Image path with the index of its label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub class: usize,
}

#[derive(Debug, Default)]
pub struct Split {
    pub train: Vec<Sample>,
    pub validation: Vec<Sample>,
}

/// Options of [`Dataset::prepare`].
#[derive(Clone, Debug)]
pub struct PrepareOptions {
    pub image_size: u32,
    pub validation_split: f32,
    pub augment_copies: usize,
    pub seed: u64,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            image_size: common::IMAGE_SIZE,
            validation_split: 0.2,
            augment_copies: 1,
            seed: 42,
        }
    }
}

/// Numbers of images written by [`Dataset::prepare`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PrepareSummary {
    pub train: usize,
    pub augmented: usize,
    pub validation: usize,
}

impl Dataset {
    /// Scan `root` for class directories. Labels are the sorted directory names.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut dirs = Vec::new();
        for entry in
            fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut classes = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let Some(label) = dir.file_name().and_then(|n| n.to_str()) else {
                log::warn!("Skipping directory with non UTF-8 name {}", dir.display());
                continue;
            };
            classes.push(ClassImages {
                label: label.to_owned(),
                files: list_images(&dir)?,
            });
        }

        if classes.is_empty() {
            bail!("no class directories found in {}", root.display());
        }
        let labels = LabelSet::new(classes.iter().map(|c| c.label.clone()).collect())?;
        log::info!("Found {} labels in {}", labels.len(), root.display());

        Ok(Self { labels, classes })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Image count per label.
    pub fn stats(&self) -> Vec<(&str, usize)> {
        self.classes
            .iter()
            .map(|class| (class.label.as_str(), class.files.len()))
            .collect()
    }

    /// Split every class separately: the first `validation_split` fraction of its sorted
    /// files is used for validation, the rest for training.
    pub fn split(&self, validation_split: f32) -> Split {
        let fraction = validation_split.clamp(0.0, 1.0);
        let mut split = Split::default();

        for (class, images) in self.classes.iter().enumerate() {
            let validation_len = (images.files.len() as f32 * fraction).round() as usize;
            for (idx, path) in images.files.iter().enumerate() {
                let sample = Sample {
                    path: path.clone(),
                    class,
                };
                match idx < validation_len {
                    true => split.validation.push(sample),
                    false => split.train.push(sample),
                }
            }
        }

        split
    }

    /// Write `labels.txt` and resized training and validation images to `out`.
    ///
    /// Layout: `<out>/{train,validation}/<label>/<name>.jpg`, augmented training copies are
    /// named `<name>_aug<k>.jpg`.
    pub fn prepare(&self, out: impl AsRef<Path>, options: &PrepareOptions) -> Result<PrepareSummary> {
        let out = out.as_ref();
        fs::create_dir_all(out)?;
        self.labels.save(out.join(LABELS_FILE))?;

        let split = self.split(options.validation_split);
        let mut rng = StdRng::seed_from_u64(options.seed);
        let augmenter = Augmenter::default();
        let mut summary = PrepareSummary::default();

        for sample in &split.validation {
            let image = self.load_resized(sample, options.image_size)?;
            image.save(self.target(out, "validation", sample, None)?)?;
            summary.validation += 1;
        }

        for sample in &split.train {
            let image = self.load_resized(sample, options.image_size)?;
            image.save(self.target(out, "train", sample, None)?)?;
            summary.train += 1;

            for copy in 0..options.augment_copies {
                let augmented = augmenter.apply(&image, &mut rng);
                augmented.save(self.target(out, "train", sample, Some(copy))?)?;
                summary.augmented += 1;
            }

            if summary.train % 1000 == 0 {
                log::info!("Prepared {}/{} training images", summary.train, split.train.len());
            }
        }

        log::info!(
            "Wrote {} training ({} augmented) and {} validation images to {}",
            summary.train,
            summary.augmented,
            summary.validation,
            out.display()
        );

        Ok(summary)
    }

    fn load_resized(&self, sample: &Sample, size: u32) -> Result<image::RgbImage> {
        let image = image::open(&sample.path)
            .with_context(|| format!("failed to open {}", sample.path.display()))?
            .to_rgb8();
        Ok(imaging::resize_square(&image, size))
    }

    fn target(
        &self,
        out: &Path,
        subset: &str,
        sample: &Sample,
        copy: Option<usize>,
    ) -> Result<PathBuf> {
        let label = &self.classes[sample.class].label;
        let dir = out.join(subset).join(label);
        fs::create_dir_all(&dir)?;

        let stem = sample
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let name = match copy {
            Some(copy) => format!("{stem}_aug{copy}.jpg"),
            None => format!("{stem}.jpg"),
        };

        Ok(dir.join(name))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
pub(crate) mod test {

    use image::{Rgb, RgbImage};

    use super::*;

    /// Create `<root>/<label>/<label>_<n>.png` images, colored per class.
    pub(crate) fn write_dataset(root: &Path, classes: &[(&str, usize)]) -> Result<()> {
        for (class, (label, count)) in classes.iter().enumerate() {
            let dir = root.join(label);
            fs::create_dir_all(&dir)?;
            let color = Rgb([(class * 80) as u8, 255 - (class * 80) as u8, 128]);
            for n in 0..*count {
                RgbImage::from_pixel(40, 30, color).save(dir.join(format!("{label}_{n}.png")))?;
            }
        }
        Ok(())
    }

    #[test]
    fn test_scan_sorts_labels_and_skips_other_files() -> Result<()> {
        let root = tempfile::tempdir()?;
        write_dataset(root.path(), &[("B", 2), ("A", 3)])?;
        fs::write(root.path().join("A").join("README"), "not an image")?;
        fs::write(root.path().join("notes.txt"), "")?;

        let dataset = Dataset::scan(root.path())?;

        assert_eq!(dataset.labels().iter().collect::<Vec<_>>(), ["A", "B"]);
        assert_eq!(dataset.stats(), vec![("A", 3), ("B", 2)]);

        Ok(())
    }

    #[test]
    fn test_scan_without_classes() -> Result<()> {
        let root = tempfile::tempdir()?;
        assert!(Dataset::scan(root.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_split_is_per_class_and_deterministic() -> Result<()> {
        let root = tempfile::tempdir()?;
        write_dataset(root.path(), &[("A", 10), ("B", 5)])?;
        let dataset = Dataset::scan(root.path())?;

        let split = dataset.split(0.2);

        assert_eq!(split.validation.len(), 3);
        assert_eq!(split.train.len(), 12);
        assert_eq!(split.validation[0].path, root.path().join("A").join("A_0.png"));
        assert_eq!(split.validation[1].path, root.path().join("A").join("A_1.png"));
        assert_eq!(split.validation[2].class, 1);
        assert_eq!(split.validation, dataset.split(0.2).validation);

        Ok(())
    }

    #[test]
    fn test_prepare_writes_labels_and_images() -> Result<()> {
        let root = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        write_dataset(root.path(), &[("A", 5), ("B", 5)])?;
        let dataset = Dataset::scan(root.path())?;

        let options = PrepareOptions {
            image_size: 32,
            augment_copies: 2,
            ..Default::default()
        };
        let summary = dataset.prepare(out.path(), &options)?;

        assert_eq!(
            summary,
            PrepareSummary {
                train: 8,
                augmented: 16,
                validation: 2,
            }
        );
        assert_eq!(LabelSet::load(out.path().join(LABELS_FILE))?, *dataset.labels());

        let validation = image::open(out.path().join("validation").join("B").join("B_0.jpg"))?;
        assert_eq!((validation.width(), validation.height()), (32, 32));
        assert!(out.path().join("train").join("A").join("A_4_aug1.jpg").exists());

        Ok(())
    }
}
