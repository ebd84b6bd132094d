//! CIFAR-10 / CIFAR-100 in their binary archive format.
//!
//! Each record is one or two label bytes followed by 3072 pixel bytes: the
//! 1024 red values, then green, then blue, each plane in row-major order.

use crate::{
    common::{CIFAR_PIXELS, CIFAR_SIDE},
    config::DatasetKind,
};
use burn::data::dataset::Dataset;
use color_eyre::{
    Result,
    eyre::{WrapErr, bail},
};
use flate2::read::GzDecoder;
use image::{Rgb, RgbImage};
use log::info;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug)]
pub struct CifarItem {
    pub image: RgbImage,
    pub label: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

/// Where a dataset's files live inside its extracted archive.
pub struct ArchiveLayout {
    pub url: &'static str,
    pub dir: &'static str,
    pub train_files: &'static [&'static str],
    pub test_files: &'static [&'static str],
    pub class_names_file: &'static str,
    pub label_bytes: usize,
    /// Which of the label bytes holds the class index.
    pub label_offset: usize,
}

const CIFAR10_LAYOUT: ArchiveLayout = ArchiveLayout {
    url: "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz",
    dir: "cifar-10-batches-bin",
    train_files: &[
        "data_batch_1.bin",
        "data_batch_2.bin",
        "data_batch_3.bin",
        "data_batch_4.bin",
        "data_batch_5.bin",
    ],
    test_files: &["test_batch.bin"],
    class_names_file: "batches.meta.txt",
    label_bytes: 1,
    label_offset: 0,
};

const CIFAR100_LAYOUT: ArchiveLayout = ArchiveLayout {
    url: "https://www.cs.toronto.edu/~kriz/cifar-100-binary.tar.gz",
    dir: "cifar-100-binary",
    train_files: &["train.bin"],
    test_files: &["test.bin"],
    class_names_file: "fine_label_names.txt",
    label_bytes: 2,
    label_offset: 1,
};

impl ArchiveLayout {
    pub fn of(kind: DatasetKind) -> &'static ArchiveLayout {
        match kind {
            DatasetKind::Cifar10 => &CIFAR10_LAYOUT,
            DatasetKind::Cifar100 => &CIFAR100_LAYOUT,
        }
    }

    pub fn record_len(&self) -> usize {
        self.label_bytes + CIFAR_PIXELS
    }

    fn files(&self, split: Split) -> &'static [&'static str] {
        match split {
            Split::Train => self.train_files,
            Split::Test => self.test_files,
        }
    }
}

pub struct CifarDataset {
    items: Vec<CifarItem>,
    classes: Vec<String>,
}

impl CifarDataset {
    /// Reads one split from `root/<archive dir>`.
    pub fn load(kind: DatasetKind, root: &Path, split: Split) -> Result<Self> {
        let layout = ArchiveLayout::of(kind);
        let dir = root.join(layout.dir);

        let classes = read_class_names(&dir.join(layout.class_names_file))?;
        if classes.len() != kind.num_classes() {
            bail!(
                "{} lists {} classes, expected {} for {kind}",
                layout.class_names_file,
                classes.len(),
                kind.num_classes()
            );
        }

        let mut items = Vec::new();
        for file in layout.files(split) {
            let path = dir.join(file);
            let bytes = fs::read(&path)
                .wrap_err_with(|| format!("Failed to read CIFAR batch {}", path.display()))?;
            let records = parse_records(&bytes, layout)
                .wrap_err_with(|| format!("Malformed CIFAR batch {}", path.display()))?;
            items.extend(records);
        }

        if let Some(bad) = items.iter().find(|item| item.label >= classes.len()) {
            bail!("Label {} out of range for {kind}", bad.label);
        }

        Ok(Self { items, classes })
    }

    pub fn from_items(items: Vec<CifarItem>, classes: Vec<String>) -> Self {
        Self { items, classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

impl Dataset<CifarItem> for CifarDataset {
    fn get(&self, index: usize) -> Option<CifarItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

pub fn parse_records(bytes: &[u8], layout: &ArchiveLayout) -> Result<Vec<CifarItem>> {
    let record_len = layout.record_len();
    if bytes.len() % record_len != 0 {
        bail!(
            "Batch length {} is not a multiple of the record length {record_len}",
            bytes.len()
        );
    }

    let plane = CIFAR_SIDE * CIFAR_SIDE;
    let items = bytes
        .chunks_exact(record_len)
        .map(|record| {
            let label = record[layout.label_offset] as usize;
            let pixels = &record[layout.label_bytes..];
            let image = RgbImage::from_fn(CIFAR_SIDE as u32, CIFAR_SIDE as u32, |x, y| {
                let idx = y as usize * CIFAR_SIDE + x as usize;
                Rgb([pixels[idx], pixels[plane + idx], pixels[2 * plane + idx]])
            });
            CifarItem { image, label }
        })
        .collect();
    Ok(items)
}

fn read_class_names(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read class names {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Makes sure the extracted archive for `kind` exists under `root`,
/// downloading it when allowed.
pub fn ensure_available(kind: DatasetKind, root: &Path, download: bool) -> Result<PathBuf> {
    let layout = ArchiveLayout::of(kind);
    let dir = root.join(layout.dir);
    if dir.exists() {
        return Ok(dir);
    }
    if !download {
        bail!(
            "Dataset directory not found: {} (enable `download` or fetch {})",
            dir.display(),
            layout.url
        );
    }

    fs::create_dir_all(root)
        .wrap_err_with(|| format!("Failed to create data directory {}", root.display()))?;
    info!("Downloading {kind} from {}", layout.url);
    let bytes = reqwest::blocking::get(layout.url)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .wrap_err_with(|| format!("Failed to download {}", layout.url))?;

    info!("Extracting {} bytes into {}", bytes.len(), root.display());
    tar::Archive::new(GzDecoder::new(&bytes[..]))
        .unpack(root)
        .wrap_err("Failed to extract CIFAR archive")?;

    if !dir.exists() {
        bail!("Archive did not contain {}", layout.dir);
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(layout: &ArchiveLayout, label: u8, red: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; layout.label_bytes];
        bytes[layout.label_offset] = label;
        let plane = CIFAR_SIDE * CIFAR_SIDE;
        bytes.extend(std::iter::repeat_n(red, plane));
        bytes.extend(std::iter::repeat_n(10, plane));
        bytes.extend(std::iter::repeat_n(20, plane));
        bytes
    }

    #[test]
    fn decodes_planar_pixels_into_rgb() {
        let layout = ArchiveLayout::of(DatasetKind::Cifar10);
        let mut bytes = record(layout, 3, 200);
        bytes.extend(record(layout, 7, 5));

        let items = parse_records(&bytes, layout).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, 3);
        assert_eq!(items[0].image.get_pixel(31, 31), &Rgb([200, 10, 20]));
        assert_eq!(items[1].label, 7);
        assert_eq!(items[1].image.dimensions(), (32, 32));
    }

    #[test]
    fn cifar100_reads_the_fine_label() {
        let layout = ArchiveLayout::of(DatasetKind::Cifar100);
        let mut bytes = record(layout, 42, 1);
        bytes[0] = 9;

        let items = parse_records(&bytes, layout).unwrap();
        assert_eq!(items[0].label, 42);
    }

    #[test]
    fn truncated_batch_is_rejected() {
        let layout = ArchiveLayout::of(DatasetKind::Cifar10);
        let bytes = record(layout, 1, 1);
        assert!(parse_records(&bytes[..100], layout).is_err());
    }

    #[test]
    fn missing_archive_without_download_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_available(DatasetKind::Cifar10, dir.path(), false).is_err());
    }
}
