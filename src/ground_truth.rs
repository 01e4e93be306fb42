//! Ground-truth label store, class-name table and image dimension probing.
//!
//! Ground truth follows the YOLO layout: one `.txt` file per image, sharing
//! the image's basename, with one `class_id cx cy w h` row per object where
//! the box values are fractions of the image size.

use crate::error::{AuditError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Mapping from numeric class id to a human-readable class name.
///
/// Ids missing from the table resolve to their decimal string, so an
/// out-of-date table degrades instead of failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassNames {
    names: BTreeMap<i64, String>,
}

#[derive(Deserialize)]
struct DataYaml {
    #[serde(default)]
    names: Option<NamesField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NamesField {
    List(Vec<String>),
    Map(BTreeMap<i64, String>),
}

impl ClassNames {
    /// Build a table where the class id is the position in `names`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .enumerate()
                .map(|(id, name)| (id as i64, name.into()))
                .collect(),
        }
    }

    /// Parse the `names` entry of a YOLO `data.yaml`.
    ///
    /// Both the list form (`names: [cat, dog]`) and the map form
    /// (`names: {0: cat, 1: dog}`) are accepted. A file without `names`
    /// yields an empty table.
    ///
    /// # Example
    ///
    /// ```
    /// use detection_audit::ground_truth::ClassNames;
    ///
    /// let names = ClassNames::from_yaml_str("names: [cat, dog]").unwrap();
    /// assert_eq!(names.name(1), "dog");
    /// assert_eq!(names.name(7), "7");
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let data: DataYaml = serde_yaml::from_str(yaml)?;
        let names = match data.names {
            Some(NamesField::List(list)) => Self::new(list),
            Some(NamesField::Map(map)) => Self { names: map },
            None => {
                warn!("class-name file has no `names` entry; ids will be used as names");
                Self::default()
            }
        };
        Ok(names)
    }

    /// Load the table from a YOLO `data.yaml` on disk.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AuditError::ConfigError(format!(
                "Failed to read class names from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Resolve a class id to its name, falling back to the id itself.
    pub fn name(&self, class_id: i64) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One parsed row of a YOLO label file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelRow {
    pub class_id: i64,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

/// Parse a single `class_id cx cy w h` row.
///
/// Returns `None` for blank lines, rows with fewer than five fields, and
/// rows whose fields are not numeric. Extra trailing fields are ignored.
pub fn parse_label_line(line: &str) -> Option<LabelRow> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return None;
    }
    Some(LabelRow {
        class_id: parts[0].parse().ok()?,
        x_center: parts[1].parse().ok()?,
        y_center: parts[2].parse().ok()?,
        width: parts[3].parse().ok()?,
        height: parts[4].parse().ok()?,
    })
}

/// Parse every row of a label file, logging and skipping malformed rows.
pub fn parse_label_file(content: &str, source: &Path) -> Vec<LabelRow> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| {
            let row = parse_label_line(line);
            if row.is_none() {
                warn!(
                    file = %source.display(),
                    line = idx + 1,
                    "skipping malformed ground-truth row"
                );
            }
            row
        })
        .collect()
}

/// Source of ground-truth rows for an image.
pub trait GroundTruthSource {
    /// Rows for `image_path`, or `None` when the image has no label file.
    fn label_rows(&self, image_path: &Path) -> Option<Vec<LabelRow>>;
}

/// Directory of YOLO label files.
#[derive(Debug, Clone)]
pub struct LabelDirectory {
    labels_dir: PathBuf,
}

impl LabelDirectory {
    /// Open a label directory.
    ///
    /// # Errors
    ///
    /// Returns `GroundTruthUnavailable` if the path is not a readable
    /// directory. This is checked once, up front, so a missing store fails
    /// the batch instead of flagging every detection.
    pub fn open<P: AsRef<Path>>(labels_dir: P) -> Result<Self> {
        let labels_dir = labels_dir.as_ref();
        if !labels_dir.is_dir() {
            return Err(AuditError::GroundTruthUnavailable(format!(
                "{} is not a directory",
                labels_dir.display()
            )));
        }
        fs::read_dir(labels_dir).map_err(|e| {
            AuditError::GroundTruthUnavailable(format!("{}: {}", labels_dir.display(), e))
        })?;
        Ok(Self {
            labels_dir: labels_dir.to_path_buf(),
        })
    }

    /// Path of the label file that belongs to `image_path`.
    pub fn label_path(&self, image_path: &Path) -> Option<PathBuf> {
        let file_name = image_path.file_name()?;
        Some(
            self.labels_dir
                .join(Path::new(file_name).with_extension("txt")),
        )
    }
}

impl GroundTruthSource for LabelDirectory {
    fn label_rows(&self, image_path: &Path) -> Option<Vec<LabelRow>> {
        let label_path = self.label_path(image_path)?;
        if !label_path.is_file() {
            debug!(label = %label_path.display(), "no ground-truth file");
            return None;
        }
        match fs::read_to_string(&label_path) {
            Ok(content) => Some(parse_label_file(&content, &label_path)),
            Err(e) => {
                warn!(label = %label_path.display(), error = %e, "failed to read ground-truth file");
                None
            }
        }
    }
}

/// Ground truth held in memory, keyed by image file stem.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLabels {
    rows: HashMap<String, Vec<LabelRow>>,
}

impl InMemoryLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rows for the image whose stem is `stem`.
    pub fn insert(&mut self, stem: impl Into<String>, rows: Vec<LabelRow>) {
        self.rows.insert(stem.into(), rows);
    }
}

impl GroundTruthSource for InMemoryLabels {
    fn label_rows(&self, image_path: &Path) -> Option<Vec<LabelRow>> {
        let stem = image_path.file_stem()?.to_str()?;
        self.rows.get(stem).cloned()
    }
}

/// Resolves the pixel size of an image.
pub trait ImageProbe {
    /// `(width, height)` in pixels, or a description of why it failed.
    fn dimensions(&self, image_path: &Path) -> std::result::Result<(u32, u32), String>;
}

/// Reads the image header from disk with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileProbe;

impl ImageProbe for ImageFileProbe {
    fn dimensions(&self, image_path: &Path) -> std::result::Result<(u32, u32), String> {
        image::image_dimensions(image_path).map_err(|e| e.to_string())
    }
}

/// Reports the same size for every image.
#[derive(Debug, Clone, Copy)]
pub struct FixedDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageProbe for FixedDimensions {
    fn dimensions(&self, _image_path: &Path) -> std::result::Result<(u32, u32), String> {
        Ok((self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_line() {
        let row = parse_label_line("2 0.5 0.25 0.1 0.2").unwrap();
        assert_eq!(row.class_id, 2);
        assert_eq!(row.y_center, 0.25);

        assert!(parse_label_line("2 0.5 0.25 0.1").is_none());
        assert!(parse_label_line("cat 0.5 0.25 0.1 0.2").is_none());
        assert!(parse_label_line("").is_none());
    }

    #[test]
    fn test_class_names_fallback() {
        let names = ClassNames::new(["cat", "dog"]);
        assert_eq!(names.name(0), "cat");
        assert_eq!(names.name(5), "5");
        assert_eq!(names.name(-1), "-1");
    }

    #[test]
    fn test_class_names_map_form() {
        let yaml = "path: ../datasets\nnames:\n  0: person\n  3: bicycle\n";
        let names = ClassNames::from_yaml_str(yaml).unwrap();
        assert_eq!(names.name(3), "bicycle");
        assert_eq!(names.name(1), "1");
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_class_names_without_names_key() {
        let names = ClassNames::from_yaml_str("nc: 3").unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_label_directory_missing() {
        let result = LabelDirectory::open("/definitely/not/here");
        assert!(matches!(result, Err(AuditError::GroundTruthUnavailable(_))));
    }

    #[test]
    fn test_label_directory_reads_rows() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("img_01.txt"), "0 0.5 0.5 0.2 0.2\nbad row\n\n1 0.1 0.1 0.1 0.1\n")
            .unwrap();

        let store = LabelDirectory::open(dir.path()).unwrap();
        let rows = store.label_rows(Path::new("/images/img_01.jpg")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].class_id, 1);

        assert!(store.label_rows(Path::new("/images/img_02.jpg")).is_none());
    }

    #[test]
    fn test_in_memory_labels_by_stem() {
        let mut labels = InMemoryLabels::new();
        labels.insert("a", vec![parse_label_line("0 0.5 0.5 1 1").unwrap()]);
        assert!(labels.label_rows(Path::new("x/y/a.png")).is_some());
        assert!(labels.label_rows(Path::new("x/y/b.png")).is_none());
    }
}
