//! JSON loading and saving of detection records and funnel artifacts.

use crate::error::{AuditError, Result};
use crate::types::Detection;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Image extensions recognised by [`list_images`], lower-case.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Load a JSON array of detections from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
///
/// ```no_run
/// use detection_audit::loader::load_detections_from_file;
///
/// let detections = load_detections_from_file("detections.json").unwrap();
/// println!("Loaded {} detections", detections.len());
/// ```
pub fn load_detections_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Detection>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let detections: Vec<Detection> = serde_json::from_reader(reader)?;
    Ok(detections)
}

/// Load a JSON array of detections from a string.
///
/// # Example
///
/// ```
/// use detection_audit::loader::load_detections_from_str;
///
/// let json = r#"[
///     {"image_path": "a.jpg", "label": "car", "confidence": "0.91", "bbox": [1, 2, 30, 40]},
///     {"image_path": "b.jpg", "label": null}
/// ]"#;
/// let detections = load_detections_from_str(json).unwrap();
/// assert!(detections[1].is_no_detection());
/// ```
pub fn load_detections_from_str(json_str: &str) -> Result<Vec<Detection>> {
    let detections: Vec<Detection> = serde_json::from_str(json_str)?;
    Ok(detections)
}

/// Lazily read a stream of detection objects.
///
/// Accepts JSON-lines or any whitespace-separated sequence of JSON objects,
/// yielding one detection at a time without buffering the whole input.
pub fn stream_detections<R: Read>(reader: R) -> impl Iterator<Item = Result<Detection>> {
    serde_json::Deserializer::from_reader(BufReader::new(reader))
        .into_iter::<Detection>()
        .map(|item| item.map_err(AuditError::from))
}

/// Write `value` as pretty-printed JSON, replacing `path` atomically.
///
/// The JSON is written to a temporary file in the destination directory and
/// renamed into place, so readers never observe a half-written file.
pub fn save_json_pretty<T, P>(value: &T, path: P) -> Result<()>
where
    T: Serialize + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let tmp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    tmp.persist(path).map_err(|e| AuditError::PersistError {
        path: path.display().to_string(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}

/// List image files in `dir`, sorted by path, optionally truncated to `limit`.
pub fn list_images<P: AsRef<Path>>(dir: P, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image_path(path))
        .collect();
    images.sort();

    if let Some(limit) = limit {
        images.truncate(limit);
    }
    Ok(images)
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
