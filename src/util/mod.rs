//! File helpers shared by the annotators and demos: JSON and CSV output, and
//! image loading and box overlays for checking labels against renders.

use image::{Rgb, RgbImage};
use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::geometry::NormalizedBBox;

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("IO Error: {0}")]
    IOError(String),
    #[error("JSON Error: {0}")]
    JsonError(String),
    #[error("CSV Error: {0}")]
    CsvError(String),
    #[error("Image Error: {0}")]
    ImageError(String),
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

impl From<std::io::Error> for UtilError {
    fn from(err: std::io::Error) -> Self {
        UtilError::IOError(err.to_string())
    }
}

impl From<serde_json::Error> for UtilError {
    fn from(err: serde_json::Error) -> Self {
        UtilError::JsonError(err.to_string())
    }
}

impl From<csv::Error> for UtilError {
    fn from(err: csv::Error) -> Self {
        UtilError::CsvError(err.to_string())
    }
}

impl From<image::ImageError> for UtilError {
    fn from(err: image::ImageError) -> Self {
        UtilError::ImageError(err.to_string())
    }
}

/// Ensure a directory (and its parents) exists
pub fn ensure_dir(dir: &Path) -> Result<(), UtilError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            UtilError::IOError(format!(
                "Failed to create directory {}: {e}",
                dir.display()
            ))
        })?;
    }
    Ok(())
}

fn create_parent_dir(path: &Path) -> Result<(), UtilError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Write `value` as single-line JSON, the format of the BOP scene files.
pub fn save_json_compact<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), UtilError> {
    create_parent_dir(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Write `value` as JSON indented by four spaces, the format of the
/// per-image sidecar files.
pub fn save_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), UtilError> {
    create_parent_dir(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value.serialize(&mut serializer)?;
    writer.flush()?;
    Ok(())
}

/// Export sampled `(input, uncertainty)` pairs as CSV
///
/// # Arguments
///
/// * `path` - Destination CSV file
/// * `input_name` - Header of the first column, e.g. `focal_length`
/// * `samples` - Input values and their uncertainty
pub fn export_uncertainty_curve(
    path: &Path,
    input_name: &str,
    samples: &[(f64, f64)],
) -> Result<(), UtilError> {
    create_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([input_name, "uncertainty"])?;
    for (input, uncertainty) in samples {
        writer.write_record([input.to_string(), uncertainty.to_string()])?;
    }
    writer.flush()?;

    info!("Exported {} samples to {}", samples.len(), path.display());
    Ok(())
}

/// Load an image from file path
///
/// # Arguments
///
/// * `image_path` - Path to the image file
///
/// # Returns
///
/// * `Result<RgbImage, UtilError>` - Loaded RGB image
pub fn load_image(image_path: &Path) -> Result<RgbImage, UtilError> {
    let img = image::open(image_path)?;
    Ok(img.to_rgb8())
}

/// Draw the outline of a normalized bounding box onto an image
///
/// The box is scaled to the image size; `thickness` pixels are drawn inward
/// from each edge.
pub fn draw_normalized_bbox(
    img: &mut RgbImage,
    bbox: &NormalizedBBox,
    color: Rgb<u8>,
    thickness: u32,
) -> Result<(), UtilError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(UtilError::InvalidParams("Image has no pixels".to_string()));
    }

    let to_px = |v: f64, size: u32| {
        ((v * size as f64).round() as i64).clamp(0, size as i64 - 1) as u32
    };
    let x1 = to_px(bbox.min_x, width);
    let x2 = to_px(bbox.max_x, width);
    let y1 = to_px(bbox.min_y, height);
    let y2 = to_px(bbox.max_y, height);

    for t in 0..thickness {
        let (left, right) = (x1.saturating_add(t).min(x2), x2.saturating_sub(t).max(x1));
        let (top, bottom) = (y1.saturating_add(t).min(y2), y2.saturating_sub(t).max(y1));
        for x in left..=right {
            img.put_pixel(x, top, color);
            img.put_pixel(x, bottom, color);
        }
        for y in top..=bottom {
            img.put_pixel(left, y, color);
            img.put_pixel(right, y, color);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn output_path(name: &str) -> PathBuf {
        Path::new("output").join("util_test").join(name)
    }

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
        values: [f64; 2],
    }

    #[test]
    fn test_json_formats() {
        let sample = Sample {
            name: "mug",
            values: [0.5, 1.0],
        };

        let compact = output_path("compact.json");
        save_json_compact(&compact, &sample).unwrap();
        assert_eq!(
            fs::read_to_string(&compact).unwrap(),
            r#"{"name":"mug","values":[0.5,1.0]}"#
        );

        let pretty = output_path("pretty.json");
        save_json_pretty(&pretty, &sample).unwrap();
        let text = fs::read_to_string(&pretty).unwrap();
        assert!(text.starts_with("{\n    \"name\": \"mug\""));
        assert!(text.contains("\n        0.5,"));
    }

    #[test]
    fn test_export_uncertainty_curve() {
        let path = output_path("curve.csv");
        export_uncertainty_curve(&path, "light", &[(0.0, 0.86), (6.0, 0.25)]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, ["light", "uncertainty"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][0], "6");
        assert_eq!(&rows[1][1], "0.25");
    }

    #[test]
    fn test_draw_normalized_bbox() {
        let mut img = RgbImage::new(100, 50);
        let bbox = NormalizedBBox {
            min_x: 0.2,
            min_y: 0.2,
            max_x: 0.6,
            max_y: 0.8,
        };
        let red = Rgb([255, 0, 0]);
        draw_normalized_bbox(&mut img, &bbox, red, 1).unwrap();

        assert_eq!(*img.get_pixel(20, 10), red);
        assert_eq!(*img.get_pixel(60, 40), red);
        assert_eq!(*img.get_pixel(40, 10), red);
        assert_eq!(*img.get_pixel(40, 25), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(10, 25), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_load_missing_image_fails() {
        assert!(matches!(
            load_image(Path::new("samples/does_not_exist.png")),
            Err(UtilError::ImageError(_)) | Err(UtilError::IOError(_))
        ));
    }
}
