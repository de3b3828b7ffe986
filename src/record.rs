// 该文件是 Yunsun （云隼） 项目的一部分。
// src/record.rs - 结果记录与导出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::FromUrl;
use crate::detect::Detection;
use crate::raster::RasterSource;

/// 序列化口径的单目标记录，数值已按输出位数取整。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
  pub id: u32,
  pub cls: String,
  pub score: f64,
  pub center_x: f64,
  pub center_y: f64,
  pub area_m2: f64,
  pub aspect_rat: f64,
  pub elev_z: f64,
  pub height_m: f64,
  pub lat: f64,
  pub lon: f64,
}

impl From<&Detection> for DetectionRecord {
  fn from(det: &Detection) -> Self {
    Self {
      id: det.id,
      cls: det.label.to_string(),
      score: round_to(det.score as f64, 3),
      center_x: round_to(det.center_x, 2),
      center_y: round_to(det.center_y, 2),
      area_m2: round_to(det.area_m2, 2),
      aspect_rat: round_to(det.aspect, 2),
      elev_z: round_to(det.elevation, 1),
      height_m: round_to(det.height_m, 2),
      lat: round_to(det.lat, 6),
      lon: round_to(det.lon, 6),
    }
  }
}

/// 按输出类别统计的汇总。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
  pub total: usize,
  pub person: usize,
  pub vehicle: usize,
  pub cone: usize,
}

impl Summary {
  pub fn count(records: &[DetectionRecord]) -> Self {
    let of = |label: &str| records.iter().filter(|r| r.cls == label).count();
    Self {
      total: records.len(),
      person: of("person"),
      vehicle: of("vehicle"),
      cone: of("cone"),
    }
  }
}

/// 一次处理的导出报告。
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
  pub generated_at: String,
  pub summary: Summary,
  pub detections: Vec<DetectionRecord>,
}

impl ExportReport {
  pub fn new(detections: &[Detection]) -> Self {
    let records: Vec<DetectionRecord> = detections.iter().map(DetectionRecord::from).collect();
    Self {
      generated_at: chrono::Local::now().to_rfc3339(),
      summary: Summary::count(&records),
      detections: records,
    }
  }

  pub fn write_json<W: Write>(&self, writer: W) -> Result<(), OutputError> {
    serde_json::to_writer_pretty(writer, self)?;
    Ok(())
  }

  pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), OutputError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in &self.detections {
      csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("无法写出结果文件: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON 序列化失败: {0}")]
  Json(#[from] serde_json::Error),
  #[error("CSV 写出失败: {0}")]
  Csv(#[from] csv::Error),
  #[cfg(feature = "save_overlay")]
  #[error("叠加图输出失败: {0}")]
  Overlay(#[from] crate::overlay::OverlayError),
  #[error("影像未加载，无法绘制叠加图")]
  MissingRaster,
  #[error("URL 路径无效: {0}")]
  BadPath(String),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  #[cfg(feature = "record_json")]
  JsonFile(PathBuf),
  #[cfg(feature = "record_csv")]
  CsvFile(PathBuf),
  #[cfg(feature = "save_overlay")]
  Overlay(crate::overlay::OverlaySink),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "record_json")]
      "json" => Ok(OutputWrapper::JsonFile(decoded_path(url)?)),
      #[cfg(feature = "record_csv")]
      "csv" => Ok(OutputWrapper::CsvFile(decoded_path(url)?)),
      #[cfg(feature = "save_overlay")]
      "overlay" => Ok(OutputWrapper::Overlay(crate::overlay::OverlaySink::from_url(url)?)),
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl OutputWrapper {
  /// 将报告或叠加图写到目的地。
  pub fn write(
    &self,
    report: &ExportReport,
    raster: Option<&dyn RasterSource>,
    detections: &[Detection],
  ) -> Result<(), OutputError> {
    match self {
      #[cfg(feature = "record_json")]
      OutputWrapper::JsonFile(path) => {
        let file = File::create(path)?;
        report.write_json(BufWriter::new(file))
      }
      #[cfg(feature = "record_csv")]
      OutputWrapper::CsvFile(path) => {
        let file = File::create(path)?;
        report.write_csv(BufWriter::new(file))
      }
      #[cfg(feature = "save_overlay")]
      OutputWrapper::Overlay(sink) => {
        let raster = raster.ok_or(OutputError::MissingRaster)?;
        sink.render(raster, detections)?;
        Ok(())
      }
    }
  }
}

fn decoded_path(url: &url::Url) -> Result<PathBuf, OutputError> {
  urlencoding::decode(url.path())
    .map(|p| PathBuf::from(p.into_owned()))
    .map_err(|e| OutputError::BadPath(e.to_string()))
}

fn round_to(v: f64, digits: i32) -> f64 {
  let factor = 10f64.powi(digits);
  (v * factor).round() / factor
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection() -> Detection {
    Detection {
      id: 3,
      class: "car",
      label: "vehicle",
      score: 0.87654,
      bbox_px: [0.0, 0.0, 50.0, 30.0],
      center_x: 500123.456789,
      center_y: 3998765.432111,
      area_m2: 15.0,
      aspect: 5.0 / 3.000001,
      elevation: 42.3456,
      height_m: 1.84321,
      lat: 36.1234567891,
      lon: 117.9876543219,
    }
  }

  #[test]
  fn record_applies_output_rounding() {
    let record = DetectionRecord::from(&detection());

    assert_eq!(record.cls, "vehicle");
    assert_eq!(record.score, 0.877);
    assert_eq!(record.center_x, 500123.46);
    assert_eq!(record.center_y, 3998765.43);
    assert_eq!(record.aspect_rat, 1.67);
    assert_eq!(record.elev_z, 42.3);
    assert_eq!(record.height_m, 1.84);
    assert_eq!(record.lat, 36.123457);
    assert_eq!(record.lon, 117.987654);
  }

  #[test]
  fn summary_counts_by_output_label() {
    let mut person = detection();
    person.label = "person";
    let records: Vec<DetectionRecord> = [detection(), detection(), person]
      .iter()
      .map(DetectionRecord::from)
      .collect();

    let summary = Summary::count(&records);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.vehicle, 2);
    assert_eq!(summary.person, 1);
    assert_eq!(summary.cone, 0);
  }

  #[test]
  fn report_serializes_expected_fields() {
    let dets = vec![detection()];
    let report = ExportReport::new(&dets);
    let value = serde_json::to_value(&report).unwrap();

    assert!(value.get("generated_at").is_some());
    assert_eq!(value["summary"]["total"], 1);
    let det = &value["detections"][0];
    for key in [
      "id", "cls", "score", "center_x", "center_y", "area_m2", "aspect_rat", "elev_z",
      "height_m", "lat", "lon",
    ] {
      assert!(det.get(key).is_some(), "缺少字段 {key}");
    }
    assert!(det.get("bbox_px").is_none());
  }

  #[test]
  fn csv_export_has_header_and_rows() {
    let dets = vec![detection(), detection()];
    let report = ExportReport::new(&dets);

    let mut buf = Vec::new();
    report.write_csv(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("id,cls,score"));
    assert!(lines[1].contains("vehicle"));
  }
}
