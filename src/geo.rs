// 该文件是 Yunsun （云隼） 项目的一部分。
// src/geo.rs - 经纬度换算
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;

use crate::detect::Detection;

#[cfg(feature = "proj_backend")]
mod proj_backend;
#[cfg(feature = "proj_backend")]
pub use self::proj_backend::ProjProjector;

/// 地图坐标到 WGS84 经纬度的投影能力。
pub trait Projector {
  /// 将 `from_crs` 坐标系中的一点换算为（纬度, 经度）。
  fn project(&self, x: f64, y: f64, from_crs: &str) -> Result<(f64, f64)>;

  /// 批量换算，默认逐点调用。
  fn project_batch(&self, points: &[(f64, f64)], from_crs: &str) -> Result<Vec<(f64, f64)>> {
    points
      .iter()
      .map(|&(x, y)| self.project(x, y, from_crs))
      .collect()
  }
}

/// 经纬度换算的结果。换算失败不是错误，目标保持零值。
#[derive(Debug, Clone, PartialEq)]
pub enum GeoOutcome {
  /// 全部目标已写入经纬度
  Projected,
  /// 影像缺少坐标参考系
  NoCrs,
  /// 没有可用的投影后端
  NoProjector,
  /// 投影后端报错，所有目标保持零值
  Failed(String),
}

/// 为目标批量填充经纬度。
pub fn assign_latlon(
  detections: &mut [Detection],
  crs: Option<&str>,
  projector: Option<&dyn Projector>,
) -> GeoOutcome {
  let Some(crs) = crs else {
    return GeoOutcome::NoCrs;
  };
  let Some(projector) = projector else {
    return GeoOutcome::NoProjector;
  };

  let points: Vec<(f64, f64)> = detections.iter().map(|d| (d.center_x, d.center_y)).collect();
  match projector.project_batch(&points, crs) {
    Ok(latlon) => {
      for (det, (lat, lon)) in detections.iter_mut().zip(latlon) {
        det.lat = lat;
        det.lon = lon;
      }
      GeoOutcome::Projected
    }
    Err(e) => GeoOutcome::Failed(e.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use anyhow::anyhow;

  use super::*;

  struct ShiftProjector;

  impl Projector for ShiftProjector {
    fn project(&self, x: f64, y: f64, _from_crs: &str) -> Result<(f64, f64)> {
      Ok((y / 100000.0, x / 100000.0))
    }
  }

  struct BrokenProjector;

  impl Projector for BrokenProjector {
    fn project(&self, _x: f64, _y: f64, from_crs: &str) -> Result<(f64, f64)> {
      Err(anyhow!("未知坐标系: {from_crs}"))
    }
  }

  fn detection(center_x: f64, center_y: f64) -> Detection {
    Detection {
      id: 1,
      class: "car",
      label: "vehicle",
      score: 0.9,
      bbox_px: [0.0, 0.0, 1.0, 1.0],
      center_x,
      center_y,
      area_m2: 10.0,
      aspect: 1.5,
      elevation: 0.0,
      height_m: 0.0,
      lat: 0.0,
      lon: 0.0,
    }
  }

  #[test]
  fn projects_all_detections() {
    let mut dets = vec![detection(250000.0, 3300000.0), detection(260000.0, 3310000.0)];
    let outcome = assign_latlon(&mut dets, Some("EPSG:32650"), Some(&ShiftProjector));

    assert_eq!(outcome, GeoOutcome::Projected);
    assert!((dets[0].lat - 33.0).abs() < 1e-9);
    assert!((dets[0].lon - 2.5).abs() < 1e-9);
    assert!((dets[1].lat - 33.1).abs() < 1e-9);
  }

  #[test]
  fn missing_crs_keeps_zeroes() {
    let mut dets = vec![detection(1.0, 2.0)];
    assert_eq!(assign_latlon(&mut dets, None, Some(&ShiftProjector)), GeoOutcome::NoCrs);
    assert_eq!(dets[0].lat, 0.0);
    assert_eq!(dets[0].lon, 0.0);
  }

  #[test]
  fn missing_projector_keeps_zeroes() {
    let mut dets = vec![detection(1.0, 2.0)];
    assert_eq!(assign_latlon(&mut dets, Some("EPSG:32650"), None), GeoOutcome::NoProjector);
    assert_eq!(dets[0].lat, 0.0);
  }

  #[test]
  fn backend_failure_is_degraded_not_fatal() {
    let mut dets = vec![detection(1.0, 2.0)];
    let outcome = assign_latlon(&mut dets, Some("EPSG:0"), Some(&BrokenProjector));

    assert!(matches!(outcome, GeoOutcome::Failed(_)));
    assert_eq!(dets[0].lat, 0.0);
    assert_eq!(dets[0].lon, 0.0);
  }
}
