// 该文件是 Yunsun （云隼） 项目的一部分。
// src/pipeline/height.rs - 点云高度融合
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::cloud::PointCloud;
use crate::config::{ClassConfig, class_config};
use crate::detect::Detection;
use crate::raster::Affine;

/// 高度先验采样的默认随机种子。
pub const DEFAULT_SEED: u64 = 42;

/// NumPy 线性插值口径的百分位数。
///
/// 输入须非空；含 NaN 时结果为 NaN。
pub fn percentile(values: &[f64], q: f64) -> f64 {
  assert!(!values.is_empty(), "百分位输入为空");
  if values.iter().any(|v| v.is_nan()) {
    return f64::NAN;
  }

  let mut sorted = values.to_vec();
  sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
  let rank = q / 100.0 * (sorted.len() - 1) as f64;
  let lower = rank.floor() as usize;
  let upper = rank.ceil() as usize;
  let frac = rank - lower as f64;
  sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// 以点云测量目标高度，点云不可用时退回类别先验采样。
///
/// 同一种子下结果可复现。
pub struct HeightFuser {
  rng: StdRng,
}

impl HeightFuser {
  pub fn new() -> Self {
    Self::with_seed(DEFAULT_SEED)
  }

  pub fn with_seed(seed: u64) -> Self {
    Self {
      rng: StdRng::seed_from_u64(seed),
    }
  }

  /// 为每个目标填充地面高程与高度。
  ///
  /// 目标包围盒换算到地图坐标后，取盒内点的 Z 值：
  /// 第 5 百分位为地面高程，第 95 与第 5 百分位之差为原始高度。
  /// 盒内无点、原始高度非有限或超出类别范围时，高度改为先验采样，
  /// 无点时地面高程记 0。
  pub fn fuse(
    &mut self,
    detections: &mut [Detection],
    cloud: Option<&PointCloud>,
    affine: &Affine,
  ) {
    for det in detections {
      let Some(config) = class_config(det.class) else {
        continue;
      };

      let Some(cloud) = cloud else {
        det.elevation = 0.0;
        det.height_m = self.impute(config);
        continue;
      };

      let (x1, y1) = affine.pixel_to_map(det.bbox_px[0], det.bbox_px[1]);
      let (x2, y2) = affine.pixel_to_map(det.bbox_px[2], det.bbox_px[3]);
      let z = cloud.select_z(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2));
      if z.is_empty() {
        det.elevation = 0.0;
        det.height_m = self.impute(config);
        continue;
      }

      let ground = percentile(&z, 5.0);
      let top = percentile(&z, 95.0);
      let raw = (top - ground).max(0.0);
      let (low, high) = config.height_range;

      det.elevation = if ground.is_finite() { ground } else { 0.0 };
      det.height_m = if raw.is_finite() && raw >= low && raw <= high {
        raw
      } else {
        self.impute(config)
      };
    }
  }

  /// 类别先验的截断正态采样。
  fn impute(&mut self, config: &ClassConfig) -> f64 {
    let (mean, std) = config.height_prior;
    let (low, high) = config.height_range;
    self.sample_trunc_normal(mean, std, low, high)
  }

  /// 最多尝试 60 次正态采样，全部越界时退化为均匀采样。
  fn sample_trunc_normal(&mut self, mean: f64, std: f64, low: f64, high: f64) -> f64 {
    if let Ok(normal) = Normal::new(mean, std) {
      for _ in 0..60 {
        let v = normal.sample(&mut self.rng);
        if v >= low && v <= high {
          return v;
        }
      }
    }
    self.rng.random_range(low..=high)
  }
}

impl Default for HeightFuser {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn person_detection() -> Detection {
    Detection {
      id: 1,
      class: "person",
      label: "person",
      score: 0.8,
      bbox_px: [10.0, 10.0, 16.0, 18.0],
      center_x: 0.0,
      center_y: 0.0,
      area_m2: 0.48,
      aspect: 1.33,
      elevation: 0.0,
      height_m: 0.0,
      lat: 0.0,
      lon: 0.0,
    }
  }

  /// 包围盒内铺 0 到 2 米共 21 层的点柱。
  fn ramp_cloud(affine: &Affine) -> PointCloud {
    let (x1, y1) = affine.pixel_to_map(10.0, 10.0);
    let (x2, y2) = affine.pixel_to_map(16.0, 18.0);
    let (cx, cy) = ((x1 + x2) / 2.0, (y1 + y2) / 2.0);

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut zs = Vec::new();
    for i in 0..21 {
      xs.push(cx);
      ys.push(cy);
      zs.push(i as f64 * 0.1);
    }
    PointCloud::new(xs, ys, zs)
  }

  #[test]
  fn percentile_matches_linear_interpolation() {
    let values: Vec<f64> = (0..21).map(|i| i as f64 * 0.1).collect();
    assert!((percentile(&values, 5.0) - 0.1).abs() < 1e-12);
    assert!((percentile(&values, 95.0) - 1.9).abs() < 1e-12);
    assert!((percentile(&values, 50.0) - 1.0).abs() < 1e-12);

    assert_eq!(percentile(&[7.5], 95.0), 7.5);
    assert!(percentile(&[1.0, f64::NAN], 50.0).is_nan());
  }

  #[test]
  fn measured_height_from_point_column() {
    let affine = Affine::from_origin(0.0, 100.0, 0.1, 0.1);
    let cloud = ramp_cloud(&affine);
    let mut dets = vec![person_detection()];

    let mut fuser = HeightFuser::new();
    fuser.fuse(&mut dets, Some(&cloud), &affine);

    // p5 = 0.1，p95 = 1.9，高差 1.8 落在行人范围 [1.45, 1.90] 内
    assert!((dets[0].elevation - 0.1).abs() < 1e-9);
    assert!((dets[0].height_m - 1.8).abs() < 1e-9);
  }

  #[test]
  fn missing_cloud_falls_back_to_prior() {
    let affine = Affine::from_origin(0.0, 100.0, 0.1, 0.1);
    let mut dets = vec![person_detection()];

    let mut fuser = HeightFuser::new();
    fuser.fuse(&mut dets, None, &affine);

    assert_eq!(dets[0].elevation, 0.0);
    assert!(dets[0].height_m >= 1.45 && dets[0].height_m <= 1.90);
  }

  #[test]
  fn empty_footprint_falls_back_to_prior() {
    let affine = Affine::from_origin(0.0, 100.0, 0.1, 0.1);
    // 点云都落在包围盒外
    let cloud = PointCloud::new(vec![500.0], vec![500.0], vec![3.0]);
    let mut dets = vec![person_detection()];

    let mut fuser = HeightFuser::new();
    fuser.fuse(&mut dets, Some(&cloud), &affine);

    assert_eq!(dets[0].elevation, 0.0);
    assert!(dets[0].height_m >= 1.45 && dets[0].height_m <= 1.90);
  }

  #[test]
  fn out_of_range_spread_falls_back_to_prior() {
    let affine = Affine::from_origin(0.0, 100.0, 0.1, 0.1);
    let (x1, y1) = affine.pixel_to_map(10.0, 10.0);
    let (x2, y2) = affine.pixel_to_map(16.0, 18.0);
    let (cx, cy) = ((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    // 高差 10 米，远超行人范围
    let cloud = PointCloud::new(vec![cx; 2], vec![cy; 2], vec![0.0, 10.0]);
    let mut dets = vec![person_detection()];

    let mut fuser = HeightFuser::new();
    fuser.fuse(&mut dets, Some(&cloud), &affine);

    assert!((dets[0].elevation - 0.5).abs() < 1e-9);
    assert!(dets[0].height_m >= 1.45 && dets[0].height_m <= 1.90);
  }

  #[test]
  fn sampling_is_reproducible_per_seed() {
    let affine = Affine::from_origin(0.0, 100.0, 0.1, 0.1);

    let heights = |seed: u64| -> Vec<f64> {
      let mut dets: Vec<Detection> = (0..32).map(|_| person_detection()).collect();
      let mut fuser = HeightFuser::with_seed(seed);
      fuser.fuse(&mut dets, None, &affine);
      dets.iter().map(|d| d.height_m).collect()
    };

    assert_eq!(heights(42), heights(42));
    assert_ne!(heights(42), heights(7));
  }
}
