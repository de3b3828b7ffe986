// 该文件是 Yunsun （云隼） 项目的一部分。
// src/pipeline/filter.rs - 几何合理性筛选
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::config::ClassConfig;
use crate::detect::{Detection, RawDetection};
use crate::raster::Affine;

/// 按占地面积与长宽比筛选候选框，生成带类别内序号的目标。
///
/// 面积为地面米制宽高之积，长宽比为长边与短边之比（分母加 1e-6），
/// 两者均按闭区间判定。序号从 1 起连续分配，只计入通过的目标。
pub fn apply(
  config: &'static ClassConfig,
  boxes: Vec<RawDetection>,
  pixel_size: (f64, f64),
  affine: &Affine,
) -> Vec<Detection> {
  let (xres, yres) = pixel_size;
  let mut out = Vec::new();
  let mut next_id = 0u32;

  for b in boxes {
    let w_m = b.width() * xres;
    let h_m = b.height() * yres;
    let area = w_m * h_m;
    let aspect = w_m.max(h_m) / (w_m.min(h_m) + 1e-6);

    if area < config.area_range.0 || area > config.area_range.1 {
      continue;
    }
    if aspect < config.ratio_range.0 || aspect > config.ratio_range.1 {
      continue;
    }

    next_id += 1;
    let (cx, cy) = ((b.x0 + b.x1) / 2.0, (b.y0 + b.y1) / 2.0);
    let (center_x, center_y) = affine.pixel_to_map(cx, cy);
    out.push(Detection {
      id: next_id,
      class: config.class,
      label: config.label,
      score: b.score,
      bbox_px: [b.x0, b.y0, b.x1, b.y1],
      center_x,
      center_y,
      area_m2: area,
      aspect,
      elevation: 0.0,
      height_m: 0.0,
      lat: 0.0,
      lon: 0.0,
    });
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::class_config;

  fn raw(x0: f64, y0: f64, x1: f64, y1: f64, score: f32) -> RawDetection {
    RawDetection { x0, y0, x1, y1, score }
  }

  #[test]
  fn plausible_car_box_passes_with_map_centroid() {
    let cfg = class_config("car").unwrap();
    let affine = Affine::from_origin(500000.0, 4000000.0, 0.1, 0.1);
    // 50x30 像素，0.1 米分辨率 → 5m x 3m，面积 15，长宽比约 1.67
    let kept = apply(cfg, vec![raw(100.0, 200.0, 150.0, 230.0, 0.9)], (0.1, 0.1), &affine);

    assert_eq!(kept.len(), 1);
    let det = &kept[0];
    assert_eq!(det.id, 1);
    assert_eq!(det.label, "vehicle");
    assert_eq!(det.class, "car");
    assert!((det.area_m2 - 15.0).abs() < 1e-9);
    assert!((det.aspect - 5.0 / (3.0 + 1e-6)).abs() < 1e-9);
    assert!((det.center_x - (500000.0 + 12.5)).abs() < 1e-9);
    assert!((det.center_y - (4000000.0 - 21.5)).abs() < 1e-9);
    assert_eq!(det.elevation, 0.0);
    assert_eq!(det.height_m, 0.0);
  }

  #[test]
  fn area_out_of_range_is_rejected() {
    let cfg = class_config("car").unwrap();
    let affine = Affine::from_origin(0.0, 100.0, 0.1, 0.1);
    // 1 平方米，低于乘用车下限 4
    assert!(apply(cfg, vec![raw(0.0, 0.0, 10.0, 10.0, 0.9)], (0.1, 0.1), &affine).is_empty());
    // 100 平方米，超出上限 25
    assert!(apply(cfg, vec![raw(0.0, 0.0, 100.0, 100.0, 0.9)], (0.1, 0.1), &affine).is_empty());
  }

  #[test]
  fn aspect_out_of_range_is_rejected() {
    let cfg = class_config("car").unwrap();
    let affine = Affine::from_origin(0.0, 100.0, 0.1, 0.1);
    // 10m x 1m：面积 10 在范围内，长宽比约 10 超出 [1, 3]
    assert!(apply(cfg, vec![raw(0.0, 0.0, 100.0, 10.0, 0.9)], (0.1, 0.1), &affine).is_empty());
  }

  #[test]
  fn area_boundary_is_inclusive() {
    let cfg = class_config("car").unwrap();
    let affine = Affine::from_origin(0.0, 100.0, 0.5, 0.5);
    // 6.25m x 4m：面积恰为上限 25，长宽比约 1.56
    let kept = apply(cfg, vec![raw(0.0, 0.0, 12.5, 8.0, 0.9)], (0.5, 0.5), &affine);
    assert_eq!(kept.len(), 1);
  }

  #[test]
  fn square_box_falls_just_under_unit_ratio() {
    let affine = Affine::from_origin(0.0, 100.0, 0.5, 0.5);
    // 长边除以 (短边 + 1e-6)，正方形略小于 1
    let cfg = class_config("car").unwrap();
    let kept = apply(cfg, vec![raw(0.0, 0.0, 4.0, 4.0, 0.9)], (0.5, 0.5), &affine);
    assert!(kept.is_empty(), "乘用车长宽比下限为 1，正方形框应被剔除");

    // 锥桶下限 0.8，同样的正方形可以通过
    let cfg = class_config("cone").unwrap();
    let affine = Affine::from_origin(0.0, 100.0, 0.1, 0.1);
    let kept = apply(cfg, vec![raw(0.0, 0.0, 4.0, 4.0, 0.8)], (0.1, 0.1), &affine);
    assert_eq!(kept.len(), 1);
  }

  #[test]
  fn ids_count_only_survivors() {
    let cfg = class_config("car").unwrap();
    let affine = Affine::from_origin(0.0, 100.0, 0.1, 0.1);
    let kept = apply(
      cfg,
      vec![
        raw(0.0, 0.0, 50.0, 30.0, 0.9),
        raw(0.0, 0.0, 5.0, 5.0, 0.9),
        raw(100.0, 100.0, 150.0, 130.0, 0.8),
      ],
      (0.1, 0.1),
      &affine,
    );

    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].id, 1);
    assert_eq!(kept[1].id, 2);
  }
}
