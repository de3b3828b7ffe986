// 该文件是 Yunsun （云隼） 项目的一部分。
// src/cloud.rs - 点云存取
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

#[cfg(feature = "read_xyz_cloud")]
mod xyz;
#[cfg(feature = "read_xyz_cloud")]
pub use self::xyz::XyzError;

/// 点云，与影像同一地图坐标系，按 X/Y/Z 三列存储。
#[derive(Debug, Clone)]
pub struct PointCloud {
  x: Box<[f64]>,
  y: Box<[f64]>,
  z: Box<[f64]>,
}

impl PointCloud {
  pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
    if x.len() != y.len() || x.len() != z.len() {
      panic!(
        "坐标列长度不匹配: x={}, y={}, z={}",
        x.len(),
        y.len(),
        z.len()
      );
    }

    Self {
      x: x.into_boxed_slice(),
      y: y.into_boxed_slice(),
      z: z.into_boxed_slice(),
    }
  }

  pub fn len(&self) -> usize {
    self.x.len()
  }

  pub fn is_empty(&self) -> bool {
    self.x.is_empty()
  }

  /// 平面范围 (min_x, min_y, max_x, max_y)，空点云为 `None`。
  pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
    if self.is_empty() {
      return None;
    }
    let mut bounds = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for i in 0..self.len() {
      bounds.0 = bounds.0.min(self.x[i]);
      bounds.1 = bounds.1.min(self.y[i]);
      bounds.2 = bounds.2.max(self.x[i]);
      bounds.3 = bounds.3.max(self.y[i]);
    }
    Some(bounds)
  }

  /// 收集落在闭区间包围盒内的点的 Z 值。
  pub fn select_z(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<f64> {
    let mut out = Vec::new();
    for i in 0..self.len() {
      if self.x[i] >= min_x && self.x[i] <= max_x && self.y[i] >= min_y && self.y[i] <= max_y {
        out.push(self.z[i]);
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bbox_selection_is_inclusive() {
    let cloud = PointCloud::new(
      vec![0.0, 1.0, 2.0, 3.0],
      vec![0.0, 1.0, 2.0, 3.0],
      vec![10.0, 11.0, 12.0, 13.0],
    );

    let z = cloud.select_z(1.0, 1.0, 2.0, 2.0);
    assert_eq!(z, vec![11.0, 12.0]);

    assert!(cloud.select_z(5.0, 5.0, 6.0, 6.0).is_empty());
  }

  #[test]
  fn nan_points_never_match() {
    let cloud = PointCloud::new(
      vec![f64::NAN, 1.0],
      vec![0.5, 1.0],
      vec![7.0, 8.0],
    );
    assert_eq!(cloud.select_z(0.0, 0.0, 2.0, 2.0), vec![8.0]);
  }

  #[test]
  fn bounds_cover_all_points() {
    let cloud = PointCloud::new(vec![3.0, -1.0], vec![0.0, 5.0], vec![0.0, 0.0]);
    assert_eq!(cloud.bounds(), Some((-1.0, 0.0, 3.0, 5.0)));
    assert_eq!(PointCloud::new(vec![], vec![], vec![]).bounds(), None);
  }
}
