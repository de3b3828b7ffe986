// 该文件是 Yunsun （云隼） 项目的一部分。
// src/terrain.rs - DSM 坡度坡向分析
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;

use crate::raster::Affine;

#[derive(Error, Debug)]
pub enum TerrainError {
  #[error("格网过小，无法计算梯度: {rows}x{cols}")]
  GridTooSmall { rows: usize, cols: usize },
}

/// 数字表面模型格网，行主序存储，无效单元为 NaN。
#[derive(Debug, Clone)]
pub struct ElevationGrid {
  rows: usize,
  cols: usize,
  data: Box<[f64]>,
  affine: Affine,
}

impl ElevationGrid {
  pub fn new(rows: usize, cols: usize, data: Vec<f64>, affine: Affine) -> Self {
    if data.len() != rows * cols {
      panic!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        rows * cols,
        data.len()
      );
    }

    Self {
      rows,
      cols,
      data: data.into_boxed_slice(),
      affine,
    }
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn affine(&self) -> Affine {
    self.affine
  }

  /// 梯度计算使用的格网间距（米）。
  pub fn resolution(&self) -> f64 {
    self.affine.pixel_size().0
  }

  /// 读取单元高程，可能为 NaN，越界时 panic。
  pub fn value(&self, row: usize, col: usize) -> f64 {
    assert!(row < self.rows && col < self.cols, "格网坐标越界");
    self.data[row * self.cols + col]
  }
}

/// 坡度（度）与坡向（度，北起顺时针 [0, 360)）格网。
#[derive(Debug, Clone)]
pub struct TerrainAnalysis {
  rows: usize,
  cols: usize,
  slope: Box<[f64]>,
  aspect: Box<[f64]>,
}

/// 坡度统计，忽略无效单元。
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SlopeStats {
  pub mean: f64,
  pub min: f64,
  pub max: f64,
}

/// 单点地形查询结果，DSM 未覆盖处各字段为 `None`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainSample {
  pub elevation: Option<f64>,
  pub slope: Option<f64>,
  pub aspect: Option<f64>,
}

impl TerrainSample {
  pub const UNKNOWN: TerrainSample = TerrainSample {
    elevation: None,
    slope: None,
    aspect: None,
  };
}

impl TerrainAnalysis {
  /// 对整幅格网求坡度与坡向。
  ///
  /// 梯度为内部中心差分、边缘单侧差分，间距取格网分辨率。
  /// 含 NaN 邻元的单元结果为 NaN。
  pub fn analyze(grid: &ElevationGrid) -> Result<Self, TerrainError> {
    let (rows, cols) = (grid.rows(), grid.cols());
    if rows < 2 || cols < 2 {
      return Err(TerrainError::GridTooSmall { rows, cols });
    }

    let spacing = grid.resolution();
    let dy = gradient_rows(grid, spacing);
    let dx = gradient_cols(grid, spacing);

    let mut slope = vec![f64::NAN; rows * cols];
    let mut aspect = vec![f64::NAN; rows * cols];
    for i in 0..rows * cols {
      slope[i] = (dx[i] * dx[i] + dy[i] * dy[i]).sqrt().atan().to_degrees();
      let mut a = (-dx[i]).atan2(dy[i]).to_degrees();
      if a < 0.0 {
        a += 360.0;
      }
      aspect[i] = a;
    }

    Ok(Self {
      rows,
      cols,
      slope: slope.into_boxed_slice(),
      aspect: aspect.into_boxed_slice(),
    })
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn slope_at(&self, row: usize, col: usize) -> f64 {
    assert!(row < self.rows && col < self.cols, "格网坐标越界");
    self.slope[row * self.cols + col]
  }

  pub fn aspect_at(&self, row: usize, col: usize) -> f64 {
    assert!(row < self.rows && col < self.cols, "格网坐标越界");
    self.aspect[row * self.cols + col]
  }

  /// 坡度统计。格网内没有有效单元时返回 `None`。
  pub fn slope_stats(&self) -> Option<SlopeStats> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &s in &self.slope {
      if s.is_finite() {
        count += 1;
        sum += s;
        min = min.min(s);
        max = max.max(s);
      }
    }
    if count == 0 {
      return None;
    }
    Some(SlopeStats {
      mean: sum / count as f64,
      min,
      max,
    })
  }
}

/// 按地图坐标查询高程、坡度与坡向。
///
/// 像素索引向零截断；点落在格网外或单元无效时对应字段为 `None`。
pub fn sample_at(
  grid: &ElevationGrid,
  analysis: &TerrainAnalysis,
  x: f64,
  y: f64,
) -> TerrainSample {
  let Some((col_f, row_f)) = grid.affine().map_to_pixel(x, y) else {
    return TerrainSample::UNKNOWN;
  };
  let (col, row) = (col_f as i64, row_f as i64);
  if row < 0 || col < 0 || row as usize >= grid.rows() || col as usize >= grid.cols() {
    return TerrainSample::UNKNOWN;
  }
  let (row, col) = (row as usize, col as usize);

  let keep = |v: f64| v.is_finite().then_some(v);
  TerrainSample {
    elevation: keep(grid.value(row, col)),
    slope: keep(analysis.slope_at(row, col)),
    aspect: keep(analysis.aspect_at(row, col)),
  }
}

/// 沿行方向（轴 0）的数值梯度。
fn gradient_rows(grid: &ElevationGrid, spacing: f64) -> Vec<f64> {
  let (rows, cols) = (grid.rows(), grid.cols());
  let mut out = vec![f64::NAN; rows * cols];
  for col in 0..cols {
    for row in 0..rows {
      let v = if row == 0 {
        (grid.value(1, col) - grid.value(0, col)) / spacing
      } else if row == rows - 1 {
        (grid.value(row, col) - grid.value(row - 1, col)) / spacing
      } else {
        (grid.value(row + 1, col) - grid.value(row - 1, col)) / (2.0 * spacing)
      };
      out[row * cols + col] = v;
    }
  }
  out
}

/// 沿列方向（轴 1）的数值梯度。
fn gradient_cols(grid: &ElevationGrid, spacing: f64) -> Vec<f64> {
  let (rows, cols) = (grid.rows(), grid.cols());
  let mut out = vec![f64::NAN; rows * cols];
  for row in 0..rows {
    for col in 0..cols {
      let v = if col == 0 {
        (grid.value(row, 1) - grid.value(row, 0)) / spacing
      } else if col == cols - 1 {
        (grid.value(row, col) - grid.value(row, col - 1)) / spacing
      } else {
        (grid.value(row, col + 1) - grid.value(row, col - 1)) / (2.0 * spacing)
      };
      out[row * cols + col] = v;
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn planar_grid(rows: usize, cols: usize, per_col: f64, per_row: f64) -> ElevationGrid {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
      for col in 0..cols {
        data.push(per_col * col as f64 + per_row * row as f64);
      }
    }
    ElevationGrid::new(rows, cols, data, Affine::from_origin(0.0, rows as f64, 1.0, 1.0))
  }

  #[test]
  fn flat_surface_has_zero_slope() {
    let grid = planar_grid(5, 5, 0.0, 0.0);
    let analysis = TerrainAnalysis::analyze(&grid).unwrap();
    for row in 0..5 {
      for col in 0..5 {
        assert!(analysis.slope_at(row, col).abs() < 1e-9);
      }
    }
  }

  #[test]
  fn eastward_ramp_slope_and_aspect() {
    let tan30 = 30f64.to_radians().tan();
    let grid = planar_grid(6, 6, tan30, 0.0);
    let analysis = TerrainAnalysis::analyze(&grid).unwrap();

    for row in 0..6 {
      for col in 0..6 {
        assert!((analysis.slope_at(row, col) - 30.0).abs() < 1e-9);
        assert!((analysis.aspect_at(row, col) - 270.0).abs() < 1e-9);
      }
    }
  }

  #[test]
  fn southward_ramp_aspect_is_zero() {
    let grid = planar_grid(6, 6, 0.0, 0.5);
    let analysis = TerrainAnalysis::analyze(&grid).unwrap();
    assert!((analysis.aspect_at(3, 3) - 0.0).abs() < 1e-9);
  }

  #[test]
  fn nodata_cells_spread_to_neighbors_and_stats_skip_them() {
    let mut data = vec![1.0; 16];
    data[5] = f64::NAN;
    let grid = ElevationGrid::new(4, 4, data, Affine::from_origin(0.0, 4.0, 1.0, 1.0));
    let analysis = TerrainAnalysis::analyze(&grid).unwrap();

    // 中心差分不含中心点：NaN 单元向邻元扩散，自身梯度仍可有限
    assert!(analysis.slope_at(1, 2).is_nan());
    assert!(analysis.slope_at(0, 1).is_nan());
    assert!(analysis.slope_at(1, 1).is_finite());
    assert!(analysis.slope_at(3, 3).is_finite());

    let stats = analysis.slope_stats().unwrap();
    assert!((stats.mean - 0.0).abs() < 1e-9);
    assert_eq!(stats.min, 0.0);
    assert_eq!(stats.max, 0.0);
  }

  #[test]
  fn all_nodata_grid_has_no_stats() {
    let grid = ElevationGrid::new(3, 3, vec![f64::NAN; 9], Affine::from_origin(0.0, 3.0, 1.0, 1.0));
    let analysis = TerrainAnalysis::analyze(&grid).unwrap();
    assert!(analysis.slope_stats().is_none());
  }

  #[test]
  fn point_query_inside_and_outside() {
    let tan10 = 10f64.to_radians().tan();
    let grid = planar_grid(8, 8, tan10, 0.0);
    let analysis = TerrainAnalysis::analyze(&grid).unwrap();

    let sample = sample_at(&grid, &analysis, 3.5, 4.5);
    assert!((sample.elevation.unwrap() - 3.0 * tan10).abs() < 1e-9);
    assert!((sample.slope.unwrap() - 10.0).abs() < 1e-9);
    assert!((sample.aspect.unwrap() - 270.0).abs() < 1e-9);

    assert_eq!(sample_at(&grid, &analysis, -5.0, 4.0), TerrainSample::UNKNOWN);
    assert_eq!(sample_at(&grid, &analysis, 100.0, 4.0), TerrainSample::UNKNOWN);
  }

  #[test]
  fn tiny_grid_is_rejected() {
    let grid = ElevationGrid::new(1, 5, vec![0.0; 5], Affine::from_origin(0.0, 1.0, 1.0, 1.0));
    assert!(matches!(
      TerrainAnalysis::analyze(&grid),
      Err(TerrainError::GridTooSmall { .. })
    ));
  }
}
