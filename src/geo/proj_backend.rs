// 该文件是 Yunsun （云隼） 项目的一部分。
// src/geo/proj_backend.rs - PROJ 投影后端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Context, Result};
use proj::Proj;

use super::Projector;

const WGS84: &str = "EPSG:4326";

/// 基于 PROJ 库的投影后端。
///
/// 轴序已归一化为 (东, 北) 进、(经, 纬) 出。
pub struct ProjProjector;

impl Projector for ProjProjector {
  fn project(&self, x: f64, y: f64, from_crs: &str) -> Result<(f64, f64)> {
    let proj = Proj::new_known_crs(from_crs, WGS84, None)
      .with_context(|| format!("无法创建 {from_crs} 到 {WGS84} 的变换"))?;
    let (lon, lat) = proj.convert((x, y)).context("坐标换算失败")?;
    Ok((lat, lon))
  }

  fn project_batch(&self, points: &[(f64, f64)], from_crs: &str) -> Result<Vec<(f64, f64)>> {
    let proj = Proj::new_known_crs(from_crs, WGS84, None)
      .with_context(|| format!("无法创建 {from_crs} 到 {WGS84} 的变换"))?;

    let mut out = Vec::with_capacity(points.len());
    for &(x, y) in points {
      let (lon, lat) = proj.convert((x, y)).context("坐标换算失败")?;
      out.push((lat, lon));
    }
    Ok(out)
  }
}
