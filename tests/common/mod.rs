// 该文件是 Yunsun （云隼） 项目的一部分。
// tests/common/mod.rs - 集成测试共用的合成数据
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use yunsun::raster::{Affine, MemoryRaster};

pub const ORIGIN_X: f64 = 500000.0;
pub const ORIGIN_Y: f64 = 4000000.0;

/// 深色底上带一个灰度亮斑的合成正射影像。
pub fn raster_with_bright_rect(
  width: u32,
  height: u32,
  rect: (u32, u32, u32, u32),
  value: u8,
  resolution: f64,
  crs: Option<String>,
) -> MemoryRaster {
  let affine = Affine::from_origin(ORIGIN_X, ORIGIN_Y, resolution, resolution);
  let mut raster = MemoryRaster::filled(width, height, (20, 20, 20), affine, crs);
  let (x, y, w, h) = rect;
  raster.fill_rect(x, y, w, h, (value, value, value));
  raster
}
