// 该文件是 Yunsun （云隼） 项目的一部分。
// src/raster/memory.rs - 内存栅格
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

use super::{Affine, PixelBlock, RasterError, RasterSource};

const RGB_CHANNELS: usize = 3;

/// 完全驻留内存的 RGB 栅格，用于程序化构造影像。
#[derive(Debug, Clone)]
pub struct MemoryRaster {
  width: u32,
  height: u32,
  data: Box<[u8]>,
  affine: Affine,
  crs: Option<String>,
}

impl MemoryRaster {
  pub fn new(
    width: u32,
    height: u32,
    data: Vec<u8>,
    affine: Affine,
    crs: Option<String>,
  ) -> Self {
    if data.len() != RGB_CHANNELS * width as usize * height as usize {
      panic!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        RGB_CHANNELS * width as usize * height as usize,
        data.len()
      );
    }

    Self {
      width,
      height,
      data: data.into_boxed_slice(),
      affine,
      crs,
    }
  }

  /// 以单一颜色填充的栅格。
  pub fn filled(
    width: u32,
    height: u32,
    rgb: (u8, u8, u8),
    affine: Affine,
    crs: Option<String>,
  ) -> Self {
    let mut data = vec![0u8; RGB_CHANNELS * width as usize * height as usize];
    for px in data.chunks_exact_mut(RGB_CHANNELS) {
      px[0] = rgb.0;
      px[1] = rgb.1;
      px[2] = rgb.2;
    }
    Self::new(width, height, data, affine, crs)
  }

  pub fn set_pixel(&mut self, x: u32, y: u32, rgb: (u8, u8, u8)) {
    assert!(x < self.width && y < self.height, "像素坐标越界");
    let idx = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
    self.data[idx] = rgb.0;
    self.data[idx + 1] = rgb.1;
    self.data[idx + 2] = rgb.2;
  }

  /// 填充一个矩形区域，右下越界部分被裁掉。
  pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgb: (u8, u8, u8)) {
    let x_end = (x + w).min(self.width);
    let y_end = (y + h).min(self.height);
    for yy in y..y_end {
      for xx in x..x_end {
        self.set_pixel(xx, yy, rgb);
      }
    }
  }
}

impl RasterSource for MemoryRaster {
  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn affine(&self) -> Affine {
    self.affine
  }

  fn crs(&self) -> Option<&str> {
    self.crs.as_deref()
  }

  fn read_window(&self, x: u32, y: u32, w: u32, h: u32) -> Result<PixelBlock, RasterError> {
    if x as u64 + w as u64 > self.width as u64 || y as u64 + h as u64 > self.height as u64 {
      return Err(RasterError::WindowOutOfBounds {
        x,
        y,
        w,
        h,
        width: self.width,
        height: self.height,
      });
    }

    let mut out = vec![0u8; RGB_CHANNELS * w as usize * h as usize];
    let src_stride = self.width as usize * RGB_CHANNELS;
    let dst_stride = w as usize * RGB_CHANNELS;
    for row in 0..h as usize {
      let src = (y as usize + row) * src_stride + x as usize * RGB_CHANNELS;
      let dst = row * dst_stride;
      out[dst..dst + dst_stride].copy_from_slice(&self.data[src..src + dst_stride]);
    }
    Ok(PixelBlock::new(w, h, out))
  }
}
