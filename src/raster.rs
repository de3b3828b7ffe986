// 该文件是 Yunsun （云隼） 项目的一部分。
// src/raster.rs - 正射影像栅格访问
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

use thiserror::Error;

use crate::FromUrl;

#[cfg(feature = "read_geotiff")]
mod geotiff;
#[cfg(feature = "read_geotiff")]
pub use self::geotiff::{GeoTiffError, GeoTiffRaster};

mod memory;
pub use self::memory::MemoryRaster;

const RGB_CHANNELS: usize = 3;

/// 像素坐标到地图坐标的仿射变换。
///
/// 系数按 GDAL/rasterio 的顺序命名：
/// `x = a * col + b * row + c`，`y = d * col + e * row + f`。
/// 北朝上的栅格中 `b = d = 0` 且 `e < 0`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
  pub a: f64,
  pub b: f64,
  pub c: f64,
  pub d: f64,
  pub e: f64,
  pub f: f64,
}

impl Affine {
  /// 由左上角地图坐标与像素分辨率构造北朝上的变换。
  pub fn from_origin(origin_x: f64, origin_y: f64, xres: f64, yres: f64) -> Self {
    Self {
      a: xres,
      b: 0.0,
      c: origin_x,
      d: 0.0,
      e: -yres,
      f: origin_y,
    }
  }

  /// 像素（列、行）到地图坐标。
  pub fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
    (
      self.a * col + self.b * row + self.c,
      self.d * col + self.e * row + self.f,
    )
  }

  /// 地图坐标到像素（列、行）。变换退化时返回 `None`。
  pub fn map_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
    let det = self.a * self.e - self.b * self.d;
    if det.abs() < 1e-12 {
      return None;
    }
    let dx = x - self.c;
    let dy = y - self.f;
    Some((
      (self.e * dx - self.b * dy) / det,
      (self.a * dy - self.d * dx) / det,
    ))
  }

  /// 单像素地面尺寸（米），取绝对值。
  pub fn pixel_size(&self) -> (f64, f64) {
    (self.a.abs(), self.e.abs())
  }
}

/// RGB 交错的像素块，滑窗检测的基本单元。
#[derive(Debug, Clone)]
pub struct PixelBlock {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl PixelBlock {
  pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
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
    }
  }

  pub fn zeroed(width: u32, height: u32) -> Self {
    let size = RGB_CHANNELS * width as usize * height as usize;
    Self {
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_rgb(&self) -> &[u8] {
    &self.data
  }

  /// 读取单个像素的 (R, G, B)，越界时 panic。
  pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
    assert!(x < self.width && y < self.height, "像素坐标越界");
    let idx = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
    (self.data[idx], self.data[idx + 1], self.data[idx + 2])
  }

  /// 右侧与下侧零填充到目标尺寸，内容保持在左上角。
  /// 目标尺寸小于自身时 panic。
  pub fn padded_to(&self, width: u32, height: u32) -> PixelBlock {
    assert!(
      width >= self.width && height >= self.height,
      "填充目标尺寸小于像素块自身"
    );
    if width == self.width && height == self.height {
      return self.clone();
    }

    let mut out = vec![0u8; RGB_CHANNELS * width as usize * height as usize];
    let src_stride = self.width as usize * RGB_CHANNELS;
    let dst_stride = width as usize * RGB_CHANNELS;
    for row in 0..self.height as usize {
      let src = row * src_stride;
      let dst = row * dst_stride;
      out[dst..dst + src_stride].copy_from_slice(&self.data[src..src + src_stride]);
    }
    PixelBlock::new(width, height, out)
  }
}

impl AsMut<[u8]> for PixelBlock {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

#[derive(Error, Debug)]
pub enum RasterError {
  #[error("窗口越界: 起点 ({x}, {y}) 尺寸 {w}x{h} 超出栅格 {width}x{height}")]
  WindowOutOfBounds {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    width: u32,
    height: u32,
  },
  #[cfg(feature = "read_geotiff")]
  #[error("GeoTIFF 读取错误: {0}")]
  GeoTiff(#[from] GeoTiffError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// 正射影像的读取能力。
///
/// 实现者提供像素尺寸、地理参考与窗口读取，检测流水线只依赖本抽象。
pub trait RasterSource {
  /// 栅格宽度（像素）。
  fn width(&self) -> u32;

  /// 栅格高度（像素）。
  fn height(&self) -> u32;

  /// 像素到地图坐标的仿射变换。
  fn affine(&self) -> Affine;

  /// 坐标参考系标识，如 `EPSG:32650`；未知时为 `None`。
  fn crs(&self) -> Option<&str>;

  /// 单像素地面尺寸（米）。
  fn pixel_size(&self) -> (f64, f64) {
    self.affine().pixel_size()
  }

  /// 读取完全位于栅格内部的窗口。
  fn read_window(&self, x: u32, y: u32, w: u32, h: u32) -> Result<PixelBlock, RasterError>;
}

/// 栅格元数据快照，供会话展示与记录导出使用。
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RasterMeta {
  pub width: u32,
  pub height: u32,
  pub pixel_size: (f64, f64),
  pub crs: Option<String>,
  /// 地图坐标范围 (min_x, min_y, max_x, max_y)。
  pub bounds: (f64, f64, f64, f64),
}

impl RasterMeta {
  pub fn from_source(source: &dyn RasterSource) -> Self {
    let affine = source.affine();
    let (w, h) = (source.width() as f64, source.height() as f64);
    let corners = [
      affine.pixel_to_map(0.0, 0.0),
      affine.pixel_to_map(w, 0.0),
      affine.pixel_to_map(0.0, h),
      affine.pixel_to_map(w, h),
    ];
    let mut bounds = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
      bounds.0 = bounds.0.min(x);
      bounds.1 = bounds.1.min(y);
      bounds.2 = bounds.2.max(x);
      bounds.3 = bounds.3.max(y);
    }

    Self {
      width: source.width(),
      height: source.height(),
      pixel_size: source.pixel_size(),
      crs: source.crs().map(str::to_owned),
      bounds,
    }
  }
}

pub enum RasterWrapper {
  #[cfg(feature = "read_geotiff")]
  GeoTiff(GeoTiffRaster),
  Memory(MemoryRaster),
}

impl FromUrl for RasterWrapper {
  type Error = RasterError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_geotiff")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GeoTiffRaster::SCHEME {
        let raster = GeoTiffRaster::from_url(url)?;
        return Ok(RasterWrapper::GeoTiff(raster));
      }
    }
    Err(RasterError::SchemeMismatch)
  }
}

impl RasterSource for RasterWrapper {
  fn width(&self) -> u32 {
    match self {
      #[cfg(feature = "read_geotiff")]
      RasterWrapper::GeoTiff(raster) => raster.width(),
      RasterWrapper::Memory(raster) => raster.width(),
    }
  }

  fn height(&self) -> u32 {
    match self {
      #[cfg(feature = "read_geotiff")]
      RasterWrapper::GeoTiff(raster) => raster.height(),
      RasterWrapper::Memory(raster) => raster.height(),
    }
  }

  fn affine(&self) -> Affine {
    match self {
      #[cfg(feature = "read_geotiff")]
      RasterWrapper::GeoTiff(raster) => raster.affine(),
      RasterWrapper::Memory(raster) => raster.affine(),
    }
  }

  fn crs(&self) -> Option<&str> {
    match self {
      #[cfg(feature = "read_geotiff")]
      RasterWrapper::GeoTiff(raster) => raster.crs(),
      RasterWrapper::Memory(raster) => raster.crs(),
    }
  }

  fn read_window(&self, x: u32, y: u32, w: u32, h: u32) -> Result<PixelBlock, RasterError> {
    match self {
      #[cfg(feature = "read_geotiff")]
      RasterWrapper::GeoTiff(raster) => raster.read_window(x, y, w, h),
      RasterWrapper::Memory(raster) => raster.read_window(x, y, w, h),
    }
  }
}

impl From<MemoryRaster> for RasterWrapper {
  fn from(raster: MemoryRaster) -> Self {
    RasterWrapper::Memory(raster)
  }
}
