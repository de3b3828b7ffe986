// 该文件是 Yunsun （云隼） 项目的一部分。
// src/raster/geotiff.rs - GeoTIFF 读取
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

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use thiserror::Error;
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::warn;

use super::{Affine, MemoryRaster, PixelBlock, RasterError, RasterSource};
use crate::terrain::ElevationGrid;
use crate::{FromUrl, FromUrlWithScheme};

const GEOTIFF_SCHEME: &str = "geotiff";

#[derive(Error, Debug)]
pub enum GeoTiffError {
  #[error("无法打开文件: {0}")]
  Io(#[from] std::io::Error),
  #[error("TIFF 解码错误: {0}")]
  Tiff(#[from] tiff::TiffError),
  #[error("不支持的像素格式: {0}")]
  UnsupportedColor(String),
  #[error("URL 路径无效: {0}")]
  BadPath(String),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// GeoTIFF 正射影像，整幅解码后驻留内存。
pub struct GeoTiffRaster {
  inner: MemoryRaster,
}

impl GeoTiffRaster {
  pub fn open(path: &Path) -> Result<Self, GeoTiffError> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let color = decoder.colortype()?;
    let affine = geo_affine(&mut decoder);
    let crs = geo_epsg(&mut decoder);

    let pixels = width as usize * height as usize;
    let rgb = match (color, decoder.read_image()?) {
      (ColorType::RGB(8), DecodingResult::U8(buf)) => buf,
      (ColorType::RGBA(8), DecodingResult::U8(buf)) => {
        let mut out = Vec::with_capacity(pixels * 3);
        for px in buf.chunks_exact(4) {
          out.extend_from_slice(&px[..3]);
        }
        out
      }
      (ColorType::Gray(8), DecodingResult::U8(buf)) => {
        let mut out = Vec::with_capacity(pixels * 3);
        for v in buf {
          out.extend_from_slice(&[v, v, v]);
        }
        out
      }
      (color, _) => {
        return Err(GeoTiffError::UnsupportedColor(format!("{color:?}")));
      }
    };

    Ok(Self {
      inner: MemoryRaster::new(width, height, rgb, affine, crs),
    })
  }
}

impl RasterSource for GeoTiffRaster {
  fn width(&self) -> u32 {
    self.inner.width()
  }

  fn height(&self) -> u32 {
    self.inner.height()
  }

  fn affine(&self) -> Affine {
    self.inner.affine()
  }

  fn crs(&self) -> Option<&str> {
    self.inner.crs()
  }

  fn read_window(&self, x: u32, y: u32, w: u32, h: u32) -> Result<PixelBlock, RasterError> {
    self.inner.read_window(x, y, w, h)
  }
}

impl FromUrl for GeoTiffRaster {
  type Error = GeoTiffError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != GEOTIFF_SCHEME {
      return Err(GeoTiffError::SchemeMismatch);
    }
    Self::open(Path::new(&url_path(url)?))
  }
}

impl FromUrlWithScheme for GeoTiffRaster {
  const SCHEME: &'static str = GEOTIFF_SCHEME;
}

/// 读取单波段 GeoTIFF 为高程格网，多波段时取第一个波段。
pub fn open_elevation(path: &Path) -> Result<ElevationGrid, GeoTiffError> {
  let file = File::open(path)?;
  let mut decoder = Decoder::new(BufReader::new(file))?;
  let (width, height) = decoder.dimensions()?;
  let color = decoder.colortype()?;
  let affine = geo_affine(&mut decoder);
  let nodata = gdal_nodata(&mut decoder);

  let bands = match color {
    ColorType::Gray(_) => 1,
    ColorType::RGB(_) => 3,
    ColorType::RGBA(_) => 4,
    other => {
      return Err(GeoTiffError::UnsupportedColor(format!("{other:?}")));
    }
  };

  let raw: Vec<f64> = match decoder.read_image()? {
    DecodingResult::F64(v) => v,
    DecodingResult::F32(v) => v.iter().map(|x| *x as f64).collect(),
    DecodingResult::I32(v) => v.iter().map(|x| *x as f64).collect(),
    DecodingResult::I16(v) => v.iter().map(|x| *x as f64).collect(),
    DecodingResult::U16(v) => v.iter().map(|x| *x as f64).collect(),
    DecodingResult::U8(v) => v.iter().map(|x| *x as f64).collect(),
    _ => {
      return Err(GeoTiffError::UnsupportedColor(format!("{color:?}")));
    }
  };

  let pixels = width as usize * height as usize;
  let mut data = Vec::with_capacity(pixels);
  for i in 0..pixels {
    let mut v = raw[i * bands];
    if let Some(nd) = nodata {
      if v == nd {
        v = f64::NAN;
      }
    }
    data.push(v);
  }

  Ok(ElevationGrid::new(height as usize, width as usize, data, affine))
}

impl FromUrl for ElevationGrid {
  type Error = GeoTiffError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != GEOTIFF_SCHEME {
      return Err(GeoTiffError::SchemeMismatch);
    }
    open_elevation(Path::new(&url_path(url)?))
  }
}

impl FromUrlWithScheme for ElevationGrid {
  const SCHEME: &'static str = GEOTIFF_SCHEME;
}

fn url_path(url: &url::Url) -> Result<String, GeoTiffError> {
  urlencoding::decode(url.path())
    .map(|p| p.into_owned())
    .map_err(|e| GeoTiffError::BadPath(e.to_string()))
}

/// 从 ModelPixelScale (33550) 与 ModelTiepoint (33922) 标签恢复仿射变换。
/// 标签缺失时退化为单位变换。
fn geo_affine<R: Read + Seek>(decoder: &mut Decoder<R>) -> Affine {
  let mut scale = None;
  let mut tiepoint = None;

  if let Ok(Some(value)) = decoder.find_tag(Tag::ModelPixelScaleTag) {
    if let Ok(v) = value.into_f64_vec() {
      if v.len() >= 2 {
        scale = Some((v[0], v[1]));
      }
    }
  }
  if let Ok(Some(value)) = decoder.find_tag(Tag::ModelTiepointTag) {
    if let Ok(v) = value.into_f64_vec() {
      if v.len() >= 6 {
        tiepoint = Some((v[0], v[1], v[3], v[4]));
      }
    }
  }

  match (scale, tiepoint) {
    (Some((xres, yres)), Some((i, j, x, y))) => {
      // 锚点像素 (i, j) 对应地图坐标 (x, y)
      Affine::from_origin(x - i * xres, y + j * yres, xres, yres)
    }
    _ => {
      warn!("GeoTIFF 缺少地理参考标签，使用单位变换");
      Affine::from_origin(0.0, 0.0, 1.0, 1.0)
    }
  }
}

/// 从 GeoKeyDirectory (34735) 提取 EPSG 代码。
/// 优先投影坐标系 (3072)，其次地理坐标系 (2048)。
fn geo_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<String> {
  let value = decoder.find_tag(Tag::GeoKeyDirectoryTag).ok()??;
  let dir = value.into_u64_vec().ok()?;
  if dir.len() < 4 {
    return None;
  }

  let lookup = |key_id: u64| {
    dir
      .chunks_exact(4)
      .skip(1)
      .find(|entry| entry[0] == key_id && entry[1] == 0)
      .map(|entry| entry[3])
  };
  let code = lookup(3072).or_else(|| lookup(2048))?;
  // 0 与 32767 分别为未定义与用户自定义
  if code == 0 || code == 32767 {
    return None;
  }
  Some(format!("EPSG:{code}"))
}

/// GDAL 的无效值标签 (42113)，ASCII 形式的浮点数。
fn gdal_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
  let value = decoder.find_tag(Tag::GdalNodata).ok()??;
  let text = value.into_string().ok()?;
  text.trim().trim_end_matches('\0').parse().ok()
}
