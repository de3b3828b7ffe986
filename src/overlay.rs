// 该文件是 Yunsun （云隼） 项目的一部分。
// src/overlay.rs - 检测结果叠加图
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::path::PathBuf;

use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use thiserror::Error;

use crate::config::class_config;
use crate::detect::Detection;
use crate::raster::{PixelBlock, RasterError, RasterSource};
use crate::{FromUrl, FromUrlWithScheme};

const OVERLAY_SCHEME: &str = "overlay";
const FALLBACK_COLOR: (u8, u8, u8) = (255, 255, 0);

#[derive(Error, Debug)]
pub enum OverlayError {
  #[error("读取影像失败: {0}")]
  Raster(#[from] RasterError),
  #[error("图像编码失败: {0}")]
  Image(#[from] image::ImageError),
  #[error("URL 路径无效: {0}")]
  BadPath(String),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// 把检测框画到影像上并存成图片文件。
pub struct OverlaySink {
  path: PathBuf,
  /// 输出最长边限制，超出时等比缩小。
  max_dim: Option<u32>,
}

impl OverlaySink {
  pub fn new(path: PathBuf, max_dim: Option<u32>) -> Self {
    Self { path, max_dim }
  }

  pub fn render(
    &self,
    raster: &dyn RasterSource,
    detections: &[Detection],
  ) -> Result<(), OverlayError> {
    let block = raster.read_window(0, 0, raster.width(), raster.height())?;
    let mut image = block_to_image(&block);
    draw_detections(&mut image, detections);

    if let Some(max_dim) = self.max_dim {
      let largest = image.width().max(image.height());
      if largest > max_dim {
        let scale = max_dim as f64 / largest as f64;
        let w = ((image.width() as f64 * scale) as u32).max(1);
        let h = ((image.height() as f64 * scale) as u32).max(1);
        image = image::imageops::resize(&image, w, h, image::imageops::FilterType::Triangle);
      }
    }

    image.save(&self.path)?;
    Ok(())
  }
}

impl FromUrl for OverlaySink {
  type Error = OverlayError;

  /// `overlay:///path/out.png?max_dim=1024`
  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != OVERLAY_SCHEME {
      return Err(OverlayError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let max_dim = query.get("max_dim").and_then(|v| v.parse().ok());

    let path = urlencoding::decode(url.path())
      .map(|p| PathBuf::from(p.into_owned()))
      .map_err(|e| OverlayError::BadPath(e.to_string()))?;
    Ok(Self::new(path, max_dim))
  }
}

impl FromUrlWithScheme for OverlaySink {
  const SCHEME: &'static str = OVERLAY_SCHEME;
}

pub fn block_to_image(block: &PixelBlock) -> RgbImage {
  ImageBuffer::from_fn(block.width(), block.height(), |x, y| {
    let (r, g, b) = block.pixel(x, y);
    Rgb([r, g, b])
  })
}

/// 按类别颜色为每个目标画出边框。
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection]) {
  for det in detections {
    let color = class_config(det.class)
      .map(|cfg| cfg.color)
      .unwrap_or(FALLBACK_COLOR);
    draw_box(image, &det.bbox_px, color);
  }
}

fn draw_box(image: &mut RgbImage, bbox: &[f64; 4], color: (u8, u8, u8)) {
  let x_min = bbox[0].max(0.0);
  let y_min = bbox[1].max(0.0);
  let x_max = bbox[2].min(image.width() as f64);
  let y_max = bbox[3].min(image.height() as f64);

  let x = x_min.floor() as i32;
  let y = y_min.floor() as i32;
  let width = (x_max.ceil() - x_min.floor()) as u32;
  let height = (y_max.ceil() - y_min.floor()) as u32;
  if width == 0 || height == 0 {
    return;
  }

  let rgb = Rgb([color.0, color.1, color.2]);
  draw_hollow_rect_mut(image, Rect::at(x, y).of_size(width, height), rgb);

  // 绘制第二个边框以增加可见度
  if width > 2 && height > 2 {
    let inner = Rect::at(x + 1, y + 1).of_size(width - 2, height - 2);
    draw_hollow_rect_mut(image, inner, rgb);
  }
}
