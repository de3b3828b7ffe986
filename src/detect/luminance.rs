// 该文件是 Yunsun （云隼） 项目的一部分。
// src/detect/luminance.rs - 亮度阈值检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;

use thiserror::Error;

use crate::detect::{Detector, TileBox};
use crate::raster::PixelBlock;
use crate::{FromUrl, FromUrlWithScheme};

const LUM_SCHEME: &str = "lum";
const DEFAULT_MIN_LUMINANCE: u8 = 200;

#[derive(Error, Debug)]
pub enum LuminanceError {
  #[error("亮度阈值无效: {0}")]
  BadThreshold(String),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// 亮度阈值检测器。
///
/// 把像素块中亮度不低于阈值的像素框进一个外接框，置信度取
/// 这些像素的平均亮度归一化值。用于合成影像上的验收流程与
/// 无推理后端时的替代路径，不具备区分类别的能力。
pub struct LuminanceDetector {
  min_luminance: u8,
}

impl LuminanceDetector {
  pub fn new(min_luminance: u8) -> Self {
    Self { min_luminance }
  }
}

/// ITU-R BT.601 亮度。
fn luminance(r: u8, g: u8, b: u8) -> f32 {
  0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

impl Detector for LuminanceDetector {
  fn detect(&self, block: &PixelBlock, conf_threshold: f32) -> anyhow::Result<Vec<TileBox>> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut sum = 0.0f32;
    let mut count = 0usize;

    for y in 0..block.height() {
      for x in 0..block.width() {
        let (r, g, b) = block.pixel(x, y);
        let lum = luminance(r, g, b);
        if lum >= self.min_luminance as f32 {
          min_x = min_x.min(x);
          min_y = min_y.min(y);
          max_x = max_x.max(x);
          max_y = max_y.max(y);
          sum += lum;
          count += 1;
        }
      }
    }

    if count == 0 {
      return Ok(Vec::new());
    }
    let score = sum / count as f32 / 255.0;
    if score < conf_threshold {
      return Ok(Vec::new());
    }

    Ok(vec![TileBox {
      x: min_x as f32,
      y: min_y as f32,
      width: (max_x - min_x + 1) as f32,
      height: (max_y - min_y + 1) as f32,
      score,
    }])
  }
}

impl FromUrl for LuminanceDetector {
  type Error = LuminanceError;

  /// `lum://?min=200`
  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != LUM_SCHEME {
      return Err(LuminanceError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let min_luminance = match query.get("min") {
      Some(raw) => raw
        .parse()
        .map_err(|_| LuminanceError::BadThreshold(raw.clone()))?,
      None => DEFAULT_MIN_LUMINANCE,
    };
    Ok(Self::new(min_luminance))
  }
}

impl FromUrlWithScheme for LuminanceDetector {
  const SCHEME: &'static str = LUM_SCHEME;
}
