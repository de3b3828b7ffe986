// 该文件是 Yunsun （云隼） 项目的一部分。
// src/detect.rs - 检测器接口
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;

use crate::FromUrl;
use crate::config::CLASSES;
use crate::raster::PixelBlock;

pub mod luminance;

/// 检测器在单个像素块内给出的候选框，坐标为块内像素。
#[derive(Debug, Clone)]
pub struct TileBox {
  /// 左上角 x 坐标
  pub x: f32,
  /// 左上角 y 坐标
  pub y: f32,
  /// 框宽度
  pub width: f32,
  /// 框高度
  pub height: f32,
  /// 置信度
  pub score: f32,
}

/// 换算到全图像素坐标的候选框。
#[derive(Debug, Clone, Copy)]
pub struct RawDetection {
  pub x0: f64,
  pub y0: f64,
  pub x1: f64,
  pub y1: f64,
  pub score: f32,
}

impl RawDetection {
  pub fn width(&self) -> f64 {
    self.x1 - self.x0
  }

  pub fn height(&self) -> f64 {
    self.y1 - self.y0
  }
}

/// 通过全部筛选的目标。
#[derive(Debug, Clone)]
pub struct Detection {
  /// 类别内序号，从 1 开始
  pub id: u32,
  /// 检测器登记名，如 `car`
  pub class: &'static str,
  /// 输出类别名，如 `vehicle`
  pub label: &'static str,
  /// 置信度
  pub score: f32,
  /// 全图像素框 [x0, y0, x1, y1]
  pub bbox_px: [f64; 4],
  /// 地图坐标中心 x
  pub center_x: f64,
  /// 地图坐标中心 y
  pub center_y: f64,
  /// 占地面积（平方米）
  pub area_m2: f64,
  /// 长宽比
  pub aspect: f64,
  /// 底部地面高程（米）
  pub elevation: f64,
  /// 目标高度（米）
  pub height_m: f64,
  /// 纬度，未投影时为 0
  pub lat: f64,
  /// 经度，未投影时为 0
  pub lon: f64,
}

/// 外部检测器能力接口。
///
/// 实现者在一个像素块上运行推理并返回块内坐标的候选框，
/// 低于置信度阈值的候选应被剔除。
pub trait Detector: Send + Sync {
  fn detect(&self, block: &PixelBlock, conf_threshold: f32) -> Result<Vec<TileBox>>;
}

/// 按类别登记的检测器表。
#[derive(Default, Clone)]
pub struct DetectorRegistry {
  detectors: HashMap<String, Arc<dyn Detector>>,
}

impl DetectorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, class: &str, detector: Arc<dyn Detector>) {
    self.detectors.insert(class.to_string(), detector);
  }

  pub fn get(&self, class: &str) -> Option<&Arc<dyn Detector>> {
    self.detectors.get(class)
  }

  pub fn contains(&self, class: &str) -> bool {
    self.detectors.contains_key(class)
  }

  pub fn is_empty(&self) -> bool {
    self.detectors.is_empty()
  }

  /// 已有检测器的已知类别，按配置表顺序。
  pub fn classes(&self) -> Vec<&'static str> {
    CLASSES
      .iter()
      .filter(|cfg| self.contains(cfg.class))
      .map(|cfg| cfg.class)
      .collect()
  }
}

#[derive(Error, Debug)]
pub enum DetectorUrlError {
  #[error("亮度检测器构造失败: {0}")]
  Luminance(#[from] luminance::LuminanceError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// 按 URL scheme 构造的检测器。
pub enum DetectorWrapper {
  Luminance(luminance::LuminanceDetector),
}

impl FromUrl for DetectorWrapper {
  type Error = DetectorUrlError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    if url.scheme() == luminance::LuminanceDetector::SCHEME {
      let detector = luminance::LuminanceDetector::from_url(url)?;
      return Ok(DetectorWrapper::Luminance(detector));
    }
    Err(DetectorUrlError::SchemeMismatch)
  }
}

impl Detector for DetectorWrapper {
  fn detect(&self, block: &PixelBlock, conf_threshold: f32) -> Result<Vec<TileBox>> {
    match self {
      DetectorWrapper::Luminance(detector) => detector.detect(block, conf_threshold),
    }
  }
}
