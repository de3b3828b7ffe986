// 该文件是 Yunsun （云隼） 项目的一部分。
// src/pipeline.rs - 检测流水线编排
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{info, warn};

use crate::cloud::PointCloud;
use crate::config::ClassConfig;
use crate::detect::{Detection, DetectorRegistry};
use crate::geo::{self, Projector};
use crate::raster::{RasterError, RasterSource};

pub mod aggregate;
pub mod filter;
pub mod height;
pub mod merge;
pub mod tile;

pub use self::aggregate::ClassDetections;
pub use self::height::HeightFuser;
pub use self::tile::{TileGrid, Window};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("未加载正射影像")]
  MissingRaster,
  #[error("没有可用的检测器")]
  NoDetectors,
  #[error("窗口重叠 {overlap} 不小于窗口边长 {patch}")]
  BadTiling { patch: u32, overlap: u32 },
  #[error("读取影像窗口失败: {0}")]
  Raster(#[from] RasterError),
  #[error("类别 {0} 检测失败: {1}")]
  Detect(&'static str, anyhow::Error),
  #[error("处理已取消")]
  Cancelled,
}

/// 进度回报接口，百分比为 0 到 100 的整数。
pub trait ProgressSink {
  fn report(&self, percent: u8, step: &str);
}

impl<F: Fn(u8, &str)> ProgressSink for F {
  fn report(&self, percent: u8, step: &str) {
    self(percent, step)
  }
}

/// 丢弃全部进度的空回报器。
pub struct NullProgress;

impl ProgressSink for NullProgress {
  fn report(&self, _percent: u8, _step: &str) {}
}

/// 一次完整处理的输入与选项。
pub struct Pipeline<'a> {
  pub raster: &'a dyn RasterSource,
  pub cloud: Option<&'a PointCloud>,
  pub registry: &'a DetectorRegistry,
  /// 待处理类别，输出顺序与此一致。
  pub classes: Vec<&'static ClassConfig>,
  /// 是否执行高度融合。
  pub include_elevation: bool,
  /// 置信度阈值覆盖，None 时使用各类别内置阈值。
  pub conf_override: Option<f32>,
  /// 高度先验采样的随机种子。
  pub seed: u64,
  pub projector: Option<&'a dyn Projector>,
}

impl Pipeline<'_> {
  /// 执行检测、去重、筛选、高度融合与坐标投影。
  ///
  /// 取消标志在滑窗之间检查，取消后返回 [`PipelineError::Cancelled`]，
  /// 不产生部分结果。
  pub fn execute(
    &self,
    progress: &dyn ProgressSink,
    cancel: &AtomicBool,
  ) -> Result<Vec<Detection>, PipelineError> {
    let classes: Vec<&'static ClassConfig> = self
      .classes
      .iter()
      .copied()
      .filter(|cfg| self.registry.contains(cfg.class))
      .collect();
    if classes.is_empty() {
      return Err(PipelineError::NoDetectors);
    }
    for cfg in &self.classes {
      if !self.registry.contains(cfg.class) {
        warn!("类别 {} 没有检测器，跳过", cfg.class);
      }
    }

    progress.report(10, "Loading models...");

    let collected = aggregate::collect(
      self.raster,
      self.registry,
      &classes,
      self.conf_override,
      progress,
      cancel,
    )?;
    if cancel.load(Ordering::Relaxed) {
      return Err(PipelineError::Cancelled);
    }

    let affine = self.raster.affine();
    let pixel_size = self.raster.pixel_size();
    let mut detections = Vec::new();
    for class in collected {
      let config = class.config;
      let kept = merge::resolve(class.boxes, config.iou_thresh);
      info!("类别 {} 去重后剩余 {} 个候选", config.class, kept.len());
      let passed = filter::apply(config, kept, pixel_size, &affine);
      info!("类别 {} 筛选后保留 {} 个目标", config.class, passed.len());
      detections.extend(passed);
    }

    if cancel.load(Ordering::Relaxed) {
      return Err(PipelineError::Cancelled);
    }

    if self.include_elevation {
      progress.report(85, "Height analysis...");
      let mut fuser = HeightFuser::with_seed(self.seed);
      fuser.fuse(&mut detections, self.cloud, &affine);
    }

    if cancel.load(Ordering::Relaxed) {
      return Err(PipelineError::Cancelled);
    }

    progress.report(95, "Coordinate transform...");
    let outcome = geo::assign_latlon(&mut detections, self.raster.crs(), self.projector);
    match outcome {
      geo::GeoOutcome::Projected => {}
      geo::GeoOutcome::NoCrs => warn!("影像缺少坐标参考系，跳过经纬度换算"),
      geo::GeoOutcome::NoProjector => warn!("没有可用的投影后端，跳过经纬度换算"),
      geo::GeoOutcome::Failed(ref reason) => warn!("经纬度换算失败: {}", reason),
    }

    progress.report(100, "Complete");
    Ok(detections)
  }
}
