// 该文件是 Yunsun （云隼） 项目的一部分。
// src/pipeline/aggregate.rs - 滑窗检测汇总
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use super::{PipelineError, ProgressSink, TileGrid};
use crate::config::ClassConfig;
use crate::detect::{DetectorRegistry, RawDetection};
use crate::raster::RasterSource;

/// 一个类别在全图上的原始候选框。
pub struct ClassDetections {
  pub config: &'static ClassConfig,
  pub boxes: Vec<RawDetection>,
}

/// 对每个类别滑窗遍历整幅影像，收集全图像素坐标的候选框。
///
/// 边缘窗口先裁剪读取再零填充到标准边长，框坐标按窗口原点平移。
/// 置信度阈值可整体覆盖，缺省取各类别配置值。
/// 进度每 10 个滑窗回报一次，在 20 到 70 之间按类别与滑窗均分。
pub fn collect(
  raster: &dyn RasterSource,
  registry: &DetectorRegistry,
  classes: &[&'static ClassConfig],
  conf_override: Option<f32>,
  progress: &dyn ProgressSink,
  cancel: &AtomicBool,
) -> Result<Vec<ClassDetections>, PipelineError> {
  let total_classes = classes.len();
  let mut all = Vec::with_capacity(total_classes);

  for (class_index, cfg) in classes.iter().enumerate() {
    let Some(detector) = registry.get(cfg.class) else {
      continue;
    };

    let grid = TileGrid::new(raster.width(), raster.height(), cfg.patch, cfg.overlap)?;
    let total_tiles = grid.total();
    let conf = conf_override.unwrap_or(cfg.conf);
    info!("开始检测类别 {}，共 {} 个滑窗", cfg.class, total_tiles);

    let mut boxes = Vec::new();
    let mut done: u64 = 0;
    for win in grid.iter() {
      if cancel.load(Ordering::Relaxed) {
        return Err(PipelineError::Cancelled);
      }

      let block = raster.read_window(win.x, win.y, win.w, win.h)?;
      let block = if win.w < grid.patch() || win.h < grid.patch() {
        block.padded_to(grid.patch(), grid.patch())
      } else {
        block
      };

      let found = detector
        .detect(&block, conf)
        .map_err(|e| PipelineError::Detect(cfg.class, e))?;
      for tb in found {
        boxes.push(RawDetection {
          x0: win.x as f64 + tb.x as f64,
          y0: win.y as f64 + tb.y as f64,
          x1: win.x as f64 + (tb.x + tb.width) as f64,
          y1: win.y as f64 + (tb.y + tb.height) as f64,
          score: tb.score,
        });
      }

      done += 1;
      if done % 10 == 0 {
        let percent = 20.0
          + (class_index as f64 / total_classes as f64) * 50.0
          + (done as f64 / total_tiles as f64) * (50.0 / total_classes as f64);
        progress.report(percent as u8, &format!("Detecting {}...", cfg.class));
      }
    }

    info!("类别 {} 收到原始候选 {} 个", cfg.class, boxes.len());
    all.push(ClassDetections { config: cfg, boxes });
  }

  Ok(all)
}
