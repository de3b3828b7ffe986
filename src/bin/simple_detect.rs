// 该文件是 Yunsun （云隼） 项目的一部分。
// src/bin/simple_detect.rs - 简单的单类别检测
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use url::Url;

use yunsun::FromUrl;
use yunsun::config::class_config;
use yunsun::detect::{DetectorRegistry, DetectorWrapper};
use yunsun::pipeline::{Pipeline, height};
use yunsun::raster::{RasterSource, RasterWrapper};
use yunsun::record::{ExportReport, OutputWrapper};

/// Yunsun 单类别检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 正射影像来源
  #[arg(long, value_name = "SOURCE")]
  pub ortho: Url,

  /// 检测器来源，如 lum://?min=200
  #[arg(long, value_name = "DETECTOR")]
  pub detector: Url,

  /// 检测类别
  #[arg(long, default_value = "car", value_name = "CLASS")]
  pub class: String,

  /// 结果输出（可选）
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("正射影像: {}", args.ortho);
  info!("检测器: {}", args.detector);

  let config =
    class_config(&args.class).with_context(|| format!("未知类别: {}", args.class))?;
  let raster = RasterWrapper::from_url(&args.ortho)?;
  let detector = DetectorWrapper::from_url(&args.detector)?;

  let mut registry = DetectorRegistry::new();
  registry.register(&args.class, Arc::new(detector));

  let pipeline = Pipeline {
    raster: &raster,
    cloud: None,
    registry: &registry,
    classes: vec![config],
    include_elevation: true,
    conf_override: None,
    seed: height::DEFAULT_SEED,
    projector: None,
  };

  let cancel = AtomicBool::new(false);
  let sink = |percent: u8, step: &str| info!("{}% {}", percent, step);
  let detections = pipeline.execute(&sink, &cancel)?;

  info!("检测完成，共 {} 个目标", detections.len());
  for det in &detections {
    info!(
      "  - {} #{}: {:.1}% 面积 {:.2} 平方米 高度 {:.2} 米 中心 ({:.2}, {:.2})",
      det.label,
      det.id,
      det.score * 100.0,
      det.area_m2,
      det.height_m,
      det.center_x,
      det.center_y
    );
  }

  if let Some(url) = &args.output {
    let report = ExportReport::new(&detections);
    let out = OutputWrapper::from_url(url)?;
    out.write(&report, Some(&raster as &dyn RasterSource), &detections)?;
    info!("已写出 {}", url);
  }

  Ok(())
}
