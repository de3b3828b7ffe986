// 该文件是 Yunsun （云隼） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use yunsun::FromUrl;
use yunsun::detect::DetectorWrapper;
use yunsun::geo::Projector;
use yunsun::raster::RasterSource;
use yunsun::record::{ExportReport, OutputWrapper};
use yunsun::session::Session;
use yunsun::task::{JobHandle, JobStatus, ProcessingRequest};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  info!("正射影像: {}", args.ortho);

  let mut session = Session::new();
  let meta = session
    .load_ortho(&args.ortho)
    .context("装载正射影像失败")?;
  match &meta.crs {
    Some(crs) => info!("坐标参考系: {}", crs),
    None => warn!("影像缺少坐标参考系，经纬度将保持为 0"),
  }

  let projector = build_projector();
  if let Some(p) = &projector {
    if let Some((min_lat, min_lon, max_lat, max_lon)) = session.wgs84_bounds(p.as_ref()) {
      info!(
        "WGS84 范围: 纬度 {:.6} 到 {:.6}, 经度 {:.6} 到 {:.6}",
        min_lat, max_lat, min_lon, max_lon
      );
    }
  }

  if let Some(url) = &args.cloud {
    info!("高程点云: {}", url);
    session.load_cloud(url).context("装载点云失败")?;
  }
  if let Some(url) = &args.dsm {
    info!("数字表面模型: {}", url);
    session.load_dsm(url).context("装载数字表面模型失败")?;
    match session.terrain_stats() {
      Ok(Some(stats)) => info!(
        "坡度统计: 平均 {:.2}°, 范围 {:.2}° 到 {:.2}°",
        stats.mean, stats.min, stats.max
      ),
      Ok(None) => warn!("坡度统计不可用: 格网全为无效单元"),
      Err(e) => warn!("坡度统计不可用: {}", e),
    }
  }

  for entry in &args.detector {
    let (class, raw) = entry
      .split_once('=')
      .with_context(|| format!("检测器参数格式应为 类别=URL: {}", entry))?;
    let url = Url::parse(raw).with_context(|| format!("检测器 URL 无效: {}", raw))?;
    let detector = DetectorWrapper::from_url(&url)?;
    session.registry_mut().register(class, Arc::new(detector));
  }
  let available = session.registry().classes();
  if available.is_empty() {
    warn!("没有登记任何检测器");
  } else {
    info!("可用检测类别: {:?}", available);
  }

  let request = ProcessingRequest {
    detect_vehicle: !args.no_vehicle,
    detect_person: !args.no_person,
    detect_cone: !args.no_cone,
    include_elevation: !args.no_elevation,
    conf_override: args.confidence,
    seed: args.seed,
  };

  let mut job = JobHandle::spawn(&session, request, projector)?;
  info!("任务 {} 已启动", job.id());

  let cancel = job.cancel_flag();
  ctrlc::set_handler(move || {
    warn!("收到中断信号，取消处理...");
    cancel.store(true, Ordering::Relaxed);
  })
  .expect("Error setting Ctrl-C handler");

  let mut last_progress = -1i32;
  let mut last_step = String::new();
  loop {
    let view = job.poll();
    if i32::from(view.progress) != last_progress || view.current_step != last_step {
      info!(
        "任务 {}: {} {}% {}",
        view.id, view.status, view.progress, view.current_step
      );
      last_progress = i32::from(view.progress);
      last_step = view.current_step.clone();
    }
    if job.is_finished() {
      break;
    }
    thread::sleep(Duration::from_millis(args.poll_ms));
  }

  let finished = job.wait();
  if finished.status == JobStatus::Error {
    anyhow::bail!("处理失败: {}", finished.current_step);
  }
  let detections = job.take_results().unwrap_or_default();
  info!(
    "检测完成，共 {} 个目标, 耗时 {:.1} 秒",
    detections.len(),
    finished.elapsed_seconds
  );
  session.store_results(detections);

  let report = ExportReport::new(session.results());
  let ortho = session.ortho();
  let raster_ref = ortho.as_deref().map(|r| r as &dyn RasterSource);
  for url in &args.output {
    let sink = OutputWrapper::from_url(url).with_context(|| format!("输出 {} 构造失败", url))?;
    sink
      .write(&report, raster_ref, session.results())
      .with_context(|| format!("输出 {} 写出失败", url))?;
    info!("已写出 {}", url);
  }

  Ok(())
}

#[cfg(feature = "proj_backend")]
fn build_projector() -> Option<Arc<dyn Projector + Send + Sync>> {
  Some(Arc::new(yunsun::geo::ProjProjector))
}

#[cfg(not(feature = "proj_backend"))]
fn build_projector() -> Option<Arc<dyn Projector + Send + Sync>> {
  None
}
