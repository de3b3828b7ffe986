// 该文件是 Yunsun （云隼） 项目的一部分。
// src/session.rs - 会话状态与缓存
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

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::FromUrl;
use crate::cloud::PointCloud;
use crate::detect::{Detection, DetectorRegistry};
use crate::geo::Projector;
use crate::raster::{RasterError, RasterMeta, RasterSource, RasterWrapper};
use crate::terrain::{ElevationGrid, SlopeStats, TerrainAnalysis, TerrainError, TerrainSample};

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("未加载数字表面模型")]
  NoDsm,
  #[error(transparent)]
  Terrain(#[from] TerrainError),
}

/// 点云装载概况。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudSummary {
  pub points: usize,
  /// 平面范围 (min_x, min_y, max_x, max_y)，空点云为 `None`。
  pub bounds: Option<(f64, f64, f64, f64)>,
}

/// 地形数据装载概况。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainStatus {
  pub loaded: bool,
  pub rows: usize,
  pub cols: usize,
  pub resolution: f64,
}

/// 一次交互会话的全部可变状态。
///
/// 影像、点云与 DSM 装载后只读；坡度坡向在首次查询时
/// 计算并缓存，重新装载 DSM 时失效。检测结果由调用方在
/// 后台任务完成后写回，处理过程中不修改会话。
#[derive(Default)]
pub struct Session {
  raster: Option<Arc<dyn RasterSource + Send + Sync>>,
  cloud: Option<Arc<PointCloud>>,
  dsm: Option<Arc<ElevationGrid>>,
  terrain: Option<Arc<TerrainAnalysis>>,
  registry: DetectorRegistry,
  results: Vec<Detection>,
}

impl Session {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn registry(&self) -> &DetectorRegistry {
    &self.registry
  }

  pub fn registry_mut(&mut self) -> &mut DetectorRegistry {
    &mut self.registry
  }

  /// 按 URL 装载正射影像，返回元数据快照。
  pub fn load_ortho(&mut self, url: &url::Url) -> Result<RasterMeta, RasterError> {
    let raster = RasterWrapper::from_url(url)?;
    Ok(self.set_ortho(raster))
  }

  pub fn set_ortho<S: RasterSource + Send + Sync + 'static>(&mut self, source: S) -> RasterMeta {
    let meta = RasterMeta::from_source(&source);
    info!(
      "正射影像装载完成: {}x{} 像素, 分辨率 {:.3} 米",
      meta.width, meta.height, meta.pixel_size.0
    );
    self.raster = Some(Arc::new(source));
    meta
  }

  pub fn ortho(&self) -> Option<Arc<dyn RasterSource + Send + Sync>> {
    self.raster.clone()
  }

  pub fn ortho_meta(&self) -> Option<RasterMeta> {
    self.raster.as_ref().map(|r| RasterMeta::from_source(&**r))
  }

  /// 影像范围换算到 WGS84 经纬度 (min_lat, min_lon, max_lat, max_lon)。
  ///
  /// 缺影像、缺坐标参考系或投影失败时为 `None`，不中断调用方。
  pub fn wgs84_bounds(&self, projector: &dyn Projector) -> Option<(f64, f64, f64, f64)> {
    let raster = self.raster.as_ref()?;
    let meta = RasterMeta::from_source(&**raster);
    let crs = meta.crs.as_deref()?;

    let (min_x, min_y, max_x, max_y) = meta.bounds;
    let corners = [
      (min_x, min_y),
      (max_x, min_y),
      (min_x, max_y),
      (max_x, max_y),
    ];
    let mut out = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
      match projector.project(x, y, crs) {
        Ok((lat, lon)) => {
          out.0 = out.0.min(lat);
          out.1 = out.1.min(lon);
          out.2 = out.2.max(lat);
          out.3 = out.3.max(lon);
        }
        Err(e) => {
          warn!("影像范围换算失败: {}", e);
          return None;
        }
      }
    }
    Some(out)
  }

  /// 按 URL 装载点云。
  #[cfg(feature = "read_xyz_cloud")]
  pub fn load_cloud(&mut self, url: &url::Url) -> Result<CloudSummary, crate::cloud::XyzError> {
    let cloud = PointCloud::from_url(url)?;
    Ok(self.set_cloud(cloud))
  }

  pub fn set_cloud(&mut self, cloud: PointCloud) -> CloudSummary {
    let summary = CloudSummary {
      points: cloud.len(),
      bounds: cloud.bounds(),
    };
    info!("点云装载完成: {} 个点", summary.points);
    self.cloud = Some(Arc::new(cloud));
    summary
  }

  pub fn cloud(&self) -> Option<Arc<PointCloud>> {
    self.cloud.clone()
  }

  pub fn cloud_summary(&self) -> Option<CloudSummary> {
    self.cloud.as_ref().map(|c| CloudSummary {
      points: c.len(),
      bounds: c.bounds(),
    })
  }

  /// 按 URL 装载数字表面模型。
  #[cfg(feature = "read_geotiff")]
  pub fn load_dsm(&mut self, url: &url::Url) -> Result<TerrainStatus, crate::raster::GeoTiffError> {
    let grid = ElevationGrid::from_url(url)?;
    Ok(self.set_dsm(grid))
  }

  pub fn set_dsm(&mut self, grid: ElevationGrid) -> TerrainStatus {
    info!(
      "数字表面模型装载完成: {}x{} 格, 分辨率 {:.3} 米",
      grid.rows(),
      grid.cols(),
      grid.resolution()
    );
    self.dsm = Some(Arc::new(grid));
    self.terrain = None;
    self.terrain_status()
  }

  pub fn dsm(&self) -> Option<Arc<ElevationGrid>> {
    self.dsm.clone()
  }

  pub fn terrain_status(&self) -> TerrainStatus {
    match &self.dsm {
      Some(grid) => TerrainStatus {
        loaded: true,
        rows: grid.rows(),
        cols: grid.cols(),
        resolution: grid.resolution(),
      },
      None => TerrainStatus {
        loaded: false,
        rows: 0,
        cols: 0,
        resolution: 0.0,
      },
    }
  }

  /// 当前 DSM 的坡度坡向分析，首次调用时计算并缓存。
  pub fn terrain(&mut self) -> Result<Arc<TerrainAnalysis>, SessionError> {
    let grid = self.dsm.clone().ok_or(SessionError::NoDsm)?;
    if let Some(cached) = &self.terrain {
      return Ok(Arc::clone(cached));
    }

    info!("计算坡度坡向: {}x{} 格", grid.rows(), grid.cols());
    let analysis = Arc::new(TerrainAnalysis::analyze(&grid)?);
    self.terrain = Some(Arc::clone(&analysis));
    Ok(analysis)
  }

  /// 全图坡度统计，全为无效单元时为 `Ok(None)`。
  pub fn terrain_stats(&mut self) -> Result<Option<SlopeStats>, SessionError> {
    let analysis = self.terrain()?;
    Ok(analysis.slope_stats())
  }

  /// 单点地形查询，DSM 未覆盖处各字段为 `None`。
  pub fn terrain_point(&mut self, x: f64, y: f64) -> Result<TerrainSample, SessionError> {
    let analysis = self.terrain()?;
    let grid = self.dsm.clone().ok_or(SessionError::NoDsm)?;
    Ok(crate::terrain::sample_at(&grid, &analysis, x, y))
  }

  /// 后台任务完成后写回检测结果，覆盖上一次的结果。
  pub fn store_results(&mut self, detections: Vec<Detection>) {
    info!("写回检测结果: {} 个目标", detections.len());
    self.results = detections;
  }

  pub fn results(&self) -> &[Detection] {
    &self.results
  }
}
