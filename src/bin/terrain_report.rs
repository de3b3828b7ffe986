// 该文件是 Yunsun （云隼） 项目的一部分。
// src/bin/terrain_report.rs - 地形坡度坡向报告
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use url::Url;

use yunsun::session::{Session, TerrainStatus};
use yunsun::terrain::SlopeStats;

/// Yunsun 地形报告参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 数字表面模型来源
  /// 支持格式:
  /// - GeoTIFF: geotiff:///data/dsm.tif
  #[arg(long, value_name = "SOURCE")]
  pub dsm: Url,

  /// 单点查询的地图坐标 x
  #[arg(long, value_name = "X", requires = "y")]
  pub x: Option<f64>,

  /// 单点查询的地图坐标 y
  #[arg(long, value_name = "Y", requires = "x")]
  pub y: Option<f64>,
}

#[derive(Serialize)]
struct PointReport {
  x: f64,
  y: f64,
  elevation: Option<f64>,
  slope: Option<f64>,
  aspect: Option<f64>,
}

#[derive(Serialize)]
struct Report {
  status: TerrainStatus,
  stats: Option<SlopeStats>,
  point: Option<PointReport>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("数字表面模型: {}", args.dsm);

  let mut session = Session::new();
  let status = session
    .load_dsm(&args.dsm)
    .context("装载数字表面模型失败")?;

  let stats = session.terrain_stats().context("坡度坡向分析失败")?;
  let point = match (args.x, args.y) {
    (Some(x), Some(y)) => {
      let sample = session.terrain_point(x, y).context("单点地形查询失败")?;
      Some(PointReport {
        x,
        y,
        elevation: sample.elevation,
        slope: sample.slope,
        aspect: sample.aspect,
      })
    }
    _ => None,
  };

  let report = Report {
    status,
    stats,
    point,
  };
  println!("{}", serde_json::to_string_pretty(&report)?);

  Ok(())
}
