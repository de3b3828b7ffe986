// 该文件是 Yunsun （云隼） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;
use url::Url;

/// Yunsun 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 正射影像来源
  /// 支持格式:
  /// - GeoTIFF: geotiff:///data/ortho.tif
  #[arg(long, value_name = "SOURCE")]
  pub ortho: Url,

  /// 高程点云来源（可选）
  /// 支持格式:
  /// - XYZ 文本: xyz:///data/cloud.txt?delim=space
  #[arg(long, value_name = "SOURCE")]
  pub cloud: Option<Url>,

  /// 数字表面模型来源（可选）
  /// 支持格式:
  /// - GeoTIFF: geotiff:///data/dsm.tif
  #[arg(long, value_name = "SOURCE")]
  pub dsm: Option<Url>,

  /// 结果输出，可多次指定
  /// 支持格式:
  /// - JSON 报告: json:///out/report.json
  /// - CSV 表格: csv:///out/report.csv
  /// - 叠加图: overlay:///out/overlay.png?max_dim=2048
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,

  /// 检测器登记，形如 类别=URL，可多次指定
  /// 例如: car=lum://?min=200
  #[arg(long, value_name = "CLASS=URL")]
  pub detector: Vec<String>,

  /// 置信度阈值 (0.0 - 1.0)，缺省使用各类别内置阈值
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// 跳过乘用车检测
  #[arg(long)]
  pub no_vehicle: bool,

  /// 跳过行人检测
  #[arg(long)]
  pub no_person: bool,

  /// 跳过锥桶检测
  #[arg(long)]
  pub no_cone: bool,

  /// 跳过高度融合
  #[arg(long)]
  pub no_elevation: bool,

  /// 高度先验采样种子
  #[arg(long, default_value = "42", value_name = "SEED")]
  pub seed: u64,

  /// 任务状态轮询间隔（毫秒）
  #[arg(long, default_value = "200", value_name = "MS")]
  pub poll_ms: u64,
}
