// 该文件是 Yunsun （云隼） 项目的一部分。
// src/cloud/xyz.rs - XYZ 文本点云读取
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

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use thiserror::Error;

use super::PointCloud;
use crate::{FromUrl, FromUrlWithScheme};

const XYZ_SCHEME: &str = "xyz";

#[derive(Error, Debug)]
pub enum XyzError {
  #[error("无法打开点云文件: {0}")]
  Io(#[from] std::io::Error),
  #[error("点云文件解析错误: {0}")]
  Csv(#[from] csv::Error),
  #[error("第 {line} 行格式无效: {text}")]
  Malformed { line: u64, text: String },
  #[error("URL 路径无效: {0}")]
  BadPath(String),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// 读取每行 `x y z` 的文本点云。
///
/// 以 `#` 开头的行视为注释，连续分隔符产生的空字段被忽略。
pub fn open_xyz(path: &Path, delimiter: u8) -> Result<PointCloud, XyzError> {
  let file = File::open(path)?;
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(false)
    .flexible(true)
    .comment(Some(b'#'))
    .delimiter(delimiter)
    .from_reader(file);

  let mut x = Vec::new();
  let mut y = Vec::new();
  let mut z = Vec::new();
  for record in reader.records() {
    let record = record?;
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let mut fields = record.iter().filter(|f| !f.trim().is_empty());

    let next_coord = |text: &str| -> Result<f64, XyzError> {
      text.trim().parse().map_err(|_| XyzError::Malformed {
        line,
        text: text.to_string(),
      })
    };
    match (fields.next(), fields.next(), fields.next()) {
      (Some(fx), Some(fy), Some(fz)) => {
        x.push(next_coord(fx)?);
        y.push(next_coord(fy)?);
        z.push(next_coord(fz)?);
      }
      (None, _, _) => continue,
      _ => {
        return Err(XyzError::Malformed {
          line,
          text: record.iter().collect::<Vec<_>>().join(" "),
        });
      }
    }
  }

  Ok(PointCloud::new(x, y, z))
}

impl FromUrl for PointCloud {
  type Error = XyzError;

  /// `xyz:///path/cloud.xyz?delim=space`，分隔符可为
  /// `space`（默认）、`comma` 或 `tab`。
  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != XYZ_SCHEME {
      return Err(XyzError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let delimiter = match query.get("delim").map(String::as_str) {
      None | Some("space") => b' ',
      Some("comma") => b',',
      Some("tab") => b'\t',
      Some(other) => {
        return Err(XyzError::BadPath(format!("未知分隔符: {other}")));
      }
    };

    let path = urlencoding::decode(url.path())
      .map(|p| p.into_owned())
      .map_err(|e| XyzError::BadPath(e.to_string()))?;
    open_xyz(Path::new(&path), delimiter)
  }
}

impl FromUrlWithScheme for PointCloud {
  const SCHEME: &'static str = XYZ_SCHEME;
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("yunsun-xyz-{}-{}", std::process::id(), name));
    let mut file = File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
  }

  #[test]
  fn parses_space_delimited_lines() {
    let path = write_temp("plain.xyz", "# 注释\n1.0 2.0 3.0\n4.5  5.5   6.5\n");
    let cloud = open_xyz(&path, b' ').unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cloud.len(), 2);
    assert_eq!(cloud.select_z(4.0, 5.0, 5.0, 6.0), vec![6.5]);
  }

  #[test]
  fn rejects_short_rows() {
    let path = write_temp("short.xyz", "1.0 2.0\n");
    let err = open_xyz(&path, b' ').unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(matches!(err, XyzError::Malformed { .. }));
  }

  #[test]
  fn from_url_honors_delimiter_query() {
    let path = write_temp("comma.xyz", "1.0,2.0,3.0\n");
    let url = url::Url::parse(&format!("xyz://{}?delim=comma", path.display())).unwrap();
    let cloud = PointCloud::from_url(&url).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(cloud.len(), 1);
  }
}
