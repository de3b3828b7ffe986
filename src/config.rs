// 该文件是 Yunsun （云隼） 项目的一部分。
// src/config.rs - 类别配置表
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

/// 单一目标类别的检测、筛选与高度融合配置。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassConfig {
  /// 检测器登记名
  pub class: &'static str,
  /// 输出记录使用的类别名
  pub label: &'static str,
  /// 置信度阈值
  pub conf: f32,
  /// 滑窗边长（像素）
  pub patch: u32,
  /// 相邻滑窗重叠（像素）
  pub overlap: u32,
  /// 同类去重的 IoU 阈值
  pub iou_thresh: f32,
  /// 占地面积合理范围（平方米）
  pub area_range: (f64, f64),
  /// 长宽比合理范围
  pub ratio_range: (f64, f64),
  /// 高度合理范围（米）
  pub height_range: (f64, f64),
  /// 高度先验（均值、标准差，米）
  pub height_prior: (f64, f64),
  /// 叠加图中的框颜色 (R, G, B)
  pub color: (u8, u8, u8),
}

/// 支持的目标类别，按流水线处理顺序排列。
pub const CLASSES: [ClassConfig; 3] = [
  ClassConfig {
    class: "car",
    label: "vehicle",
    conf: 0.75,
    patch: 1024,
    overlap: 850,
    iou_thresh: 0.1,
    area_range: (4.0, 25.0),
    ratio_range: (1.0, 3.0),
    height_range: (1.0, 2.2),
    height_prior: (1.60, 0.25),
    color: (0, 255, 0),
  },
  ClassConfig {
    class: "person",
    label: "person",
    conf: 0.60,
    patch: 1024,
    overlap: 850,
    iou_thresh: 0.1,
    area_range: (0.2, 1.0),
    ratio_range: (0.5, 2.0),
    height_range: (1.45, 1.90),
    height_prior: (1.70, 0.08),
    color: (255, 0, 0),
  },
  ClassConfig {
    class: "cone",
    label: "cone",
    conf: 0.60,
    patch: 1024,
    overlap: 850,
    iou_thresh: 0.1,
    area_range: (0.05, 0.5),
    ratio_range: (0.8, 1.4),
    height_range: (0.25, 0.90),
    height_prior: (0.45, 0.10),
    color: (0, 128, 255),
  },
];

/// 按检测器登记名查询类别配置。
pub fn class_config(class: &str) -> Option<&'static ClassConfig> {
  CLASSES.iter().find(|c| c.class == class)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_by_class_name() {
    let car = class_config("car").unwrap();
    assert_eq!(car.label, "vehicle");
    assert_eq!(car.patch, 1024);
    assert_eq!(car.overlap, 850);
    assert!(class_config("truck").is_none());
  }

  #[test]
  fn ranges_are_ordered() {
    for cfg in &CLASSES {
      assert!(cfg.overlap < cfg.patch);
      assert!(cfg.area_range.0 < cfg.area_range.1);
      assert!(cfg.ratio_range.0 < cfg.ratio_range.1);
      assert!(cfg.height_range.0 < cfg.height_range.1);
      assert!(cfg.height_prior.1 > 0.0);
    }
  }
}
