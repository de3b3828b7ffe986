// 该文件是 Yunsun （云隼） 项目的一部分。
// src/pipeline/merge.rs - 跨窗候选去重
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::detect::RawDetection;

/// 同类候选框贪心去重。
///
/// 按置信度降序依次保留，与已保留框 IoU 达到阈值的候选被丢弃。
/// 排序是稳定的，同分候选维持进入顺序。
pub fn resolve(mut boxes: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
  boxes.sort_by(|a, b| {
    b.score
      .partial_cmp(&a.score)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut result = Vec::new();
  while !boxes.is_empty() {
    let best = boxes.remove(0);
    result.push(best);

    boxes.retain(|det| iou(&best, det) < iou_threshold as f64);
  }

  result
}

/// 两个像素框的 IoU，并集为零时取 0。
pub fn iou(a: &RawDetection, b: &RawDetection) -> f64 {
  let x1 = a.x0.max(b.x0);
  let y1 = a.y0.max(b.y0);
  let x2 = a.x1.min(b.x1);
  let y2 = a.y1.min(b.y1);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = a.width() * a.height();
  let area_b = b.width() * b.height();
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(x0: f64, y0: f64, x1: f64, y1: f64, score: f32) -> RawDetection {
    RawDetection { x0, y0, x1, y1, score }
  }

  #[test]
  fn keeps_highest_score_among_overlaps() {
    let boxes = vec![
      raw(0.0, 0.0, 10.0, 10.0, 0.7),
      raw(1.0, 1.0, 11.0, 11.0, 0.9),
      raw(50.0, 50.0, 60.0, 60.0, 0.5),
    ];
    let kept = resolve(boxes, 0.3);

    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].score, 0.9);
    assert_eq!(kept[1].score, 0.5);
  }

  #[test]
  fn equal_scores_keep_first_seen() {
    let boxes = vec![
      raw(0.0, 0.0, 10.0, 10.0, 0.8),
      raw(0.0, 0.0, 10.0, 10.0, 0.8),
    ];
    let kept = resolve(boxes, 0.5);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].x0, 0.0);
  }

  #[test]
  fn iou_exactly_at_threshold_is_discarded() {
    // 交 50，并 100
    let boxes = vec![
      raw(0.0, 0.0, 10.0, 10.0, 0.9),
      raw(0.0, 0.0, 10.0, 5.0, 0.8),
    ];
    assert_eq!(resolve(boxes, 0.5).len(), 1);
  }

  #[test]
  fn disjoint_boxes_all_survive() {
    let boxes = vec![
      raw(0.0, 0.0, 5.0, 5.0, 0.6),
      raw(10.0, 10.0, 15.0, 15.0, 0.7),
      raw(20.0, 0.0, 25.0, 5.0, 0.8),
    ];
    assert_eq!(resolve(boxes, 0.1).len(), 3);
  }

  #[test]
  fn zero_area_boxes_have_zero_iou() {
    let a = raw(5.0, 5.0, 5.0, 5.0, 0.9);
    let b = raw(5.0, 5.0, 5.0, 5.0, 0.8);
    assert_eq!(iou(&a, &b), 0.0);
    assert_eq!(resolve(vec![a, b], 0.1).len(), 2);
  }

  #[test]
  fn empty_input_is_fine() {
    assert!(resolve(Vec::new(), 0.5).is_empty());
  }
}
