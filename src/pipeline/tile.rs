// 该文件是 Yunsun （云隼） 项目的一部分。
// src/pipeline/tile.rs - 滑窗划分
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

use super::PipelineError;

/// 栅格内的一个滑窗，已裁剪到栅格边界。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
  pub x: u32,
  pub y: u32,
  pub w: u32,
  pub h: u32,
}

/// 行主序的重叠滑窗划分。
///
/// 步长为 `patch - overlap`，窗口起点落在栅格内即产出，
/// 右缘与下缘窗口按边界裁剪。
#[derive(Debug, Clone, Copy)]
pub struct TileGrid {
  width: u32,
  height: u32,
  patch: u32,
  step: u32,
}

impl TileGrid {
  pub fn new(width: u32, height: u32, patch: u32, overlap: u32) -> Result<Self, PipelineError> {
    if overlap >= patch {
      return Err(PipelineError::BadTiling { patch, overlap });
    }

    Ok(Self {
      width,
      height,
      patch,
      step: patch - overlap,
    })
  }

  pub fn patch(&self) -> u32 {
    self.patch
  }

  /// 窗口总数，与迭代产出的个数一致。
  pub fn total(&self) -> u64 {
    if self.width == 0 || self.height == 0 {
      return 0;
    }
    let cols = (self.width as u64).div_ceil(self.step as u64);
    let rows = (self.height as u64).div_ceil(self.step as u64);
    cols * rows
  }

  pub fn iter(&self) -> TileIter {
    TileIter {
      grid: *self,
      x: 0,
      y: 0,
      done: self.width == 0 || self.height == 0,
    }
  }
}

pub struct TileIter {
  grid: TileGrid,
  x: u32,
  y: u32,
  done: bool,
}

impl Iterator for TileIter {
  type Item = Window;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    let window = Window {
      x: self.x,
      y: self.y,
      w: self.grid.patch.min(self.grid.width - self.x),
      h: self.grid.patch.min(self.grid.height - self.y),
    };

    match self.x.checked_add(self.grid.step) {
      Some(x) if x < self.grid.width => self.x = x,
      _ => {
        self.x = 0;
        match self.y.checked_add(self.grid.step) {
          Some(y) if y < self.grid.height => self.y = y,
          _ => self.done = true,
        }
      }
    }

    Some(window)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn overlap_must_be_smaller_than_patch() {
    assert!(matches!(
      TileGrid::new(100, 100, 64, 64),
      Err(PipelineError::BadTiling { patch: 64, overlap: 64 })
    ));
    assert!(TileGrid::new(100, 100, 64, 63).is_ok());
  }

  #[test]
  fn windows_cover_every_pixel_exactly() {
    let grid = TileGrid::new(200, 200, 100, 30).unwrap();
    assert_eq!(grid.total(), 9);

    let mut covered = vec![false; 200 * 200];
    let mut count = 0u64;
    for win in grid.iter() {
      count += 1;
      assert!(win.x + win.w <= 200 && win.y + win.h <= 200);
      for y in win.y..win.y + win.h {
        for x in win.x..win.x + win.w {
          covered[(y * 200 + x) as usize] = true;
        }
      }
    }
    assert_eq!(count, grid.total());
    assert!(covered.iter().all(|&c| c));
  }

  #[test]
  fn edge_windows_are_clipped() {
    let grid = TileGrid::new(200, 150, 100, 30).unwrap();
    let windows: Vec<Window> = grid.iter().collect();

    let last = windows.last().unwrap();
    assert_eq!((last.x, last.y), (140, 140));
    assert_eq!((last.w, last.h), (60, 10));
    assert!(windows.iter().all(|w| w.w > 0 && w.h > 0));
  }

  #[test]
  fn patch_larger_than_raster_yields_single_window() {
    let grid = TileGrid::new(50, 40, 100, 30).unwrap();
    let windows: Vec<Window> = grid.iter().collect();
    assert_eq!(windows, vec![Window { x: 0, y: 0, w: 50, h: 40 }]);
    assert_eq!(grid.total(), 1);
  }

  #[test]
  fn empty_raster_yields_nothing() {
    let grid = TileGrid::new(0, 100, 64, 32).unwrap();
    assert_eq!(grid.iter().count(), 0);
    assert_eq!(grid.total(), 0);
  }

  #[test]
  fn production_geometry_window_count() {
    let grid = TileGrid::new(2000, 2000, 1024, 850).unwrap();
    assert_eq!(grid.total(), 144);
    assert_eq!(grid.iter().count(), 144);
  }

  #[test]
  fn iteration_is_restartable() {
    let grid = TileGrid::new(300, 300, 128, 64).unwrap();
    let first: Vec<Window> = grid.iter().collect();
    let second: Vec<Window> = grid.iter().collect();
    assert_eq!(first, second);
  }
}
