// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/postprocess/rescale.rs - 坐标还原到原图
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

use crate::postprocess::{Candidate, Detection};

/// 画布坐标除以 `scale` 后向下取整
///
/// 不做边界裁剪，靠近边缘的框可能出现负的 left/top。
pub fn rescale(candidate: &Candidate, scale: f64) -> Detection {
  let bbox = &candidate.bbox;
  let left = (bbox.cx as f64 - bbox.w as f64 / 2.0) / scale;
  let top = (bbox.cy as f64 - bbox.h as f64 / 2.0) / scale;

  Detection {
    left: left.floor() as i32,
    top: top.floor() as i32,
    width: (bbox.w as f64 / scale).floor() as i32,
    height: (bbox.h as f64 / scale).floor() as i32,
    score: candidate.score,
    class_id: candidate.class_id,
  }
}

pub fn rescale_all(candidates: &[Candidate], scale: f64) -> Vec<Detection> {
  candidates.iter().map(|c| rescale(c, scale)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{letterbox::fit, postprocess::CenterBox};
  use proptest::prelude::*;

  fn cand(cx: f32, cy: f32, w: f32, h: f32) -> Candidate {
    Candidate {
      bbox: CenterBox::new(cx, cy, w, h),
      score: 0.9,
      class_id: 2,
    }
  }

  #[test]
  fn half_scale_doubles_box() {
    let det = rescale(&cand(80.0, 80.0, 40.0, 40.0), 0.5);
    assert_eq!(
      det,
      Detection {
        left: 120,
        top: 120,
        width: 80,
        height: 80,
        score: 0.9,
        class_id: 2,
      }
    );
  }

  #[test]
  fn border_boxes_are_not_clamped() {
    let det = rescale(&cand(2.0, 3.0, 10.0, 10.0), 0.5);
    assert_eq!(det.left, -6);
    assert_eq!(det.top, -4);
  }

  #[test]
  fn negative_coordinates_floor_downwards() {
    let det = rescale(&cand(0.0, 0.0, 3.0, 3.0), 1.0);
    assert_eq!(det.left, -2);
    assert_eq!(det.top, -2);
    assert_eq!(det.width, 3);
  }

  proptest! {
    // 原图中的框投到画布再还原，误差不超过 1 像素
    #[test]
    fn letterbox_scale_is_invertible(
      height in 1usize..2000,
      width in 1usize..2000,
      input_size in 32u32..1024,
      fx in 0.0f64..1.0,
      fy in 0.0f64..1.0,
      fw in 0.0f64..1.0,
      fh in 0.0f64..1.0,
    ) {
      let (_, _, scale) = fit(height, width, input_size).unwrap();
      let left = (fx * width as f64).floor();
      let top = (fy * height as f64).floor();
      let w = (fw * width as f64).floor();
      let h = (fh * height as f64).floor();

      let candidate = cand(
        ((left + w / 2.0) * scale) as f32,
        ((top + h / 2.0) * scale) as f32,
        (w * scale) as f32,
        (h * scale) as f32,
      );
      let det = rescale(&candidate, scale);

      prop_assert!((det.left as f64 - left).abs() <= 1.0);
      prop_assert!((det.top as f64 - top).abs() <= 1.0);
      prop_assert!((det.width as f64 - w).abs() <= 1.0);
      prop_assert!((det.height as f64 - h).abs() <= 1.0);
    }
  }
}
