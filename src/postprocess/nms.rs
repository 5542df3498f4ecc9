// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use tracing::trace;

use crate::postprocess::{Candidate, CenterBox};

/// NMS 参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NmsConfig {
  /// 低于该分数的候选先被丢弃
  pub score_threshold: f32,
  /// 与已保留框 IoU 不小于该值的候选被抑制
  pub iou_threshold: f32,
  /// 为 true 时只在同一类别内抑制
  pub class_aware: bool,
}

impl NmsConfig {
  pub fn apply(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
    if self.class_aware {
      nms_class_aware(candidates, self.score_threshold, self.iou_threshold)
    } else {
      nms(candidates, self.score_threshold, self.iou_threshold)
    }
  }
}

/// 计算两个框的 IoU
///
/// 并集面积为零（两个零面积框）时，相同的框记为 1，否则为 0。
pub fn iou(a: &CenterBox, b: &CenterBox) -> f32 {
  let (ax1, ay1) = (a.left(), a.top());
  let (bx1, by1) = (b.left(), b.top());
  let x1 = ax1.max(bx1);
  let y1 = ay1.max(by1);
  let x2 = (ax1 + a.w).min(bx1 + b.w);
  let y2 = (ay1 + a.h).min(by1 + b.h);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    intersection / union
  } else if a == b {
    1.0
  } else {
    0.0
  }
}

/// 与类别无关的贪心 NMS
pub fn nms(candidates: Vec<Candidate>, score_threshold: f32, iou_threshold: f32) -> Vec<Candidate> {
  greedy(candidates, score_threshold, iou_threshold, |_, _| true)
}

/// 只在同一类别内抑制的贪心 NMS
pub fn nms_class_aware(
  candidates: Vec<Candidate>,
  score_threshold: f32,
  iou_threshold: f32,
) -> Vec<Candidate> {
  greedy(candidates, score_threshold, iou_threshold, |a, b| {
    a.class_id == b.class_id
  })
}

fn greedy<F>(
  mut candidates: Vec<Candidate>,
  score_threshold: f32,
  iou_threshold: f32,
  competes: F,
) -> Vec<Candidate>
where
  F: Fn(&Candidate, &Candidate) -> bool,
{
  let total = candidates.len();
  candidates.retain(|c| c.score >= score_threshold);
  // 稳定排序，同分保持解码顺序
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
  for candidate in candidates {
    let suppressed = kept
      .iter()
      .any(|k| competes(k, &candidate) && iou(&k.bbox, &candidate.bbox) >= iou_threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }

  trace!("NMS 保留 {} / {} 个候选", kept.len(), total);
  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn cand(cx: f32, cy: f32, w: f32, h: f32, score: f32, class_id: usize) -> Candidate {
    Candidate {
      bbox: CenterBox::new(cx, cy, w, h),
      score,
      class_id,
    }
  }

  #[test]
  fn iou_of_known_boxes() {
    let a = CenterBox::new(5.0, 5.0, 10.0, 10.0);
    let b = CenterBox::new(10.0, 5.0, 10.0, 10.0);
    // 交集 50, 并集 150
    assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
    assert_eq!(iou(&a, &a), 1.0);
    assert_eq!(iou(&a, &CenterBox::new(100.0, 100.0, 4.0, 4.0)), 0.0);
  }

  #[test]
  fn iou_of_degenerate_boxes() {
    let point = CenterBox::new(3.0, 3.0, 0.0, 0.0);
    let other = CenterBox::new(3.0, 3.0, 2.0, 2.0);
    assert_eq!(iou(&point, &point), 1.0);
    assert_eq!(iou(&point, &other), 0.0);
    assert_eq!(iou(&point, &CenterBox::new(4.0, 4.0, 0.0, 0.0)), 0.0);
  }

  #[test]
  fn single_candidate_is_unchanged() {
    let c = cand(80.0, 80.0, 40.0, 40.0, 0.9, 2);
    assert_eq!(nms(vec![c], 0.25, 0.7), vec![c]);
  }

  #[test]
  fn overlapping_lower_score_is_suppressed() {
    let low = cand(50.0, 50.0, 20.0, 20.0, 0.6, 1);
    let high = cand(51.0, 50.0, 20.0, 20.0, 0.8, 1);
    let far = cand(150.0, 150.0, 20.0, 20.0, 0.3, 1);
    let kept = nms(vec![low, high, far], 0.25, 0.7);
    assert_eq!(kept, vec![high, far]);
  }

  #[test]
  fn iou_equal_to_threshold_is_suppressed() {
    let a = cand(5.0, 5.0, 10.0, 10.0, 0.9, 0);
    let b = cand(10.0, 5.0, 10.0, 10.0, 0.5, 0);
    let threshold = iou(&a.bbox, &b.bbox);
    assert_eq!(nms(vec![a, b], 0.0, threshold), vec![a]);
  }

  #[test]
  fn class_agnostic_and_class_aware_modes() {
    let a = cand(50.0, 50.0, 20.0, 20.0, 0.9, 0);
    let b = cand(50.0, 50.0, 20.0, 20.0, 0.8, 1);
    assert_eq!(nms(vec![a, b], 0.25, 0.7), vec![a]);
    assert_eq!(nms_class_aware(vec![a, b], 0.25, 0.7), vec![a, b]);

    let config = NmsConfig {
      score_threshold: 0.25,
      iou_threshold: 0.7,
      class_aware: true,
    };
    assert_eq!(config.apply(vec![b, a]), vec![a, b]);
  }

  #[test]
  fn score_threshold_filters_before_suppression() {
    let weak = cand(50.0, 50.0, 20.0, 20.0, 0.2, 0);
    let strong = cand(100.0, 100.0, 20.0, 20.0, 0.3, 0);
    assert_eq!(nms(vec![weak, strong], 0.25, 0.7), vec![strong]);
  }

  #[test]
  fn equal_scores_keep_input_order() {
    let a = cand(10.0, 10.0, 4.0, 4.0, 0.5, 0);
    let b = cand(100.0, 100.0, 4.0, 4.0, 0.5, 0);
    assert_eq!(nms(vec![a, b], 0.25, 0.7), vec![a, b]);
  }

  fn arb_candidate() -> impl Strategy<Value = Candidate> {
    (
      0.0f32..100.0,
      0.0f32..100.0,
      0.0f32..40.0,
      0.0f32..40.0,
      0.0f32..1.0,
      0usize..3,
    )
      .prop_map(|(cx, cy, w, h, score, class_id)| cand(cx, cy, w, h, score, class_id))
  }

  proptest! {
    #[test]
    fn nms_is_idempotent(
      candidates in prop::collection::vec(arb_candidate(), 0..24),
      iou_threshold in 0.05f32..1.0,
      class_aware in any::<bool>(),
    ) {
      let config = NmsConfig { score_threshold: 0.25, iou_threshold, class_aware };
      let once = config.apply(candidates);
      let twice = config.apply(once.clone());
      prop_assert_eq!(once, twice);
    }

    #[test]
    fn survivors_do_not_overlap(
      candidates in prop::collection::vec(arb_candidate(), 0..24),
      iou_threshold in 0.05f32..1.0,
    ) {
      let kept = nms(candidates, 0.0, iou_threshold);
      for (i, a) in kept.iter().enumerate() {
        for b in &kept[i + 1..] {
          prop_assert!(iou(&a.bbox, &b.bbox) < iou_threshold);
        }
      }
    }
  }
}
