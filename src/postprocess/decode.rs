// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/postprocess/decode.rs - 原始输出张量解码
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

use crate::{
  model::{BOX_PARAMS, RawOutput},
  postprocess::{Candidate, CenterBox},
};

/// 取每行最高类别分数，低于阈值的行被丢弃
///
/// 分数相同时取下标最小的类别；输出顺序与输入行顺序一致。
pub fn decode(raw: &RawOutput, confidence_threshold: f32) -> Vec<Candidate> {
  let mut candidates = Vec::new();

  for row in raw.iter_rows() {
    let (bbox, scores) = row.split_at(BOX_PARAMS);

    let mut max_score = f32::NEG_INFINITY;
    let mut class_id = 0usize;
    for (c, &score) in scores.iter().enumerate() {
      // NaN 不会胜出
      if score > max_score {
        max_score = score;
        class_id = c;
      }
    }

    if max_score >= confidence_threshold {
      candidates.push(Candidate {
        bbox: CenterBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
        score: max_score,
        class_id,
      });
    }
  }

  trace!("解码得到 {} / {} 个候选", candidates.len(), raw.rows());
  candidates
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn raw(rows: Vec<[f32; 7]>) -> RawOutput {
    let n = rows.len();
    RawOutput::from_rows(n, 7, rows.into_iter().flatten().collect()).unwrap()
  }

  #[test]
  fn picks_best_class_per_row() {
    let out = decode(
      &raw(vec![
        [80.0, 80.0, 40.0, 40.0, 0.1, 0.3, 0.9],
        [10.0, 10.0, 5.0, 5.0, 0.6, 0.2, 0.1],
      ]),
      0.25,
    );
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].class_id, 2);
    assert_eq!(out[0].score, 0.9);
    assert_eq!(out[0].bbox, CenterBox::new(80.0, 80.0, 40.0, 40.0));
    assert_eq!(out[1].class_id, 0);
  }

  #[test]
  fn threshold_is_inclusive() {
    let out = decode(&raw(vec![[0.0, 0.0, 1.0, 1.0, 0.25, 0.0, 0.0]]), 0.25);
    assert_eq!(out.len(), 1);
    let out = decode(&raw(vec![[0.0, 0.0, 1.0, 1.0, 0.24, 0.0, 0.0]]), 0.25);
    assert!(out.is_empty());
  }

  #[test]
  fn ties_go_to_first_class() {
    let out = decode(&raw(vec![[0.0, 0.0, 1.0, 1.0, 0.2, 0.7, 0.7]]), 0.25);
    assert_eq!(out[0].class_id, 1);
  }

  #[test]
  fn nan_scores_never_win() {
    let out = decode(&raw(vec![[0.0, 0.0, 1.0, 1.0, f32::NAN, 0.4, 0.3]]), 0.25);
    assert_eq!(out[0].class_id, 1);
    let out = decode(
      &raw(vec![[0.0, 0.0, 1.0, 1.0, f32::NAN, f32::NAN, f32::NAN]]),
      0.25,
    );
    assert!(out.is_empty());
  }

  #[test]
  fn all_below_threshold_is_empty() {
    let out = decode(
      &raw(vec![
        [1.0, 1.0, 1.0, 1.0, 0.1, 0.2, 0.05],
        [2.0, 2.0, 2.0, 2.0, 0.0, 0.24, 0.01],
      ]),
      0.25,
    );
    assert!(out.is_empty());
  }

  proptest! {
    #[test]
    fn raising_threshold_never_adds_candidates(
      scores in prop::collection::vec(prop::array::uniform3(0.0f32..1.0), 1..32),
      low in 0.0f32..1.0,
      delta in 0.0f32..1.0,
    ) {
      let rows: Vec<[f32; 7]> = scores
        .iter()
        .map(|s| [50.0, 50.0, 10.0, 10.0, s[0], s[1], s[2]])
        .collect();
      let raw = raw(rows);
      let high = (low + delta).min(1.0);
      prop_assert!(decode(&raw, high).len() <= decode(&raw, low).len());
    }
  }
}
