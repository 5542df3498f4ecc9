// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/postprocess.rs - 检测后处理
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

use serde::Serialize;

/// 画布坐标系下的中心点表示框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterBox {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
}

impl CenterBox {
  pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self { cx, cy, w, h }
  }

  pub fn left(&self) -> f32 {
    self.cx - self.w / 2.0
  }

  pub fn top(&self) -> f32 {
    self.cy - self.h / 2.0
  }

  pub fn area(&self) -> f32 {
    self.w * self.h
  }
}

/// 解码后、NMS 前的候选
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub bbox: CenterBox,
  pub score: f32,
  pub class_id: usize,
}

/// 原图像素坐标下的最终检测结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
  pub left: i32,
  pub top: i32,
  pub width: i32,
  pub height: i32,
  pub score: f32,
  pub class_id: usize,
}

mod decode;
mod nms;
mod rescale;

pub use self::decode::decode;
pub use self::nms::{NmsConfig, iou, nms, nms_class_aware};
pub use self::rescale::{rescale, rescale_all};
