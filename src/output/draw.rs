// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::Rgb;
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use tracing::info;

use crate::{Error, config::LabelTable, frame::RgbFrame, postprocess::Detection};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_BELOW_OFFSET: i32 = 20;
const LABEL_ABOVE_OFFSET: i32 = 25;
const FALLBACK_COLOR: [u8; 3] = [255, 255, 255];

// DejaVu Sans，许可见 assets/LICENSE-font
static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/font.ttf");

/// 标签文字的基线位置
///
/// 框的上边缘位于帧的上半部分时，文字放在框下方，否则放在框上方。
pub fn label_anchor(detection: &Detection, frame_height: usize) -> (i32, i32) {
  let half = (frame_height / 2) as i32;
  let y = if detection.top < half {
    detection.top + detection.height + LABEL_BELOW_OFFSET
  } else {
    detection.top - LABEL_ABOVE_OFFSET
  };
  (detection.left, y)
}

pub fn label_text(labels: &LabelTable, detection: &Detection) -> String {
  match labels.get(detection.class_id) {
    Some(label) => format!("{}: {:.2}", label.name, detection.score),
    None => format!("#{}: {:.2}", detection.class_id, detection.score),
  }
}

pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc, Error> {
  let path = path.as_ref();
  let data = std::fs::read(path)
    .map_err(|e| Error::config(format!("无法读取字体文件 {}: {}", path.display(), e)))?;
  let font = FontArc::try_from_vec(data)
    .map_err(|e| Error::config(format!("字体文件无效 {}: {}", path.display(), e)))?;
  info!("已加载字体: {}", path.display());
  Ok(font)
}

/// 在帧上绘制检测框与 "标签: 分数" 文本
pub struct Annotator {
  labels: LabelTable,
  font: FontArc,
  font_size: f32,
}

impl Annotator {
  pub fn new(labels: LabelTable) -> Self {
    let font = FontArc::try_from_slice(DEFAULT_FONT).expect("无法加载嵌入的字体文件");
    Self {
      labels,
      font,
      font_size: LABEL_FONT_SIZE,
    }
  }

  /// 替换内置字体
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = font;
    self
  }

  pub fn font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  fn color_of(&self, class_id: usize) -> Rgb<u8> {
    Rgb(
      self
        .labels
        .get(class_id)
        .map(|l| l.color)
        .unwrap_or(FALLBACK_COLOR),
    )
  }

  pub fn annotate(&self, frame: &mut RgbFrame, detections: &[Detection]) {
    let frame_height = frame.height();

    for detection in detections {
      let color = self.color_of(detection.class_id);
      let width = detection.width.max(1) as u32;
      let height = detection.height.max(1) as u32;

      // 两层边框，线宽 2 像素
      let rect = Rect::at(detection.left, detection.top).of_size(width, height);
      draw_hollow_rect_mut(frame, rect, color);
      if width > 2 && height > 2 {
        let inner = Rect::at(detection.left + 1, detection.top + 1).of_size(width - 2, height - 2);
        draw_hollow_rect_mut(frame, inner, color);
      }

      let text = label_text(&self.labels, detection);
      let (x, baseline) = label_anchor(detection, frame_height);
      // imageproc 以文字顶部定位
      let y = baseline - self.font_size as i32;
      let scale = PxScale::from(self.font_size);
      draw_text_mut(frame, color, x, y, scale, &self.font, &text);
    }
  }
}
