// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/letterbox.rs - 保持宽高比的缩放（letterbox）
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

//! 把任意宽高比的帧缩放进固定边长的正方形画布。
//!
//! 缩放后的图像贴在画布左上角，其余区域保持为零（黑色）。
//! 因为填充只出现在右侧与下侧，画布坐标除以 [`Letterbox::scale`]
//! 即可还原到原图坐标，不需要任何偏移修正。

use image::{RgbImage, imageops::FilterType};
use tracing::trace;

use crate::{Error, frame::RgbFrame};

/// 一次 letterbox 变换的结果，只对产生它的那一帧有效
#[derive(Debug, Clone)]
pub struct Letterbox {
  canvas: RgbFrame,
  scale: f64,
  resized_width: u32,
  resized_height: u32,
}

impl Letterbox {
  pub fn canvas(&self) -> &RgbFrame {
    &self.canvas
  }

  pub fn into_canvas(self) -> RgbFrame {
    self.canvas
  }

  /// 原图到画布的缩放系数；画布坐标除以它得到原图坐标
  pub fn scale(&self) -> f64 {
    self.scale
  }

  /// 画布中有效（非填充）区域的 (宽, 高)
  pub fn resized(&self) -> (u32, u32) {
    (self.resized_width, self.resized_height)
  }
}

/// 计算适配后的 (宽, 高) 与缩放系数
///
/// 高大于宽时以高为基准，否则以宽为基准，另一边向下取整。
pub fn fit(height: usize, width: usize, input_size: u32) -> Result<(u32, u32, f64), Error> {
  if input_size == 0 {
    return Err(Error::config("input_size 必须为正整数"));
  }
  if height == 0 || width == 0 {
    return Err(Error::invalid(format!("帧尺寸无效: {}x{}", width, height)));
  }

  let ratio = height as f64 / width as f64;
  let (w, h) = if ratio > 1.0 {
    let h = input_size;
    let w = (h as f64 / ratio).floor() as u32;
    (w, h)
  } else {
    let w = input_size;
    let h = (w as f64 * ratio).floor() as u32;
    (w, h)
  };

  // 极端宽高比下短边可能取整为 0
  let (w, h) = (w.max(1), h.max(1));
  let scale = h as f64 / height as f64;

  Ok((w, h, scale))
}

pub fn letterbox(frame: &RgbFrame, input_size: u32) -> Result<Letterbox, Error> {
  let (w, h, scale) = fit(frame.height(), frame.width(), input_size)?;
  trace!(
    "letterbox: {}x{} -> {}x{} (画布 {}), scale = {}",
    frame.width(),
    frame.height(),
    w,
    h,
    input_size,
    scale
  );

  let source = frame.to_rgb_image();
  let resized = if (w, h) == source.dimensions() {
    source
  } else {
    image::imageops::resize(&source, w, h, FilterType::Triangle)
  };

  let mut canvas = RgbImage::new(input_size, input_size);
  image::imageops::replace(&mut canvas, &resized, 0, 0);

  Ok(Letterbox {
    canvas: RgbFrame::from(canvas),
    scale,
    resized_width: w,
    resized_height: h,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;
  use proptest::prelude::*;

  fn solid(height: u32, width: u32, value: u8) -> RgbFrame {
    RgbFrame::from(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
  }

  #[test]
  fn wide_frame_fits_by_width() {
    let lb = letterbox(&solid(160, 320, 200), 160).unwrap();
    assert_eq!(lb.resized(), (160, 80));
    assert_eq!(lb.scale(), 0.5);
    assert_eq!(lb.canvas().width(), 160);
    assert_eq!(lb.canvas().height(), 160);
  }

  #[test]
  fn tall_frame_fits_by_height() {
    let (w, h, scale) = fit(640, 480, 160).unwrap();
    assert_eq!((w, h), (120, 160));
    assert_eq!(scale, 0.25);
  }

  #[test]
  fn square_frame_fills_canvas() {
    let lb = letterbox(&solid(10, 10, 9), 10).unwrap();
    assert_eq!(lb.resized(), (10, 10));
    assert_eq!(lb.scale(), 1.0);
    assert!(lb.canvas().as_ref().iter().all(|&v| v == 9));
  }

  #[test]
  fn zero_dimension_is_invalid_input() {
    let frame = RgbFrame::with_shape(0, 10);
    assert!(matches!(letterbox(&frame, 160), Err(Error::InvalidInput(_))));
  }

  #[test]
  fn zero_input_size_is_configuration_error() {
    assert!(matches!(
      letterbox(&solid(4, 4, 1), 0),
      Err(Error::Configuration(_))
    ));
  }

  #[test]
  fn extreme_aspect_keeps_one_pixel() {
    let (w, h, _) = fit(1, 1000, 16).unwrap();
    assert_eq!((w, h), (16, 1));
  }

  proptest! {
    #[test]
    fn padding_is_zero_and_aspect_preserved(
      height in 1u32..48,
      width in 1u32..48,
      input_size in 4u32..40,
    ) {
      let frame = solid(height, width, 200);
      let lb = letterbox(&frame, input_size).unwrap();
      let (w, h) = lb.resized();
      let canvas = lb.canvas();

      for y in 0..input_size as usize {
        for x in 0..input_size as usize {
          let inside = x < w as usize && y < h as usize;
          let pixel = canvas.pixel(x, y);
          if inside {
            prop_assert_eq!(pixel, [200, 200, 200]);
          } else {
            prop_assert_eq!(pixel, [0, 0, 0]);
          }
        }
      }

      // 短边与精确等比尺寸相差不到一个像素
      if height > width {
        let exact = h as f64 * width as f64 / height as f64;
        prop_assert_eq!(h, input_size);
        prop_assert!((w as f64 - exact).abs() < 1.0);
      } else {
        let exact = w as f64 * height as f64 / width as f64;
        prop_assert_eq!(w, input_size);
        prop_assert!((h as f64 - exact).abs() < 1.0);
      }
    }
  }
}
