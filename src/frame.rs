// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::Canvas;

use crate::Error;

const RGB_CHANNELS: usize = 3;

/// 模型输入的通道顺序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

/// RGB 三通道、NHWC 排布的帧，尺寸在运行时确定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
  height: usize,
  width: usize,
  data: Box<[u8]>,
}

impl RgbFrame {
  /// 全零（黑色）帧
  pub fn with_shape(height: usize, width: usize) -> Self {
    let size = RGB_CHANNELS * height * width;
    Self {
      height,
      width,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  pub fn from_raw(height: usize, width: usize, data: Vec<u8>) -> Result<Self, Error> {
    if data.len() != RGB_CHANNELS * height * width {
      return Err(Error::invalid(format!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        RGB_CHANNELS * height * width,
        data.len()
      )));
    }

    Ok(Self {
      height,
      width,
      data: data.into_boxed_slice(),
    })
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn is_empty(&self) -> bool {
    self.height == 0 || self.width == 0
  }

  pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
    let idx = (y * self.width + x) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    let width = self.width as u32;
    ImageBuffer::from_fn(width, self.height as u32, |x, y| {
      Rgb(self.pixel(x as usize, y as usize))
    })
  }

  /// 归一化到 [0, 1] 的 NCHW 浮点张量（批大小为 1）
  pub fn to_nchw_f32(&self, order: ChannelOrder) -> Vec<f32> {
    let plane = self.height * self.width;
    let mut tensor = vec![0f32; plane * RGB_CHANNELS];

    for (idx, pixel) in self.data.chunks_exact(RGB_CHANNELS).enumerate() {
      for (c, &value) in pixel.iter().enumerate() {
        let channel = match order {
          ChannelOrder::Rgb => c,
          ChannelOrder::Bgr => RGB_CHANNELS - 1 - c,
        };
        tensor[channel * plane + idx] = value as f32 / 255.0;
      }
    }

    tensor
  }
}

impl From<&RgbImage> for RgbFrame {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      height: height as usize,
      width: width as usize,
      data: image.as_raw().clone().into_boxed_slice(),
    }
  }
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      height: height as usize,
      width: width as usize,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl AsRef<[u8]> for RgbFrame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

impl AsMut<[u8]> for RgbFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

// 直接在帧上绘制，避免来回转换 RgbImage
impl Canvas for RgbFrame {
  type Pixel = Rgb<u8>;

  fn dimensions(&self) -> (u32, u32) {
    (self.width as u32, self.height as u32)
  }

  fn get_pixel(&self, x: u32, y: u32) -> Self::Pixel {
    Rgb(self.pixel(x as usize, y as usize))
  }

  fn draw_pixel(&mut self, x: u32, y: u32, color: Self::Pixel) {
    let idx = (y as usize * self.width + x as usize) * RGB_CHANNELS;
    self.data[idx..idx + RGB_CHANNELS].copy_from_slice(&color.0);
  }
}
