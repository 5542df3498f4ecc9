// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  input::{FrameSource, InputError},
  url_path, url_query,
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("Missing image path")]
  MissingPath,
  #[error("Invalid repeat count: {0}")]
  InvalidRepeat(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单张静态图像，`image:///path.png?repeat=N` 时重复 N 次
pub struct ImageFileInput {
  frame: RgbFrame,
  remaining: usize,
}

impl ImageFileInput {
  pub fn new(frame: RgbFrame, repeat: usize) -> Self {
    Self {
      frame,
      remaining: repeat,
    }
  }
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let repeat = match url_query(url, "repeat") {
      Some(v) => v
        .parse()
        .map_err(|_| ImageFileInputError::InvalidRepeat(v.to_string()))?,
      None => 1,
    };

    let path = url_path(url).ok_or(ImageFileInputError::MissingPath)?;
    let image = ImageReader::open(&path)?.decode()?;
    debug!(
      "Loaded {} ({}x{})",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(ImageFileInput::new(RgbFrame::from(image.to_rgb8()), repeat))
  }
}

impl FrameSource for ImageFileInput {
  fn read(&mut self) -> Result<RgbFrame, InputError> {
    if self.remaining == 0 {
      return Err(InputError::Exhausted);
    }
    self.remaining -= 1;
    Ok(self.frame.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn repeats_then_exhausts() {
    let mut input = ImageFileInput::new(RgbFrame::with_shape(2, 3), 2);
    assert!(input.read().is_ok());
    assert!(input.read().is_ok());
    assert!(matches!(input.read(), Err(InputError::Exhausted)));
  }

  #[test]
  fn loads_image_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("still.png");
    RgbImage::from_pixel(4, 2, Rgb([1, 2, 3])).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}?repeat=3", path.display())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    let frame = input.read().unwrap();
    assert_eq!((frame.width(), frame.height()), (4, 2));
    assert_eq!(frame.pixel(3, 1), [1, 2, 3]);
    assert_eq!(input.remaining, 2);
  }
}
