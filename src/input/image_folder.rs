// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/input/image_folder.rs - 图像目录输入
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

use std::{collections::VecDeque, path::PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  input::{FrameSource, InputError},
  url_path,
};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum ImageFolderInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("缺少目录路径")]
  MissingPath,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 按文件名顺序逐张读取目录中的图像
pub struct ImageFolderInput {
  files: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFolderInputError::SchemeMismatch);
    }

    let directory = url_path(url).ok_or(ImageFolderInputError::MissingPath)?;
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);
      if path.is_file() && is_image {
        files.push(path);
      }
    }
    files.sort();

    info!("目录 {} 中共有 {} 张图像", directory.display(), files.len());
    Ok(ImageFolderInput {
      files: files.into(),
    })
  }
}

impl FrameSource for ImageFolderInput {
  fn read(&mut self) -> Result<RgbFrame, InputError> {
    let path = self.files.pop_front().ok_or(InputError::Exhausted)?;
    debug!("读取图像: {}", path.display());
    let image = ImageReader::open(&path)
      .map_err(ImageFolderInputError::from)?
      .decode()
      .map_err(ImageFolderInputError::from)?;
    Ok(RgbFrame::from(image.to_rgb8()))
  }
}
