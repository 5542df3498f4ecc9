// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame};

/// 帧来源：每次调用阻塞读取一帧
pub trait FrameSource {
  fn read(&mut self) -> Result<RgbFrame, InputError>;
}

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

mod image_folder;
pub use self::image_folder::{ImageFolderInput, ImageFolderInputError};

#[cfg(feature = "v4l_input")]
mod v4l_input;
#[cfg(feature = "v4l_input")]
pub use self::v4l_input::{V4lInput, V4lInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("输入源已耗尽")]
  Exhausted,
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Image folder input error: {0}")]
  ImageFolderInputError(#[from] ImageFolderInputError),
  #[cfg(feature = "v4l_input")]
  #[error("V4L input error: {0}")]
  V4lInputError(#[from] V4lInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ImageFolder(ImageFolderInput),
  #[cfg(feature = "v4l_input")]
  V4l(V4lInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      ImageFolderInput::SCHEME => Ok(InputWrapper::ImageFolder(ImageFolderInput::from_url(url)?)),
      #[cfg(feature = "v4l_input")]
      V4lInput::SCHEME => Ok(InputWrapper::V4l(V4lInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl FrameSource for InputWrapper {
  fn read(&mut self) -> Result<RgbFrame, InputError> {
    match self {
      InputWrapper::ReadImageFile(input) => input.read(),
      InputWrapper::ImageFolder(input) => input.read(),
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.read(),
    }
  }
}
