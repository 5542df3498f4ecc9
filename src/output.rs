// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, postprocess::Detection};

/// 展示已标注的帧
pub trait Render {
  type Error;

  fn render_result(&mut self, frame: &RgbFrame, detections: &[Detection])
  -> Result<(), Self::Error>;

  /// 为假时收到未标注的原始帧
  fn wants_annotation(&self) -> bool {
    true
  }

  /// 每帧轮询一次的退出请求
  fn quit_requested(&mut self) -> bool {
    false
  }
}

pub mod draw;

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

mod directory_record;
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

mod log_output;
pub use self::log_output::{LogOutput, LogOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("日志输出错误: {0}")]
  LogOutputError(#[from] LogOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  SaveImageFileOutput(SaveImageFileOutput),
  DirectoryRecordOutput(DirectoryRecordOutput),
  LogOutput(LogOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      LogOutput::SCHEME => Ok(OutputWrapper::LogOutput(LogOutput::from_url(url)?)),
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &mut self,
    frame: &RgbFrame,
    detections: &[Detection],
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, detections)
        .map_err(OutputError::from),
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, detections)
        .map_err(OutputError::from),
      OutputWrapper::LogOutput(output) => output
        .render_result(frame, detections)
        .map_err(OutputError::from),
    }
  }

  fn wants_annotation(&self) -> bool {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => output.wants_annotation(),
      OutputWrapper::DirectoryRecordOutput(output) => output.wants_annotation(),
      OutputWrapper::LogOutput(output) => output.wants_annotation(),
    }
  }

  fn quit_requested(&mut self) -> bool {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => output.quit_requested(),
      OutputWrapper::DirectoryRecordOutput(output) => output.quit_requested(),
      OutputWrapper::LogOutput(output) => output.quit_requested(),
    }
  }
}
