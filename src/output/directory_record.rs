// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::PathBuf;

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::RgbFrame, output::Render, postprocess::Detection, url_path,
  url_query,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("缺少目录路径")]
  MissingPath,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每帧写入 `<目录>/<年>/<月>/<日>/<时-分-秒>-<序号>.png`
///
/// `folder:///data/record?always`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: u16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let directory = url_path(uri).ok_or(DirectoryRecordOutputError::MissingPath)?;
    let always = url_query(uri, "always").is_some();

    Ok(DirectoryRecordOutput::new(directory).always(always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      frame_counter: 0,
      always: false,
    }
  }

  /// 为真时没有检测结果的帧也会保存
  pub fn always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  fn frame_id(&mut self) -> u16 {
    self.frame_counter = self.frame_counter.wrapping_add(1);
    self.frame_counter
  }

  fn frame_path(&mut self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &mut self,
    frame: &RgbFrame,
    detections: &[Detection],
  ) -> Result<(), Self::Error> {
    if !self.always && detections.is_empty() {
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    frame.to_rgb_image().save(&path)?;
    debug!("记录帧: {}", path.display());
    Ok(())
  }
}
