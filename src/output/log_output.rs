// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/output/log_output.rs - 日志输出
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
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, output::Render, postprocess::Detection};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 以 JSON 形式把每帧的检测结果写入日志，`log://`
#[derive(Debug, Default)]
pub struct LogOutput {
  frames: u64,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }
    Ok(LogOutput::default())
  }
}

impl LogOutput {
  pub fn frames(&self) -> u64 {
    self.frames
  }
}

impl Render for LogOutput {
  type Error = LogOutputError;

  fn render_result(
    &mut self,
    frame: &RgbFrame,
    detections: &[Detection],
  ) -> Result<(), Self::Error> {
    self.frames += 1;
    let json = serde_json::to_string(detections)?;
    info!(
      "帧 {} ({}x{}): {} 个目标 {}",
      self.frames,
      frame.width(),
      frame.height(),
      detections.len(),
      json
    );
    Ok(())
  }

  fn wants_annotation(&self) -> bool {
    false
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counts_rendered_frames() {
    let url = Url::parse("log://").unwrap();
    let mut output = LogOutput::from_url(&url).unwrap();
    let frame = RgbFrame::with_shape(2, 2);
    output.render_result(&frame, &[]).unwrap();
    output.render_result(&frame, &[]).unwrap();
    assert_eq!(output.frames(), 2);
  }
}
