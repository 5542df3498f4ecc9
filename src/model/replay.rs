// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/model/replay.rs - 回放预先录制的模型输出
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

//! 从 JSON 文件读取录制好的原始输出张量，并按顺序循环返回。
//!
//! 文件内容可以是单个张量，也可以是张量数组：
//!
//! ```json
//! { "layout": "rows", "shape": [1, 7], "data": [80, 80, 40, 40, 0.1, 0.2, 0.9] }
//! ```
//!
//! `layout` 为 `rows` 时 `shape` 是 `[N, 4 + C]`；
//! 为 `channels_first` 时 `shape` 是 `[4 + C, N]`。

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Model, ModelInput, RawOutput, TensorShapeError},
  url_path,
};

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("缺少文件路径")]
  MissingPath,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("{0}")]
  TensorShape(#[from] TensorShapeError),
  #[error("没有可回放的张量")]
  Empty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
  #[default]
  Rows,
  ChannelsFirst,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedTensor {
  #[serde(default)]
  pub layout: TensorLayout,
  pub shape: [usize; 2],
  pub data: Vec<f32>,
}

impl TryFrom<RecordedTensor> for RawOutput {
  type Error = TensorShapeError;

  fn try_from(tensor: RecordedTensor) -> Result<Self, Self::Error> {
    let [a, b] = tensor.shape;
    match tensor.layout {
      TensorLayout::Rows => RawOutput::from_rows(a, b, tensor.data),
      TensorLayout::ChannelsFirst => RawOutput::from_channels_first(a, b, tensor.data),
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayFile {
  Many(Vec<RecordedTensor>),
  One(RecordedTensor),
}

pub struct ReplayModel {
  outputs: Vec<RawOutput>,
  cursor: usize,
}

impl ReplayModel {
  pub fn new(outputs: Vec<RawOutput>) -> Result<Self, ReplayModelError> {
    if outputs.is_empty() {
      return Err(ReplayModelError::Empty);
    }
    Ok(Self { outputs, cursor: 0 })
  }

  pub fn from_json_str(json: &str) -> Result<Self, ReplayModelError> {
    let tensors = match serde_json::from_str::<ReplayFile>(json)? {
      ReplayFile::Many(tensors) => tensors,
      ReplayFile::One(tensor) => vec![tensor],
    };

    let outputs = tensors
      .into_iter()
      .map(RawOutput::try_from)
      .collect::<Result<Vec<_>, _>>()?;
    Self::new(outputs)
  }

  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModel {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayModelError::SchemeMismatch);
    }

    let path = url_path(url).ok_or(ReplayModelError::MissingPath)?;
    info!("加载回放张量文件: {}", path.display());
    let json = std::fs::read_to_string(&path)?;
    let model = Self::from_json_str(&json)?;
    info!("回放张量数量: {}", model.len());
    Ok(model)
  }
}

impl Model for ReplayModel {
  type Error = ReplayModelError;

  fn infer(&mut self, input: &ModelInput) -> Result<RawOutput, Self::Error> {
    debug!("回放第 {} 个张量, 输入形状 {:?}", self.cursor, input.shape());
    let output = self.outputs[self.cursor].clone();
    self.cursor = (self.cursor + 1) % self.outputs.len();
    Ok(output)
  }

  fn num_classes(&self) -> Option<usize> {
    self.outputs.first().map(RawOutput::num_classes)
  }
}
