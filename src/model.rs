// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/model.rs - 模型
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

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ChannelOrder, RgbFrame},
};

/// 每个候选框前 4 列为 cx, cy, w, h
pub const BOX_PARAMS: usize = 4;

/// 推理能力：输入画布张量，输出原始检测张量
pub trait Model {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&mut self, input: &ModelInput) -> Result<RawOutput, Self::Error>;

  /// 模型输出的类别数，启动时用于校验标签表；未知时为 `None`
  fn num_classes(&self) -> Option<usize> {
    None
  }
}

#[derive(Error, Debug)]
#[error("张量形状无效: {0}")]
pub struct TensorShapeError(String);

/// 1 x 3 x S x S 的归一化输入张量
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
  size: usize,
  data: Box<[f32]>,
}

impl ModelInput {
  pub fn from_canvas(canvas: &RgbFrame, order: ChannelOrder) -> Result<Self, TensorShapeError> {
    if canvas.width() != canvas.height() {
      return Err(TensorShapeError(format!(
        "画布必须为正方形, 实际为 {}x{}",
        canvas.width(),
        canvas.height()
      )));
    }

    Ok(Self {
      size: canvas.width(),
      data: canvas.to_nchw_f32(order).into_boxed_slice(),
    })
  }

  pub fn zeros(size: usize) -> Self {
    Self {
      size,
      data: vec![0f32; 3 * size * size].into_boxed_slice(),
    }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, 3, self.size, self.size]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

/// N 行、每行 4 + C 列的原始输出张量（行优先）
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  rows: usize,
  cols: usize,
  data: Box<[f32]>,
}

impl RawOutput {
  pub fn from_rows(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, TensorShapeError> {
    if cols <= BOX_PARAMS {
      return Err(TensorShapeError(format!(
        "每行至少需要 {} 列, 实际为 {}",
        BOX_PARAMS + 1,
        cols
      )));
    }
    if data.len() != rows * cols {
      return Err(TensorShapeError(format!(
        "数据长度不匹配: 期望 {}x{}={}, 实际 {}",
        rows,
        cols,
        rows * cols,
        data.len()
      )));
    }

    Ok(Self {
      rows,
      cols,
      data: data.into_boxed_slice(),
    })
  }

  /// 由 (4 + C, N) 排布的数据构造，即 YOLOv8 导出模型的输出格式
  pub fn from_channels_first(
    channels: usize,
    anchors: usize,
    data: Vec<f32>,
  ) -> Result<Self, TensorShapeError> {
    if data.len() != channels * anchors {
      return Err(TensorShapeError(format!(
        "数据长度不匹配: 期望 {}x{}={}, 实际 {}",
        channels,
        anchors,
        channels * anchors,
        data.len()
      )));
    }

    let mut rows = vec![0f32; data.len()];
    for c in 0..channels {
      for a in 0..anchors {
        rows[a * channels + c] = data[c * anchors + a];
      }
    }
    Self::from_rows(anchors, channels, rows)
  }

  /// 去掉前导的单位维度后按 (4 + C, N) 解释模型输出
  pub fn from_model_output(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorShapeError> {
    let dims: Vec<usize> = {
      let first = shape.iter().position(|&d| d != 1).unwrap_or(shape.len());
      shape[first..].to_vec()
    };

    match dims.as_slice() {
      [channels, anchors] => Self::from_channels_first(*channels, *anchors, data),
      _ => Err(TensorShapeError(format!("不支持的输出形状: {:?}", shape))),
    }
  }

  /// 候选框数量 N
  pub fn rows(&self) -> usize {
    self.rows
  }

  /// 类别数量 C
  pub fn num_classes(&self) -> usize {
    self.cols - BOX_PARAMS
  }

  pub fn row(&self, index: usize) -> &[f32] {
    &self.data[index * self.cols..(index + 1) * self.cols]
  }

  pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, f32> {
    self.data.chunks_exact(self.cols)
  }
}

mod replay;
pub use self::replay::{RecordedTensor, ReplayModel, ReplayModelError, TensorLayout};

#[cfg(feature = "onnx_model")]
mod onnx;
#[cfg(feature = "onnx_model")]
pub use self::onnx::{OnnxModel, OnnxModelBuilder, OnnxModelError};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("回放模型错误: {0}")]
  ReplayModelError(#[from] ReplayModelError),
  #[cfg(feature = "onnx_model")]
  #[error("ONNX 模型错误: {0}")]
  OnnxModelError(#[from] OnnxModelError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum ModelWrapper {
  Replay(ReplayModel),
  #[cfg(feature = "onnx_model")]
  Onnx(OnnxModel),
}

impl ModelWrapper {
  /// 按 URL 方案创建模型；`input_size` 用于 ONNX 模型的预热输入
  pub fn open(url: &Url, input_size: u32) -> Result<Self, ModelError> {
    #[cfg(not(feature = "onnx_model"))]
    let _ = input_size;

    match url.scheme() {
      ReplayModel::SCHEME => Ok(ModelWrapper::Replay(ReplayModel::from_url(url)?)),
      #[cfg(feature = "onnx_model")]
      OnnxModelBuilder::SCHEME => {
        let model = OnnxModelBuilder::from_url(url)?
          .input_size(input_size as usize)
          .build()?;
        Ok(ModelWrapper::Onnx(model))
      }
      other => Err(ModelError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Model for ModelWrapper {
  type Error = ModelError;

  fn infer(&mut self, input: &ModelInput) -> Result<RawOutput, Self::Error> {
    match self {
      ModelWrapper::Replay(model) => model.infer(input).map_err(ModelError::from),
      #[cfg(feature = "onnx_model")]
      ModelWrapper::Onnx(model) => model.infer(input).map_err(ModelError::from),
    }
  }

  fn num_classes(&self) -> Option<usize> {
    match self {
      ModelWrapper::Replay(model) => model.num_classes(),
      #[cfg(feature = "onnx_model")]
      ModelWrapper::Onnx(model) => model.num_classes(),
    }
  }
}
