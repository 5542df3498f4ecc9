// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理后端
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

use ort::{session::Session, value::Tensor};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Model, ModelInput, RawOutput, TensorShapeError},
  url_path, url_query,
};

const ONNX_DEFAULT_WARMUP: usize = 10;
const ONNX_DEFAULT_INPUT_SIZE: usize = 160;

#[derive(Error, Debug)]
pub enum OnnxModelError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("{0}")]
  TensorShape(#[from] TensorShapeError),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
}

pub struct OnnxModelBuilder {
  model_path: PathBuf,
  warmup: usize,
  input_size: usize,
}

impl FromUrlWithScheme for OnnxModelBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxModelBuilder {
  type Error = OnnxModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let model_path = url_path(url)
      .ok_or_else(|| OnnxModelError::ModelPathError("缺少模型文件路径".to_string()))?;
    let warmup = match url_query(url, "warmup") {
      Some(v) => v
        .parse()
        .map_err(|_| OnnxModelError::ModelPathError(format!("warmup 参数无效: {}", v)))?,
      None => ONNX_DEFAULT_WARMUP,
    };

    Ok(OnnxModelBuilder {
      model_path,
      warmup,
      input_size: ONNX_DEFAULT_INPUT_SIZE,
    })
  }
}

impl OnnxModelBuilder {
  pub fn warmup(mut self, warmup: usize) -> Self {
    self.warmup = warmup;
    self
  }

  pub fn input_size(mut self, input_size: usize) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn build(self) -> Result<OnnxModel, OnnxModelError> {
    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()?.commit_from_file(&self.model_path)?;

    let input_name = match session.inputs.first() {
      Some(input) => input.name.clone(),
      None => {
        error!("模型没有输入");
        return Err(OnnxModelError::ModelInvalid("模型没有输入".to_string()));
      }
    };
    debug!("模型输入名称: {}", input_name);
    debug!("模型输出数量: {}", session.outputs.len());

    let mut model = OnnxModel {
      session,
      input_name,
      num_classes: None,
    };

    // 首几次推理较慢，先用全零输入预热；至少运行一次以得到输出类别数
    let zeros = ModelInput::zeros(self.input_size);
    let runs = self.warmup.max(1);
    for i in 0..runs {
      debug!("预热推理 {}/{}", i + 1, runs);
      let output = model.infer(&zeros)?;
      model.num_classes = Some(output.num_classes());
    }
    info!("模型加载完成，类别数: {:?}", model.num_classes);

    Ok(model)
  }
}

pub struct OnnxModel {
  session: Session,
  input_name: String,
  num_classes: Option<usize>,
}

impl Model for OnnxModel {
  type Error = OnnxModelError;

  fn infer(&mut self, input: &ModelInput) -> Result<RawOutput, Self::Error> {
    let tensor = Tensor::from_array((input.shape(), input.as_slice().to_vec()))?;
    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => tensor])?;

    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    debug!("模型输出形状: {:?}", dims);

    Ok(RawOutput::from_model_output(&dims, data.to_vec())?)
  }

  fn num_classes(&self) -> Option<usize> {
    self.num_classes
  }
}
