// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/error.rs - 错误定义
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

use crate::{input::InputError, model::TensorShapeError, output::OutputError};

/// 检测流程的错误类型
///
/// `InvalidInput` 与 `Configuration` 在循环开始前抛出；
/// `Capture` 与 `Inference` 会终止帧循环。
#[derive(Error, Debug)]
pub enum Error {
  #[error("输入无效: {0}")]
  InvalidInput(String),
  #[error("帧获取失败: {0}")]
  Capture(#[from] InputError),
  #[error("推理失败: {0}")]
  Inference(Box<dyn std::error::Error + Send + Sync>),
  #[error("配置错误: {0}")]
  Configuration(String),
  #[error("输出错误: {0}")]
  Output(#[from] OutputError),
}

impl Error {
  pub fn invalid(msg: impl Into<String>) -> Self {
    Error::InvalidInput(msg.into())
  }

  pub fn config(msg: impl Into<String>) -> Self {
    Error::Configuration(msg.into())
  }

  pub fn inference<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    Error::Inference(Box::new(err))
  }
}

impl From<TensorShapeError> for Error {
  fn from(err: TensorShapeError) -> Self {
    Error::InvalidInput(err.to_string())
  }
}
