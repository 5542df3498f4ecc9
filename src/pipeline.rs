// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/pipeline.rs - 单帧检测流程
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

use tracing::debug;

use crate::{
  Error,
  config::{DetectorConfig, LabelTable},
  frame::RgbFrame,
  letterbox::{Letterbox, letterbox},
  model::{Model, ModelInput, RawOutput},
  postprocess::{Candidate, Detection, decode, rescale_all},
};

/// letterbox → 推理 → 解码 → NMS → 坐标还原
///
/// 各阶段单独暴露，帧循环按阶段推进并记录状态。
pub struct Detector<M> {
  model: M,
  config: DetectorConfig,
  labels: LabelTable,
}

impl<M> Detector<M>
where
  M: Model,
{
  /// 校验参数；模型报告类别数时同时校验标签表
  pub fn new(model: M, config: DetectorConfig, labels: LabelTable) -> Result<Self, Error> {
    config.validate()?;
    if let Some(num_classes) = model.num_classes() {
      labels.check_class_count(num_classes)?;
    }
    Ok(Self {
      model,
      config,
      labels,
    })
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn preprocess(&self, frame: &RgbFrame) -> Result<(Letterbox, ModelInput), Error> {
    let boxed = letterbox(frame, self.config.input_size)?;
    let input = ModelInput::from_canvas(boxed.canvas(), self.config.channel_order)?;
    Ok((boxed, input))
  }

  pub fn infer(&mut self, input: &ModelInput) -> Result<RawOutput, Error> {
    self.model.infer(input).map_err(Error::inference)
  }

  pub fn decode(&self, raw: &RawOutput) -> Result<Vec<Candidate>, Error> {
    self.labels.check_class_count(raw.num_classes())?;
    Ok(decode(raw, self.config.confidence_threshold))
  }

  pub fn filter(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
    self.config.nms.apply(candidates)
  }

  pub fn rescale(&self, candidates: &[Candidate], boxed: &Letterbox) -> Vec<Detection> {
    rescale_all(candidates, boxed.scale())
  }

  /// 一次完成整帧检测，返回原图坐标下的结果
  pub fn detect(&mut self, frame: &RgbFrame) -> Result<Vec<Detection>, Error> {
    let (boxed, input) = self.preprocess(frame)?;
    let raw = self.infer(&input)?;
    let candidates = self.decode(&raw)?;
    let kept = self.filter(candidates);
    let detections = self.rescale(&kept, &boxed);
    debug!("检测到 {} 个目标", detections.len());
    Ok(detections)
  }
}
