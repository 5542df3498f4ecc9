// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/config.rs - 检测参数与类别标签表
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

use std::{collections::HashMap, path::Path};

use serde::Deserialize;
use tracing::info;

use crate::{Error, frame::ChannelOrder, postprocess::NmsConfig};

pub const DEFAULT_INPUT_SIZE: u32 = 160;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;

/// 检测流程参数
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
  /// 正方形画布边长
  pub input_size: u32,
  /// 解码阶段的置信度阈值
  pub confidence_threshold: f32,
  pub nms: NmsConfig,
  pub channel_order: ChannelOrder,
  /// 推理失败时跳过该帧而不是终止循环
  pub skip_failed_inference: bool,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      input_size: DEFAULT_INPUT_SIZE,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      nms: NmsConfig {
        score_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        iou_threshold: DEFAULT_IOU_THRESHOLD,
        class_aware: false,
      },
      channel_order: ChannelOrder::default(),
      skip_failed_inference: false,
    }
  }
}

fn check_unit_range(name: &str, value: f32) -> Result<(), Error> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(Error::config(format!("{} 必须在 [0, 1] 内, 实际为 {}", name, value)))
  }
}

impl DetectorConfig {
  pub fn validate(&self) -> Result<(), Error> {
    if self.input_size == 0 {
      return Err(Error::config("input_size 必须为正整数"));
    }
    check_unit_range("confidence_threshold", self.confidence_threshold)?;
    check_unit_range("nms.score_threshold", self.nms.score_threshold)?;
    check_unit_range("nms.iou_threshold", self.nms.iou_threshold)?;
    Ok(())
  }
}

/// 一个类别的显示名称与 RGB 颜色
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
  pub name: String,
  pub color: [u8; 3],
}

/// 有序的类别标签表，下标即类别编号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  labels: Box<[ClassLabel]>,
}

/// 标签文件格式
///
/// ```toml
/// labels = ["normal", "stain"]
///
/// [colors]
/// normal = [0, 255, 0]
/// stain = [128, 0, 128]
/// ```
#[derive(Debug, Deserialize)]
struct LabelFile {
  labels: Vec<String>,
  colors: HashMap<String, [u8; 3]>,
}

impl Default for LabelTable {
  fn default() -> Self {
    let labels = [
      ("normal", [0, 255, 0]),
      ("karies kecil", [255, 255, 0]),
      ("karies sedang", [0, 0, 255]),
      ("karies besar", [255, 0, 0]),
      ("stain", [128, 0, 128]),
      ("karang gigi", [255, 165, 0]),
      ("lain-lain", [128, 128, 128]),
    ];

    Self {
      labels: labels
        .into_iter()
        .map(|(name, color)| ClassLabel {
          name: name.to_string(),
          color,
        })
        .collect(),
    }
  }
}

impl LabelTable {
  pub fn new(labels: Vec<ClassLabel>) -> Result<Self, Error> {
    if labels.is_empty() {
      return Err(Error::config("标签表不能为空"));
    }
    for (i, label) in labels.iter().enumerate() {
      if label.name.trim().is_empty() {
        return Err(Error::config(format!("第 {} 个标签名称为空", i)));
      }
      if labels[..i].iter().any(|l| l.name == label.name) {
        return Err(Error::config(format!("标签重复: {}", label.name)));
      }
    }

    Ok(Self {
      labels: labels.into_boxed_slice(),
    })
  }

  /// 由有序标签与标签到颜色的映射构造，映射必须覆盖每个标签
  pub fn from_parts(names: Vec<String>, colors: &HashMap<String, [u8; 3]>) -> Result<Self, Error> {
    let labels = names
      .into_iter()
      .map(|name| match colors.get(&name) {
        Some(&color) => Ok(ClassLabel { name, color }),
        None => Err(Error::config(format!("标签 '{}' 缺少颜色", name))),
      })
      .collect::<Result<Vec<_>, _>>()?;
    Self::new(labels)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, Error> {
    let file: LabelFile =
      toml::from_str(content).map_err(|e| Error::config(format!("标签文件解析失败: {}", e)))?;
    Self::from_parts(file.labels, &file.colors)
  }

  pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let content = std::fs::read_to_string(path)
      .map_err(|e| Error::config(format!("无法读取标签文件 {}: {}", path.display(), e)))?;
    Self::from_toml_str(&content)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn get(&self, class_id: usize) -> Option<&ClassLabel> {
    self.labels.get(class_id)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, ClassLabel> {
    self.labels.iter()
  }

  /// 模型类别数必须与标签数一致
  pub fn check_class_count(&self, num_classes: usize) -> Result<(), Error> {
    if num_classes != self.labels.len() {
      return Err(Error::invalid(format!(
        "模型类别数 {} 与标签数 {} 不一致",
        num_classes,
        self.labels.len()
      )));
    }
    Ok(())
  }
}
