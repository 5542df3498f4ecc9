// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/main.rs - 实时检测主程序
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

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use gigi::{
  Error, FromUrl,
  config::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_SIZE, DEFAULT_IOU_THRESHOLD, DetectorConfig,
    LabelTable,
  },
  frame::ChannelOrder,
  input::{InputError, InputWrapper},
  model::ModelWrapper,
  output::{
    OutputWrapper,
    draw::{Annotator, load_font},
  },
  pipeline::Detector,
  postprocess::NmsConfig,
  task::ContinuousTask,
};

/// Gigi 牙面实时检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型来源，例如 onnx:///models/best.onnx 或 replay:///tmp/out.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 v4l:///dev/video0 或 folder:///data/images
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出方式
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,

  /// 模型输入边长
  #[arg(long, default_value_t = DEFAULT_INPUT_SIZE)]
  pub input_size: u32,
  /// 置信度阈值
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
  pub confidence: f32,
  /// NMS 的 IoU 阈值
  #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD)]
  pub iou_threshold: f32,
  /// NMS 的分数阈值，默认与置信度阈值相同
  #[arg(long)]
  pub nms_score_threshold: Option<f32>,
  /// 只在同类别之间做 NMS
  #[arg(long)]
  pub class_aware_nms: bool,
  /// 模型输入通道顺序
  #[arg(long, value_enum, default_value_t = ChannelOrder::Rgb)]
  pub channel_order: ChannelOrder,

  /// 标签与颜色表（TOML）
  #[arg(long, value_name = "LABELS")]
  pub labels: Option<PathBuf>,
  /// 标注文字使用的字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 推理失败时跳过该帧
  #[arg(long)]
  pub skip_failed_inference: bool,
}

impl Args {
  fn detector_config(&self) -> DetectorConfig {
    DetectorConfig {
      input_size: self.input_size,
      confidence_threshold: self.confidence,
      nms: NmsConfig {
        score_threshold: self.nms_score_threshold.unwrap_or(self.confidence),
        iou_threshold: self.iou_threshold,
        class_aware: self.class_aware_nms,
      },
      channel_order: self.channel_order,
      skip_failed_inference: self.skip_failed_inference,
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型来源: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出方式: {}", args.output);

  let config = args.detector_config();
  config.validate().context("检测参数无效")?;

  let labels = match &args.labels {
    Some(path) => LabelTable::from_toml_file(path).context("无法加载标签表")?,
    None => LabelTable::default(),
  };
  info!("共 {} 个类别", labels.len());

  let mut annotator = Annotator::new(labels.clone());
  if let Some(path) = &args.font {
    annotator = annotator.with_font(load_font(path)?);
  }

  let model = ModelWrapper::open(&args.model, config.input_size).context("无法加载模型")?;
  let mut detector = Detector::new(model, config, labels)?;
  let mut input = InputWrapper::from_url(&args.input).context("无法打开输入")?;
  let mut output = OutputWrapper::from_url(&args.output).context("无法创建输出")?;

  let mut task = ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_ctrlc_handler()?;

  match task.run(&mut input, &mut detector, &annotator, &mut output) {
    Ok(report) => {
      info!(
        "任务结束 ({:?}): {} 帧, {} 个目标, 跳过 {} 帧",
        report.stop_reason, report.frames, report.detections, report.skipped
      );
      Ok(())
    }
    Err(Error::Capture(InputError::Exhausted)) => {
      info!("输入已读完，共处理 {} 帧", task.frames());
      Ok(())
    }
    Err(e) => {
      warn!("任务异常结束: {}", e);
      Err(e.into())
    }
  }
}
