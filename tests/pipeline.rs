// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// tests/pipeline.rs - 检测流程集成测试
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

use std::io;

use gigi::{
  Error, FromUrl,
  config::{DetectorConfig, LabelTable},
  frame::RgbFrame,
  input::{FrameSource, ImageFileInput, InputError},
  model::{Model, ModelInput, RawOutput, ReplayModel},
  output::{OutputError, Render, draw::Annotator},
  pipeline::Detector,
  postprocess::Detection,
  task::{ContinuousTask, LoopState, StopReason},
};
use url::Url;

const REPLAY_ONE_ROW: &str = r#"{
  "layout": "rows",
  "shape": [1, 11],
  "data": [80.0, 80.0, 40.0, 40.0, 0.1, 0.2, 0.9, 0.0, 0.0, 0.0, 0.0]
}"#;

struct Recorder {
  frames: Vec<RgbFrame>,
  detections: Vec<Vec<Detection>>,
  annotate: bool,
}

impl Recorder {
  fn new(annotate: bool) -> Self {
    Self {
      frames: Vec::new(),
      detections: Vec::new(),
      annotate,
    }
  }
}

impl Render for Recorder {
  type Error = OutputError;

  fn render_result(&mut self, frame: &RgbFrame, detections: &[Detection]) -> Result<(), Self::Error> {
    self.frames.push(frame.clone());
    self.detections.push(detections.to_vec());
    Ok(())
  }

  fn wants_annotation(&self) -> bool {
    self.annotate
  }
}

/// 第 `fail_on` 次调用失败，其余返回空输出
struct Flaky {
  calls: usize,
  fail_on: usize,
}

impl Model for Flaky {
  type Error = io::Error;

  fn infer(&mut self, _input: &ModelInput) -> Result<RawOutput, Self::Error> {
    self.calls += 1;
    if self.calls == self.fail_on {
      return Err(io::Error::other("backend crashed"));
    }
    Ok(RawOutput::from_rows(0, 11, Vec::new()).unwrap())
  }
}

fn replay_detector() -> Detector<ReplayModel> {
  let model = ReplayModel::from_json_str(REPLAY_ONE_ROW).unwrap();
  Detector::new(model, DetectorConfig::default(), LabelTable::default()).unwrap()
}

fn source(frames: usize) -> ImageFileInput {
  ImageFileInput::new(RgbFrame::with_shape(160, 320), frames)
}

#[test]
fn single_row_maps_to_source_coordinates() {
  let detections = replay_detector()
    .detect(&RgbFrame::with_shape(160, 320))
    .unwrap();

  assert_eq!(
    detections,
    vec![Detection {
      left: 120,
      top: 120,
      width: 80,
      height: 80,
      score: 0.9,
      class_id: 2,
    }]
  );
}

#[test]
fn empty_output_yields_no_detections_and_no_drawing() {
  let model = Flaky {
    calls: 0,
    fail_on: usize::MAX,
  };
  let mut detector = Detector::new(model, DetectorConfig::default(), LabelTable::default()).unwrap();
  let mut recorder = Recorder::new(true);
  let report = ContinuousTask::default()
    .with_frame_number(Some(1))
    .run(
      &mut source(1),
      &mut detector,
      &Annotator::new(LabelTable::default()),
      &mut recorder,
    )
    .unwrap();

  assert_eq!(report.detections, 0);
  assert_eq!(recorder.frames, vec![RgbFrame::with_shape(160, 320)]);
}

#[test]
fn loop_annotates_frames_before_display() {
  let mut recorder = Recorder::new(true);
  let mut task = ContinuousTask::default().with_frame_number(Some(2));
  let report = task
    .run(
      &mut source(10),
      &mut replay_detector(),
      &Annotator::new(LabelTable::default()),
      &mut recorder,
    )
    .unwrap();

  assert_eq!(report.stop_reason, StopReason::FrameLimit);
  assert_eq!(report.frames, 2);
  assert_eq!(report.detections, 2);
  assert_eq!(task.state(), LoopState::Stopped);

  // 框角使用类别 2 的颜色
  let color = LabelTable::default().get(2).unwrap().color;
  assert_eq!(recorder.frames[0].pixel(120, 120), color);
  assert_eq!(recorder.frames[1].pixel(120, 120), color);
}

#[test]
fn raw_frames_reach_outputs_that_skip_annotation() {
  let mut recorder = Recorder::new(false);
  ContinuousTask::default()
    .with_frame_number(Some(1))
    .run(
      &mut source(1),
      &mut replay_detector(),
      &Annotator::new(LabelTable::default()),
      &mut recorder,
    )
    .unwrap();

  assert_eq!(recorder.frames[0], RgbFrame::with_shape(160, 320));
  assert_eq!(recorder.detections[0].len(), 1);
}

#[test]
fn label_count_must_match_model_classes_before_the_loop() {
  let labels = LabelTable::from_toml_str(
    r#"
      labels = ["tooth", "plaque"]
      [colors]
      tooth = [255, 255, 255]
      plaque = [255, 255, 0]
    "#,
  )
  .unwrap();
  let model = ReplayModel::from_json_str(REPLAY_ONE_ROW).unwrap();
  let mut input = source(3);

  assert!(matches!(
    Detector::new(model, DetectorConfig::default(), labels),
    Err(Error::InvalidInput(_))
  ));
  // 构造失败时输入源一帧都没有被读取
  for _ in 0..3 {
    assert!(input.read().is_ok());
  }
  assert!(matches!(input.read(), Err(InputError::Exhausted)));
}

#[test]
fn inference_failure_is_fatal_by_default() {
  let model = Flaky {
    calls: 0,
    fail_on: 2,
  };
  let mut detector = Detector::new(model, DetectorConfig::default(), LabelTable::default()).unwrap();
  let mut task = ContinuousTask::default();
  let result = task.run(
    &mut source(5),
    &mut detector,
    &Annotator::new(LabelTable::default()),
    &mut Recorder::new(true),
  );

  assert!(matches!(result, Err(Error::Inference(_))));
  assert_eq!(task.frames(), 1);
  assert_eq!(task.state(), LoopState::Stopped);
}

#[test]
fn inference_failure_can_be_skipped() {
  let model = Flaky {
    calls: 0,
    fail_on: 2,
  };
  let config = DetectorConfig {
    skip_failed_inference: true,
    ..DetectorConfig::default()
  };
  let mut detector = Detector::new(model, config, LabelTable::default()).unwrap();
  let mut recorder = Recorder::new(true);
  let mut task = ContinuousTask::default();
  let result = task.run(
    &mut source(3),
    &mut detector,
    &Annotator::new(LabelTable::default()),
    &mut recorder,
  );

  assert!(matches!(result, Err(Error::Capture(InputError::Exhausted))));
  assert_eq!(task.frames(), 2);
  assert_eq!(recorder.frames.len(), 2);
}

#[test]
fn still_image_url_feeds_the_loop() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("mouth.png");
  image::RgbImage::new(320, 160).save(&path).unwrap();

  let url = Url::parse(&format!("image://{}?repeat=2", path.display())).unwrap();
  let mut input = ImageFileInput::from_url(&url).unwrap();
  assert_eq!(input.read().unwrap().width(), 320);
  assert_eq!(input.read().unwrap().height(), 160);
  assert!(matches!(input.read(), Err(InputError::Exhausted)));
}
