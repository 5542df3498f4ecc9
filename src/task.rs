// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/task.rs - 帧循环任务
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

use std::{
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::{
  Error,
  fps::FpsCounter,
  frame::RgbFrame,
  input::FrameSource,
  model::Model,
  output::{Render, draw::Annotator},
  pipeline::Detector,
};

const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

/// 帧循环所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  WaitingFrame,
  Preprocessing,
  Inferring,
  Decoding,
  Filtering,
  Rescaling,
  Annotating,
  Displaying,
  Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
  /// 收到中断信号
  Interrupted,
  /// 输出端请求退出
  QuitRequested,
  /// 达到指定帧数
  FrameLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
  pub frames: usize,
  pub detections: usize,
  pub skipped: usize,
  pub stop_reason: StopReason,
}

/// 逐帧读取、检测并输出，直到收到停止信号或输入失败
#[derive(Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  stop_signal: Option<Receiver<()>>,
  state: LoopState,
  fps: FpsCounter,
  frames: usize,
  detections: usize,
  skipped: usize,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      frame_number: None,
      stop_signal: None,
      state: LoopState::WaitingFrame,
      fps: FpsCounter::default(),
      frames: 0,
      detections: 0,
      skipped: 0,
    }
  }
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_stop_signal(mut self, stop_signal: Receiver<()>) -> Self {
    self.stop_signal = Some(stop_signal);
    self
  }

  /// 注册 Ctrl-C 处理；第二阶段在 30 秒后强制退出进程
  pub fn with_ctrlc_handler(self) -> Result<Self, Error> {
    let (tx, rx) = mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .map_err(|e| Error::config(format!("无法设置 Ctrl-C 处理器: {}", e)))?;

    Ok(self.with_stop_signal(rx))
  }

  pub fn state(&self) -> LoopState {
    self.state
  }

  /// 已输出的帧数
  pub fn frames(&self) -> usize {
    self.frames
  }

  fn transition(&mut self, state: LoopState) {
    debug!("{:?} -> {:?}", self.state, state);
    self.state = state;
  }

  fn stop_reason<O: Render>(&mut self, output: &mut O) -> Option<StopReason> {
    if self.frame_number.is_some_and(|n| self.frames + self.skipped >= n) {
      info!("达到指定帧数 {}, 退出任务循环", self.frames + self.skipped);
      return Some(StopReason::FrameLimit);
    }
    if output.quit_requested() {
      info!("输出端请求退出");
      return Some(StopReason::QuitRequested);
    }
    if let Some(rx) = &self.stop_signal
      && rx.try_recv().is_ok()
    {
      warn!("中断信号接收，退出任务循环");
      return Some(StopReason::Interrupted);
    }
    None
  }

  fn report(&self, stop_reason: StopReason) -> TaskReport {
    TaskReport {
      frames: self.frames,
      detections: self.detections,
      skipped: self.skipped,
      stop_reason,
    }
  }

  /// 单帧处理，返回检测数量
  fn process_frame<M, O>(
    &mut self,
    mut frame: RgbFrame,
    detector: &mut Detector<M>,
    annotator: &Annotator,
    output: &mut O,
  ) -> Result<usize, Error>
  where
    M: Model,
    O: Render,
    O::Error: Into<Error>,
  {
    self.transition(LoopState::Preprocessing);
    let (boxed, input) = detector.preprocess(&frame)?;

    self.transition(LoopState::Inferring);
    let started = Instant::now();
    let raw = detector.infer(&input)?;
    debug!("推理完成，耗时: {:.2?}", started.elapsed());

    self.transition(LoopState::Decoding);
    let candidates = detector.decode(&raw)?;

    self.transition(LoopState::Filtering);
    let kept = detector.filter(candidates);

    self.transition(LoopState::Rescaling);
    let detections = detector.rescale(&kept, &boxed);

    self.transition(LoopState::Annotating);
    if output.wants_annotation() {
      annotator.annotate(&mut frame, &detections);
    }

    self.transition(LoopState::Displaying);
    output
      .render_result(&frame, &detections)
      .map_err(Into::into)?;

    Ok(detections.len())
  }

  pub fn run<S, M, O>(
    &mut self,
    source: &mut S,
    detector: &mut Detector<M>,
    annotator: &Annotator,
    output: &mut O,
  ) -> Result<TaskReport, Error>
  where
    S: FrameSource,
    M: Model,
    O: Render,
    O::Error: Into<Error>,
  {
    info!("开始任务...");
    self.fps = FpsCounter::new(Instant::now());

    loop {
      if let Some(reason) = self.stop_reason(output) {
        self.transition(LoopState::Stopped);
        info!("任务完成，共处理 {} 帧", self.frames);
        return Ok(self.report(reason));
      }

      self.transition(LoopState::WaitingFrame);
      let frame = match source.read() {
        Ok(frame) => frame,
        Err(e) => {
          self.transition(LoopState::Stopped);
          info!("无法获取帧，退出任务循环: {}", e);
          return Err(Error::Capture(e));
        }
      };

      match self.process_frame(frame, detector, annotator, output) {
        Ok(count) => {
          self.frames += 1;
          self.detections += count;
          if count > 0 {
            info!("第 {} 帧检测到 {} 个目标", self.frames, count);
          }
        }
        Err(Error::Inference(e)) if detector.config().skip_failed_inference => {
          self.skipped += 1;
          warn!("推理失败，跳过该帧: {}", e);
        }
        Err(e) => {
          self.transition(LoopState::Stopped);
          error!("帧处理失败: {}", e);
          return Err(e);
        }
      }

      if let Some(fps) = self.fps.tick(Instant::now()) {
        info!("FPS: {:.2}", fps);
      }
    }
  }
}
