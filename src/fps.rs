// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/fps.rs - 帧率统计
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

use std::time::{Duration, Instant};

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// 每满一秒计算一次帧率，然后清零
#[derive(Debug, Clone)]
pub struct FpsCounter {
  frames: u32,
  last_reset: Instant,
}

impl FpsCounter {
  pub fn new(now: Instant) -> Self {
    Self {
      frames: 0,
      last_reset: now,
    }
  }

  pub fn frames(&self) -> u32 {
    self.frames
  }

  /// 记录一帧；距离上次清零不少于一秒时返回帧率
  pub fn tick(&mut self, now: Instant) -> Option<f64> {
    self.frames += 1;
    let elapsed = now.saturating_duration_since(self.last_reset);
    if elapsed < FPS_WINDOW {
      return None;
    }

    let fps = self.frames as f64 / elapsed.as_secs_f64();
    self.frames = 0;
    self.last_reset = now;
    Some(fps)
  }
}

impl Default for FpsCounter {
  fn default() -> Self {
    Self::new(Instant::now())
  }
}
