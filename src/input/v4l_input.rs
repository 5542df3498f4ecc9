// 该文件是 Gigi （牙面实时检测） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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
use tracing::{error, info};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  input::{FrameSource, InputError},
  url_path, url_query,
};

const V4L_DEFAULT_DEVICE: &str = "/dev/video0";
const V4L_BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Invalid query parameter: {0}")]
  InvalidQuery(String),
  #[error("Unsupported pixel format: {0}")]
  UnsupportedPixelFormat(String),
  #[error("Captured buffer size mismatch: expected {expected}, found {found}")]
  BufferSizeMismatch { expected: usize, found: usize },
  #[error("MJPG decode error: {0}")]
  DecodeError(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy)]
enum PixelFormat {
  Rgb3,
  Yuyv,
  Mjpg,
}

/// `v4l:///dev/video0?width=640&height=480`
pub struct V4lInput {
  stream: Stream<'static>,
  width: usize,
  height: usize,
  pixel_format: PixelFormat,
}

fn parse_dimension(url: &Url, key: &str) -> Result<Option<u32>, V4lInputError> {
  url_query(url, key)
    .map(|v| {
      v.parse()
        .map_err(|_| V4lInputError::InvalidQuery(format!("{}={}", key, v)))
    })
    .transpose()
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemaMismatch);
    }

    let device_path = url_path(url).unwrap_or_else(|| V4L_DEFAULT_DEVICE.into());
    let device = Device::with_path(&device_path)?;

    let mut format = device.format()?;
    let width = parse_dimension(url, "width")?;
    let height = parse_dimension(url, "height")?;
    if width.is_some() || height.is_some() {
      format.width = width.unwrap_or(format.width);
      format.height = height.unwrap_or(format.height);
      format = device.set_format(&format)?;
    }

    let pixel_format = if format.fourcc == FourCC::new(b"RGB3") {
      PixelFormat::Rgb3
    } else if format.fourcc == FourCC::new(b"YUYV") {
      PixelFormat::Yuyv
    } else if format.fourcc == FourCC::new(b"MJPG") {
      PixelFormat::Mjpg
    } else {
      return Err(V4lInputError::UnsupportedPixelFormat(format.fourcc.to_string()));
    };

    info!(
      "打开摄像头 {}: {}x{} {}",
      device_path.display(),
      format.width,
      format.height,
      format.fourcc
    );

    let stream = Stream::with_buffers(&device, Type::VideoCapture, V4L_BUFFER_COUNT)?;

    Ok(V4lInput {
      stream,
      width: format.width as usize,
      height: format.height as usize,
      pixel_format,
    })
  }
}

impl V4lInput {
  fn capture_frame(&mut self) -> Result<RgbFrame, V4lInputError> {
    let (buf, meta) = self.stream.next()?;
    let used = (meta.bytesused as usize).min(buf.len());
    let data = &buf[..used];

    match self.pixel_format {
      PixelFormat::Rgb3 => {
        let expected = self.width * self.height * 3;
        if data.len() < expected {
          return Err(V4lInputError::BufferSizeMismatch {
            expected,
            found: data.len(),
          });
        }
        RgbFrame::from_raw(self.height, self.width, data[..expected].to_vec()).map_err(|_| {
          V4lInputError::BufferSizeMismatch {
            expected,
            found: data.len(),
          }
        })
      }
      PixelFormat::Yuyv => {
        let expected = self.width * self.height * 2;
        if data.len() < expected {
          return Err(V4lInputError::BufferSizeMismatch {
            expected,
            found: data.len(),
          });
        }
        Ok(yuyv_to_rgb(&data[..expected], self.height, self.width))
      }
      PixelFormat::Mjpg => {
        let image = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?;
        Ok(RgbFrame::from(image.to_rgb8()))
      }
    }
  }
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
  let y = y as f32;
  let u = u as f32 - 128.0;
  let v = v as f32 - 128.0;
  let r = y + 1.402 * v;
  let g = y - 0.344_136 * u - 0.714_136 * v;
  let b = y + 1.772 * u;
  [
    r.clamp(0.0, 255.0) as u8,
    g.clamp(0.0, 255.0) as u8,
    b.clamp(0.0, 255.0) as u8,
  ]
}

fn yuyv_to_rgb(data: &[u8], height: usize, width: usize) -> RgbFrame {
  let mut frame = RgbFrame::with_shape(height, width);
  let out = frame.as_mut();

  // 每 4 字节 (Y0 U Y1 V) 对应两个像素
  for (i, chunk) in data.chunks_exact(4).enumerate() {
    let [y0, u, y1, v] = [chunk[0], chunk[1], chunk[2], chunk[3]];
    out[i * 6..i * 6 + 3].copy_from_slice(&yuv_to_rgb(y0, u, v));
    out[i * 6 + 3..i * 6 + 6].copy_from_slice(&yuv_to_rgb(y1, u, v));
  }
  frame
}

impl FrameSource for V4lInput {
  fn read(&mut self) -> Result<RgbFrame, InputError> {
    self.capture_frame().map_err(|e| {
      error!("Failed to capture frame: {}", e);
      InputError::from(e)
    })
  }
}
