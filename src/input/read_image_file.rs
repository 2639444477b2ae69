// 该文件是 Leafscope（叶镜）项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, url_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单张图像输入，只产出一帧
pub struct ImageFileInput {
  frame: Option<Frame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Self::open(url_path(url))
  }
}

impl ImageFileInput {
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, ImageFileInputError> {
    let path = path.into();
    let frame = read_frame(&path, 0)?;
    info!(
      "读取图像 {}: {}x{}",
      path.display(),
      frame.width(),
      frame.height()
    );
    Ok(Self { frame: Some(frame) })
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

/// 解码图像文件为 RGB 帧
pub(crate) fn read_frame(path: &Path, index: u64) -> Result<Frame, ImageFileInputError> {
  let image = ImageReader::open(path)?
    .with_guessed_format()?
    .decode()?
    .to_rgb8();
  Ok(Frame::new(image, index, path))
}
