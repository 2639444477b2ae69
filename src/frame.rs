// 该文件是 Leafscope（叶镜）项目的一部分。
// src/frame.rs - 帧定义
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

use image::RgbImage;

/// 已解码的一帧图像
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 像素
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 来源文件路径
  pub source: PathBuf,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, source: impl Into<PathBuf>) -> Self {
    Self {
      image,
      index,
      source: source.into(),
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn source(&self) -> &Path {
    &self.source
  }

  /// 来源文件名（不含扩展名），无来源时用帧索引
  pub fn stem(&self) -> String {
    self
      .source
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| format!("frame_{:06}", self.index))
  }
}
