// 该文件是 Leafscope（叶镜）项目的一部分。
// src/input/folder.rs - 目录批量输入
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

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use super::read_image_file::read_frame;
use crate::{FromUrl, FromUrlWithScheme, frame::Frame, url_path};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum FolderInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

/// 目录中的所有图像文件，按文件名排序
pub struct FolderInput {
  files: std::vec::IntoIter<PathBuf>,
  index: u64,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = FolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(FolderInputError::SchemaMismatch);
    }

    Self::open(url_path(url))
  }
}

fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    .unwrap_or(false)
}

impl FolderInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, FolderInputError> {
    let directory = directory.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_image_file(&path) {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中共有 {} 张图像", directory.display(), files.len());

    Ok(Self {
      files: files.into_iter(),
      index: 0,
    })
  }
}

impl Iterator for FolderInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    // 无法解码的文件记录后跳过
    for path in self.files.by_ref() {
      match read_frame(&path, self.index) {
        Ok(frame) => {
          self.index += 1;
          return Some(frame);
        }
        Err(e) => error!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}
