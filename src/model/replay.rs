// 该文件是 Leafscope（叶镜）项目的一部分。
// src/model/replay.rs - 回放检测结果
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
use std::time::Instant;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::{DetectResult, Detection, DetectionError},
  frame::Frame,
  labels::LabelTable,
  model::Model,
  url_path,
};

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("回放目录不存在: {0}")]
  MissingDirectory(PathBuf),
  #[error("找不到检测记录 {0}: {1}")]
  MissingRecord(PathBuf, std::io::Error),
  #[error("检测记录解析失败 {0}: {1}")]
  JsonError(PathBuf, serde_json::Error),
  #[error("检测记录无效 {0}: {1}")]
  InvalidDetection(PathBuf, DetectionError),
  #[error("标签文件读取失败: {0}")]
  LabelError(std::io::Error),
}

/// 检测记录文件可以是完整的 `DetectResult`，也可以只是检测数组
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayRecord {
  Items(Vec<Detection>),
  Full(DetectResult),
}

/// 从目录中读取预先记录的原始检测结果
///
/// 对于来源为 `leaf_01.jpg` 的帧，读取 `<dir>/leaf_01.json`。
pub struct ReplayModel {
  directory: PathBuf,
  labels: LabelTable,
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModel {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayModelError::SchemaMismatch);
    }

    let labels = match url.query_pairs().find(|(k, _)| k == "labels") {
      Some((_, path)) => {
        LabelTable::from_file(path.into_owned()).map_err(ReplayModelError::LabelError)?
      }
      None => LabelTable::default(),
    };
    Self::new(url_path(url), labels)
  }
}

impl ReplayModel {
  pub fn new(directory: impl Into<PathBuf>, labels: LabelTable) -> Result<Self, ReplayModelError> {
    let directory = directory.into();
    if !directory.is_dir() {
      return Err(ReplayModelError::MissingDirectory(directory));
    }
    info!("回放检测目录: {}", directory.display());
    Ok(Self { directory, labels })
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn record_path(&self, frame: &Frame) -> PathBuf {
    self.directory.join(format!("{}.json", frame.stem()))
  }
}

impl Model for ReplayModel {
  type Input = Frame;
  type Output = DetectResult;
  type Error = ReplayModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let start = Instant::now();
    let path = self.record_path(input);
    debug!("读取检测记录: {}", path.display());

    let text = std::fs::read_to_string(&path)
      .map_err(|e| ReplayModelError::MissingRecord(path.clone(), e))?;
    let record: ReplayRecord =
      serde_json::from_str(&text).map_err(|e| ReplayModelError::JsonError(path.clone(), e))?;

    let (mut items, recorded_ms) = match record {
      ReplayRecord::Full(result) => (result.items, Some(result.inference_time_ms)),
      ReplayRecord::Items(items) => (items, None),
    };

    for item in items.iter_mut() {
      item
        .validate()
        .map_err(|e| ReplayModelError::InvalidDetection(path.clone(), e))?;
      if item.class_name.is_empty() {
        item.class_name = self.labels.name(item.class_id).to_string();
      }
    }

    let inference_time_ms =
      recorded_ms.unwrap_or_else(|| start.elapsed().as_secs_f64() * 1000.0);
    debug!("回放 {} 个检测结果", items.len());

    Ok(DetectResult {
      items,
      inference_time_ms,
    })
  }
}
