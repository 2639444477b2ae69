// 该文件是 Leafscope（叶镜）项目的一部分。
// src/output/capture_folder.rs - 拍摄记录目录
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

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  FromUrl, FromUrlWithScheme,
  analyzer::Analysis,
  detection::Detection,
  feedback::FeedbackReport,
  frame::Frame,
  output::{
    Render,
    draw::{Annotator, FontError},
  },
  quality::QualityMetrics,
  url_path,
};

const JPEG_QUALITY: u8 = 95;
const CAPTURE_PREFIX: &str = "capture_";
const DATA_SUFFIX: &str = "_data.json";

#[derive(Error, Debug)]
pub enum CaptureFolderOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("字体错误: {0}")]
  FontError(#[from] FontError),
}

/// 一次拍摄的持久化记录，图像以文件名引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
  pub capture_id: String,
  pub timestamp: DateTime<Local>,
  pub original_image: String,
  pub annotated_image: String,
  pub detections: Vec<Detection>,
  pub quality_metrics: QualityMetrics,
  pub feedback: FeedbackReport,
  pub inference_time_ms: f64,
}

/// 每帧写出原图、标注图与 JSON 数据三个文件
pub struct CaptureFolderOutput {
  directory: PathBuf,
  annotator: Annotator,
}

impl FromUrlWithScheme for CaptureFolderOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for CaptureFolderOutput {
  type Error = CaptureFolderOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(CaptureFolderOutputError::SchemeMismatch);
    }

    Ok(Self::new(url_path(uri), Annotator::from_url_query(uri)?))
  }
}

fn save_jpeg(image: &RgbImage, path: &Path) -> Result<(), CaptureFolderOutputError> {
  let mut writer = BufWriter::new(File::create(path)?);
  JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(image)?;
  Ok(())
}

impl CaptureFolderOutput {
  pub fn new(directory: impl Into<PathBuf>, annotator: Annotator) -> Self {
    Self {
      directory: directory.into(),
      annotator,
    }
  }

  /// URL 未指定字体时改用给定的标注器
  pub fn with_fallback_annotator(mut self, annotator: &Annotator) -> Self {
    if !self.annotator.has_font() {
      self.annotator = annotator.clone();
    }
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// 以分析时间生成拍摄编号，同一微秒内重复时追加序号
  fn capture_id(&self, timestamp: &DateTime<Local>) -> String {
    let base = format!("{}{}", CAPTURE_PREFIX, timestamp.format("%Y%m%d_%H%M%S_%6f"));
    let mut capture_id = base.clone();
    let mut n = 1;
    while self.directory.join(format!("{}{}", capture_id, DATA_SUFFIX)).exists() {
      capture_id = format!("{}_{}", base, n);
      n += 1;
    }
    capture_id
  }

  pub fn save(
    &self,
    frame: &Frame,
    analysis: &Analysis,
  ) -> Result<CaptureRecord, CaptureFolderOutputError> {
    std::fs::create_dir_all(&self.directory)?;

    let capture_id = self.capture_id(&analysis.timestamp);
    let original_image = format!("{}_original.jpg", capture_id);
    let annotated_image = format!("{}_detected.jpg", capture_id);

    save_jpeg(&frame.image, &self.directory.join(&original_image))?;
    let annotated = self.annotator.annotate(&frame.image, &analysis.detections);
    save_jpeg(&annotated, &self.directory.join(&annotated_image))?;

    let record = CaptureRecord {
      capture_id,
      timestamp: analysis.timestamp,
      original_image,
      annotated_image,
      detections: analysis.detections.clone(),
      quality_metrics: analysis.quality_metrics,
      feedback: analysis.feedback.clone(),
      inference_time_ms: analysis.inference_time_ms,
    };

    let data_path = self
      .directory
      .join(format!("{}{}", record.capture_id, DATA_SUFFIX));
    let writer = BufWriter::new(File::create(&data_path)?);
    serde_json::to_writer_pretty(writer, &record)?;

    info!(
      "保存拍摄记录 {} ({} 个检测)",
      record.capture_id,
      record.detections.len()
    );
    Ok(record)
  }
}

impl Render<Frame, Analysis> for CaptureFolderOutput {
  type Error = CaptureFolderOutputError;

  fn render_result(&self, frame: &Frame, result: &Analysis) -> Result<(), Self::Error> {
    self.save(frame, result).map(|_| ())
  }
}

/// 列出目录中的全部拍摄记录，最新的在前
///
/// 无法解析的记录文件记录警告后跳过。
pub fn list_captures(
  directory: impl AsRef<Path>,
) -> Result<Vec<CaptureRecord>, CaptureFolderOutputError> {
  let directory = directory.as_ref();
  let mut files: Vec<PathBuf> = std::fs::read_dir(directory)?
    .filter_map(|entry| entry.ok().map(|e| e.path()))
    .filter(|path| {
      path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(CAPTURE_PREFIX) && name.ends_with(DATA_SUFFIX))
        .unwrap_or(false)
    })
    .collect();
  files.sort_by(|a, b| b.cmp(a));

  let mut records = Vec::with_capacity(files.len());
  for path in files {
    let parsed = std::fs::read_to_string(&path)
      .map_err(CaptureFolderOutputError::from)
      .and_then(|text| serde_json::from_str::<CaptureRecord>(&text).map_err(Into::into));
    match parsed {
      Ok(record) => records.push(record),
      Err(e) => warn!("跳过无法读取的拍摄记录 {}: {}", path.display(), e),
    }
  }
  debug!("目录 {} 中共有 {} 条拍摄记录", directory.display(), records.len());
  Ok(records)
}
