// 该文件是 Leafscope（叶镜）项目的一部分。
// src/output/json_report.rs - JSON 分析报告
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

use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, analyzer::Analysis, frame::Frame, output::Render, url_path,
};

#[derive(Error, Debug)]
pub enum JsonReportOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct FrameReport<'a> {
  source: &'a Path,
  #[serde(flatten)]
  analysis: &'a Analysis,
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
  Stdout,
  File(PathBuf),
  /// 每帧写一个 `<stem>.json`
  Directory(PathBuf),
}

/// `json:-` 写到标准输出，`json:///a/report.json` 写到文件（每帧一行 JSON），
/// `json:///a/reports/` 按帧写到目录
pub struct JsonReportOutput {
  target: Target,
  /// 文件目标首帧截断旧内容，之后逐行追加
  started: Cell<bool>,
}

impl FromUrlWithScheme for JsonReportOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonReportOutput {
  type Error = JsonReportOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonReportOutputError::SchemeMismatch);
    }

    let path = url_path(url);
    let target = if path == "-" || path.is_empty() {
      Target::Stdout
    } else if path.ends_with('/') {
      Target::Directory(PathBuf::from(path))
    } else {
      Target::File(PathBuf::from(path))
    };
    Ok(Self {
      target,
      started: Cell::new(false),
    })
  }
}

impl JsonReportOutput {
  pub fn stdout() -> Self {
    Self {
      target: Target::Stdout,
      started: Cell::new(false),
    }
  }

  fn append_line(&self, path: &Path, report: &FrameReport) -> Result<(), JsonReportOutputError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = if self.started.replace(true) {
      OpenOptions::new().append(true).open(path)?
    } else {
      File::create(path)?
    };
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("追加分析报告: {}", path.display());
    Ok(())
  }

  fn write_to(path: &Path, report: &FrameReport) -> Result<(), JsonReportOutputError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("写出分析报告: {}", path.display());
    Ok(())
  }
}

impl Render<Frame, Analysis> for JsonReportOutput {
  type Error = JsonReportOutputError;

  fn render_result(&self, frame: &Frame, result: &Analysis) -> Result<(), Self::Error> {
    let report = FrameReport {
      source: frame.source(),
      analysis: result,
    };
    match &self.target {
      Target::Stdout => {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        serde_json::to_writer_pretty(&mut lock, &report)?;
        lock.write_all(b"\n")?;
        Ok(())
      }
      Target::File(path) => self.append_line(path, &report),
      Target::Directory(directory) => {
        Self::write_to(&directory.join(format!("{}.json", frame.stem())), &report)
      }
    }
  }
}
