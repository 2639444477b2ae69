// 该文件是 Leafscope（叶镜）项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, analyzer::Analysis, frame::Frame};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

/// 依次交给多个输出，遇到第一个错误即返回
impl<F, O, R: Render<F, O>> Render<F, O> for Vec<R> {
  type Error = R::Error;

  fn render_result(&self, frame: &F, result: &O) -> Result<(), Self::Error> {
    for output in self {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}

pub mod draw;

mod json_report;
pub use self::json_report::{JsonReportOutput, JsonReportOutputError};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "capture_record")]
mod capture_folder;
#[cfg(feature = "capture_record")]
pub use self::capture_folder::{
  CaptureFolderOutput, CaptureFolderOutputError, CaptureRecord, list_captures,
};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("JSON 报告输出错误: {0}")]
  JsonReportOutputError(#[from] JsonReportOutputError),
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "capture_record")]
  #[error("拍摄记录输出错误: {0}")]
  CaptureFolderOutputError(#[from] CaptureFolderOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  JsonReportOutput(JsonReportOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "capture_record")]
  CaptureFolderOutput(CaptureFolderOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      JsonReportOutput::SCHEME => {
        let output = JsonReportOutput::from_url(url)?;
        Ok(OutputWrapper::JsonReportOutput(output))
      }
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "capture_record")]
      CaptureFolderOutput::SCHEME => {
        let output = CaptureFolderOutput::from_url(url)?;
        Ok(OutputWrapper::CaptureFolderOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl OutputWrapper {
  /// 为需要标注的输出补上命令行给出的字体
  #[allow(unused_variables)]
  pub fn with_fallback_annotator(self, annotator: &draw::Annotator) -> Self {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        OutputWrapper::SaveImageFileOutput(output.with_fallback_annotator(annotator))
      }
      #[cfg(feature = "capture_record")]
      OutputWrapper::CaptureFolderOutput(output) => {
        OutputWrapper::CaptureFolderOutput(output.with_fallback_annotator(annotator))
      }
      other => other,
    }
  }
}

impl Render<Frame, Analysis> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &Analysis) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::JsonReportOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "capture_record")]
      OutputWrapper::CaptureFolderOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}
