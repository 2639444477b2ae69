// 该文件是 Leafscope（叶镜）项目的一部分。
// src/model.rs - 检测模型
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

use crate::{FromUrl, FromUrlWithScheme, detection::DetectResult, frame::Frame};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

mod replay;
pub use self::replay::{ReplayModel, ReplayModelError};

#[cfg(feature = "model_yolo26")]
mod yolo26;
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Builder, Yolo26Error};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("Replay model error: {0}")]
  ReplayModelError(#[from] ReplayModelError),
  #[cfg(feature = "model_yolo26")]
  #[error("Yolo26 model error: {0}")]
  Yolo26Error(#[from] Yolo26Error),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

/// 按 URL 方案选择的检测器
pub enum ModelWrapper {
  Replay(ReplayModel),
  #[cfg(feature = "model_yolo26")]
  Yolo26(Yolo26),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() == ReplayModel::SCHEME {
      let model = ReplayModel::from_url(url)?;
      return Ok(ModelWrapper::Replay(model));
    }
    #[cfg(feature = "model_yolo26")]
    {
      if url.scheme() == Yolo26Builder::SCHEME {
        let model = Yolo26Builder::from_url(url)?.build()?;
        return Ok(ModelWrapper::Yolo26(model));
      }
    }
    Err(ModelError::SchemeMismatch)
  }
}

impl Model for ModelWrapper {
  type Input = Frame;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      ModelWrapper::Replay(model) => Ok(model.infer(input)?),
      #[cfg(feature = "model_yolo26")]
      ModelWrapper::Yolo26(model) => Ok(model.infer(input)?),
    }
  }
}
