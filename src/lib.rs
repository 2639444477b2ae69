// 该文件是 Leafscope（叶镜）项目的一部分。
// src/lib.rs - 库主文件
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

//! 植物叶片病害检测与拍摄质量反馈。
//!
//! 核心流程：外部检测器给出原始检测框，[`filter`] 剔除不像叶片的误检，
//! [`quality`] 计算亮度与清晰度，[`feedback`] 汇总规则生成评价、建议与免责声明。

pub mod analyzer;
pub mod args;
pub mod catalog;
pub mod detection;
pub mod feedback;
pub mod filter;
pub mod frame;
pub mod input;
pub mod labels;
pub mod model;
pub mod output;
pub mod quality;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 从 URL 中取出本地路径（处理百分号编码）
pub(crate) fn url_path(url: &url::Url) -> String {
  urlencoding::decode(url.path())
    .map(|path| path.into_owned())
    .unwrap_or_else(|_| url.path().to_string())
}
