// 该文件是 Leafscope（叶镜）项目的一部分。
// src/args.rs - 公共命令行参数
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

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::{
  analyzer::AnalyzerConfig,
  catalog::{CatalogError, SuggestionCatalog},
  filter::{
    DEFAULT_MAX_AREA_RATIO, DEFAULT_MIN_AREA_RATIO, DEFAULT_MIN_GREEN_RATIO, FilterThresholds,
  },
  output::draw::{Annotator, FontError},
};

/// 过滤与建议库参数
#[derive(Args, Debug, Clone)]
pub struct AnalyzerArgs {
  /// 检测框内绿色像素比例下限
  #[arg(long, default_value_t = DEFAULT_MIN_GREEN_RATIO, value_name = "RATIO")]
  pub min_green_ratio: f64,

  /// 检测框面积比例下限
  #[arg(long, default_value_t = DEFAULT_MIN_AREA_RATIO, value_name = "RATIO")]
  pub min_area_ratio: f64,

  /// 检测框面积比例上限
  #[arg(long, default_value_t = DEFAULT_MAX_AREA_RATIO, value_name = "RATIO")]
  pub max_area_ratio: f64,

  /// 关闭误检过滤，原始检测全部视为可信
  #[arg(long)]
  pub no_filter: bool,

  /// 自定义建议库（JSON 数组，元素为 {"key", "suggestions"}）
  #[arg(long, value_name = "FILE")]
  pub catalog: Option<PathBuf>,
}

impl AnalyzerArgs {
  pub fn config(&self) -> AnalyzerConfig {
    AnalyzerConfig {
      thresholds: FilterThresholds {
        min_green_ratio: self.min_green_ratio,
        min_area_ratio: self.min_area_ratio,
        max_area_ratio: self.max_area_ratio,
      },
      enable_filtering: !self.no_filter,
    }
  }

  pub fn load_catalog(&self) -> Result<SuggestionCatalog, CatalogError> {
    match &self.catalog {
      Some(path) => {
        let catalog = SuggestionCatalog::from_json_file(path)?;
        info!("使用自定义建议库: {} ({} 条)", path.display(), catalog.len());
        Ok(catalog)
      }
      None => Ok(SuggestionCatalog::builtin()),
    }
  }
}

/// 标注参数
#[derive(Args, Debug, Clone, Default)]
pub struct AnnotatorArgs {
  /// 标签字体（TTF/OTF），未指定时标签只绘制底色
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

impl AnnotatorArgs {
  pub fn annotator(&self) -> Result<Annotator, FontError> {
    match &self.font {
      Some(path) => Annotator::from_font_file(path),
      None => Ok(Annotator::default()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser)]
  struct Cli {
    #[command(flatten)]
    analyzer: AnalyzerArgs,
    #[command(flatten)]
    annotator: AnnotatorArgs,
  }

  #[test]
  fn defaults_match_filter_defaults() {
    let cli = Cli::parse_from(["leafscope"]);
    assert_eq!(cli.analyzer.config(), AnalyzerConfig::default());
  }

  #[test]
  fn no_filter_disables_filtering() {
    let cli = Cli::parse_from(["leafscope", "--no-filter", "--min-green-ratio", "0.3"]);
    let config = cli.analyzer.config();
    assert!(!config.enable_filtering);
    assert_eq!(config.thresholds.min_green_ratio, 0.3);
  }

  #[test]
  fn font_is_optional() {
    let cli = Cli::parse_from(["leafscope"]);
    assert!(cli.annotator.font.is_none());
    assert!(!cli.annotator.annotator().unwrap().has_font());
  }

  #[test]
  fn font_flag_loads_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.ttf");
    let cli = Cli::parse_from(["leafscope", "--font", missing.to_str().unwrap()]);
    assert_eq!(cli.annotator.font.as_deref(), Some(missing.as_path()));
    assert!(matches!(cli.annotator.annotator(), Err(FontError::IoError(_))));

    let broken = dir.path().join("broken.ttf");
    std::fs::write(&broken, b"not a font").unwrap();
    let args = AnnotatorArgs { font: Some(broken) };
    assert!(matches!(args.annotator(), Err(FontError::InvalidFont(_))));
  }
}
