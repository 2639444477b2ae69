// 该文件是 Leafscope（叶镜）项目的一部分。
// src/analyzer.rs - 检测、过滤、质量评估与反馈的组合
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

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
  catalog::SuggestionCatalog,
  detection::{DetectResult, Detection},
  feedback::{FeedbackEngine, FeedbackReport},
  filter::{FilterThresholds, FilteringStats, filter_detections},
  frame::Frame,
  model::Model,
  quality::{QualityMetrics, compute_image_quality_metrics},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
  pub thresholds: FilterThresholds,
  /// 关闭时原始检测全部视为可信
  pub enable_filtering: bool,
}

impl Default for AnalyzerConfig {
  fn default() -> Self {
    Self {
      thresholds: FilterThresholds::default(),
      enable_filtering: true,
    }
  }
}

/// 一帧图像的完整分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
  pub detections: Vec<Detection>,
  pub raw_detections: Vec<Detection>,
  pub filtering_stats: FilteringStats,
  pub quality_metrics: QualityMetrics,
  pub feedback: FeedbackReport,
  pub inference_time_ms: f64,
  pub timestamp: DateTime<Local>,
}

pub struct Analyzer<M> {
  detector: M,
  catalog: SuggestionCatalog,
  config: AnalyzerConfig,
}

impl<M> Analyzer<M>
where
  M: Model<Input = Frame, Output = DetectResult>,
{
  pub fn new(detector: M, catalog: SuggestionCatalog, config: AnalyzerConfig) -> Self {
    Self {
      detector,
      catalog,
      config,
    }
  }

  pub fn config(&self) -> &AnalyzerConfig {
    &self.config
  }

  pub fn catalog(&self) -> &SuggestionCatalog {
    &self.catalog
  }

  /// 对已有的原始检测结果执行过滤、质量评估与反馈
  pub fn analyze(&self, frame: &Frame, raw: DetectResult) -> Analysis {
    let detections = if self.config.enable_filtering {
      filter_detections(&raw.items, &frame.image, &self.config.thresholds)
    } else {
      raw.items.clone()
    };
    let filtering_stats = FilteringStats::new(raw.items.len(), detections.len());
    debug!(
      "过滤统计: 原始 {}, 保留 {}, 剔除 {}",
      filtering_stats.raw_count, filtering_stats.filtered_count, filtering_stats.removed_count
    );

    let quality_metrics = compute_image_quality_metrics(&frame.image);
    let feedback = FeedbackEngine::new(&self.catalog).generate(
      &detections,
      &quality_metrics,
      frame.width(),
      frame.height(),
    );
    info!(
      "{}: {} 个可信检测, 质量评分 {}",
      frame.source().display(),
      detections.len(),
      feedback.summary.quality_score
    );

    Analysis {
      detections,
      raw_detections: raw.items,
      filtering_stats,
      quality_metrics,
      feedback,
      inference_time_ms: raw.inference_time_ms,
      timestamp: Local::now(),
    }
  }
}

impl<M> Model for Analyzer<M>
where
  M: Model<Input = Frame, Output = DetectResult>,
{
  type Input = Frame;
  type Output = Analysis;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let raw = self.detector.infer(input)?;
    debug!(
      "检测器返回 {} 个候选, 耗时 {:.1} ms",
      raw.len(),
      raw.inference_time_ms
    );
    Ok(self.analyze(input, raw))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  struct FixedModel(Vec<Detection>);

  impl Model for FixedModel {
    type Input = Frame;
    type Output = DetectResult;
    type Error = std::convert::Infallible;

    fn infer(&self, _input: &Frame) -> Result<DetectResult, Self::Error> {
      Ok(DetectResult {
        items: self.0.clone(),
        inference_time_ms: 12.0,
      })
    }
  }

  /// 左半绿色、右半灰色的 100x100 图像
  fn half_green_frame() -> Frame {
    let image = RgbImage::from_fn(100, 100, |x, _| {
      if x < 50 {
        Rgb([40, 160, 40])
      } else {
        Rgb([128, 128, 128])
      }
    });
    Frame::new(image, 0, "leaf.jpg")
  }

  fn candidates() -> Vec<Detection> {
    vec![
      Detection::new(25, "Tomato leaf", 0.8, [0.0, 0.0, 40.0, 40.0]).unwrap(),
      Detection::new(19, "Tomato Early blight leaf", 0.6, [60.0, 60.0, 90.0, 90.0]).unwrap(),
    ]
  }

  #[test]
  fn filtering_drops_grey_box() {
    let analyzer = Analyzer::new(
      FixedModel(candidates()),
      SuggestionCatalog::builtin(),
      AnalyzerConfig::default(),
    );
    let analysis = analyzer.infer(&half_green_frame()).unwrap();

    assert_eq!(analysis.raw_detections.len(), 2);
    assert_eq!(analysis.detections.len(), 1);
    assert_eq!(analysis.detections[0].class_name, "Tomato leaf");
    assert_eq!(analysis.filtering_stats, FilteringStats::new(2, 1));
    assert_eq!(analysis.feedback.summary.detections_count, 1);
    assert_eq!(analysis.inference_time_ms, 12.0);
  }

  #[test]
  fn disabled_filtering_keeps_everything() {
    let config = AnalyzerConfig {
      enable_filtering: false,
      ..AnalyzerConfig::default()
    };
    let analyzer = Analyzer::new(FixedModel(candidates()), SuggestionCatalog::builtin(), config);
    let analysis = analyzer.infer(&half_green_frame()).unwrap();

    assert_eq!(analysis.detections, analysis.raw_detections);
    assert_eq!(analysis.filtering_stats.removed_count, 0);
    assert!(analysis.detections.iter().all(|d| d.green_ratio.is_none()));
  }
}
