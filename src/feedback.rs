// 该文件是 Leafscope（叶镜）项目的一部分。
// src/feedback.rs - 规则化反馈生成
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

//! 决策支持反馈：根据检测结果与拍摄质量给出评价、建议与免责声明。
//!
//! 规则按固定顺序执行（亮度、清晰度、检测、分辨率），输出只依赖输入，
//! 同样的输入总是得到完全相同的报告。

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::SuggestionCatalog;
use crate::detection::Detection;
use crate::filter::box_area_ratio;
use crate::quality::QualityMetrics;

pub const BRIGHTNESS_LOW_THRESHOLD: f64 = 60.0;
pub const BRIGHTNESS_HIGH_THRESHOLD: f64 = 200.0;
/// 亮度超出可接受区间多少以内仍得 1 分
pub const BRIGHTNESS_TOLERANCE: f64 = 20.0;
/// 拉普拉斯方差阈值
pub const BLUR_THRESHOLD: f64 = 100.0;
pub const CONFIDENCE_LOW_THRESHOLD: f32 = 0.5;
pub const CONFIDENCE_HIGH_THRESHOLD: f32 = 0.7;
pub const BBOX_AREA_MIN_THRESHOLD: f64 = 0.05;
pub const BBOX_AREA_MAX_THRESHOLD: f64 = 0.95;
pub const MIN_RESOLUTION: u32 = 400;

pub const DISCLAIMER: &str = "⚠️ PENAFIAN PENTING: Sistem ini hanya menyediakan dukungan keputusan dan BUKAN \
pengganti diagnosis profesional. Untuk identifikasi penyakit yang akurat dan \
rekomendasi perawatan, silakan berkonsultasi dengan:\n  \
• Layanan penyuluhan pertanian\n  \
• Patolog tanaman bersertifikat\n  \
• Agronom profesional\n\n\
Selalu konfirmasi penyakit yang dicurigai melalui pengujian laboratorium bila memungkinkan. \
Saran yang diberikan adalah praktik budidaya umum dan harus disesuaikan \
dengan kondisi pertumbuhan spesifik Anda, peraturan lokal, dan panduan ahli.";

/// 综合拍摄质量等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityScore {
  #[serde(rename = "sangat baik")]
  SangatBaik,
  #[serde(rename = "baik")]
  Baik,
  #[serde(rename = "cukup")]
  Cukup,
  #[serde(rename = "buruk")]
  Buruk,
}

impl QualityScore {
  pub fn from_points(points: u8) -> Self {
    match points {
      5.. => QualityScore::SangatBaik,
      4 => QualityScore::Baik,
      2..=3 => QualityScore::Cukup,
      _ => QualityScore::Buruk,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      QualityScore::SangatBaik => "sangat baik",
      QualityScore::Baik => "baik",
      QualityScore::Cukup => "cukup",
      QualityScore::Buruk => "buruk",
    }
  }
}

impl fmt::Display for QualityScore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
  pub detections_count: usize,
  pub unique_diseases: usize,
  pub max_confidence: f32,
  pub quality_score: QualityScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReport {
  pub critique: Vec<String>,
  pub suggestions: Vec<String>,
  pub disclaimer: String,
  pub summary: FeedbackSummary,
}

fn brightness_points(brightness: f64) -> u8 {
  if (BRIGHTNESS_LOW_THRESHOLD..=BRIGHTNESS_HIGH_THRESHOLD).contains(&brightness) {
    2
  } else if brightness < BRIGHTNESS_LOW_THRESHOLD - BRIGHTNESS_TOLERANCE
    || brightness > BRIGHTNESS_HIGH_THRESHOLD + BRIGHTNESS_TOLERANCE
  {
    0
  } else {
    1
  }
}

fn sharpness_points(blur_metric: f64) -> u8 {
  if blur_metric >= BLUR_THRESHOLD * 2.0 {
    2
  } else if blur_metric >= BLUR_THRESHOLD {
    1
  } else {
    0
  }
}

fn confidence_points(detections: &[Detection]) -> u8 {
  match max_confidence(detections) {
    Some(conf) if conf >= CONFIDENCE_HIGH_THRESHOLD => 2,
    Some(conf) if conf >= CONFIDENCE_LOW_THRESHOLD => 1,
    _ => 0,
  }
}

/// 亮度、清晰度、置信度各 0-2 分，合计映射为质量等级
pub fn compute_quality_score(
  brightness: f64,
  blur_metric: f64,
  detections: &[Detection],
) -> QualityScore {
  let points =
    brightness_points(brightness) + sharpness_points(blur_metric) + confidence_points(detections);
  QualityScore::from_points(points)
}

fn max_confidence(detections: &[Detection]) -> Option<f32> {
  detections.iter().map(|d| d.confidence).reduce(f32::max)
}

/// 按首次出现顺序去重的类别名
pub fn unique_class_names(detections: &[Detection]) -> Vec<&str> {
  let mut names: Vec<&str> = Vec::new();
  for det in detections {
    if !names.contains(&det.class_name.as_str()) {
      names.push(&det.class_name);
    }
  }
  names
}

/// 反馈生成器，持有只读建议库
pub struct FeedbackEngine<'a> {
  catalog: &'a SuggestionCatalog,
}

impl<'a> FeedbackEngine<'a> {
  pub fn new(catalog: &'a SuggestionCatalog) -> Self {
    Self { catalog }
  }

  pub fn generate(
    &self,
    detections: &[Detection],
    metrics: &QualityMetrics,
    image_width: u32,
    image_height: u32,
  ) -> FeedbackReport {
    let mut critique = Vec::new();
    let mut suggestions = Vec::new();

    assess_brightness(metrics.brightness, &mut critique, &mut suggestions);
    assess_sharpness(metrics.blur_metric, &mut critique, &mut suggestions);
    self.assess_detections(
      detections,
      image_width,
      image_height,
      &mut critique,
      &mut suggestions,
    );
    assess_resolution(image_width, image_height, &mut critique, &mut suggestions);

    let summary = FeedbackSummary {
      detections_count: detections.len(),
      unique_diseases: unique_class_names(detections).len(),
      max_confidence: max_confidence(detections).unwrap_or(0.0),
      quality_score: compute_quality_score(metrics.brightness, metrics.blur_metric, detections),
    };
    debug!(
      "反馈生成完成: {} 条评价, {} 条建议, 质量等级 {}",
      critique.len(),
      suggestions.len(),
      summary.quality_score
    );

    FeedbackReport {
      critique,
      suggestions,
      disclaimer: DISCLAIMER.to_string(),
      summary,
    }
  }

  fn assess_detections(
    &self,
    detections: &[Detection],
    image_width: u32,
    image_height: u32,
    critique: &mut Vec<String>,
    suggestions: &mut Vec<String>,
  ) {
    let Some(max_conf) = max_confidence(detections) else {
      critique.push("⚠️ Tidak ada penyakit tanaman terdeteksi dalam gambar ini".to_string());
      suggestions.push("Pastikan daun terlihat jelas dan dibingkai dengan baik".to_string());
      suggestions.push("Coba sudut atau jarak yang berbeda".to_string());
      suggestions.push("Verifikasi bahwa daun menunjukkan gejala yang terlihat".to_string());
      return;
    };

    let min_conf = detections
      .iter()
      .map(|d| d.confidence)
      .fold(f32::INFINITY, f32::min);
    let mean_conf = detections.iter().map(|d| d.confidence).sum::<f32>() / detections.len() as f32;
    debug!(
      "置信度: 最高 {:.3}, 最低 {:.3}, 平均 {:.3}",
      max_conf, min_conf, mean_conf
    );

    if max_conf < CONFIDENCE_LOW_THRESHOLD {
      critique.push(format!(
        "⚠️ Deteksi dengan kepercayaan rendah (tertinggi: {:.2}%)",
        max_conf * 100.0
      ));
      suggestions.push("Coba tangkap dari jarak lebih dekat".to_string());
      suggestions.push("Pastikan pencahayaan dan fokus lebih baik".to_string());
      suggestions.push("Tangkap ulang jika gejala tidak jelas".to_string());
    } else {
      critique.push(format!(
        "✓ Deteksi ditemukan dengan kepercayaan hingga {:.2}%",
        max_conf * 100.0
      ));
    }

    // 与过滤器同一公式，但重新计算：这里只用于提示，不剔除
    let ratios: Vec<f64> = detections
      .iter()
      .map(|d| box_area_ratio(&d.bbox_xyxy, image_width, image_height))
      .collect();
    let first_small = ratios.iter().find(|&&r| r < BBOX_AREA_MIN_THRESHOLD);
    let first_large = ratios.iter().find(|&&r| r > BBOX_AREA_MAX_THRESHOLD);

    if let Some(ratio) = first_small {
      critique.push(format!(
        "⚠️ Wilayah terdeteksi kecil ({:.1}% dari bingkai)",
        ratio * 100.0
      ));
      suggestions.push("Pindahkan kamera lebih dekat ke daun".to_string());
      suggestions.push("Zoom pada area yang terkena".to_string());
    }

    if let Some(ratio) = first_large {
      critique.push(format!(
        "ℹ️ Deteksi mengisi sebagian besar bingkai ({:.1}%)",
        ratio * 100.0
      ));
      suggestions
        .push("Pertimbangkan menangkap dari jarak sedikit lebih jauh untuk konteks".to_string());
    }

    let classes = unique_class_names(detections);
    if classes.len() > 1 {
      critique.push(format!(
        "ℹ️ Beberapa jenis penyakit terdeteksi: {}",
        classes.join(", ")
      ));
      suggestions.push(
        "Pertimbangkan menangkap daun individual secara terpisah untuk diagnosis yang lebih jelas"
          .to_string(),
      );
      suggestions.push("Beberapa gejala dapat menunjukkan infeksi kompleks".to_string());
    }

    for class_name in classes {
      suggestions.push(format!("\n📋 Untuk {}:", class_name));
      suggestions.extend(
        self
          .catalog
          .lookup(class_name)
          .into_iter()
          .map(|s| format!("  • {}", s)),
      );
    }
  }
}

fn assess_brightness(brightness: f64, critique: &mut Vec<String>, suggestions: &mut Vec<String>) {
  if brightness < BRIGHTNESS_LOW_THRESHOLD {
    critique.push(format!(
      "⚠️ Pencahayaan rendah terdeteksi (kecerahan: {:.0}/255). Gambar mungkin terlalu gelap.",
      brightness
    ));
    suggestions.push("Tingkatkan pencahayaan atau pindah ke area yang lebih terang".to_string());
  } else if brightness > BRIGHTNESS_HIGH_THRESHOLD {
    critique.push(format!(
      "⚠️ Pencahayaan sangat terang (kecerahan: {:.0}/255). Dapat menyebabkan overexposure.",
      brightness
    ));
    suggestions.push("Kurangi cahaya langsung atau sesuaikan eksposur kamera".to_string());
  } else {
    critique.push(format!(
      "✓ Pencahayaan memadai (kecerahan: {:.0}/255)",
      brightness
    ));
  }
}

fn assess_sharpness(blur_metric: f64, critique: &mut Vec<String>, suggestions: &mut Vec<String>) {
  if blur_metric < BLUR_THRESHOLD {
    critique.push(format!(
      "⚠️ Gambar tampak blur (skor ketajaman: {:.1})",
      blur_metric
    ));
    suggestions
      .push("Tahan kamera dengan stabil atau gunakan kecepatan rana lebih cepat".to_string());
    suggestions.push("Pastikan fokus yang tepat pada daun".to_string());
  } else {
    critique.push(format!(
      "✓ Ketajaman gambar dapat diterima (skor: {:.1})",
      blur_metric
    ));
  }
}

fn assess_resolution(
  image_width: u32,
  image_height: u32,
  critique: &mut Vec<String>,
  suggestions: &mut Vec<String>,
) {
  if image_width < MIN_RESOLUTION || image_height < MIN_RESOLUTION {
    critique.push(format!(
      "⚠️ Resolusi rendah ({}x{})",
      image_width, image_height
    ));
    suggestions.push("Gunakan resolusi kamera lebih tinggi jika tersedia".to_string());
  }
}
