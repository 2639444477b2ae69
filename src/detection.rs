// 该文件是 Leafscope（叶镜）项目的一部分。
// src/detection.rs - 检测结果定义
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DetectionError {
  #[error("置信度超出 [0, 1] 范围: {0}")]
  ConfidenceOutOfRange(f32),
  #[error("边界框坐标不是有限数值: {0:?}")]
  NonFiniteBox([f32; 4]),
}

/// 单个检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  /// 类别索引
  pub class_id: u32,
  /// 类别名称（建议库的查询键）
  #[serde(default)]
  pub class_name: String,
  /// 置信度
  pub confidence: f32,
  /// 像素坐标 [x1, y1, x2, y2]
  pub bbox_xyxy: [f32; 4],
  /// 框内绿色像素比例，仅过滤后存在
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub green_ratio: Option<f64>,
  /// 框面积与图像面积之比，仅过滤后存在
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub area_ratio: Option<f64>,
}

impl Detection {
  pub fn new(
    class_id: u32,
    class_name: impl Into<String>,
    confidence: f32,
    bbox_xyxy: [f32; 4],
  ) -> Result<Self, DetectionError> {
    let detection = Self {
      class_id,
      class_name: class_name.into(),
      confidence,
      bbox_xyxy,
      green_ratio: None,
      area_ratio: None,
    };
    detection.validate()?;
    Ok(detection)
  }

  /// 检查结构性错误；倒置或零面积的框不算错误，由过滤器处理
  pub fn validate(&self) -> Result<(), DetectionError> {
    if !(0.0..=1.0).contains(&self.confidence) {
      return Err(DetectionError::ConfidenceOutOfRange(self.confidence));
    }
    if self.bbox_xyxy.iter().any(|v| !v.is_finite()) {
      return Err(DetectionError::NonFiniteBox(self.bbox_xyxy));
    }
    Ok(())
  }
}

/// 检测器的原始输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectResult {
  pub items: Vec<Detection>,
  /// 推理耗时（毫秒），原样透传
  pub inference_time_ms: f64,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

/// 两个 xyxy 边界框的交并比
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按类别的非极大值抑制，结果按置信度降序，最多保留 `max_det` 个
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32, max_det: usize) -> Vec<Detection> {
  detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut result: Vec<Detection> = Vec::new();
  for det in detections {
    if result.len() >= max_det {
      break;
    }
    let suppressed = result.iter().any(|kept| {
      kept.class_id == det.class_id && iou(&kept.bbox_xyxy, &det.bbox_xyxy) >= iou_threshold
    });
    if !suppressed {
      result.push(det);
    }
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[test]
  fn new_rejects_out_of_range_confidence() {
    let err = Detection::new(0, "tomato_leaf", 1.2, [0.0, 0.0, 1.0, 1.0]).unwrap_err();
    assert_eq!(err, DetectionError::ConfidenceOutOfRange(1.2));
  }

  #[test]
  fn new_rejects_non_finite_box() {
    let err = Detection::new(0, "tomato_leaf", 0.5, [0.0, f32::NAN, 1.0, 1.0]).unwrap_err();
    assert!(matches!(err, DetectionError::NonFiniteBox(_)));
  }

  #[test]
  fn new_accepts_inverted_box() {
    assert!(Detection::new(0, "tomato_leaf", 0.5, [10.0, 10.0, 5.0, 5.0]).is_ok());
  }

  #[test]
  fn ratios_are_omitted_until_annotated() {
    let detection = Detection::new(3, "apple_leaf", 0.9, [1.0, 2.0, 3.0, 4.0]).unwrap();
    let json = serde_json::to_value(&detection).unwrap();
    assert!(json.get("green_ratio").is_none());
    assert_eq!(json["bbox_xyxy"][3], 4.0);
  }

  #[test]
  fn iou_of_half_overlap() {
    let a = [0.0, 0.0, 10.0, 10.0];
    let b = [5.0, 0.0, 15.0, 10.0];
    assert_relative_eq!(iou(&a, &b), 50.0 / 150.0);
    assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
  }

  #[test]
  fn nms_suppresses_same_class_only() {
    let detections = vec![
      Detection::new(1, "corn_rust_leaf", 0.6, [1.0, 1.0, 11.0, 11.0]).unwrap(),
      Detection::new(1, "corn_rust_leaf", 0.9, [0.0, 0.0, 10.0, 10.0]).unwrap(),
      Detection::new(2, "corn_leaf_blight", 0.7, [0.0, 0.0, 10.0, 10.0]).unwrap(),
      Detection::new(1, "corn_rust_leaf", 0.5, [50.0, 50.0, 60.0, 60.0]).unwrap(),
    ];
    let kept = nms(detections, 0.5, 100);
    let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.7, 0.5]);
  }

  #[test]
  fn nms_honours_max_det() {
    let detections = (0..5)
      .map(|i| {
        let x = i as f32 * 20.0;
        Detection::new(0, "apple_leaf", 0.5, [x, 0.0, x + 10.0, 10.0]).unwrap()
      })
      .collect();
    assert_eq!(nms(detections, 0.5, 3).len(), 3);
  }
}
