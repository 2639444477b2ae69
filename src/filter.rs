// 该文件是 Leafscope（叶镜）项目的一部分。
// src/filter.rs - 误检过滤
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

//! 基于颜色与尺寸的启发式过滤，剔除不像叶片组织的检测框。

use image::{GenericImageView, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detection::Detection;

// OpenCV 8 位 HSV 量纲：色相 0-180，饱和度与明度 0-255
const GREEN_HUE_MIN: u8 = 25;
const GREEN_HUE_MAX: u8 = 90;
const GREEN_SATURATION_MIN: u8 = 40;
const GREEN_VALUE_MIN: u8 = 40;

pub const DEFAULT_MIN_GREEN_RATIO: f64 = 0.15;
pub const DEFAULT_MIN_AREA_RATIO: f64 = 0.001;
pub const DEFAULT_MAX_AREA_RATIO: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterThresholds {
  pub min_green_ratio: f64,
  pub min_area_ratio: f64,
  pub max_area_ratio: f64,
}

impl Default for FilterThresholds {
  fn default() -> Self {
    Self {
      min_green_ratio: DEFAULT_MIN_GREEN_RATIO,
      min_area_ratio: DEFAULT_MIN_AREA_RATIO,
      max_area_ratio: DEFAULT_MAX_AREA_RATIO,
    }
  }
}

/// 过滤统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteringStats {
  pub raw_count: usize,
  pub filtered_count: usize,
  pub removed_count: usize,
}

impl FilteringStats {
  pub fn new(raw_count: usize, filtered_count: usize) -> Self {
    Self {
      raw_count,
      filtered_count,
      removed_count: raw_count.saturating_sub(filtered_count),
    }
  }
}

/// RGB 转 OpenCV 8 位 HSV (H: 0-180, S/V: 0-255)
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> (u8, u8, u8) {
  let [r, g, b] = pixel.0.map(i32::from);
  let value = r.max(g).max(b);
  let diff = value - r.min(g).min(b);

  let saturation = if value == 0 {
    0
  } else {
    (255 * diff + value / 2) / value
  };

  let hue = if diff == 0 {
    0
  } else {
    let sector = if value == r {
      g - b
    } else if value == g {
      b - r + 2 * diff
    } else {
      r - g + 4 * diff
    };
    let hue = (30.0 * sector as f32 / diff as f32 + 0.5).floor() as i32;
    if hue < 0 { hue + 180 } else { hue }
  };

  (hue as u8, saturation as u8, value as u8)
}

fn is_green(pixel: &Rgb<u8>) -> bool {
  let (h, s, v) = rgb_to_hsv(pixel);
  (GREEN_HUE_MIN..=GREEN_HUE_MAX).contains(&h)
    && s >= GREEN_SATURATION_MIN
    && v >= GREEN_VALUE_MIN
}

/// 框内绿色像素比例
///
/// 坐标先截断为整数并夹到图像范围内，每个方向至少保留 1 像素。
pub fn green_ratio(image: &RgbImage, bbox_xyxy: &[f32; 4]) -> f64 {
  let (w, h) = (i64::from(image.width()), i64::from(image.height()));
  if w == 0 || h == 0 {
    return 0.0;
  }

  let [x1, y1, x2, y2] = bbox_xyxy.map(|v| v as i64);
  let x1 = x1.min(w - 1).max(0);
  let y1 = y1.min(h - 1).max(0);
  let x2 = x2.min(w).max(x1 + 1);
  let y2 = y2.min(h).max(y1 + 1);

  let roi = image.view(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32);
  let total = u64::from(roi.width()) * u64::from(roi.height());
  if total == 0 {
    return 0.0;
  }

  let green = roi.pixels().filter(|(_, _, p)| is_green(p)).count() as u64;
  green as f64 / total as f64
}

/// 框面积与图像面积之比，框先夹到图像范围内
pub fn box_area_ratio(bbox_xyxy: &[f32; 4], image_width: u32, image_height: u32) -> f64 {
  let (w, h) = (f64::from(image_width), f64::from(image_height));
  let image_area = w * h;
  if image_area <= 0.0 {
    return 0.0;
  }
  let [x1, y1, x2, y2] = bbox_xyxy.map(f64::from);
  let width = (x2.clamp(0.0, w) - x1.clamp(0.0, w)).max(0.0);
  let height = (y2.clamp(0.0, h) - y1.clamp(0.0, h)).max(0.0);
  width * height / image_area
}

/// 保留绿色比例与面积比例都达标的检测，并附上这两个比例
///
/// 输出保持输入顺序，只删除不新增。
pub fn filter_detections(
  detections: &[Detection],
  image: &RgbImage,
  thresholds: &FilterThresholds,
) -> Vec<Detection> {
  if detections.is_empty() {
    return Vec::new();
  }

  let (width, height) = image.dimensions();
  let area_range = thresholds.min_area_ratio..=thresholds.max_area_ratio;

  detections
    .iter()
    .filter_map(|det| {
      let green = green_ratio(image, &det.bbox_xyxy);
      let area = box_area_ratio(&det.bbox_xyxy, width, height);
      if green >= thresholds.min_green_ratio && area_range.contains(&area) {
        Some(Detection {
          green_ratio: Some(green),
          area_ratio: Some(area),
          ..det.clone()
        })
      } else {
        debug!(
          "剔除检测 {} ({:.2}): 绿色比例 {:.3}, 面积比例 {:.4}",
          det.class_name, det.confidence, green, area
        );
        None
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  fn detection(bbox: [f32; 4]) -> Detection {
    Detection::new(0, "tomato_leaf", 0.8, bbox).unwrap()
  }

  #[test]
  fn hsv_matches_opencv_primaries() {
    assert_eq!(rgb_to_hsv(&Rgb([0, 255, 0])), (60, 255, 255));
    assert_eq!(rgb_to_hsv(&Rgb([255, 0, 0])), (0, 255, 255));
    assert_eq!(rgb_to_hsv(&Rgb([0, 0, 255])), (120, 255, 255));
    assert_eq!(rgb_to_hsv(&Rgb([128, 128, 128])), (0, 0, 128));
    assert_eq!(rgb_to_hsv(&Rgb([0, 0, 0])), (0, 0, 0));
  }

  #[test]
  fn hsv_wraps_negative_hue() {
    // 品红偏红：R 最大且 G < B
    let (h, _, _) = rgb_to_hsv(&Rgb([255, 0, 128]));
    assert!(h > 150);
  }

  #[test]
  fn solid_green_full_box() {
    let image = RgbImage::from_pixel(100, 80, Rgb([30, 160, 40]));
    let ratio = green_ratio(&image, &[0.0, 0.0, 100.0, 80.0]);
    assert_relative_eq!(ratio, 1.0);
  }

  #[test]
  fn solid_red_full_box() {
    let image = RgbImage::from_pixel(100, 80, Rgb([200, 20, 20]));
    assert_eq!(green_ratio(&image, &[0.0, 0.0, 100.0, 80.0]), 0.0);
  }

  #[test]
  fn dark_green_is_not_green() {
    let image = RgbImage::from_pixel(10, 10, Rgb([0, 30, 0]));
    assert_eq!(green_ratio(&image, &[0.0, 0.0, 10.0, 10.0]), 0.0);
  }

  #[test]
  fn half_green_split() {
    let image = RgbImage::from_fn(10, 10, |x, _| {
      if x < 5 {
        Rgb([0, 200, 0])
      } else {
        Rgb([200, 0, 0])
      }
    });
    assert_relative_eq!(green_ratio(&image, &[0.0, 0.0, 10.0, 10.0]), 0.5);
    assert_relative_eq!(green_ratio(&image, &[0.0, 0.0, 5.0, 10.0]), 1.0);
  }

  #[test]
  fn out_of_bounds_and_degenerate_boxes_are_clamped() {
    let image = RgbImage::from_pixel(10, 10, Rgb([0, 200, 0]));
    assert_relative_eq!(green_ratio(&image, &[-50.0, -50.0, 500.0, 500.0]), 1.0);
    // 零面积框仍然取 1 像素
    assert_relative_eq!(green_ratio(&image, &[3.0, 3.0, 3.0, 3.0]), 1.0);
    assert_relative_eq!(green_ratio(&image, &[20.0, 20.0, 30.0, 30.0]), 1.0);
  }

  #[test]
  fn green_ratio_on_empty_image() {
    let image = RgbImage::new(0, 0);
    assert_eq!(green_ratio(&image, &[0.0, 0.0, 10.0, 10.0]), 0.0);
  }

  #[test]
  fn area_ratio_clamps_to_image() {
    assert_relative_eq!(box_area_ratio(&[0.0, 0.0, 10.0, 5.0], 10, 10), 0.5);
    assert_relative_eq!(box_area_ratio(&[-10.0, -10.0, 20.0, 20.0], 10, 10), 1.0);
    assert_eq!(box_area_ratio(&[5.0, 5.0, 5.0, 9.0], 10, 10), 0.0);
    assert_eq!(box_area_ratio(&[0.0, 0.0, 5.0, 5.0], 0, 0), 0.0);
  }

  #[test]
  fn filter_keeps_green_boxes_in_order_and_annotates() {
    let image = RgbImage::from_fn(200, 100, |x, _| {
      if x < 100 {
        Rgb([20, 180, 30])
      } else {
        Rgb([180, 30, 20])
      }
    });
    let input = vec![
      detection([10.0, 10.0, 60.0, 60.0]),
      detection([120.0, 10.0, 180.0, 60.0]),
      detection([20.0, 20.0, 80.0, 90.0]),
    ];
    let kept = filter_detections(&input, &image, &FilterThresholds::default());
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].bbox_xyxy, input[0].bbox_xyxy);
    assert_eq!(kept[1].bbox_xyxy, input[2].bbox_xyxy);
    assert_relative_eq!(kept[0].green_ratio.unwrap(), 1.0);
    assert_relative_eq!(kept[0].area_ratio.unwrap(), 2500.0 / 20000.0);
  }

  #[test]
  fn filter_drops_tiny_full_frame_and_degenerate_boxes() {
    let image = RgbImage::from_pixel(100, 100, Rgb([20, 180, 30]));
    let input = vec![
      detection([0.0, 0.0, 100.0, 100.0]),
      detection([10.0, 10.0, 10.5, 10.5]),
      detection([40.0, 40.0, 40.0, 70.0]),
      detection([10.0, 10.0, 50.0, 50.0]),
    ];
    let kept = filter_detections(&input, &image, &FilterThresholds::default());
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].bbox_xyxy, [10.0, 10.0, 50.0, 50.0]);
  }

  #[test]
  fn custom_thresholds_keep_an_ordered_subsequence() {
    // 上 60 行绿色，下 40 行红色
    let image = RgbImage::from_fn(100, 100, |_, y| {
      if y < 60 {
        Rgb([20, 180, 30])
      } else {
        Rgb([180, 30, 20])
      }
    });
    let thresholds = FilterThresholds {
      min_green_ratio: 0.6,
      min_area_ratio: 0.05,
      max_area_ratio: 0.5,
    };
    let input = vec![
      detection([0.0, 0.0, 50.0, 50.0]),
      detection([0.0, 0.0, 10.0, 10.0]),
      detection([0.0, 40.0, 50.0, 100.0]),
      detection([0.0, 0.0, 90.0, 90.0]),
      detection([50.0, 0.0, 100.0, 40.0]),
      detection([-30.0, 20.0, 30.0, 70.0]),
    ];
    let kept = filter_detections(&input, &image, &thresholds);

    let positions: Vec<usize> = kept
      .iter()
      .map(|k| {
        input
          .iter()
          .position(|d| d.bbox_xyxy == k.bbox_xyxy)
          .unwrap()
      })
      .collect();
    assert_eq!(positions, vec![0, 4, 5]);
    for det in &kept {
      assert!(det.green_ratio.unwrap() >= thresholds.min_green_ratio);
      let area = det.area_ratio.unwrap();
      assert!((thresholds.min_area_ratio..=thresholds.max_area_ratio).contains(&area));
    }
    assert_relative_eq!(kept[2].area_ratio.unwrap(), 0.15);
  }

  #[test]
  fn filter_on_empty_input() {
    let image = RgbImage::from_pixel(4, 4, Rgb([0, 255, 0]));
    assert!(filter_detections(&[], &image, &FilterThresholds::default()).is_empty());
  }

  #[test]
  fn stats_count_removed() {
    let stats = FilteringStats::new(5, 3);
    assert_eq!(stats.removed_count, 2);
  }
}
