// 该文件是 Leafscope（叶镜）项目的一部分。
// src/quality.rs - 图像质量指标
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

use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::laplacian_filter;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 单张图像的拍摄质量指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
  /// 灰度均值 (0-255)
  pub brightness: f64,
  /// 拉普拉斯响应方差，越大越清晰
  pub blur_metric: f64,
  pub width: u32,
  pub height: u32,
}

// Rec.601 定点系数，与 OpenCV 的 RGB 转灰度一致，三者之和为 1 << 14
const GRAY_R: u32 = 4899;
const GRAY_G: u32 = 9617;
const GRAY_B: u32 = 1868;
const GRAY_SHIFT: u32 = 14;

/// 按 Rec.601 权重转灰度
pub fn to_luma(image: &RgbImage) -> GrayImage {
  GrayImage::from_fn(image.width(), image.height(), |x, y| {
    let [r, g, b] = image.get_pixel(x, y).0.map(u32::from);
    let luma = (r * GRAY_R + g * GRAY_G + b * GRAY_B + (1 << (GRAY_SHIFT - 1))) >> GRAY_SHIFT;
    Luma([luma as u8])
  })
}

/// 平均亮度
pub fn compute_brightness(image: &RgbImage) -> f64 {
  mean_intensity(&to_luma(image))
}

/// 清晰度：灰度图拉普拉斯响应的方差
pub fn compute_blur_metric(image: &RgbImage) -> f64 {
  laplacian_variance(&to_luma(image))
}

pub fn compute_image_quality_metrics(image: &RgbImage) -> QualityMetrics {
  // 灰度图只转换一次
  let gray = to_luma(image);
  let metrics = QualityMetrics {
    brightness: mean_intensity(&gray),
    blur_metric: laplacian_variance(&gray),
    width: image.width(),
    height: image.height(),
  };
  debug!(
    "质量指标: 亮度 {:.1}, 清晰度 {:.1}, 尺寸 {}x{}",
    metrics.brightness, metrics.blur_metric, metrics.width, metrics.height
  );
  metrics
}

fn mean_intensity(gray: &GrayImage) -> f64 {
  let pixels = gray.as_raw();
  if pixels.is_empty() {
    return 0.0;
  }
  let sum: u64 = pixels.iter().map(|&v| u64::from(v)).sum();
  sum as f64 / pixels.len() as f64
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
  if gray.width() == 0 || gray.height() == 0 {
    return 0.0;
  }
  let response = laplacian_filter(gray);
  let values = response.as_raw();
  let n = values.len() as f64;
  let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
  values
    .iter()
    .map(|&v| {
      let d = f64::from(v) - mean;
      d * d
    })
    .sum::<f64>()
    / n
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;
  use image::Rgb;

  #[test]
  fn uniform_image_has_flat_statistics() {
    let image = RgbImage::from_pixel(32, 24, Rgb([90, 90, 90]));
    let metrics = compute_image_quality_metrics(&image);
    assert_eq!(metrics.brightness, 90.0);
    assert_relative_eq!(metrics.blur_metric, 0.0);
    assert_eq!((metrics.width, metrics.height), (32, 24));
  }

  #[test]
  fn black_and_white_extremes() {
    let black = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
    let white = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
    assert_eq!(compute_brightness(&black), 0.0);
    assert_eq!(compute_brightness(&white), 255.0);
  }

  #[test]
  fn luma_uses_rec601_weights() {
    let green = RgbImage::from_pixel(4, 4, Rgb([0, 255, 0]));
    let leaf = RgbImage::from_pixel(4, 4, Rgb([80, 255, 80]));
    assert_eq!(compute_brightness(&green), 150.0);
    // Rec.709 会得到 205，越过过曝阈值
    assert_eq!(compute_brightness(&leaf), 183.0);
    assert_eq!(to_luma(&leaf).get_pixel(0, 0), &Luma([183]));
  }

  #[test]
  fn checkerboard_is_sharper_than_gradient() {
    let checker = RgbImage::from_fn(64, 64, |x, y| {
      if (x + y) % 2 == 0 {
        Rgb([255, 255, 255])
      } else {
        Rgb([0, 0, 0])
      }
    });
    let gradient = RgbImage::from_fn(64, 64, |x, _| {
      let v = (x * 4) as u8;
      Rgb([v, v, v])
    });
    let sharp = compute_blur_metric(&checker);
    let soft = compute_blur_metric(&gradient);
    assert!(sharp > 100.0);
    assert!(sharp > soft);
  }

  #[test]
  fn empty_image_is_zero_not_nan() {
    let image = RgbImage::new(0, 0);
    let metrics = compute_image_quality_metrics(&image);
    assert_eq!(metrics.brightness, 0.0);
    assert_eq!(metrics.blur_metric, 0.0);
  }
}
