// 该文件是 Leafscope（叶镜）项目的一部分。
// src/output/draw.rs - 检测结果标注
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_HEIGHT: u32 = 12;
const LABEL_CHAR_WIDTH: f32 = 9.0; // 无字体时按字符数估算宽度
const LABEL_PADDING: i32 = 5;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const TEXT_COLOR: [u8; 3] = [0, 0, 0];

#[derive(Error, Debug)]
pub enum FontError {
  #[error("字体文件读取失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 在图像上绘制可信检测框与标签
#[derive(Clone)]
pub struct Annotator {
  font: Option<FontArc>,
  font_size: f32,
  color: Rgb<u8>,
  text_color: Rgb<u8>,
}

impl Default for Annotator {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      color: Rgb(BOX_COLOR),
      text_color: Rgb(TEXT_COLOR),
    }
  }
}

impl Annotator {
  pub fn with_font(font: FontArc) -> Self {
    Self {
      font: Some(font),
      ..Self::default()
    }
  }

  pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, FontError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    info!("加载标注字体: {}", path.display());
    Ok(Self::with_font(font))
  }

  /// 读取 URL 中的 `font` 参数，没有则不绘制文字
  pub fn from_url_query(url: &Url) -> Result<Self, FontError> {
    match url.query_pairs().find(|(k, _)| k == "font") {
      Some((_, path)) => Self::from_font_file(path.into_owned()),
      None => Ok(Self::default()),
    }
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 标签文本，例如 `tomato_leaf 0.87 (G:0.42)`
  pub fn label(detection: &crate::detection::Detection) -> String {
    let mut label = format!("{} {:.2}", detection.class_name, detection.confidence);
    if let Some(green) = detection.green_ratio {
      label.push_str(&format!(" (G:{:.2})", green));
    }
    label
  }

  fn label_size(&self, label: &str) -> (u32, u32) {
    match &self.font {
      Some(font) => text_size(PxScale::from(self.font_size), font, label),
      None => (
        (label.chars().count() as f32 * LABEL_CHAR_WIDTH) as u32,
        LABEL_TEXT_HEIGHT,
      ),
    }
  }

  fn draw_box(&self, image: &mut RgbImage, bbox: &[f32; 4]) -> Option<(i32, i32)> {
    let [x1, y1, x2, y2] = bbox.map(|v| v as i32);
    if x2 <= x1 || y2 <= y1 {
      return None;
    }

    for t in 0..BOX_THICKNESS {
      let w = x2 - x1 + 1 - 2 * t;
      let h = y2 - y1 + 1 - 2 * t;
      if w <= 0 || h <= 0 {
        break;
      }
      let rect = Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32);
      draw_hollow_rect_mut(image, rect, self.color);
    }
    Some((x1, y1))
  }

  fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, label: &str) {
    let (text_w, text_h) = self.label_size(label);
    let bar_w = text_w + 2 * LABEL_PADDING as u32;
    let bar_h = text_h + 2 * LABEL_PADDING as u32;
    // 框上方没有空间时贴着图像上沿
    let bar_y = (y - bar_h as i32).max(0);

    draw_filled_rect_mut(image, Rect::at(x, bar_y).of_size(bar_w, bar_h), self.color);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        self.text_color,
        x + LABEL_PADDING,
        bar_y + LABEL_PADDING,
        PxScale::from(self.font_size),
        font,
        label,
      );
    }
  }

  pub fn annotate(&self, image: &RgbImage, detections: &[crate::detection::Detection]) -> RgbImage {
    let mut canvas = image.clone();
    for detection in detections {
      let Some((x, y)) = self.draw_box(&mut canvas, &detection.bbox_xyxy) else {
        debug!("跳过退化检测框: {:?}", detection.bbox_xyxy);
        continue;
      };
      self.draw_label(&mut canvas, x, y, &Self::label(detection));
    }
    canvas
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::Detection;

  #[test]
  fn label_includes_green_ratio_when_known() {
    let mut detection = Detection::new(0, "tomato_leaf", 0.873, [0.0, 0.0, 1.0, 1.0]).unwrap();
    assert_eq!(Annotator::label(&detection), "tomato_leaf 0.87");
    detection.green_ratio = Some(0.4249);
    assert_eq!(Annotator::label(&detection), "tomato_leaf 0.87 (G:0.42)");
  }

  #[test]
  fn draws_green_box_and_label_bar() {
    let image = RgbImage::from_pixel(100, 100, Rgb([10, 10, 10]));
    let detection = Detection::new(0, "apple_leaf", 0.9, [20.0, 60.0, 80.0, 90.0]).unwrap();
    let annotated = Annotator::default().annotate(&image, &[detection]);

    // 左边框两像素宽
    assert_eq!(annotated.get_pixel(20, 75), &Rgb(BOX_COLOR));
    assert_eq!(annotated.get_pixel(21, 75), &Rgb(BOX_COLOR));
    assert_eq!(annotated.get_pixel(22, 75), &Rgb([10, 10, 10]));
    // 标签底色在框上方
    assert_eq!(annotated.get_pixel(25, 50), &Rgb(BOX_COLOR));
    // 原图不变
    assert_eq!(image.get_pixel(20, 75), &Rgb([10, 10, 10]));
  }

  #[test]
  fn degenerate_box_is_skipped() {
    let image = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
    let detection = Detection::new(0, "apple_leaf", 0.9, [5.0, 5.0, 5.0, 8.0]).unwrap();
    assert_eq!(Annotator::default().annotate(&image, &[detection]), image);
  }
}
