// 该文件是 Leafscope（叶镜）项目的一部分。
// src/labels.rs - 类别标签表
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

use tracing::info;

/// PlantDoc 数据集类别名称
pub const PLANTDOC_CLASSES: [&str; 30] = [
  "Apple Scab Leaf",
  "Apple leaf",
  "Apple rust leaf",
  "Bell_pepper leaf spot",
  "Bell_pepper leaf",
  "Blueberry leaf",
  "Cherry leaf",
  "Corn Gray leaf spot",
  "Corn leaf blight",
  "Corn rust leaf",
  "Peach leaf",
  "Potato leaf early blight",
  "Potato leaf late blight",
  "Potato leaf",
  "Raspberry leaf",
  "Soyabean leaf",
  "Soybean leaf",
  "Squash Powdery mildew leaf",
  "Strawberry leaf",
  "Tomato Early blight leaf",
  "Tomato Septoria leaf spot",
  "Tomato leaf bacterial spot",
  "Tomato leaf late blight",
  "Tomato leaf mosaic virus",
  "Tomato leaf yellow virus",
  "Tomato leaf",
  "Tomato mold leaf",
  "Tomato two spotted spider mites leaf",
  "grape leaf black rot",
  "grape leaf",
];

const UNKNOWN_LABEL: &str = "unknown";

/// 类别索引到名称的映射
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
  names: Vec<String>,
}

impl Default for LabelTable {
  fn default() -> Self {
    Self::plantdoc()
  }
}

impl LabelTable {
  pub fn plantdoc() -> Self {
    Self {
      names: PLANTDOC_CLASSES.iter().map(|s| s.to_string()).collect(),
    }
  }

  /// 每行一个类别名，忽略空行
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
    let path = path.as_ref();
    let names: Vec<String> = std::fs::read_to_string(path)?
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    info!("从 {} 加载 {} 个类别", path.display(), names.len());
    Ok(Self { names })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn name(&self, class_id: u32) -> &str {
    self
      .names
      .get(class_id as usize)
      .map(String::as_str)
      .unwrap_or(UNKNOWN_LABEL)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::{SuggestionCatalog, normalize_class_name};

  #[test]
  fn every_plantdoc_class_has_exact_catalog_entry() {
    let catalog = SuggestionCatalog::builtin();
    for name in PLANTDOC_CLASSES {
      let key = normalize_class_name(name);
      assert!(
        catalog.entries().iter().any(|e| e.key == key),
        "缺少建议条目: {}",
        key
      );
    }
  }

  #[test]
  fn unknown_id_falls_back() {
    let labels = LabelTable::plantdoc();
    assert_eq!(labels.name(25), "Tomato leaf");
    assert_eq!(labels.name(99), "unknown");
  }

  #[test]
  fn loads_label_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.txt");
    std::fs::write(&path, "rice blast\n\n  rice healthy \n").unwrap();
    let labels = LabelTable::from_file(&path).unwrap();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels.name(1), "rice healthy");
  }
}
