// 该文件是 Leafscope（叶镜）项目的一部分。
// src/catalog.rs - 病害建议库
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CatalogError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("建议库 JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("建议库条目 '{0}' 没有任何建议")]
  EmptySuggestions(String),
}

/// 通用健康叶片建议
pub const HEALTHY_FALLBACK: [&str; 2] = [
  "Daun tampak sehat",
  "Lanjutkan praktik perawatan saat ini",
];

/// 无法识别类别时的通用建议
pub const EXPERT_FALLBACK: [&str; 4] = [
  "Konsultasikan dengan layanan penyuluhan pertanian atau patolog tanaman",
  "Dokumentasikan gejala dengan foto yang jelas",
  "Pantau perkembangan penyakit",
  "Pertimbangkan pengujian laboratorium untuk diagnosis akurat",
];

// 顺序即部分匹配时的优先级，不可随意调整
const BUILTIN_SUGGESTIONS: &[(&str, &[&str])] = &[
  (
    "apple_scab_leaf",
    &[
      "Pertimbangkan untuk membuang daun yang sangat terinfeksi untuk mengurangi penyebaran spora",
      "Tingkatkan sirkulasi udara di sekitar tanaman",
      "Hindari penyiraman dari atas; siram di permukaan tanah",
      "Pantau secara teratur untuk deteksi dini penyebaran",
    ],
  ),
  (
    "apple_rust_leaf",
    &[
      "Hapus pohon cedar terdekat jika memungkinkan (inang alternatif)",
      "Aplikasikan fungisida selama cuaca basah di musim semi",
      "Pilih varietas tahan untuk penanaman masa depan",
      "Tingkatkan drainase dan sirkulasi udara",
    ],
  ),
  (
    "apple_leaf",
    &[
      "Daun tampak sehat - lanjutkan praktik perawatan saat ini",
      "Pertahankan pemantauan rutin untuk deteksi masalah dini",
      "Pastikan nutrisi dan manajemen air yang memadai",
    ],
  ),
  (
    "bell_pepper_leaf_spot",
    &[
      "Gunakan benih dan transplantasi bebas patogen",
      "Hindari bekerja dengan tanaman saat basah",
      "Aplikasikan produk berbasis tembaga secara preventif",
      "Praktikkan rotasi tanaman dengan tanaman non-inang",
    ],
  ),
  (
    "bell_pepper_leaf",
    &[
      "Tanaman paprika tampak sehat",
      "Lanjutkan praktik pertumbuhan saat ini",
    ],
  ),
  (
    "blueberry_leaf",
    &[
      "Daun blueberry tampak sehat",
      "Pertahankan pH tanah (4.5-5.5) dan kelembaban yang memadai",
    ],
  ),
  (
    "cherry_leaf",
    &[
      "Daun ceri tampak sehat",
      "Lanjutkan pemantauan rutin dan praktik budidaya yang baik",
    ],
  ),
  (
    "corn_gray_leaf_spot",
    &[
      "Praktikkan rotasi tanaman dengan tanaman non-inang",
      "Buang sisa tanaman setelah panen",
      "Pertimbangkan hibrida tahan untuk musim berikutnya",
      "Pantau kondisi cuaca yang mendukung penyebaran penyakit",
    ],
  ),
  (
    "corn_leaf_blight",
    &[
      "Praktikkan rotasi tanaman (minimal 2-3 tahun)",
      "Kubur sisa tanaman melalui pengolahan tanah dalam",
      "Gunakan hibrida tahan",
      "Aplikasikan fungisida pada tahap awal penyakit jika diperlukan",
    ],
  ),
  (
    "corn_rust_leaf",
    &[
      "Tanam hibrida tahan jika tersedia",
      "Pantau perkembangan penyakit secara teratur",
      "Aplikasikan fungisida jika ambang ekonomi tercapai",
      "Pastikan nutrisi seimbang, terutama nitrogen",
    ],
  ),
  (
    "peach_leaf",
    &[
      "Daun persik tampak sehat",
      "Pertahankan pemantauan dan perawatan kebun secara teratur",
    ],
  ),
  (
    "potato_leaf_early_blight",
    &[
      "Buang daun bawah yang terinfeksi",
      "Aplikasikan fungisida yang sesuai secara preventif",
      "Pertahankan jarak tanam yang memadai untuk sirkulasi udara",
      "Praktikkan rotasi tanaman",
    ],
  ),
  (
    "potato_leaf_late_blight",
    &[
      "Ini adalah penyakit serius - bertindak cepat",
      "Buang dan hancurkan tanaman yang terinfeksi segera",
      "Aplikasikan fungisida protektif pada tanaman sehat",
      "Pantau kondisi cuaca (cuaca dingin dan basah mendukung penyakit)",
    ],
  ),
  (
    "potato_leaf",
    &[
      "Dedaunan kentang tampak sehat",
      "Lanjutkan pemantauan dan praktik saat ini",
    ],
  ),
  (
    "raspberry_leaf",
    &[
      "Daun raspberry tampak sehat",
      "Pertahankan rejimen perawatan saat ini",
    ],
  ),
  (
    "soyabean_leaf",
    &[
      "Daun kedelai tampak sehat",
      "Lanjutkan pemantauan sepanjang musim tanam",
    ],
  ),
  (
    "soybean_leaf",
    &[
      "Daun kedelai tampak sehat",
      "Lanjutkan pemantauan sepanjang musim tanam",
    ],
  ),
  (
    "squash_powdery_mildew_leaf",
    &[
      "Tingkatkan sirkulasi udara di sekitar tanaman",
      "Siram di permukaan tanah, hindari membasahi dedaunan",
      "Aplikasikan perawatan sulfur atau kalium bikarbonat",
      "Buang daun yang sangat terinfeksi",
    ],
  ),
  (
    "strawberry_leaf",
    &[
      "Daun stroberi tampak sehat",
      "Pertahankan praktik budidaya yang baik",
    ],
  ),
  (
    "tomato_early_blight_leaf",
    &[
      "Buang daun bawah yang terinfeksi",
      "Mulsa untuk mencegah percikan tanah",
      "Aplikasikan fungisida secara preventif",
      "Pastikan jarak tanam yang memadai",
    ],
  ),
  (
    "tomato_septoria_leaf_spot",
    &[
      "Buang daun bawah yang terinfeksi",
      "Hindari penyiraman dari atas",
      "Aplikasikan fungisida yang sesuai",
      "Praktikkan rotasi tanaman",
    ],
  ),
  (
    "tomato_leaf_bacterial_spot",
    &[
      "Gunakan benih dan transplantasi bebas penyakit",
      "Hindari irigasi dari atas",
      "Aplikasikan produk berbasis tembaga secara preventif",
      "Buang tanaman yang sangat terinfeksi",
    ],
  ),
  (
    "tomato_leaf_late_blight",
    &[
      "Ini adalah penyakit serius yang memerlukan tindakan segera",
      "Buang dan hancurkan tanaman yang terinfeksi",
      "Aplikasikan fungisida protektif pada tanaman yang tidak terinfeksi",
      "Pantau cuaca (kondisi dingin dan basah mendukung penyakit)",
    ],
  ),
  (
    "tomato_leaf_mosaic_virus",
    &[
      "Buang dan hancurkan tanaman yang terinfeksi segera",
      "Kendalikan vektor kutu daun",
      "Gunakan varietas tahan virus",
      "Praktikkan sanitasi yang baik (cuci tangan, desinfeksi alat)",
    ],
  ),
  (
    "tomato_leaf_yellow_virus",
    &[
      "Kendalikan vektor kutu putih (metode transmisi utama)",
      "Buang tanaman yang terinfeksi untuk mencegah penyebaran",
      "Gunakan mulsa reflektif untuk menghalau kutu putih",
      "Tanam varietas tahan jika tersedia",
    ],
  ),
  (
    "tomato_leaf",
    &[
      "Daun tomat tampak sehat",
      "Lanjutkan praktik pertumbuhan dan pemantauan saat ini",
    ],
  ),
  (
    "tomato_mold_leaf",
    &[
      "Tingkatkan ventilasi rumah kaca jika tumbuh di dalam ruangan",
      "Kurangi tingkat kelembaban",
      "Buang daun yang terinfeksi",
      "Beri jarak tanaman yang memadai untuk sirkulasi udara",
    ],
  ),
  (
    "tomato_two_spotted_spider_mites_leaf",
    &[
      "Tingkatkan kelembaban di sekitar tanaman (tungau lebih suka kondisi kering)",
      "Semprot tanaman dengan air untuk mengusir tungau",
      "Gunakan sabun insektisida atau minyak neem",
      "Dorong serangga predator yang bermanfaat",
    ],
  ),
  (
    "grape_leaf_black_rot",
    &[
      "Buang buah anggur yang mummi dan daun yang terinfeksi",
      "Pangkas untuk meningkatkan sirkulasi udara dan penetrasi cahaya",
      "Aplikasikan fungisida preventif selama periode rentan",
      "Pertahankan sanitasi kebun anggur",
    ],
  ),
  (
    "grape_leaf",
    &[
      "Daun anggur tampak sehat",
      "Lanjutkan praktik manajemen kebun anggur saat ini",
    ],
  ),
];

/// 类别名归一化：小写，空格与连字符替换为下划线
pub fn normalize_class_name(class_name: &str) -> String {
  class_name.to_lowercase().replace([' ', '-'], "_")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
  pub key: String,
  pub suggestions: Vec<String>,
}

/// 病害类别到栽培建议的只读映射
///
/// 条目顺序是查询契约的一部分：部分匹配时取第一个命中的条目。
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionCatalog {
  entries: Vec<CatalogEntry>,
}

impl Default for SuggestionCatalog {
  fn default() -> Self {
    Self::builtin()
  }
}

impl SuggestionCatalog {
  /// 内置建议库
  pub fn builtin() -> Self {
    let entries = BUILTIN_SUGGESTIONS
      .iter()
      .map(|(key, suggestions)| CatalogEntry {
        key: key.to_string(),
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
      })
      .collect();
    Self { entries }
  }

  /// 由条目构造，键会被归一化，空建议列表视为错误
  pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
    let entries = entries
      .into_iter()
      .map(|entry| {
        if entry.suggestions.is_empty() {
          return Err(CatalogError::EmptySuggestions(entry.key));
        }
        Ok(CatalogEntry {
          key: normalize_class_name(&entry.key),
          suggestions: entry.suggestions,
        })
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { entries })
  }

  /// 从 JSON 文件加载，格式为 `[{"key": ..., "suggestions": [...]}, ...]`
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
    let path = path.as_ref();
    info!("加载建议库: {}", path.display());
    let data = std::fs::read_to_string(path)?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&data)?;
    let catalog = Self::from_entries(entries)?;
    info!("建议库条目数: {}", catalog.len());
    Ok(catalog)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn entries(&self) -> &[CatalogEntry] {
    &self.entries
  }

  /// 查询类别建议，结果总是非空
  ///
  /// 依次尝试：精确匹配；按条目顺序的双向子串匹配；含 "healthy" 的通用健康建议；
  /// 最后是咨询专家的通用建议。
  pub fn lookup(&self, class_name: &str) -> Vec<&str> {
    let normalized = normalize_class_name(class_name);

    let matched = self
      .entries
      .iter()
      .find(|entry| entry.key == normalized)
      .or_else(|| {
        self
          .entries
          .iter()
          .find(|entry| normalized.contains(&entry.key) || entry.key.contains(&normalized))
      });

    if let Some(entry) = matched {
      debug!("类别 '{}' 匹配建议条目 '{}'", class_name, entry.key);
      return entry.suggestions.iter().map(String::as_str).collect();
    }

    if normalized.contains("healthy") {
      HEALTHY_FALLBACK.to_vec()
    } else {
      debug!("类别 '{}' 无匹配条目，使用通用建议", class_name);
      EXPERT_FALLBACK.to_vec()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_covers_plantdoc_classes() {
    let catalog = SuggestionCatalog::builtin();
    assert_eq!(catalog.len(), 30);
    assert!(
      catalog
        .entries()
        .iter()
        .all(|e| (2..=4).contains(&e.suggestions.len()))
    );
  }

  #[test]
  fn normalizes_spaces_and_hyphens() {
    assert_eq!(normalize_class_name("Tomato-Leaf"), "tomato_leaf");
    assert_eq!(
      normalize_class_name("Bell_pepper leaf spot"),
      "bell_pepper_leaf_spot"
    );
  }

  #[test]
  fn exact_match_after_normalization() {
    let catalog = SuggestionCatalog::builtin();
    assert_eq!(
      catalog.lookup("Tomato-Leaf"),
      vec![
        "Daun tomat tampak sehat",
        "Lanjutkan praktik pertumbuhan dan pemantauan saat ini"
      ]
    );
    assert_eq!(
      catalog.lookup("Tomato leaf late blight")[0],
      "Ini adalah penyakit serius yang memerlukan tindakan segera"
    );
  }

  #[test]
  fn partial_match_takes_first_entry_in_order() {
    let catalog = SuggestionCatalog::builtin();
    // "apple_scab_leaf" 在表中先于 "apple_leaf"
    assert_eq!(
      catalog.lookup("apple scab leaf severe"),
      catalog.lookup("apple_scab_leaf")
    );
    // 名称被条目键包含
    assert_eq!(catalog.lookup("corn_rust"), catalog.lookup("corn_rust_leaf"));
  }

  #[test]
  fn healthy_and_expert_fallbacks() {
    let catalog = SuggestionCatalog::builtin();
    assert_eq!(catalog.lookup("Mango healthy"), HEALTHY_FALLBACK.to_vec());
    assert_eq!(catalog.lookup("Orchid wilt"), EXPERT_FALLBACK.to_vec());
  }

  #[test]
  fn custom_entries_are_normalized_and_checked() {
    let catalog = SuggestionCatalog::from_entries(vec![CatalogEntry {
      key: "Rice Blast".to_string(),
      suggestions: vec!["Kurangi pupuk nitrogen".to_string()],
    }])
    .unwrap();
    assert_eq!(catalog.lookup("rice-blast"), vec!["Kurangi pupuk nitrogen"]);

    let err = SuggestionCatalog::from_entries(vec![CatalogEntry {
      key: "empty".to_string(),
      suggestions: vec![],
    }])
    .unwrap_err();
    assert!(matches!(err, CatalogError::EmptySuggestions(key) if key == "empty"));
  }
}
