// 该文件是 Leafscope（叶镜）项目的一部分。
// tests/pipeline.rs - 端到端分析流程测试
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

use approx::assert_relative_eq;
use image::{Rgb, RgbImage};
use url::Url;

use leafscope::{
  FromUrl,
  analyzer::{Analyzer, AnalyzerConfig},
  catalog::SuggestionCatalog,
  feedback::DISCLAIMER,
  input::FolderInput,
  labels::LabelTable,
  model::{Model, ReplayModel},
  output::{CaptureFolderOutput, JsonReportOutput, OutputWrapper, draw::Annotator, list_captures},
  task::{BatchTask, Task},
};

/// 左半叶绿色、右半灰色背景
fn leaf_photo() -> RgbImage {
  RgbImage::from_fn(400, 400, |x, _| {
    if x < 200 {
      Rgb([40, 160, 40])
    } else {
      Rgb([128, 128, 128])
    }
  })
}

const LEAF_DETECTIONS: &str = r#"{
  "items": [
    {"class_id": 25, "class_name": "Tomato leaf", "confidence": 0.85, "bbox_xyxy": [20, 20, 180, 180]},
    {"class_id": 19, "class_name": "Tomato Early blight leaf", "confidence": 0.6, "bbox_xyxy": [250, 250, 380, 380]},
    {"class_id": 1, "class_name": "Apple leaf", "confidence": 0.9, "bbox_xyxy": [0, 0, 400, 400]}
  ],
  "inference_time_ms": 18.5
}"#;

fn prepare(root: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
  let photos = root.join("photos");
  let replay = root.join("replay");
  std::fs::create_dir_all(&photos).unwrap();
  std::fs::create_dir_all(&replay).unwrap();

  leaf_photo().save(photos.join("leaf.png")).unwrap();
  RgbImage::from_pixel(300, 200, Rgb([128, 128, 128]))
    .save(photos.join("wall.png"))
    .unwrap();

  std::fs::write(replay.join("leaf.json"), LEAF_DETECTIONS).unwrap();
  std::fs::write(replay.join("wall.json"), "[]").unwrap();
  (photos, replay)
}

#[test]
fn analyzer_filters_and_explains() {
  let dir = tempfile::tempdir().unwrap();
  let (photos, replay) = prepare(dir.path());

  let model = ReplayModel::new(&replay, LabelTable::plantdoc()).unwrap();
  let analyzer = Analyzer::new(model, SuggestionCatalog::builtin(), AnalyzerConfig::default());
  let frame = FolderInput::open(&photos).unwrap().next().unwrap();
  assert_eq!(frame.stem(), "leaf");

  let analysis = analyzer.infer(&frame).unwrap();

  assert_eq!(analysis.raw_detections.len(), 3);
  assert_eq!(analysis.detections.len(), 1);
  assert_eq!(analysis.filtering_stats.removed_count, 2);
  assert_eq!(analysis.inference_time_ms, 18.5);

  let kept = &analysis.detections[0];
  assert_eq!(kept.class_name, "Tomato leaf");
  assert_relative_eq!(kept.green_ratio.unwrap(), 1.0);
  assert_relative_eq!(kept.area_ratio.unwrap(), 0.16);

  let feedback = &analysis.feedback;
  assert_eq!(feedback.disclaimer, DISCLAIMER);
  assert_eq!(feedback.summary.detections_count, 1);
  assert_eq!(feedback.summary.unique_diseases, 1);
  assert_relative_eq!(feedback.summary.max_confidence, 0.85);
  assert!(feedback.critique[0].starts_with("✓ Pencahayaan memadai"));
  assert!(
    feedback
      .critique
      .iter()
      .any(|c| c == "✓ Deteksi ditemukan dengan kepercayaan hingga 85.00%")
  );
  assert!(feedback.suggestions.iter().any(|s| s == "\n📋 Untuk Tomato leaf:"));
}

#[test]
fn batch_writes_capture_records_and_reports() {
  let dir = tempfile::tempdir().unwrap();
  let (photos, replay) = prepare(dir.path());
  let captures = dir.path().join("captures");
  let reports = dir.path().join("reports");

  let input = FolderInput::open(&photos).unwrap();
  let model = ReplayModel::new(&replay, LabelTable::plantdoc()).unwrap();
  let analyzer = Analyzer::new(model, SuggestionCatalog::builtin(), AnalyzerConfig::default());
  let report_url = Url::parse(&format!("json://{}/", reports.display())).unwrap();
  let outputs = vec![
    OutputWrapper::CaptureFolderOutput(CaptureFolderOutput::new(&captures, Annotator::default())),
    OutputWrapper::JsonReportOutput(JsonReportOutput::from_url(&report_url).unwrap()),
  ];

  let processed = BatchTask::default().run_task(input, analyzer, outputs).unwrap();
  assert_eq!(processed, 2);

  assert!(reports.join("leaf.json").is_file());
  let wall_report: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(reports.join("wall.json")).unwrap()).unwrap();
  assert_eq!(wall_report["filtering_stats"]["raw_count"], 0);
  assert_eq!(wall_report["feedback"]["summary"]["quality_score"], "cukup");

  let mut records = list_captures(&captures).unwrap();
  assert_eq!(records.len(), 2);
  records.sort_by_key(|r| r.detections.len());

  let wall = &records[0];
  assert!(wall.detections.is_empty());
  assert_eq!(
    wall.feedback.critique.last().unwrap(),
    "⚠️ Resolusi rendah (300x200)"
  );

  let leaf = &records[1];
  assert_eq!(leaf.detections.len(), 1);
  assert_eq!(leaf.inference_time_ms, 18.5);
  assert!(leaf.capture_id.starts_with("capture_"));
  assert!(captures.join(&leaf.original_image).is_file());
  assert!(captures.join(&leaf.annotated_image).is_file());
  assert_eq!(leaf.annotated_image, format!("{}_detected.jpg", leaf.capture_id));
}

#[test]
fn gallery_skips_broken_records() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("capture_20260101_000000_000000_data.json"), "{").unwrap();
  std::fs::write(dir.path().join("notes.json"), "{}").unwrap();
  assert!(list_captures(dir.path()).unwrap().is_empty());
}

#[test]
fn batch_appends_one_report_line_per_frame() {
  let dir = tempfile::tempdir().unwrap();
  let (photos, replay) = prepare(dir.path());
  let report = dir.path().join("out").join("report.json");
  std::fs::create_dir_all(report.parent().unwrap()).unwrap();
  std::fs::write(&report, "stale\n").unwrap();

  let input = FolderInput::open(&photos).unwrap();
  let model = ReplayModel::new(&replay, LabelTable::plantdoc()).unwrap();
  let analyzer = Analyzer::new(model, SuggestionCatalog::builtin(), AnalyzerConfig::default());
  let report_url = Url::parse(&format!("json://{}", report.display())).unwrap();
  let outputs = vec![OutputWrapper::JsonReportOutput(
    JsonReportOutput::from_url(&report_url).unwrap(),
  )];

  let processed = BatchTask::default().run_task(input, analyzer, outputs).unwrap();
  assert_eq!(processed, 2);

  let text = std::fs::read_to_string(&report).unwrap();
  let lines: Vec<serde_json::Value> = text
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();
  assert_eq!(lines.len(), 2);
  assert!(lines[0]["source"].as_str().unwrap().ends_with("leaf.png"));
  assert!(lines[1]["source"].as_str().unwrap().ends_with("wall.png"));
  assert_eq!(lines[1]["filtering_stats"]["raw_count"], 0);
}
