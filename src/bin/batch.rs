// 该文件是 Leafscope（叶镜）项目的一部分。
// src/bin/batch.rs - 目录批量分析
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use url::Url;

use leafscope::{
  FromUrl,
  analyzer::Analyzer,
  args::{AnalyzerArgs, AnnotatorArgs},
  input::InputWrapper,
  model::ModelWrapper,
  output::OutputWrapper,
  task::{BatchTask, Task},
};
use tracing::info;

/// 批量分析目录中的叶片照片
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型，例如 replay:///data/detections 或 yolo26:///models/plantdoc.rknn
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入目录，例如 folder:///data/photos
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，可重复：json:///out/reports/、folder:///captures
  #[arg(long, value_name = "OUTPUT", required = true)]
  pub output: Vec<Url>,
  /// 最多处理的帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  #[command(flatten)]
  pub analyzer: AnalyzerArgs,

  #[command(flatten)]
  pub annotator: AnnotatorArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);

  let input = InputWrapper::from_url(&args.input)?;
  let model = ModelWrapper::from_url(&args.model)?;
  let analyzer = Analyzer::new(model, args.analyzer.load_catalog()?, args.analyzer.config());
  let annotator = args.annotator.annotator()?;
  let outputs = args
    .output
    .iter()
    .map(|url| {
      info!("输出: {}", url);
      OutputWrapper::from_url(url).map(|output| output.with_fallback_annotator(&annotator))
    })
    .collect::<Result<Vec<_>, _>>()?;

  let processed = BatchTask::default()
    .with_frame_limit(args.frame_number)
    .run_task(input, analyzer, outputs)?;
  info!("共分析 {} 张图像", processed);

  Ok(())
}
