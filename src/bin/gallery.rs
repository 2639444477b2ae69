// 该文件是 Leafscope（叶镜）项目的一部分。
// src/bin/gallery.rs - 拍摄记录列表
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use leafscope::output::list_captures;
use tracing::info;

/// 列出已保存的拍摄记录，最新的在前
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 拍摄记录目录
  #[arg(long, value_name = "DIR", default_value = "captures")]
  pub captures: PathBuf,
  /// 每条记录只输出一行摘要
  #[arg(long)]
  pub summary: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let records = list_captures(&args.captures)?;
  info!("{} 中共有 {} 条拍摄记录", args.captures.display(), records.len());

  if args.summary {
    for record in &records {
      println!(
        "{}\t{}\t{} 个检测\t{}",
        record.capture_id,
        record.timestamp.to_rfc3339(),
        record.feedback.summary.detections_count,
        record.feedback.summary.quality_score
      );
    }
  } else {
    println!("{}", serde_json::to_string_pretty(&records)?);
  }

  Ok(())
}
