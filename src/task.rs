// 该文件是 Leafscope（叶镜）项目的一部分。
// src/task.rs - 任务执行
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

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{thread, time::Duration};

use tracing::{info, warn};

use crate::{model::Model, output::Render};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static HANDLER: Once = Once::new();

/// 进程内只安装一次 Ctrl-C 处理器
fn install_interrupt_handler() {
  HANDLER.call_once(|| {
    let result = ctrlc::set_handler(|| {
      info!("收到中断信号，准备退出...");
      INTERRUPTED.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = result {
      warn!("无法设置 Ctrl-C 处理器: {}", e);
    }
  });
}

/// 运行任务，返回处理的帧数
pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<usize, Self::Error>;
}

/// 只处理第一帧
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<usize, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    info!("分析完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(1)
  }
}

/// 处理全部输入帧，可限制帧数，收到 Ctrl-C 后在当前帧结束时退出
#[derive(Default, Debug)]
pub struct BatchTask {
  frame_limit: Option<usize>,
}

impl BatchTask {
  pub fn with_frame_limit(mut self, frame_limit: Option<usize>) -> Self {
    self.frame_limit = frame_limit;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for BatchTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<usize, Self::Error> {
    info!("开始批处理任务...");
    install_interrupt_handler();
    INTERRUPTED.store(false, Ordering::SeqCst);

    let mut processed = 0;
    for frame in input {
      if self.frame_limit.is_some_and(|n| processed >= n) {
        info!("达到指定帧数 {}, 退出任务循环", processed);
        break;
      }
      let now = std::time::Instant::now();
      let result = model.infer(&frame)?;
      output.render_result(&frame, &result)?;
      processed += 1;
      info!("第 {} 帧处理完成，耗时: {:.2?}", processed, now.elapsed());

      if INTERRUPTED.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", processed);
    Ok(processed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;

  struct Doubler;

  impl Model for Doubler {
    type Input = u32;
    type Output = u32;
    type Error = std::io::Error;

    fn infer(&self, input: &u32) -> Result<u32, Self::Error> {
      Ok(input * 2)
    }
  }

  #[derive(Default)]
  struct Collect(RefCell<Vec<u32>>);

  impl Render<u32, u32> for &Collect {
    type Error = std::io::Error;

    fn render_result(&self, _frame: &u32, result: &u32) -> Result<(), Self::Error> {
      self.0.borrow_mut().push(*result);
      Ok(())
    }
  }

  #[test]
  fn one_shot_uses_first_frame() {
    let sink = Collect::default();
    let n = OneShotTask.run_task(vec![3, 4].into_iter(), Doubler, &sink).unwrap();
    assert_eq!(n, 1);
    assert_eq!(*sink.0.borrow(), vec![6]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let sink = Collect::default();
    assert!(OneShotTask.run_task(Vec::new().into_iter(), Doubler, &sink).is_err());
  }

  #[test]
  fn batch_respects_frame_limit() {
    let sink = Collect::default();
    let n = BatchTask::default()
      .with_frame_limit(Some(2))
      .run_task(vec![1, 2, 3].into_iter(), Doubler, &sink)
      .unwrap();
    assert_eq!(n, 2);
    assert_eq!(*sink.0.borrow(), vec![2, 4]);
  }
}
