// 该文件是 Leafscope（叶镜）项目的一部分。
// src/model/yolo26.rs - YOLO26 叶片病害检测模型
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

use std::time::Instant;

use image::imageops::FilterType;
use rknpu::{Context, InitFlags, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::{DetectResult, Detection, nms},
  frame::Frame,
  labels::LabelTable,
  model::Model,
  url_path,
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_INPUT_SIZE: u32 = 640;
const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];

pub const DEFAULT_CONF_THRESHOLD: f32 = 0.35;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MAX_DET: usize = 100;

#[derive(Error, Debug)]
pub enum Yolo26Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("参数 {0} 无效: {1}")]
  InvalidParameter(String, String),
}

impl Yolo26Error {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    Yolo26Error::ModelInvalid(msg.to_string(), e)
  }
}

pub struct Yolo26 {
  context: Context,
  labels: LabelTable,
  conf_threshold: f32,
  iou_threshold: f32,
  max_det: usize,
}

pub struct Yolo26Builder {
  model_path: String,
  flags: InitFlags,
  labels: LabelTable,
  conf_threshold: f32,
  iou_threshold: f32,
  max_det: usize,
}

impl FromUrlWithScheme for Yolo26Builder {
  const SCHEME: &'static str = "yolo26";
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Yolo26Error> {
  value
    .parse()
    .map_err(|_| Yolo26Error::InvalidParameter(key.to_string(), value.to_string()))
}

impl FromUrl for Yolo26Builder {
  type Error = Yolo26Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolo26Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = Yolo26Builder {
      model_path: url_path(url),
      flags: InitFlags::default(),
      labels: LabelTable::default(),
      conf_threshold: DEFAULT_CONF_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_det: DEFAULT_MAX_DET,
    };

    for (key, value) in url.query_pairs() {
      match &*key {
        "conf" => builder.conf_threshold = parse_param(&key, &value)?,
        "iou" => builder.iou_threshold = parse_param(&key, &value)?,
        "max_det" => builder.max_det = parse_param(&key, &value)?,
        "labels" => builder.labels = LabelTable::from_file(value.into_owned())?,
        other => debug!("忽略未知参数: {}", other),
      }
    }

    Ok(builder)
  }
}

impl Yolo26Builder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn labels(mut self, labels: LabelTable) -> Self {
    self.labels = labels;
    self
  }

  pub fn build(self) -> Result<Yolo26, Yolo26Error> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, self.flags)?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(Yolo26Error::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输出数量", e))?;

    if num_inputs != YOLO26_NUM_INPUTS || num_outputs != YOLO26_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(Yolo26Error::invalid(&msg, rknpu::Error::InvalidModel));
    }

    info!(
      "模型加载完成: {} 个类别, conf={}, iou={}, max_det={}",
      self.labels.len(),
      self.conf_threshold,
      self.iou_threshold,
      self.max_det
    );

    Ok(Yolo26 {
      context,
      labels: self.labels,
      conf_threshold: self.conf_threshold,
      iou_threshold: self.iou_threshold,
      max_det: self.max_det,
    })
  }
}

/// 根据张量大小区分回归与分类输出
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
  head_idx: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    debug!("检测头 {}: 输出顺序交换", head_idx);
    Some((tensor2, tensor1))
  } else {
    error!(
      "检测头 {}: 输出大小不匹配 - 张量1: {}, 张量2: {}, 期望回归: {}, 期望分类: {}",
      head_idx,
      tensor1.len(),
      tensor2.len(),
      reg_expected,
      cls_expected
    );
    None
  }
}

impl Yolo26 {
  fn preprocess(&self, frame: &Frame) -> Vec<u8> {
    image::imageops::resize(
      &frame.image,
      YOLO26_INPUT_SIZE,
      YOLO26_INPUT_SIZE,
      FilterType::Triangle,
    )
    .into_raw()
  }

  /// 解码三个检测头，框坐标缩放回原图像素
  fn postprocess(&self, output: &rknpu::Output, width: u32, height: u32) -> Vec<Detection> {
    let class_num = self.labels.len();
    let input_size = YOLO26_INPUT_SIZE as f32;
    let scale_x = width as f32 / input_size;
    let scale_y = height as f32 / input_size;
    let mut items = Vec::new();

    for (head_idx, (&(map_h, map_w), stride)) in
      YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate()
    {
      let spatial = map_h * map_w;
      let reg_expected = 4 * spatial;
      let cls_expected = class_num * spatial;

      let (tensor1, tensor2) = match (
        output.get_f32(head_idx * 2),
        output.get_f32(head_idx * 2 + 1),
      ) {
        (Ok(t1), Ok(t2)) => (t1, t2),
        (Err(e), _) | (_, Err(e)) => {
          error!("获取检测头 {} 的输出失败: {}", head_idx, e);
          continue;
        }
      };

      let Some((reg, cls)) =
        match_reg_cls_tensors(tensor1, tensor2, reg_expected, cls_expected, head_idx)
      else {
        continue;
      };

      for h in 0..map_h {
        for w in 0..map_w {
          let idx = h * map_w + w;

          let mut max_logit = f32::MIN;
          let mut class_id = 0usize;
          for c in 0..class_num {
            let logit = cls[c * spatial + idx];
            if logit > max_logit {
              max_logit = logit;
              class_id = c;
            }
          }
          let score = sigmoid(max_logit);
          if score < self.conf_threshold {
            continue;
          }

          let grid_x = (w as f32) + 0.5;
          let grid_y = (h as f32) + 0.5;
          let x1 = ((grid_x - reg[idx]) * stride).clamp(0.0, input_size);
          let y1 = ((grid_y - reg[spatial + idx]) * stride).clamp(0.0, input_size);
          let x2 = ((grid_x + reg[2 * spatial + idx]) * stride).clamp(0.0, input_size);
          let y2 = ((grid_y + reg[3 * spatial + idx]) * stride).clamp(0.0, input_size);

          let class_id = class_id as u32;
          items.push(Detection {
            class_id,
            class_name: self.labels.name(class_id).to_string(),
            confidence: score,
            bbox_xyxy: [x1 * scale_x, y1 * scale_y, x2 * scale_x, y2 * scale_y],
            green_ratio: None,
            area_ratio: None,
          });
        }
      }
    }

    debug!("NMS 前候选框数量: {}", items.len());
    nms(items, self.iou_threshold, self.max_det)
  }
}

impl Model for Yolo26 {
  type Input = Frame;
  type Output = DetectResult;
  type Error = Yolo26Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let start = Instant::now();

    debug!("设置模型输入");
    let data = self.preprocess(input);
    self
      .context
      .set_input(0, &data, rknpu::TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    let output = self.context.get_outputs()?;
    let items = self.postprocess(&output, input.width(), input.height());

    let inference_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    debug!(
      "检测到 {} 个目标, 耗时 {:.1} ms",
      items.len(),
      inference_time_ms
    );

    Ok(DetectResult {
      items,
      inference_time_ms,
    })
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
