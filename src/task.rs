// 该文件是 Yunsun （云隼） 项目的一部分。
// src/task.rs - 后台处理任务
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

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{self, ClassConfig};
use crate::detect::Detection;
use crate::geo::Projector;
use crate::pipeline::{Pipeline, PipelineError, height};
use crate::session::Session;

/// 一次处理请求的选项。
#[derive(Debug, Clone, Copy)]
pub struct ProcessingRequest {
  pub detect_vehicle: bool,
  pub detect_person: bool,
  pub detect_cone: bool,
  /// 是否执行高度融合。
  pub include_elevation: bool,
  /// 置信度阈值覆盖，None 时使用各类别内置阈值。
  pub conf_override: Option<f32>,
  /// 高度先验采样种子。
  pub seed: u64,
}

impl Default for ProcessingRequest {
  fn default() -> Self {
    Self {
      detect_vehicle: true,
      detect_person: true,
      detect_cone: true,
      include_elevation: true,
      conf_override: None,
      seed: height::DEFAULT_SEED,
    }
  }
}

impl ProcessingRequest {
  /// 请求勾选的类别，顺序与配置表一致。
  pub fn classes(&self) -> Vec<&'static ClassConfig> {
    config::CLASSES
      .iter()
      .filter(|cfg| match cfg.class {
        "car" => self.detect_vehicle,
        "person" => self.detect_person,
        "cone" => self.detect_cone,
        _ => false,
      })
      .collect()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
  Pending,
  Running,
  Done,
  Error,
}

impl std::fmt::Display for JobStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      JobStatus::Pending => "pending",
      JobStatus::Running => "running",
      JobStatus::Done => "done",
      JobStatus::Error => "error",
    })
  }
}

/// 轮询得到的任务状态快照。
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
  pub id: String,
  pub status: JobStatus,
  pub progress: u8,
  pub current_step: String,
  /// 自任务启动起算的秒数，保留一位小数。
  pub elapsed_seconds: f64,
}

enum JobEvent {
  Progress(u8, String),
  Finished(Vec<Detection>),
  Failed(String),
}

/// 后台处理任务的句柄。
///
/// 进度与结果经通道送回，由调用方轮询汇集；句柄被丢弃时
/// 后台线程继续运行到结束。结果只在任务完成后整体产出，
/// 取消或失败的任务不产出任何检测。
pub struct JobHandle {
  id: String,
  rx: Receiver<JobEvent>,
  cancel: Arc<AtomicBool>,
  worker: Option<JoinHandle<()>>,
  started: Instant,
  status: JobStatus,
  progress: u8,
  step: String,
  results: Option<Vec<Detection>>,
}

impl JobHandle {
  /// 以会话当前数据启动一次后台处理。
  ///
  /// 未装载影像或请求的类别均无检测器时立即失败，不产生任务。
  pub fn spawn(
    session: &Session,
    request: ProcessingRequest,
    projector: Option<Arc<dyn Projector + Send + Sync>>,
  ) -> Result<Self, PipelineError> {
    let raster = session.ortho().ok_or(PipelineError::MissingRaster)?;
    let registry = session.registry().clone();
    let classes = request.classes();
    if !classes.iter().any(|cfg| registry.contains(cfg.class)) {
      return Err(PipelineError::NoDetectors);
    }
    let cloud = session.cloud();

    let id = format!("job_{}", chrono::Local::now().timestamp());
    info!("启动后台任务 {}", id);

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let (tx, rx) = mpsc::channel();

    let worker = thread::spawn(move || {
      let progress_tx = tx.clone();
      let sink = move |percent: u8, step: &str| {
        let _ = progress_tx.send(JobEvent::Progress(percent, step.to_string()));
      };

      let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let pipeline = Pipeline {
          raster: &*raster,
          cloud: cloud.as_deref(),
          registry: &registry,
          classes,
          include_elevation: request.include_elevation,
          conf_override: request.conf_override,
          seed: request.seed,
          projector: projector.as_deref(),
        };
        pipeline.execute(&sink, &worker_cancel)
      }));

      match outcome {
        Ok(Ok(detections)) => {
          info!("后台任务完成，共 {} 个目标", detections.len());
          let _ = tx.send(JobEvent::Finished(detections));
        }
        Ok(Err(e)) => {
          warn!("后台任务失败: {}", e);
          let _ = tx.send(JobEvent::Failed(e.to_string()));
        }
        Err(payload) => {
          let message = panic_text(payload.as_ref());
          error!("后台任务崩溃: {}", message);
          let _ = tx.send(JobEvent::Failed(message));
        }
      }
    });

    Ok(Self {
      id,
      rx,
      cancel,
      worker: Some(worker),
      started: Instant::now(),
      status: JobStatus::Pending,
      progress: 0,
      step: String::new(),
      results: None,
    })
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// 汇集后台送回的事件并返回当前快照。
  pub fn poll(&mut self) -> JobView {
    loop {
      match self.rx.try_recv() {
        Ok(JobEvent::Progress(percent, step)) => {
          self.status = JobStatus::Running;
          self.progress = percent;
          self.step = step;
        }
        Ok(JobEvent::Finished(detections)) => {
          self.status = JobStatus::Done;
          self.progress = 100;
          self.results = Some(detections);
        }
        Ok(JobEvent::Failed(message)) => {
          self.status = JobStatus::Error;
          self.step = message;
        }
        Err(TryRecvError::Empty) => break,
        Err(TryRecvError::Disconnected) => {
          if !self.is_finished() {
            self.status = JobStatus::Error;
            self.step = String::from("任务异常终止");
          }
          break;
        }
      }
    }
    self.view()
  }

  /// 请求取消，实际停止点在下一个滑窗或阶段边界。
  pub fn cancel(&self) {
    self.cancel.store(true, Ordering::Relaxed);
  }

  /// 可跨线程共享的取消开关，供信号处理等场景持有。
  pub fn cancel_flag(&self) -> Arc<AtomicBool> {
    Arc::clone(&self.cancel)
  }

  pub fn is_finished(&self) -> bool {
    matches!(self.status, JobStatus::Done | JobStatus::Error)
  }

  /// 等待后台线程退出并返回最终快照。
  pub fn wait(&mut self) -> JobView {
    if let Some(worker) = self.worker.take() {
      let _ = worker.join();
    }
    self.poll()
  }

  /// 任务完成后取走检测结果，只能取走一次。
  pub fn take_results(&mut self) -> Option<Vec<Detection>> {
    self.results.take()
  }

  fn view(&self) -> JobView {
    JobView {
      id: self.id.clone(),
      status: self.status,
      progress: self.progress,
      current_step: self.step.clone(),
      elapsed_seconds: (self.started.elapsed().as_secs_f64() * 10.0).round() / 10.0,
    }
  }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(text) = payload.downcast_ref::<&str>() {
    (*text).to_string()
  } else if let Some(text) = payload.downcast_ref::<String>() {
    text.clone()
  } else {
    String::from("任务异常终止")
  }
}
