//! 模拟传输层
//!
//! Scripted in-memory transport. Responses are served in FIFO order; every
//! call, cancel and emitted event is recorded for inspection.

use super::transport::{DeviceEvent, Transport, TransportResponse};
use crate::core::errors::WalletError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// 一次被记录的 `call` 调用
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub namespace: String,
    pub method: String,
    pub args: Value,
}

/// 下一次 `call` 的行为
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(TransportResponse),
    /// Link-level failure
    Fail(WalletError),
    /// Sleep, then respond
    Delay(Duration, TransportResponse),
    /// Block until `cancel` is called, then fail with the given error
    Hang(WalletError),
}

/// 脚本驱动的内存传输层, 供测试使用
pub struct MockTransport {
    device_id: String,
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
    events: Mutex<Vec<(String, DeviceEvent)>>,
    call_count: AtomicUsize,
    cancel_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    cancelled: Notify,
}

impl MockTransport {
    /// 创建空脚本的模拟设备
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            cancel_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            cancelled: Notify::new(),
        }
    }

    /// 追加一步脚本
    pub fn push(&self, step: Scripted) -> &Self {
        self.script.lock().push_back(step);
        self
    }

    /// 追加一个成功响应
    pub fn respond_ok(&self, method: &str, payload: Value) -> &Self {
        self.push(Scripted::Respond(TransportResponse::ok(method, payload)))
    }

    /// 追加一个 `success == false` 的厂商失败响应
    pub fn respond_err(&self, method: &str, payload: Value) -> &Self {
        self.push(Scripted::Respond(TransportResponse::failed(method, payload)))
    }

    /// 已发生的 `call` 次数
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// `cancel` 被调用的次数
    pub fn cancel_count(&self) -> usize {
        self.cancel_count.load(Ordering::SeqCst)
    }

    /// 观察到的最大并发 `call` 数
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// 所有已记录的调用 (按顺序)
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// 通过 `emit` 收到的诊断事件
    pub fn events(&self) -> Vec<(String, DeviceEvent)> {
        self.events.lock().clone()
    }

    /// 尚未消费的脚本步数
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    async fn call(
        &self,
        namespace: &str,
        method: &str,
        args: Value,
    ) -> Result<TransportResponse, WalletError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        debug!(namespace, method, "mock transport call");
        self.calls.lock().push(RecordedCall {
            namespace: namespace.to_string(),
            method: method.to_string(),
            args,
        });

        let step = self.script.lock().pop_front();
        match step {
            Some(Scripted::Respond(resp)) => Ok(resp),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Delay(d, resp)) => {
                tokio::time::sleep(d).await;
                Ok(resp)
            }
            Some(Scripted::Hang(err)) => {
                self.cancelled.notified().await;
                Err(err)
            }
            None => Err(WalletError::device_failed(
                format!("no scripted response for {}.{}", namespace, method),
                None,
            )),
        }
    }

    async fn cancel(&self) -> Result<(), WalletError> {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
        self.cancelled.notify_one();
        Ok(())
    }

    fn emit(&self, topic: &str, event: DeviceEvent) {
        self.events.lock().push((topic.to_string(), event));
    }
}
