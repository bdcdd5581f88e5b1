// source/mod.rs — 图片源模块入口
// 定义所有 provider 共享的抽象：ImageProvider Trait、解析上下文、随机源

pub mod earth;
pub mod epic;
pub mod mars;
pub mod payload;
pub mod rolling;
pub mod selector;

use crate::error::{FetchError, TransportError};
use crate::transport::Transport;
use async_trait::async_trait;
use chrono::NaiveDate;
use payload::{PayloadKind, ProviderResponse};
use rand::RngCore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use selector::ProviderSelector;

/// 注入的伪随机源
///
/// provider 选择、火星照片选择、地球坐标、EPIC 记录选择共用同一个随机源，
/// 测试中传入固定种子的 `StdRng` 即可得到确定的结果。
pub type RandomSource = dyn RngCore + Send;

/// 单次请求的默认超时
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// 图片来源
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// 好奇号火星车照片
    Mars,
    /// Landsat 地球单点影像
    Earth,
    /// DSCOVR EPIC 全色地球影像
    Epic,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Mars => "mars",
            ProviderKind::Earth => "earth",
            ProviderKind::Epic => "epic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 解析结果：图片地址 + 来源
///
/// 引擎不会验证该地址是否真的能下载到图片。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub url: String,
    pub provider: ProviderKind,
}

/// 一次解析过程共享的外部条件
///
/// - `transport`: 发起请求的传输实现
/// - `today`: 日期回滚的起点
/// - `fetch_timeout`: 单次请求的截止时间
/// - `cancel`: 取消信号，触发后循环在当前请求处立即停止
pub struct ResolveContext<'a> {
    pub transport: &'a dyn Transport,
    pub today: NaiveDate,
    pub fetch_timeout: Duration,
    pub cancel: CancellationToken,
}

impl<'a> ResolveContext<'a> {
    pub fn new(transport: &'a dyn Transport, today: NaiveDate) -> Self {
        Self {
            transport,
            today,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 发起一次带截止时间和取消检查的请求，并按期望形状解析响应
    pub async fn fetch(&self, url: &str, kind: PayloadKind) -> Result<ProviderResponse, FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            result = tokio::time::timeout(self.fetch_timeout, self.transport.fetch(url)) => match result {
                Ok(response) => response?,
                Err(_) => return Err(TransportError::Timeout(self.fetch_timeout.as_secs()).into()),
            },
        };

        payload::decode(&response, kind)
    }
}

/// 图片源的抽象 Trait
///
/// 每个实现封装自己的 URL 模板、响应形状和选图规则，
/// 只返回最终的图片地址或终止错误。
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        rng: &mut RandomSource,
    ) -> Result<String, crate::error::ResolveError>;
}
