// error.rs — 错误类型模块
// 区分"单次请求失败"（可重试）与"整次解析失败"（终止）两层错误

use crate::source::ProviderKind;
use thiserror::Error;

/// 传输层错误：网络、DNS、超时
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// 测试桩使用的通用错误
    #[cfg(test)]
    #[error("{0}")]
    Other(String),
}

/// 单次请求（某个日期 / 某组坐标）的失败原因
///
/// 除 `Cancelled` 外，这些错误都只在重试循环内部消化，
/// 转换为"日期后退一天，继续尝试"，不会单独返回给调用方。
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed response body: {0}")]
    Decode(String),

    /// 接口返回了结构化的错误信息（限流、API Key 无效等）
    #[error("API error: {0}")]
    Api(String),

    #[error("no usable image: {0}")]
    EmptyResult(String),

    #[error("request cancelled")]
    Cancelled,
}

/// 跨越 provider 边界的终止错误
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no images found after {attempts} attempts")]
    ExhaustedRetries { attempts: usize },

    /// 不做重试的单次请求失败（EPIC）
    #[error(transparent)]
    Fetch(FetchError),

    #[error("resolution cancelled")]
    Cancelled,

    #[error("no image provider available")]
    NoProviderAvailable,

    #[error("{provider} provider failed: {source}")]
    NoProviderSucceeded {
        provider: ProviderKind,
        #[source]
        source: Box<ResolveError>,
    },
}

// 取消信号必须原样穿透，不能被包装成普通的请求失败
impl From<FetchError> for ResolveError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Cancelled => ResolveError::Cancelled,
            other => ResolveError::Fetch(other),
        }
    }
}

impl ResolveError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            ResolveError::Cancelled => true,
            ResolveError::NoProviderSucceeded { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
