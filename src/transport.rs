// transport.rs — HTTP 传输层
// 对外只暴露一个 fetch 能力：给定 URL，返回状态码、响应头和响应体

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use std::time::Duration;

/// 一次完整的 HTTP 响应
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// 读取 Content-Type，头不存在或不是合法字符串时返回 None
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 传输层抽象
///
/// 解析引擎只依赖这个 Trait，测试中用脚本化的桩实现替换真实网络。
/// 所有调用都是顺序执行的，实现无需考虑并发请求。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// 基于 reqwest 的传输实现
pub struct ReqwestTransport {
    /// HTTP 客户端（内部有连接池，应复用）
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// 创建带整体超时的客户端
    ///
    /// # 参数
    /// - `timeout`: 单次请求（含读取响应体）的最长耗时
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("astrowall/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout.as_secs())
            } else {
                TransportError::Request(e)
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
