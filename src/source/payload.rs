// payload.rs — 响应体解析
// 三个 provider 返回的数据形状各不相同，这里统一转换成 ProviderResponse

use crate::error::FetchError;
use crate::transport::HttpResponse;
use serde::Deserialize;

/// 火星车照片记录
#[derive(Deserialize, Debug, Clone)]
pub struct MarsPhoto {
    /// 照片原图地址
    pub img_src: String,
}

/// Mars Rover Photos 接口的顶层结构
/// 缺少 photos 字段时视为空列表
#[derive(Deserialize, Debug)]
struct MarsPhotosResponse {
    #[serde(default)]
    photos: Vec<MarsPhoto>,
}

/// EPIC 图像记录
#[derive(Deserialize, Debug, Clone)]
pub struct EpicRecord {
    /// 图像标识符（如 "epic_1b_20240307112233"）
    pub image: String,
    /// 拍摄时间，格式 "YYYY-MM-DD HH:MM:SS"
    pub date: String,
}

/// 接口错误体
///
/// api.nasa.gov 有两种形式：
/// - `{"msg": "..."}`（Mars / Earth 接口自身的错误）
/// - `{"error": {"code": "...", "message": "..."}}`（网关层：限流、Key 无效）
#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<GatewayError>,
}

#[derive(Deserialize, Debug)]
struct GatewayError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// 期望的响应形状，由发起请求的 provider 决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    MarsPhotos,
    Image,
    EpicRecords,
}

/// 解析后的响应，恰好有一个变体被填充
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    MarsPhotos(Vec<MarsPhoto>),
    /// 接口直接返回了图片字节
    Image { content_type: String, len: usize },
    EpicRecords(Vec<EpicRecord>),
}

/// 将一次 HTTP 响应解析为指定形状
///
/// 判定顺序：
/// 1. Content-Type 以 `image/` 开头 → 图片（只有期望图片时才算成功）
/// 2. 响应体是带非空错误信息的 JSON 对象 → `FetchError::Api`
/// 3. 按期望形状反序列化，失败 → `FetchError::Decode`
pub fn decode(response: &HttpResponse, kind: PayloadKind) -> Result<ProviderResponse, FetchError> {
    let content_type = response.content_type().unwrap_or_default();

    if content_type.starts_with("image/") {
        return match kind {
            PayloadKind::Image => Ok(ProviderResponse::Image {
                content_type: content_type.to_string(),
                len: response.body.len(),
            }),
            _ => Err(FetchError::Decode(format!(
                "expected JSON, got `{content_type}`"
            ))),
        };
    }

    if let Some(message) = api_error_message(&response.body) {
        return Err(FetchError::Api(message));
    }

    match kind {
        PayloadKind::MarsPhotos => {
            let parsed: MarsPhotosResponse = parse_json(&response.body)?;
            Ok(ProviderResponse::MarsPhotos(parsed.photos))
        }
        PayloadKind::EpicRecords => Ok(ProviderResponse::EpicRecords(parse_json(&response.body)?)),
        PayloadKind::Image => Err(FetchError::Decode(format!(
            "expected image content, got `{}` (HTTP {})",
            content_type, response.status
        ))),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// 提取错误信息；响应体不是对象、或错误字段为空时返回 None
fn api_error_message(body: &[u8]) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_slice(body).ok()?;

    if let Some(msg) = parsed.msg.filter(|m| !m.is_empty()) {
        return Some(msg);
    }

    let error = parsed.error?;
    match (error.code, error.message) {
        (Some(code), Some(message)) if !message.is_empty() => Some(format!("{code}: {message}")),
        (None, Some(message)) if !message.is_empty() => Some(message),
        (Some(code), _) if !code.is_empty() => Some(code),
        _ => None,
    }
}
