// rolling.rs — 日期回滚重试驱动
// "今天没有就试昨天，昨天没有就试前天……" 的通用实现

use super::payload::{PayloadKind, ProviderResponse};
use super::{RandomSource, ResolveContext};
use crate::error::{FetchError, ResolveError};
use chrono::NaiveDate;
use tracing::{info, warn};

/// 接口使用的日期格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 提取步骤的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// 响应体中给出了图片地址
    ImageAt(String),
    /// 请求 URL 本身就是图片（接口直接返回图片字节）
    DirectImage,
    /// 本次响应里没有可用图片，附带原因
    NotFound(String),
}

/// 按日期参数化的接口
///
/// 每个 provider 各自实现：如何拼 URL、期望什么形状的响应、如何从响应中挑出图片。
pub trait DatedEndpoint: Send + Sync {
    fn url_for(&self, date: NaiveDate) -> String;

    fn payload_kind(&self) -> PayloadKind;

    fn extract(&self, payload: ProviderResponse, rng: &mut RandomSource) -> Extraction;
}

/// 单次尝试的请求参数，构造后不可变
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub date: NaiveDate,
    pub url: String,
}

impl ImageRequest {
    fn build(endpoint: &dyn DatedEndpoint, date: NaiveDate) -> Self {
        Self {
            date,
            url: endpoint.url_for(date),
        }
    }
}

/// 一次解析过程中的游标，只在 resolve() 内部存活
#[derive(Debug)]
struct RetryState {
    date: NaiveDate,
    attempts: usize,
}

impl RetryState {
    fn starting(today: NaiveDate) -> Self {
        Self {
            date: today,
            attempts: 0,
        }
    }

    /// 后退一天；到达日历下界时返回 false
    fn step_back(&mut self) -> bool {
        match self.date.pred_opt() {
            Some(previous) => {
                self.date = previous;
                true
            }
            None => false,
        }
    }
}

/// 日期回滚解析器
#[derive(Debug, Clone, Copy)]
pub struct RollingDateResolver {
    max_attempts: usize,
}

impl RollingDateResolver {
    pub fn new(max_attempts: usize) -> Self {
        Self { max_attempts }
    }

    /// 从 `ctx.today` 开始逐日向前尝试，直到拿到图片或用完次数
    ///
    /// 请求失败、响应无法解析、接口返回错误、响应中没有图片，
    /// 都只会让日期后退一天；只有取消会立即终止循环。
    pub async fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        endpoint: &dyn DatedEndpoint,
        rng: &mut RandomSource,
    ) -> Result<String, ResolveError> {
        let mut state = RetryState::starting(ctx.today);

        while state.attempts < self.max_attempts {
            state.attempts += 1;
            let request = ImageRequest::build(endpoint, state.date);
            info!(attempt = state.attempts, date = %request.date.format(DATE_FORMAT), url = %request.url, "checking URL");

            let failure = match ctx.fetch(&request.url, endpoint.payload_kind()).await {
                Ok(payload) => match endpoint.extract(payload, rng) {
                    Extraction::ImageAt(url) if !url.is_empty() => return Ok(url),
                    Extraction::DirectImage => return Ok(request.url),
                    Extraction::ImageAt(_) => FetchError::EmptyResult("empty image locator".into()),
                    Extraction::NotFound(reason) => FetchError::EmptyResult(reason),
                },
                Err(FetchError::Cancelled) => return Err(ResolveError::Cancelled),
                Err(err) => err,
            };
            warn!(attempt = state.attempts, date = %request.date.format(DATE_FORMAT), error = %failure, "no image for date");

            if !state.step_back() {
                break;
            }
        }

        Err(ResolveError::ExhaustedRetries {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stub::{HangingTransport, ScriptedTransport, json};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// 把日期直接编码进 URL，并把 JSON 里的第一张照片作为结果
    struct Listing;

    impl DatedEndpoint for Listing {
        fn url_for(&self, date: NaiveDate) -> String {
            format!("https://listing.test/{}", date.format(DATE_FORMAT))
        }

        fn payload_kind(&self) -> PayloadKind {
            PayloadKind::MarsPhotos
        }

        fn extract(&self, payload: ProviderResponse, _rng: &mut RandomSource) -> Extraction {
            match payload {
                ProviderResponse::MarsPhotos(photos) => photos
                    .first()
                    .map(|p| Extraction::ImageAt(p.img_src.clone()))
                    .unwrap_or_else(|| Extraction::NotFound("empty".into())),
                _ => Extraction::NotFound("wrong shape".into()),
            }
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn exhausts_after_exactly_max_attempts_with_descending_dates() {
        let transport = ScriptedTransport::new();
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(7);

        let err = RollingDateResolver::new(4)
            .resolve(&ctx, &Listing, &mut rng)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::ExhaustedRetries { attempts: 4 }));
        // 跨越闰年二月
        assert_eq!(
            transport.requests(),
            vec![
                "https://listing.test/2024-03-01",
                "https://listing.test/2024-02-29",
                "https://listing.test/2024-02-28",
                "https://listing.test/2024-02-27",
            ]
        );
    }

    #[tokio::test]
    async fn stops_at_first_successful_attempt() {
        let transport = ScriptedTransport::new()
            .then_error("dns failure")
            .then(json(r#"{"msg":"No photos"}"#))
            .then(json(r#"{"photos":[]}"#))
            .then(json(r#"{"photos":[{"img_src":"https://mars.test/4.jpg"}]}"#))
            .then(json(r#"{"photos":[{"img_src":"https://mars.test/5.jpg"}]}"#));
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(7);

        let url = RollingDateResolver::new(30)
            .resolve(&ctx, &Listing, &mut rng)
            .await
            .unwrap();

        assert_eq!(url, "https://mars.test/4.jpg");
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test]
    async fn direct_image_returns_the_request_url() {
        struct Direct;
        impl DatedEndpoint for Direct {
            fn url_for(&self, date: NaiveDate) -> String {
                format!("https://earth.test/?date={}", date.format(DATE_FORMAT))
            }
            fn payload_kind(&self) -> PayloadKind {
                PayloadKind::Image
            }
            fn extract(&self, _payload: ProviderResponse, _rng: &mut RandomSource) -> Extraction {
                Extraction::DirectImage
            }
        }

        let transport = ScriptedTransport::new()
            .then(json(r#"{"msg":"no imagery"}"#))
            .then(crate::transport::stub::image());
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(1);

        let url = RollingDateResolver::new(3)
            .resolve(&ctx, &Direct, &mut rng)
            .await
            .unwrap();
        assert_eq!(url, "https://earth.test/?date=2024-02-29");
    }

    #[tokio::test]
    async fn empty_locator_is_a_failed_attempt() {
        let transport =
            ScriptedTransport::new().then(json(r#"{"photos":[{"img_src":""}]}"#));
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(1);

        let err = RollingDateResolver::new(2)
            .resolve(&ctx, &Listing, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ExhaustedRetries { attempts: 2 }));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_fetch_counts_as_failed_attempt() {
        let transport = HangingTransport::new();
        let ctx = ResolveContext::new(&transport, today()).with_timeout(Duration::from_secs(5));
        let mut rng = StdRng::seed_from_u64(1);

        let err = RollingDateResolver::new(3)
            .resolve(&ctx, &Listing, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ExhaustedRetries { attempts: 3 }));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_in_flight_fetch() {
        let transport = HangingTransport::new();
        let cancel = CancellationToken::new();
        let ctx = ResolveContext::new(&transport, today())
            .with_timeout(Duration::from_secs(60))
            .with_cancellation(cancel.clone());
        let mut rng = StdRng::seed_from_u64(1);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            cancel.cancel();
        });

        let err = RollingDateResolver::new(30)
            .resolve(&ctx, &Listing, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Cancelled));
        // 第一次请求还没超时就被打断，日期不会回滚
        assert_eq!(transport.requests(), vec!["https://listing.test/2024-03-01"]);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let transport = ScriptedTransport::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = ResolveContext::new(&transport, today()).with_cancellation(cancel);
        let mut rng = StdRng::seed_from_u64(1);

        let err = RollingDateResolver::new(30)
            .resolve(&ctx, &Listing, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Cancelled));
        assert!(transport.requests().is_empty());
    }
}
