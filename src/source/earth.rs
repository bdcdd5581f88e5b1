// earth.rs — 地球单点影像源
// 单点影像只在极少数坐标/日期组合下存在，所以有两层重试：
// 外层随机换坐标，内层对同一坐标做日期回滚

use super::payload::{PayloadKind, ProviderResponse};
use super::rolling::{DATE_FORMAT, DatedEndpoint, Extraction, RollingDateResolver};
use super::{ImageProvider, ProviderKind, RandomSource, ResolveContext};
use crate::error::ResolveError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use tracing::{debug, info, warn};

pub const DEFAULT_COORDINATE_ATTEMPTS: usize = 5;
pub const DEFAULT_MAX_DAYS: usize = 3;
/// 影像边长（度）
pub const DEFAULT_DIM: f64 = 0.2;

/// 经纬度，每次外层尝试重新抽取
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// 纬度均匀取自 [-90, 90]，经度均匀取自 [-180, 180]
    pub fn random(rng: &mut RandomSource) -> Self {
        Self {
            lat: rng.gen_range(-90.0..=90.0),
            lon: rng.gen_range(-180.0..=180.0),
        }
    }
}

pub struct EarthProvider {
    base_url: String,
    api_key: String,
    dim: f64,
    coordinate_attempts: usize,
    resolver: RollingDateResolver,
}

impl EarthProvider {
    pub fn new(
        base_url: &str,
        api_key: &str,
        dim: f64,
        coordinate_attempts: usize,
        max_days: usize,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            dim,
            coordinate_attempts,
            resolver: RollingDateResolver::new(max_days),
        }
    }

    fn endpoint(&self, coordinates: Coordinates) -> EarthEndpoint<'_> {
        EarthEndpoint {
            provider: self,
            coordinates,
        }
    }
}

/// 固定坐标后的日期参数化接口
struct EarthEndpoint<'a> {
    provider: &'a EarthProvider,
    coordinates: Coordinates,
}

impl DatedEndpoint for EarthEndpoint<'_> {
    fn url_for(&self, date: NaiveDate) -> String {
        format!(
            "{}/planetary/earth/imagery?lon={:.6}&lat={:.6}&date={}&dim={}&api_key={}",
            self.provider.base_url,
            self.coordinates.lon,
            self.coordinates.lat,
            date.format(DATE_FORMAT),
            self.provider.dim,
            self.provider.api_key
        )
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Image
    }

    // 接口直接返回图片字节，请求地址本身就是图片地址
    fn extract(&self, payload: ProviderResponse, _rng: &mut RandomSource) -> Extraction {
        match payload {
            ProviderResponse::Image { content_type, len } => {
                debug!(%content_type, bytes = len, "Earth imagery returned");
                Extraction::DirectImage
            }
            _ => Extraction::NotFound("response is not an image".into()),
        }
    }
}

#[async_trait]
impl ImageProvider for EarthProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Earth
    }

    async fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        rng: &mut RandomSource,
    ) -> Result<String, ResolveError> {
        for attempt in 1..=self.coordinate_attempts {
            let coordinates = Coordinates::random(rng);
            info!(attempt, lat = coordinates.lat, lon = coordinates.lon, "trying Earth coordinates");

            let endpoint = self.endpoint(coordinates);
            match self.resolver.resolve(ctx, &endpoint, rng).await {
                Ok(url) => return Ok(url),
                Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
                Err(err) => warn!(attempt, error = %err, "Earth attempt failed"),
            }
        }

        Err(ResolveError::ExhaustedRetries {
            attempts: self.coordinate_attempts,
        })
    }
}
