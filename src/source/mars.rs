// mars.rs — 火星车照片源
// 按地球日期列出好奇号当天拍摄的照片，随机挑一张

use super::payload::{PayloadKind, ProviderResponse};
use super::rolling::{DATE_FORMAT, DatedEndpoint, Extraction, RollingDateResolver};
use super::{ImageProvider, ProviderKind, RandomSource, ResolveContext};
use crate::error::ResolveError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use tracing::debug;

/// 默认回滚天数：火星车并非每天都有照片回传
pub const DEFAULT_MAX_DAYS: usize = 30;

pub const DEFAULT_ROVER: &str = "curiosity";

pub struct MarsProvider {
    base_url: String,
    api_key: String,
    rover: String,
    resolver: RollingDateResolver,
}

impl MarsProvider {
    /// # 参数
    /// - `base_url`: API 根地址（如 "https://api.nasa.gov"）
    /// - `rover`: 火星车名称，默认 curiosity
    /// - `max_days`: 最多回滚的天数
    pub fn new(base_url: &str, api_key: &str, rover: &str, max_days: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            rover: rover.to_string(),
            resolver: RollingDateResolver::new(max_days),
        }
    }
}

impl DatedEndpoint for MarsProvider {
    fn url_for(&self, date: NaiveDate) -> String {
        format!(
            "{}/mars-photos/api/v1/rovers/{}/photos?earth_date={}&api_key={}",
            self.base_url,
            self.rover,
            date.format(DATE_FORMAT),
            self.api_key
        )
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::MarsPhotos
    }

    fn extract(&self, payload: ProviderResponse, rng: &mut RandomSource) -> Extraction {
        let ProviderResponse::MarsPhotos(photos) = payload else {
            return Extraction::NotFound("unexpected payload shape".into());
        };

        match photos.choose(rng) {
            Some(photo) => {
                debug!(candidates = photos.len(), img_src = %photo.img_src, "picked Mars photo");
                Extraction::ImageAt(photo.img_src.clone())
            }
            None => Extraction::NotFound("no Mars images found".into()),
        }
    }
}

#[async_trait]
impl ImageProvider for MarsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mars
    }

    async fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        rng: &mut RandomSource,
    ) -> Result<String, ResolveError> {
        self.resolver.resolve(ctx, self, rng).await
    }
}
