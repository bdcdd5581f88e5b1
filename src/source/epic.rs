// epic.rs — DSCOVR EPIC 全色影像源
// 接口不带日期参数，直接返回最近一天的影像列表，所以不做日期回滚

use super::payload::{EpicRecord, PayloadKind, ProviderResponse};
use super::{ImageProvider, ProviderKind, RandomSource, ResolveContext};
use crate::error::{FetchError, ResolveError};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{debug, info};

/// 影像归档站点
pub const DEFAULT_ARCHIVE_URL: &str = "https://epic.gsfc.nasa.gov";

pub struct EpicProvider {
    base_url: String,
    api_key: String,
    archive_url: String,
}

impl EpicProvider {
    pub fn new(base_url: &str, api_key: &str, archive_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            archive_url: archive_url.trim_end_matches('/').to_string(),
        }
    }

    fn listing_url(&self) -> String {
        format!("{}/EPIC/api/natural?api_key={}", self.base_url, self.api_key)
    }

    /// 拼出归档中的 PNG 原图地址
    pub fn archive_url(&self, record: &EpicRecord) -> String {
        format!(
            "{}/archive/natural/{}/png/{}.png",
            self.archive_url,
            date_path(&record.date),
            record.image
        )
    }
}

/// 将 "2024-03-07 11:22:33" 转换为归档目录 "2024/03/07"
pub fn date_path(timestamp: &str) -> String {
    let date = timestamp.split(' ').next().unwrap_or(timestamp);
    date.replace('-', "/")
}

#[async_trait]
impl ImageProvider for EpicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Epic
    }

    async fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        rng: &mut RandomSource,
    ) -> Result<String, ResolveError> {
        let url = self.listing_url();
        info!(url = %url, "checking URL");

        let records = match ctx.fetch(&url, PayloadKind::EpicRecords).await? {
            ProviderResponse::EpicRecords(records) => records,
            _ => return Err(FetchError::Decode("unexpected payload shape".into()).into()),
        };

        let record = records
            .choose(rng)
            .ok_or_else(|| FetchError::EmptyResult("no EPIC images available".into()))?;
        debug!(candidates = records.len(), image = %record.image, date = %record.date, "picked EPIC image");

        Ok(self.archive_url(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stub::{ScriptedTransport, json};
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn provider() -> EpicProvider {
        EpicProvider::new("https://api.test", "KEY", DEFAULT_ARCHIVE_URL)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()
    }

    #[test]
    fn date_path_uses_only_the_day() {
        assert_eq!(date_path("2024-03-07 11:22:33"), "2024/03/07");
        assert_eq!(date_path("2024-03-07"), "2024/03/07");
    }

    #[test]
    fn archive_url_layout() {
        let record = EpicRecord {
            image: "epic_1b_20240307112233".into(),
            date: "2024-03-07 11:22:33".into(),
        };
        assert_eq!(
            provider().archive_url(&record),
            "https://epic.gsfc.nasa.gov/archive/natural/2024/03/07/png/epic_1b_20240307112233.png"
        );
    }

    #[tokio::test]
    async fn resolves_with_a_single_fetch() {
        let transport = ScriptedTransport::new().then(json(
            r#"[{"image":"epic_1b_20240307112233","date":"2024-03-07 11:22:33","caption":"x"}]"#,
        ));
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(9);

        let url = provider().resolve(&ctx, &mut rng).await.unwrap();

        assert_eq!(
            url,
            "https://epic.gsfc.nasa.gov/archive/natural/2024/03/07/png/epic_1b_20240307112233.png"
        );
        assert_eq!(transport.requests(), vec!["https://api.test/EPIC/api/natural?api_key=KEY"]);
    }

    #[tokio::test]
    async fn empty_listing_is_an_error_without_retry() {
        let transport = ScriptedTransport::new().then(json("[]"));
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(9);

        let err = provider().resolve(&ctx, &mut rng).await.unwrap_err();

        assert!(matches!(err, ResolveError::Fetch(FetchError::EmptyResult(_))));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_surfaces() {
        let transport = ScriptedTransport::new().then_error("connection reset");
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(9);

        let err = provider().resolve(&ctx, &mut rng).await.unwrap_err();
        assert!(matches!(err, ResolveError::Fetch(FetchError::Transport(_))));
    }
}
