// selector.rs — 随机选择图片源
// 每次调用均匀地挑一个 provider 并委托给它，调用之间不保留任何状态

use super::earth::EarthProvider;
use super::epic::EpicProvider;
use super::mars::MarsProvider;
use super::{ImageProvider, ProviderKind, RandomSource, ResolveContext, ResolvedImage};
use crate::config::AppConfig;
use crate::error::ResolveError;
use rand::seq::SliceRandom;
use tracing::info;

pub struct ProviderSelector {
    providers: Vec<Box<dyn ImageProvider>>,
}

impl ProviderSelector {
    pub fn new(providers: Vec<Box<dyn ImageProvider>>) -> Self {
        Self { providers }
    }

    /// 按配置创建包含全部三个 provider 的选择器
    pub fn from_config(config: &AppConfig) -> Self {
        let api_key = config.api_key();
        Self::new(vec![
            Box::new(MarsProvider::new(
                &config.base_url,
                api_key,
                &config.mars.rover,
                config.mars.max_days,
            )),
            Box::new(EarthProvider::new(
                &config.base_url,
                api_key,
                config.earth.dim,
                config.earth.coordinate_attempts,
                config.earth.max_days,
            )),
            Box::new(EpicProvider::new(
                &config.base_url,
                api_key,
                &config.epic_archive_url,
            )),
        ])
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    /// 随机挑一个 provider 解析出图片地址
    pub async fn resolve_random_image(
        &self,
        ctx: &ResolveContext<'_>,
        rng: &mut RandomSource,
    ) -> Result<ResolvedImage, ResolveError> {
        self.resolve_with(ctx, rng, None).await
    }

    /// 与 `resolve_random_image` 相同，但 `pinned` 为 Some 时跳过随机选择
    pub async fn resolve_with(
        &self,
        ctx: &ResolveContext<'_>,
        rng: &mut RandomSource,
        pinned: Option<ProviderKind>,
    ) -> Result<ResolvedImage, ResolveError> {
        let provider = match pinned {
            Some(kind) => self.providers.iter().find(|p| p.kind() == kind),
            None => self.providers.choose(&mut *rng),
        }
        .ok_or(ResolveError::NoProviderAvailable)?;

        let kind = provider.kind();
        info!(provider = %kind, pinned = pinned.is_some(), "selected provider");

        match provider.resolve(ctx, rng).await {
            Ok(url) => Ok(ResolvedImage {
                url,
                provider: kind,
            }),
            Err(err) => Err(ResolveError::NoProviderSucceeded {
                provider: kind,
                source: Box::new(err),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stub::{ScriptedTransport, image, json};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    /// 不发请求，直接返回固定地址
    struct Fixed(ProviderKind);

    #[async_trait]
    impl ImageProvider for Fixed {
        fn kind(&self) -> ProviderKind {
            self.0
        }

        async fn resolve(
            &self,
            _ctx: &ResolveContext<'_>,
            _rng: &mut RandomSource,
        ) -> Result<String, ResolveError> {
            Ok(format!("https://{}.test/image.png", self.0))
        }
    }

    fn fixed_selector() -> ProviderSelector {
        ProviderSelector::new(vec![
            Box::new(Fixed(ProviderKind::Mars)),
            Box::new(Fixed(ProviderKind::Earth)),
            Box::new(Fixed(ProviderKind::Epic)),
        ])
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()
    }

    fn nasa_selector() -> ProviderSelector {
        ProviderSelector::new(vec![
            Box::new(MarsProvider::new("https://api.test", "KEY", "curiosity", 30)),
            Box::new(EarthProvider::new("https://api.test", "KEY", 0.2, 5, 3)),
            Box::new(EpicProvider::new(
                "https://api.test",
                "KEY",
                "https://epic.test",
            )),
        ])
    }

    /// 对任何 provider 都能给出结果的脚本：先失败一次，再返回可用响应
    fn deterministic_transport() -> ScriptedTransport {
        ScriptedTransport::new()
            .then(json(r#"{"msg":"rate limited"}"#))
            .then(image())
    }

    #[tokio::test]
    async fn every_provider_gets_picked() {
        let selector = fixed_selector();
        let transport = ScriptedTransport::new();
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(0);

        let mut seen = HashSet::new();
        for _ in 0..60 {
            let image = selector.resolve_random_image(&ctx, &mut rng).await.unwrap();
            assert_eq!(image.url, format!("https://{}.test/image.png", image.provider));
            seen.insert(image.provider);
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn pinned_provider_skips_random_choice() {
        let selector = fixed_selector();
        let transport = ScriptedTransport::new();
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..10 {
            let image = selector
                .resolve_with(&ctx, &mut rng, Some(ProviderKind::Epic))
                .await
                .unwrap();
            assert_eq!(image.provider, ProviderKind::Epic);
        }
    }

    #[tokio::test]
    async fn empty_selector_reports_no_provider() {
        let selector = ProviderSelector::new(vec![]);
        let transport = ScriptedTransport::new();
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(0);

        let err = selector.resolve_random_image(&ctx, &mut rng).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoProviderAvailable));
    }

    #[tokio::test]
    async fn provider_failure_is_wrapped_with_provenance() {
        let selector = nasa_selector();
        let transport = ScriptedTransport::new();
        let ctx = ResolveContext::new(&transport, today());
        let mut rng = StdRng::seed_from_u64(0);

        let err = selector
            .resolve_with(&ctx, &mut rng, Some(ProviderKind::Mars))
            .await
            .unwrap_err();
        match err {
            ResolveError::NoProviderSucceeded { provider, source } => {
                assert_eq!(provider, ProviderKind::Mars);
                assert!(matches!(*source, ResolveError::ExhaustedRetries { attempts: 30 }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn seeded_resolution_is_reproducible() {
        let selector = nasa_selector();

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            let transport = deterministic_transport();
            let ctx = ResolveContext::new(&transport, today());
            let mut rng = StdRng::seed_from_u64(2024);

            let outcome = selector
                .resolve_random_image(&ctx, &mut rng)
                .await
                .map(|image| (image.provider, image.url))
                .map_err(|err| err.to_string());
            outcomes.push((outcome, transport.requests()));
        }

        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[1], outcomes[2]);
    }
}
