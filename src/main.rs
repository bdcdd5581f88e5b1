// main.rs — 程序入口
// 负责初始化日志与多语言、解析命令行参数、分发子命令

mod cli;
mod config;
mod download;
mod error;
mod setter;
mod source;
mod transport;

// 初始化多语言支持，嵌入 locales 目录下的所有翻译
rust_i18n::i18n!("locales");

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands, ResolveArgs};
use config::AppConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_i18n::t;
use source::{ProviderSelector, ResolveContext, ResolvedImage};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use transport::ReqwestTransport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 自动检测系统语言并设置
    let locale = std::env::var("LANG").unwrap_or_else(|_| "en".to_string());
    if locale.starts_with("zh") {
        rust_i18n::set_locale("zh-CN");
    } else {
        rust_i18n::set_locale("en");
    }

    // 诊断日志输出到 stderr，不干扰 stdout 上的结果（如 resolve 打印的地址）
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("astrowall=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::new()?;

    // Ctrl-C 触发取消信号，重试循环与下载都会在当前请求处停止
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match &cli.command {
        Commands::Resolve { args } => {
            let image = handle_resolve(&config, args, &cancel).await?;
            println!("{}", image.url);
        }

        Commands::Fetch { args } => {
            handle_fetch(&config, args, &cancel).await?;
        }

        Commands::Set { args } => {
            let image_path = handle_fetch(&config, args, &cancel).await?;

            println!("{}", t!("setting_wallpaper"));
            setter::set_from_path(&image_path)?;
            println!("{}", t!("set_done"));
        }

        Commands::Apply { image } => {
            println!("{}", t!("setting_wallpaper"));
            setter::set_from_path(image)?;
            println!("{}", t!("set_done"));
        }

        Commands::Providers => {
            let selector = ProviderSelector::from_config(&config);
            for kind in selector.kinds() {
                let marker = if config.default_provider == Some(kind) { "*" } else { " " };
                println!("{} {}", marker, kind);
            }
        }

        Commands::Completions { shell } => {
            generate(
                *shell,
                &mut Cli::command(),
                "astrowall",
                &mut std::io::stdout(),
            );
        }

        Commands::Config { action } => {
            handle_config(&mut config, action)?;
        }

        Commands::Clean => {
            handle_clean(&config)?;
        }
    }

    Ok(())
}

/// 随机（或按指定来源）解析出一张图片
async fn handle_resolve(
    config: &AppConfig,
    args: &ResolveArgs,
    cancel: &CancellationToken,
) -> Result<ResolvedImage, Box<dyn std::error::Error>> {
    let transport = ReqwestTransport::new(config.fetch_timeout())?;
    let selector = ProviderSelector::from_config(config);

    let today = chrono::Local::now().date_naive();
    let ctx = ResolveContext::new(&transport, today)
        .with_timeout(config.fetch_timeout())
        .with_cancellation(cancel.clone());

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    if !config.has_api_key() {
        eprintln!("{}", t!("demo_key_warning"));
    }
    eprintln!("{}", t!("resolve_start"));

    let resolution = match args.provider.or(config.default_provider) {
        Some(kind) => selector.resolve_with(&ctx, &mut rng, Some(kind)).await,
        None => selector.resolve_random_image(&ctx, &mut rng).await,
    };
    match resolution {
        Ok(image) => {
            eprintln!("{}", t!("resolved", provider => image.provider, url => image.url));
            Ok(image)
        }
        Err(err) if err.is_cancelled() => Err(t!("error_cancelled").into()),
        Err(err) => Err(t!("error_resolve_failed", reason => err).into()),
    }
}

/// 解析并下载到壁纸目录，返回保存路径
async fn handle_fetch(
    config: &AppConfig,
    args: &ResolveArgs,
    cancel: &CancellationToken,
) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
    config.ensure_dirs()?;
    let image = handle_resolve(config, args, cancel).await?;

    println!("{}", t!("download_start", url => image.url));
    let transport = ReqwestTransport::new(config.fetch_timeout())?;
    let save_path = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(t!("error_cancelled").into()),
        saved = download::save_image(&transport, &image, &config.wallpaper_dir) => saved?,
    };
    println!("{}", t!("save_path", path => save_path.display()));

    Ok(save_path)
}

/// 处理 config 子命令：查看或修改配置
fn handle_config(
    config: &mut AppConfig,
    action: &cli::ConfigAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        cli::ConfigAction::Show => {
            println!("{}", t!("config_title"));
            println!("{}", t!("config_path", path => config.config_path.display()));
            println!(
                "{}",
                t!("config_wallpaper_dir", path => config.wallpaper_dir.display())
            );
            let provider = config
                .default_provider
                .map(|p| p.to_string())
                .unwrap_or_else(|| "random".to_string());
            println!("{}", t!("config_provider", provider => provider));
            let key_source = if config.has_api_key() { "custom" } else { config::DEMO_API_KEY };
            println!("{}", t!("config_api_key", key => key_source));
            println!("{}", t!("config_timeout", secs => config.timeout_secs));
        }
        cli::ConfigAction::Schema => {
            println!("{}", AppConfig::get_schema());
        }
        cli::ConfigAction::Dump => {
            println!("{}", config.to_toml());
        }
        cli::ConfigAction::Set { key, value } => {
            config
                .set(key, value)
                .map_err(|reason| t!("config_error", reason => reason))?;
            config.ensure_dirs()?;
            config.save()?;
            println!("{}", t!("config_updated", key => key, value => value));
        }
    }
    Ok(())
}

/// 处理 clean 子命令：清理壁纸目录中所有以 astrowall- 开头的文件
fn handle_clean(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let dir = &config.wallpaper_dir;
    let mut deleted_count = 0;

    if dir.exists() {
        println!("{}", t!("cleaning_dir", path => dir.display()));

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                if filename.starts_with(download::FILE_PREFIX) {
                    std::fs::remove_file(&path)?;
                    deleted_count += 1;
                    println!("  {} {}", t!("deleted"), filename);
                }
            }
        }
    }

    println!("{}", t!("clean_done", count => deleted_count));
    Ok(())
}
