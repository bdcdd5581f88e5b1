// config.rs — 配置管理模块
// 遵循 Unix 风格：优先从 ~/.config/astrowall/config.toml 读取配置

use crate::source::ProviderKind;
use crate::source::{earth, epic, mars};
use schemars::JsonSchema; // 引入用于生成 JSON Schema 的 trait
use serde::{Deserialize, Serialize}; // 引入序列化与反序列化 trait
use shellexpand::tilde; // 用于展开 ~ 和环境变量
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 未配置 API Key 时使用的公共演示 Key（有严格的限流）
pub const DEMO_API_KEY: &str = "DEMO_KEY";

/// 展开路径中的 ~ 和环境变量 ($HOME, $XDG_CONFIG_HOME 等)
fn expand_path(path_str: &str) -> PathBuf {
    PathBuf::from(tilde(path_str).into_owned())
}

/// 映射 config.toml 文件内容的嵌套结构体
#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
struct ConfigFile {
    #[serde(default)]
    common: CommonConfig,
    #[serde(default)]
    nasa: NasaConfig,
    #[serde(default)]
    mars: MarsConfig,
    #[serde(default)]
    earth: EarthConfig,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct CommonConfig {
    /// 壁纸保存目录 (支持 ~、$HOME 等环境变量，相对路径则相对于 $HOME)
    wallpaper_dir: Option<String>,
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    /// 固定使用的图片源，不配置则每次随机选择
    #[serde(default)]
    provider: Option<ProviderKind>,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            wallpaper_dir: None,
            timeout_secs: default_timeout_secs(),
            provider: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct NasaConfig {
    /// api.nasa.gov 的 API Key (优先级：ENV > TOML > DEMO_KEY)
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default = "default_base_url")]
    base_url: String,
    /// EPIC 影像归档站点
    #[serde(default = "default_epic_archive_url")]
    epic_archive_url: String,
}

impl Default for NasaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            epic_archive_url: default_epic_archive_url(),
        }
    }
}

/// 火星车照片源参数
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct MarsConfig {
    #[serde(default = "default_rover")]
    pub rover: String,
    /// 最多向前回滚的天数
    #[serde(default = "default_mars_max_days")]
    pub max_days: usize,
}

impl Default for MarsConfig {
    fn default() -> Self {
        Self {
            rover: default_rover(),
            max_days: default_mars_max_days(),
        }
    }
}

/// 地球单点影像源参数
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct EarthConfig {
    /// 随机坐标的抽取次数
    #[serde(default = "default_coordinate_attempts")]
    pub coordinate_attempts: usize,
    /// 每组坐标最多向前回滚的天数
    #[serde(default = "default_earth_max_days")]
    pub max_days: usize,
    /// 影像边长（度）
    #[serde(default = "default_dim")]
    pub dim: f64,
}

impl Default for EarthConfig {
    fn default() -> Self {
        Self {
            coordinate_attempts: default_coordinate_attempts(),
            max_days: default_earth_max_days(),
            dim: default_dim(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_base_url() -> String {
    "https://api.nasa.gov".to_string()
}
fn default_epic_archive_url() -> String {
    epic::DEFAULT_ARCHIVE_URL.to_string()
}
fn default_rover() -> String {
    mars::DEFAULT_ROVER.to_string()
}
fn default_mars_max_days() -> usize {
    mars::DEFAULT_MAX_DAYS
}
fn default_coordinate_attempts() -> usize {
    earth::DEFAULT_COORDINATE_ATTEMPTS
}
fn default_earth_max_days() -> usize {
    earth::DEFAULT_MAX_DAYS
}
fn default_dim() -> f64 {
    earth::DEFAULT_DIM
}

/// 应用全局配置项
pub struct AppConfig {
    /// 来自 NASA_API_KEY 环境变量的 Key，只读，从不写回配置文件
    pub env_api_key: Option<String>,
    /// 配置文件中的 Key，save() 只持久化这一项
    pub file_api_key: Option<String>,
    pub base_url: String,
    pub epic_archive_url: String,
    /// 壁纸保存目录
    pub wallpaper_dir: PathBuf,
    pub timeout_secs: u64,
    /// 固定使用的图片源
    pub default_provider: Option<ProviderKind>,
    pub mars: MarsConfig,
    pub earth: EarthConfig,
    /// 配置文件所在路径
    pub config_path: PathBuf,
}

impl AppConfig {
    /// 初始化配置
    ///
    /// $HOME 不存在时返回错误，配置文件不存在或格式错误时使用默认值。
    pub fn new() -> std::io::Result<Self> {
        let home = env::var("HOME").map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "$HOME is not set")
        })?;
        let home_path = PathBuf::from(&home);
        let config_path = home_path.join(".config").join("astrowall").join("config.toml");

        let config_file = Self::load_config_from_file(&config_path).unwrap_or_default();
        let env_key = env::var("NASA_API_KEY").ok().filter(|k| !k.is_empty());

        Ok(Self::from_file(config_file, &home_path, config_path, env_key))
    }

    fn from_file(
        config_file: ConfigFile,
        home_path: &Path,
        config_path: PathBuf,
        env_key: Option<String>,
    ) -> Self {
        // 壁纸目录：
        // 1. 配置了路径：展开 ~ 和环境变量，相对路径则相对于 $HOME
        // 2. 未配置：默认使用 $HOME/Pictures/astrowall
        let wallpaper_dir = match config_file.common.wallpaper_dir {
            Some(dir_str) => {
                let p = expand_path(&dir_str);
                if p.is_absolute() { p } else { home_path.join(p) }
            }
            None => home_path.join("Pictures").join("astrowall"),
        };

        // dim 会直接拼进请求地址，非法值回退到默认
        let mut earth = config_file.earth;
        if !earth.dim.is_finite() || earth.dim <= 0.0 {
            earth.dim = default_dim();
        }

        Self {
            env_api_key: env_key,
            file_api_key: config_file.nasa.api_key,
            base_url: config_file.nasa.base_url,
            epic_archive_url: config_file.nasa.epic_archive_url,
            wallpaper_dir,
            timeout_secs: config_file.common.timeout_secs.max(1),
            default_provider: config_file.common.provider,
            mars: config_file.mars,
            earth,
            config_path,
        }
    }

    /// 辅助函数：解析 TOML 配置文件
    fn load_config_from_file(path: &Path) -> Option<ConfigFile> {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
    }

    /// 实际使用的 API Key (优先级：ENV > TOML > DEMO_KEY)
    pub fn api_key(&self) -> &str {
        self.env_api_key
            .as_deref()
            .or(self.file_api_key.as_deref())
            .unwrap_or(DEMO_API_KEY)
    }

    pub fn has_api_key(&self) -> bool {
        self.env_api_key.is_some() || self.file_api_key.is_some()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 确保配置目录和壁纸目录存在
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.wallpaper_dir)
    }

    fn to_file(&self) -> ConfigFile {
        ConfigFile {
            common: CommonConfig {
                wallpaper_dir: Some(self.wallpaper_dir.to_string_lossy().to_string()),
                timeout_secs: self.timeout_secs,
                provider: self.default_provider,
            },
            nasa: NasaConfig {
                api_key: self.file_api_key.clone(),
                base_url: self.base_url.clone(),
                epic_archive_url: self.epic_archive_url.clone(),
            },
            mars: self.mars.clone(),
            earth: self.earth.clone(),
        }
    }

    /// 将配置保存回文件
    pub fn save(&self) -> std::io::Result<()> {
        let toml_str = toml::to_string_pretty(&self.to_file()).map_err(std::io::Error::other)?;
        fs::write(&self.config_path, toml_str)
    }

    /// 修改单个配置项，值非法时返回错误信息
    ///
    /// 支持的键：provider, api_key, wallpaper_dir, timeout, rover, mars_days,
    /// earth_attempts, earth_days, dim
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
            value
                .parse()
                .map_err(|_| format!("invalid value for `{key}`: {value}"))
        }

        match key {
            "provider" => {
                self.default_provider = match value {
                    "random" | "" => None,
                    other => Some(
                        <ProviderKind as clap::ValueEnum>::from_str(other, true)
                            .map_err(|_| format!("invalid value for `{key}`: {other}"))?,
                    ),
                }
            }
            "api_key" | "key" => self.file_api_key = Some(value.to_string()),
            "wallpaper_dir" | "dir" => self.wallpaper_dir = expand_path(value),
            "timeout" | "timeout_secs" => self.timeout_secs = parse::<u64>(key, value)?.max(1),
            "rover" => self.mars.rover = value.to_string(),
            "mars_days" => self.mars.max_days = parse(key, value)?,
            "earth_attempts" => self.earth.coordinate_attempts = parse(key, value)?,
            "earth_days" => self.earth.max_days = parse(key, value)?,
            "dim" => {
                let dim: f64 = parse(key, value)?;
                if !dim.is_finite() || dim <= 0.0 {
                    return Err(format!("invalid value for `{key}`: {value}"));
                }
                self.earth.dim = dim;
            }
            _ => return Err(format!("unknown key: {key}")),
        }
        Ok(())
    }

    /// 获取配置文件的 JSON Schema
    pub fn get_schema() -> String {
        let schema = schemars::schema_for!(ConfigFile);
        serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
    }

    /// 将当前配置转换为 TOML 字符串
    pub fn to_toml(&self) -> String {
        let toml_str = toml::to_string_pretty(&self.to_file())
            .unwrap_or_else(|_| "# Error serializing config".to_string());

        // toml 库不支持带注释序列化，所以手动插入
        toml_str.replace(
            "[nasa]",
            "# 在 https://api.nasa.gov 免费申请 API Key，也可通过 NASA_API_KEY 环境变量设置\n[nasa]",
        )
    }
}
