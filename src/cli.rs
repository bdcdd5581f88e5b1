// cli.rs — 命令行接口定义模块
// 使用 clap 的 derive 模式定义所有子命令和参数

use crate::source::ProviderKind;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// 天文壁纸工具
///
/// 从 NASA 的火星车照片、地球单点影像、EPIC 全色影像中随机挑选一张，
/// 下载并设置为桌面壁纸。
#[derive(Parser)]
#[command(name = "astrowall")]
#[command(version)]
#[command(author)]
#[command(about = "Random astronomy wallpapers from NASA's open APIs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 解析相关的公共参数
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    /// 固定使用某个图片源（默认随机）
    #[arg(short, long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// 随机种子，相同种子可复现同一次选择
    #[arg(short, long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 解析出一张图片的地址并打印，不下载
    ///
    /// 用法示例:
    ///   astrowall resolve
    ///   astrowall resolve --provider epic
    Resolve {
        #[command(flatten)]
        args: ResolveArgs,
    },

    /// 解析并下载图片到壁纸目录
    ///
    /// 用法示例:
    ///   astrowall fetch
    ///   astrowall fetch -p mars -s 42
    Fetch {
        #[command(flatten)]
        args: ResolveArgs,
    },

    /// 一键更换：解析、下载并设置为系统壁纸
    ///
    /// 用法示例:
    ///   astrowall set
    ///   astrowall set --provider earth
    Set {
        #[command(flatten)]
        args: ResolveArgs,
    },

    /// 将本地指定的图片设置为系统壁纸
    ///
    /// 用法示例:
    ///   astrowall apply image.png
    Apply {
        /// 图片的本地路径
        image: String,
    },

    /// 列出所有图片源
    Providers,

    /// 生成 shell 补全脚本（支持 bash, zsh, fish, elvish, powershell）
    ///
    /// 用法示例：
    ///   astrowall completions zsh > ~/.zsh/completions/_astrowall
    Completions {
        /// 目标 shell 类型
        shell: Shell,
    },

    /// 配置管理操作
    ///
    /// 用法示例:
    ///   astrowall config show
    ///   astrowall config set provider epic
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// 清理所有带有 astrowall- 前缀的下载文件
    Clean,
}

/// 配置管理操作
#[derive(Subcommand)]
pub enum ConfigAction {
    /// 查看当前配置简报
    Show,
    /// 生成配置文件对应的 JSON Schema
    Schema,
    /// 以 TOML 格式打印当前完整配置内容
    Dump,
    /// 设置配置项 (provider, api_key, wallpaper_dir, timeout, rover,
    /// mars_days, earth_attempts, earth_days, dim)
    Set {
        /// 要设置的键
        key: String,
        /// 要设置的值
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_resolve_args() {
        let cli = Cli::try_parse_from(["astrowall", "set", "--provider", "earth", "--seed", "7"])
            .unwrap();
        match cli.command {
            Commands::Set { args } => {
                assert_eq!(args.provider, Some(ProviderKind::Earth));
                assert_eq!(args.seed, Some(7));
            }
            _ => panic!("expected set"),
        }
    }
}
