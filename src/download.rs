// download.rs — 将解析出的图片保存到本地

use crate::source::ResolvedImage;
use crate::transport::Transport;
use std::path::{Path, PathBuf};
use tokio::fs::File; // tokio 提供的异步文件操作
use tokio::io::AsyncWriteExt; // 异步写入 trait，提供 write_all() 等方法
use tracing::info;

/// 下载文件统一使用的前缀，clean 子命令按此前缀清理
pub const FILE_PREFIX: &str = "astrowall-";

/// 下载中的临时文件后缀，写完后再改名为正式文件
const PARTIAL_SUFFIX: &str = ".part";

/// 未提交的临时文件在析构时删除，覆盖写入失败和 Ctrl-C 中途丢弃 future 两种情况
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    async fn commit(mut self, target: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.path, target).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// 下载图片到指定目录，返回保存后的完整路径
///
/// 非 2xx 响应、非图片内容或写入中断都视为失败，不会留下文件。
pub async fn save_image(
    transport: &dyn Transport,
    image: &ResolvedImage,
    save_dir: &Path,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let response = transport.fetch(&image.url).await?;
    if !response.is_success() {
        return Err(format!("HTTP {} from {}", response.status, image.url).into());
    }

    let content_type = response.content_type().unwrap_or_default().to_string();
    if !content_type.is_empty() && !content_type.starts_with("image/") {
        return Err(format!("not an image: `{content_type}`").into());
    }

    let file_name = file_name_for(image, &content_type);
    let save_path = save_dir.join(&file_name);
    let partial = PartialFile::new(save_dir.join(format!("{file_name}{PARTIAL_SUFFIX}")));

    let mut file = File::create(&partial.path).await?;
    file.write_all(&response.body).await?;
    file.flush().await?;
    drop(file);
    partial.commit(&save_path).await?;

    info!(path = %save_path.display(), bytes = response.body.len(), "image saved");
    Ok(save_path)
}

/// 生成文件名：astrowall-<provider>-<原文件名>
///
/// 原地址没有扩展名时（地球影像接口），用 Content-Type 推断，
/// 并带上时间戳避免覆盖。
pub fn file_name_for(image: &ResolvedImage, content_type: &str) -> String {
    let path = image.url.split(['?', '#']).next().unwrap_or_default();
    let last = path.rsplit('/').next().unwrap_or_default();
    let last: String = last
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

    if last.contains('.') {
        format!("{FILE_PREFIX}{}-{}", image.provider, last)
    } else {
        let stem = if last.is_empty() { "image" } else { last.as_str() };
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        format!(
            "{FILE_PREFIX}{}-{}-{}.{}",
            image.provider,
            stem,
            stamp,
            extension_for(content_type)
        )
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or_default().trim() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}
