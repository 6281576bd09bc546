use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Image,
    Video,
    Text,
    Unknown,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico", "avif",
];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mov", "m4v"];

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "log", "csv", "json", "yaml", "yml", "toml", "xml", "html", "css", "js", "ts",
    "go", "rs", "py", "sh", "c", "h", "cpp", "java", "ini", "conf",
];

/// Largest text file rendered inline; bigger ones get the download link.
pub const MAX_TEXT_PREVIEW: u64 = 2 * 1024 * 1024;

pub fn kind_of(path: &Path) -> PreviewKind {
    let Some(ext) = file_extension(path) else {
        return PreviewKind::Unknown;
    };
    let ext = ext.as_str();
    if IMAGE_EXTENSIONS.contains(&ext) {
        PreviewKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        PreviewKind::Video
    } else if TEXT_EXTENSIONS.contains(&ext) {
        PreviewKind::Text
    } else {
        PreviewKind::Unknown
    }
}

/// MIME type for inline media, falling back to a generic binary type.
pub fn mime_for(path: &Path) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
}

fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
}
