/// Category classifier: maps a file extension to one of seven fixed
/// categories, or `Other`.
///
/// Pure and stateless. Matching is ASCII case-insensitive and only the
/// final extension counts, so `backup.tar.gz` is an archive by way of `gz`.
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FileCategory {
    Images,
    Video,
    Audio,
    Archives,
    Documents,
    Code,
    Executables,
    Other,
}

impl FileCategory {
    /// Every category in table order, `Other` last.
    pub const ALL: [FileCategory; 8] = [
        Self::Images,
        Self::Video,
        Self::Audio,
        Self::Archives,
        Self::Documents,
        Self::Code,
        Self::Executables,
        Self::Other,
    ];

    /// Key used for this category on the wire.
    pub fn label(self) -> &'static str {
        match self {
            Self::Images => "Images",
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Archives => "Archives",
            Self::Documents => "Documents",
            Self::Code => "Code",
            Self::Executables => "Executables",
            Self::Other => "Other",
        }
    }
}

/// Longest extension in the table ("docx", "pptx", "xlsx").
const MAX_EXT_LEN: usize = 4;

/// Categorise an extension given without its leading dot.
///
/// Lowercases into a stack buffer, so the hot path never allocates.
pub fn categorise_extension(ext: &str) -> FileCategory {
    let bytes = ext.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_EXT_LEN {
        return FileCategory::Other;
    }

    let mut lower = [0u8; MAX_EXT_LEN];
    for (dest, &src) in lower.iter_mut().zip(bytes) {
        *dest = src.to_ascii_lowercase();
    }
    let lower = match std::str::from_utf8(&lower[..bytes.len()]) {
        Ok(s) => s,
        Err(_) => return FileCategory::Other,
    };

    match lower {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" => FileCategory::Images,
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" => FileCategory::Video,
        "mp3" | "wav" | "aac" | "flac" | "ogg" | "m4a" => FileCategory::Audio,
        "zip" | "rar" | "7z" | "tar" | "gz" | "iso" | "dmg" => FileCategory::Archives,
        "pdf" | "doc" | "docx" | "txt" | "xls" | "xlsx" | "ppt" | "pptx" | "md" => {
            FileCategory::Documents
        }
        "js" | "html" | "css" | "ts" | "tsx" | "jsx" | "json" | "java" | "py" | "c" | "cpp"
        | "php" | "sql" => FileCategory::Code,
        "exe" | "msi" | "bat" | "sh" | "app" | "dll" => FileCategory::Executables,
        _ => FileCategory::Other,
    }
}

/// Categorise a file by the extension of its final path component.
///
/// Names without an extension, including dot-files like `.bashrc`, are `Other`.
pub fn categorise_path(path: &Path) -> FileCategory {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(categorise_extension)
        .unwrap_or(FileCategory::Other)
}
