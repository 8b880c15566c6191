use std::path::{Component, Path, PathBuf};

use warp::http::StatusCode;

use super::types::Outcome;
use crate::storage::storage_trait::{EventKind, EventSink};

pub const ASSET_PREFIX: &str = "/assets/";

/// Content type by extension, case-insensitive.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Joins `relative` onto `root`, refusing anything but plain path segments.
pub fn resolve_asset(root: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    let mut components = rel.components().peekable();
    components.peek()?;
    if components.all(|c| matches!(c, Component::Normal(_))) {
        Some(root.join(rel))
    } else {
        None
    }
}

/// Serves `<root>/<relative>` verbatim. Missing files, directories and traversal
/// attempts all answer 404.
pub async fn serve_asset(root: &Path, request_path: &str, sink: &dyn EventSink) -> Outcome {
    sink.event(EventKind::Asset, &format!("Serving asset: {}", request_path));

    let relative = request_path.strip_prefix(ASSET_PREFIX).unwrap_or("");
    let file = match resolve_asset(root, relative) {
        Some(f) => f,
        None => {
            sink.event(EventKind::Asset, &format!("Rejected asset path: {}", request_path));
            return Outcome::text(StatusCode::NOT_FOUND, "Not found.");
        }
    };

    match tokio::fs::metadata(&file).await {
        Ok(meta) if meta.is_file() => {}
        _ => {
            sink.event(EventKind::Asset, &format!("File not found: {}", file.display()));
            return Outcome::text(StatusCode::NOT_FOUND, "Not found.");
        }
    }

    match tokio::fs::read(&file).await {
        Ok(bytes) => Outcome::new(StatusCode::OK, content_type_for(&file), bytes),
        Err(e) => {
            log::error!("Failed to read asset {}: {}", file.display(), e);
            Outcome::text(StatusCode::NOT_FOUND, "Not found.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory_log::MemoryLog;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_table() {
        assert_eq!(content_type_for(Path::new("a.css")), "text/css");
        assert_eq!(content_type_for(Path::new("a.JS")), "application/javascript");
        assert_eq!(content_type_for(Path::new("logo.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("p.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("p.jpg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("favicon.ico")), "image/x-icon");
        assert_eq!(content_type_for(Path::new("i.svg")), "image/svg+xml");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("x.woff2")), "application/octet-stream");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = Path::new("/srv/assets");
        assert_eq!(
            resolve_asset(root, "css/site.css"),
            Some(PathBuf::from("/srv/assets/css/site.css"))
        );
        assert_eq!(resolve_asset(root, "../secret"), None);
        assert_eq!(resolve_asset(root, "css/../../secret"), None);
        assert_eq!(resolve_asset(root, "/etc/passwd"), None);
        assert_eq!(resolve_asset(root, ""), None);
    }

    #[tokio::test]
    async fn test_serve_present_and_absent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("x.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::create_dir(tmp.path().join("dir")).unwrap();
        let log = MemoryLog::new();

        let out = serve_asset(tmp.path(), "/assets/x.png", &log).await;
        assert_eq!(out.status, StatusCode::OK);
        assert_eq!(out.body, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(
            out.header(&warp::http::header::CONTENT_TYPE),
            Some("image/png")
        );

        let missing = serve_asset(tmp.path(), "/assets/y.png", &log).await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let dir = serve_asset(tmp.path(), "/assets/dir", &log).await;
        assert_eq!(dir.status, StatusCode::NOT_FOUND);

        let escape = serve_asset(tmp.path(), "/assets/../x.png", &log).await;
        assert_eq!(escape.status, StatusCode::NOT_FOUND);
        assert_eq!(log.count_containing("Serving asset: /assets/x.png"), 1);
    }
}
