//! Static files, the service worker and the cache headers the service worker
//! relies on.

use std::path::Path;

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
    Router,
};
use tower_http::services::{ServeDir, ServeFile};

use crate::AppState;

pub const IMMUTABLE: &str = "public, max-age=31536000, immutable";
pub const SHORT_LIVED: &str = "public, max-age=3600";
pub const REVALIDATE: &str = "no-cache";
pub const NO_STORE: &str = "no-store";

const SERVICE_WORKER_ALLOWED: &str = "service-worker-allowed";

const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];
const ICON_EXTENSIONS: &[&str] = &["ico", "svg", "png", "webp"];

/// `/sw.js`, `/offline.html`, `/static/*`; any other page path falls back to
/// the front end's `index.html`.
pub fn routes(static_dir: &str) -> Router<AppState> {
    let dir = Path::new(static_dir);

    Router::new()
        .route_service("/sw.js", ServeFile::new(dir.join("sw.js")))
        .route_service("/offline.html", ServeFile::new(dir.join("offline.html")))
        .nest_service("/static", ServeDir::new(dir))
        .fallback_service(ServeFile::new(dir.join("index.html")))
}

/// Cache-Control value for a request path.
pub fn cache_policy(path: &str) -> &'static str {
    if path == "/sw.js" {
        return REVALIDATE;
    }

    let Some(asset) = path.strip_prefix("/static/") else {
        return NO_STORE;
    };

    let file_name = asset.rsplit('/').next().unwrap_or(asset);
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let is_font = FONT_EXTENSIONS.contains(&extension.as_str());
    let is_icon = asset.starts_with("icons/")
        || (file_name.starts_with("icon") && ICON_EXTENSIONS.contains(&extension.as_str()));

    if is_fingerprinted(file_name) || is_font || is_icon {
        IMMUTABLE
    } else {
        SHORT_LIVED
    }
}

/// `app.3f9a1c2b.js`, `chunk-4KX2Z9QA.css`: a build hash segment of at least
/// eight alphanumerics with a digit in it.
fn is_fingerprinted(file_name: &str) -> bool {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);

    stem.split(['.', '-', '_']).skip(1).any(|segment| {
        segment.len() >= 8
            && segment.chars().all(|c| c.is_ascii_alphanumeric())
            && segment.chars().any(|c| c.is_ascii_digit())
    })
}

/// Sets Cache-Control from [`cache_policy`] unless the handler already chose one.
pub async fn cache_headers(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(cache_policy(&path)),
        );
    }
    if path == "/sw.js" {
        headers.insert(
            HeaderName::from_static(SERVICE_WORKER_ALLOWED),
            HeaderValue::from_static("/"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_bundles_are_immutable() {
        assert_eq!(cache_policy("/static/js/app.3f9a1c2b.js"), IMMUTABLE);
        assert_eq!(cache_policy("/static/css/chunk-4KX2Z9QA.css"), IMMUTABLE);
    }

    #[test]
    fn fonts_and_icons_are_immutable() {
        assert_eq!(cache_policy("/static/fonts/inter.woff2"), IMMUTABLE);
        assert_eq!(cache_policy("/static/icons/logo-192.png"), IMMUTABLE);
        assert_eq!(cache_policy("/static/icon-512.png"), IMMUTABLE);
    }

    #[test]
    fn unhashed_static_files_expire_after_an_hour() {
        assert_eq!(cache_policy("/static/manifest.json"), SHORT_LIVED);
        assert_eq!(cache_policy("/static/js/app.js"), SHORT_LIVED);
        assert_eq!(cache_policy("/static/img/banner-home.jpg"), SHORT_LIVED);
    }

    #[test]
    fn service_worker_always_revalidates() {
        assert_eq!(cache_policy("/sw.js"), REVALIDATE);
    }

    #[test]
    fn pages_and_api_are_not_stored() {
        assert_eq!(cache_policy("/"), NO_STORE);
        assert_eq!(cache_policy("/dashboard"), NO_STORE);
        assert_eq!(cache_policy("/api/v1/documents"), NO_STORE);
        assert_eq!(cache_policy("/staticfile.js"), NO_STORE);
    }
}
