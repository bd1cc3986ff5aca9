//! Document loading
//!
//! Reads a page from a path or URL and attaches the documents of its
//! same-origin frames. Cross-origin frames are left empty, the way a page
//! script would see them.

use crate::error::SessionError;
use futures::future::{BoxFuture, FutureExt};
use picpick_archive::Fetcher;
use picpick_dom::{same_origin, Document};
use picpick_resource::ResourceKey;
use std::path::Path;
use url::Url;

/// How deep nested frames are followed
const MAX_FRAME_DEPTH: usize = 4;

/// Turn a CLI-style source into a URL
///
/// `http(s)`, `file` and `data` URLs pass through; anything else is taken
/// as a local path.
///
/// # Errors
/// Returns `SessionError::InvalidSource` for other URL schemes or paths that
/// cannot be made absolute
pub fn resolve_source(source: &str) -> Result<Url, SessionError> {
    if let Ok(url) = Url::parse(source) {
        // Single letters are Windows drive prefixes, not schemes
        if url.scheme().len() > 1 {
            return match url.scheme() {
                "http" | "https" | "file" | "data" => Ok(url),
                _ => Err(SessionError::InvalidSource(source.to_string())),
            };
        }
    }
    let path = Path::new(source);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|_| SessionError::InvalidSource(source.to_string()))?
            .join(path)
    };
    Url::from_file_path(&absolute).map_err(|()| SessionError::InvalidSource(source.to_string()))
}

/// Fetch and parse a page, then load its same-origin frames
///
/// # Errors
/// Returns `SessionError::Load` if the page itself cannot be fetched. Frame
/// failures only leave that frame empty.
pub async fn load_document(url: Url, fetcher: &dyn Fetcher) -> Result<Document, SessionError> {
    let mut doc = fetch_page(url, fetcher).await?;
    load_frames(&mut doc, fetcher, 1).await;
    tracing::info!(url = %doc.url(), elements = doc.elements().len(), "document loaded");
    Ok(doc)
}

async fn fetch_page(url: Url, fetcher: &dyn Fetcher) -> Result<Document, SessionError> {
    let fetched = fetcher.fetch(&ResourceKey::new(url.as_str())).await?;
    let html = String::from_utf8_lossy(&fetched.bytes);
    Ok(Document::parse(&html, url))
}

fn load_frames<'a>(doc: &'a mut Document, fetcher: &'a dyn Fetcher, depth: usize) -> BoxFuture<'a, ()> {
    async move {
        if depth > MAX_FRAME_DEPTH {
            return;
        }
        let top = doc.url().clone();
        for frame in doc.frame_ids() {
            // srcdoc frames are already attached by the parser
            if matches!(doc.frame_document(frame, &top), Ok(Some(_))) {
                continue;
            }
            let Some(src) = doc.element(frame).and_then(|el| el.attr("src")).map(str::to_string) else {
                continue;
            };
            let Ok(url) = top.join(&src) else {
                tracing::debug!(%src, "unparsable frame address");
                continue;
            };
            if !same_origin(&url, &top) {
                tracing::debug!(%url, "cross-origin frame left unloaded");
                continue;
            }
            match fetch_page(url.clone(), fetcher).await {
                Ok(mut child) => {
                    load_frames(&mut child, fetcher, depth + 1).await;
                    if let Err(e) = doc.attach_frame(frame, child) {
                        tracing::warn!(error = %e, "frame not attached");
                    }
                }
                Err(e) => tracing::warn!(%url, error = %e, "frame not loaded"),
            }
        }
    }
    .boxed()
}
