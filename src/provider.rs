//! Remote media provider interface
//!
//! Reference validation, encoding selection against the fixed target profile,
//! and the trait through which the session's transformer talks to the single
//! supported provider. Listing encodings for a reference is the provider
//! implementation's concern; this module only decides which encoding to play.

use crate::config::SelectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use url::Url;

/// A decodable audio byte stream, ready to pipe or play
pub type AudioStream = Box<dyn AsyncRead + Send + Unpin>;

/// One encoding the provider can serve for a reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Provider quality identifier
    pub itag: u32,
    /// Container format
    pub container: String,
    /// Direct stream URL
    pub url: String,
}

/// Remote media provider, consumed as a capability
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// List the encodings available for a validated reference.
    async fn formats(&self, reference: &str) -> Result<Vec<StreamFormat>>;

    /// Open the raw network stream for a previously listed format.
    async fn open(&self, format: &StreamFormat) -> Result<AudioStream>;
}

/// Whether a track reference points at the supported provider.
///
/// Accepts `https://{www,m,music}.youtube.com/watch?v=<id>` and
/// `https://youtu.be/<id>` with an 11-character video id. Pure predicate;
/// unsupported references make every transformer operation report invalid
/// input instead of reaching the network.
pub fn is_supported_reference(reference: &str) -> bool {
    let Ok(url) = Url::parse(reference) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    match url.host_str() {
        Some("youtube.com" | "www.youtube.com" | "m.youtube.com" | "music.youtube.com") => {
            url.path() == "/watch"
                && url
                    .query_pairs()
                    .any(|(key, value)| key == "v" && is_video_id(&value))
        }
        Some("youtu.be") => is_video_id(url.path().trim_start_matches('/')),
        _ => false,
    }
}

fn is_video_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Select the encoding to play: walk the quality priority list in order and
/// take the first listed format whose container is whitelisted.
pub fn choose_format<'a>(
    formats: &'a [StreamFormat],
    selection: &SelectionConfig,
) -> Option<&'a StreamFormat> {
    for itag in &selection.quality_priority {
        if let Some(format) = formats
            .iter()
            .find(|f| f.itag == *itag && selection.containers.iter().any(|c| c == &f.container))
        {
            return Some(format);
        }
    }
    None
}

/// Open an HTTP(S) URL as an [`AudioStream`].
///
/// Helper for provider implementations: adapts the response body's byte
/// stream into an `AsyncRead` so it can be piped into a transcoder or handed
/// to the sink directly.
pub async fn open_http_stream(client: &reqwest::Client, url: &str) -> Result<AudioStream> {
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response
        .bytes_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    Ok(Box::new(StreamReader::new(Box::pin(bytes))))
}
