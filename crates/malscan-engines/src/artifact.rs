//! Submitted artifacts: immutable bytes plus content identifiers.

use malscan_core::ArtifactSummary;
use std::sync::Arc;

use crate::hash::{sha1_bytes, sha256_bytes};

/// Media type used when neither the submitter nor the sniffer knows better.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// The byte stream under analysis.
///
/// Hashes and media type are computed once at construction; the bytes are
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Artifact {
    bytes: Arc<[u8]>,
    sha256: String,
    sha1: String,
    media_type: String,
    file_name: Option<String>,
}

impl Artifact {
    /// Wrap raw bytes, hashing them and sniffing the media type.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Arc<[u8]> = Arc::from(bytes.into());
        let sha256 = sha256_bytes(&bytes);
        let sha1 = sha1_bytes(&bytes);
        let media_type = sniff_media_type(&bytes);
        Self {
            bytes,
            sha256,
            sha1,
            media_type,
            file_name: None,
        }
    }

    /// Override the sniffed media type with a declared one
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Remember the submitter's file name (informational only)
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the bytes, for moving onto blocking threads
    #[must_use]
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    #[must_use]
    pub fn sha1(&self) -> &str {
        &self.sha1
    }

    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Serializable identity for the report
    #[must_use]
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            sha256: self.sha256.clone(),
            sha1: self.sha1.clone(),
            size: self.bytes.len() as u64,
            media_type: self.media_type.clone(),
            file_name: self.file_name.clone(),
        }
    }
}

/// Guess a media type from magic bytes.
fn sniff_media_type(bytes: &[u8]) -> String {
    infer::get(bytes).map_or_else(
        || DEFAULT_MEDIA_TYPE.to_string(),
        |kind| kind.mime_type().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_computed_once() {
        let artifact = Artifact::new(b"hello world".to_vec());
        assert_eq!(
            artifact.sha256(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(artifact.sha1(), "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        assert_eq!(artifact.len(), 11);
    }

    #[test]
    fn sniffs_pdf() {
        let artifact = Artifact::new(b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec());
        assert_eq!(artifact.media_type(), "application/pdf");
    }

    #[test]
    fn unknown_content_falls_back() {
        let artifact = Artifact::new(b"just some text".to_vec());
        assert_eq!(artifact.media_type(), DEFAULT_MEDIA_TYPE);
    }

    #[test]
    fn declared_media_type_wins() {
        let artifact = Artifact::new(b"%PDF-1.4".to_vec()).with_media_type("text/plain");
        assert_eq!(artifact.media_type(), "text/plain");
    }

    #[test]
    fn summary_carries_file_name() {
        let summary = Artifact::new(Vec::new())
            .with_file_name("sample.bin")
            .summary();
        assert_eq!(summary.size, 0);
        assert_eq!(summary.file_name.as_deref(), Some("sample.bin"));
    }
}
