//! Download progress reporting, injectable so the core stays free of any
//! terminal or UI dependency while still letting a caller drive a progress
//! bar during [`crate::client::RegistryClient::download_source_archive`].

/// Reports byte-level progress for a streamed download.
///
/// The crate calls [`DownloadProgress::on_progress`] once per chunk
/// received from the registry, with the cumulative bytes downloaded so far
/// and the total size when the response carried a `Content-Length` header.
pub trait DownloadProgress: Send + Sync {
    /// `downloaded` is cumulative across the whole download; `total` is
    /// `None` when the server did not report a `Content-Length`.
    fn on_progress(&self, downloaded: u64, total: Option<u64>);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::DownloadProgress;

    #[derive(Default)]
    struct RecordingProgress {
        last_downloaded: AtomicU64,
        calls: AtomicU64,
    }

    impl DownloadProgress for RecordingProgress {
        fn on_progress(&self, downloaded: u64, _total: Option<u64>) {
            self.last_downloaded.store(downloaded, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn records_the_most_recent_progress_report() {
        let progress = RecordingProgress::default();
        progress.on_progress(10, Some(100));
        progress.on_progress(40, Some(100));
        assert_eq!(progress.last_downloaded.load(Ordering::SeqCst), 40);
        assert_eq!(progress.calls.load(Ordering::SeqCst), 2);
    }
}
