//! Concurrent download of every platform-matched catalog entry
//!
//! All entries of one batch are started together and the batch settles only
//! once each of them has succeeded or failed. A failing entry publishes an
//! `Error` event right away but does not cancel its siblings; the batch then
//! reports the first failure it observed. Files extracted by failed entries
//! are left in place.

use crate::errors::{BinWrapError, BinWrapResult};
use crate::installation::catalog::SourceEntry;
use crate::installation::progress::{ProgressBus, ProgressEvent, ProgressRecord};
use crate::installation::traits::{ArchiveFetcher, ExtractRequest, TransferObserver};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

/// Publishes a progress snapshot for every transfer notification of one entry
struct ProgressTracker<'a> {
    bus: &'a ProgressBus,
    record: ProgressRecord,
}

impl<'a> ProgressTracker<'a> {
    fn new(bus: &'a ProgressBus, url: &str) -> Self {
        Self {
            bus,
            record: ProgressRecord {
                total_bytes: None,
                completed_bytes: 0,
                resource_url: url.to_string(),
            },
        }
    }

    fn publish(&self) {
        self.bus.emit(ProgressEvent::Progress(self.record.clone()));
    }
}

impl TransferObserver for ProgressTracker<'_> {
    fn on_response(&mut self, total_bytes: Option<u64>) {
        self.record.total_bytes = total_bytes;
        self.record.completed_bytes = 0;
        self.publish();
    }

    fn on_chunk(&mut self, len: usize) {
        self.record.completed_bytes = self.record.completed_bytes.saturating_add(len as u64);
        self.publish();
    }
}

/// Downloads and extracts a batch of entries
#[derive(Clone)]
pub struct Fetcher {
    fetcher: Arc<dyn ArchiveFetcher>,
    bus: ProgressBus,
}

impl Fetcher {
    pub fn new(fetcher: Arc<dyn ArchiveFetcher>, bus: ProgressBus) -> Self {
        Self { fetcher, bus }
    }

    /// Fetch every entry concurrently and wait for all of them to settle.
    ///
    /// `entries` must be non-empty; the caller has already filtered them for
    /// the host platform. On success the binary at `binary_path`, if the
    /// batch produced one, is made executable.
    pub async fn fetch_all(
        &self,
        entries: &[&SourceEntry],
        request: &ExtractRequest,
        binary_path: &Path,
    ) -> BinWrapResult<()> {
        log::info!(
            "Downloading {} source(s) into {}",
            entries.len(),
            request.destination.display()
        );
        self.bus.emit(ProgressEvent::Started);

        let mut pending: FuturesUnordered<_> = entries
            .iter()
            .map(|entry| self.fetch_entry(entry, request))
            .collect();

        let mut first_error = None;
        while let Some(result) = pending.next().await {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        let produced = fs::try_exists(binary_path)
            .await
            .map_err(|e| BinWrapError::filesystem(binary_path, e))?;
        if produced {
            make_executable(binary_path).await?;
        }
        log::info!("Download complete: {}", binary_path.display());
        Ok(())
    }

    async fn fetch_entry(&self, entry: &SourceEntry, request: &ExtractRequest) -> BinWrapResult<()> {
        log::debug!("Fetching {}", entry.url);
        let mut tracker = ProgressTracker::new(&self.bus, &entry.url);

        match self.fetcher.fetch(&entry.url, request, &mut tracker).await {
            Ok(()) => {
                log::debug!("Extracted {}", entry.url);
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to fetch {}: {}", entry.url, e);
                self.bus.emit(ProgressEvent::Error(e.clone()));
                Err(e)
            }
        }
    }
}

/// Make the binary executable (Unix only)
pub(crate) async fn make_executable(binary_path: &Path) -> BinWrapResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(binary_path)
            .await
            .map_err(|e| BinWrapError::filesystem(binary_path, e))?;
        if metadata.is_file() {
            let mut permissions = metadata.permissions();
            permissions.set_mode(permissions.mode() | 0o755);
            fs::set_permissions(binary_path, permissions)
                .await
                .map_err(|e| BinWrapError::filesystem(binary_path, e))?;
        }
    }
    #[cfg(not(unix))]
    let _ = binary_path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Scripted fetcher: each URL maps to a chunk plan and a final outcome
    struct MockFetcher {
        plans: HashMap<String, (Vec<usize>, Duration, Result<&'static str, BinWrapError>)>,
    }

    #[async_trait]
    impl ArchiveFetcher for MockFetcher {
        async fn fetch(
            &self,
            url: &str,
            request: &ExtractRequest,
            observer: &mut dyn TransferObserver,
        ) -> BinWrapResult<()> {
            let (chunks, delay, outcome) = self.plans.get(url).expect("unplanned url");
            observer.on_response(Some(chunks.iter().sum::<usize>() as u64));
            for chunk in chunks {
                observer.on_chunk(*chunk);
            }
            tokio::time::sleep(*delay).await;
            match outcome {
                Ok(file) => {
                    let path = request.destination.join(file);
                    fs::create_dir_all(path.parent().unwrap()).await?;
                    fs::write(path, b"#!/bin/sh\n").await?;
                    Ok(())
                }
                Err(e) => Err(e.clone()),
            }
        }
    }

    fn record_events(bus: &ProgressBus) -> Arc<Mutex<Vec<ProgressEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[tokio::test]
    async fn test_single_entry_event_sequence() {
        let temp_dir = tempdir().unwrap();
        let bus = ProgressBus::new();
        let events = record_events(&bus);
        let fetcher = Fetcher::new(
            Arc::new(MockFetcher {
                plans: HashMap::from([(
                    "u".to_string(),
                    (vec![4, 4, 2], Duration::ZERO, Ok("bin/tool")),
                )]),
            }),
            bus,
        );

        let entry = SourceEntry::new("u");
        let request = ExtractRequest {
            destination: temp_dir.path().to_path_buf(),
            strip_components: 1,
        };
        let binary = temp_dir.path().join("bin/tool");
        fetcher.fetch_all(&[&entry], &request, &binary).await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events[0], ProgressEvent::Started);
        let completed: Vec<u64> = events[1..]
            .iter()
            .map(|event| match event {
                ProgressEvent::Progress(record) => record.completed_bytes,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(completed, vec![0, 4, 8, 10]);
        match events.last().unwrap() {
            ProgressEvent::Progress(record) => assert!(record.is_complete()),
            other => panic!("unexpected event {:?}", other),
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&binary).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[tokio::test]
    async fn test_join_waits_for_slow_sibling() {
        let temp_dir = tempdir().unwrap();
        let bus = ProgressBus::new();
        let events = record_events(&bus);
        let failure = BinWrapError::network("broken", "connection reset");
        let fetcher = Fetcher::new(
            Arc::new(MockFetcher {
                plans: HashMap::from([
                    (
                        "broken".to_string(),
                        (vec![1], Duration::ZERO, Err(failure.clone())),
                    ),
                    (
                        "slow".to_string(),
                        (vec![3], Duration::from_millis(100), Ok("slow/done")),
                    ),
                ]),
            }),
            bus,
        );

        let broken = SourceEntry::new("broken");
        let slow = SourceEntry::new("slow");
        let request = ExtractRequest {
            destination: temp_dir.path().to_path_buf(),
            strip_components: 1,
        };
        let result = fetcher
            .fetch_all(&[&broken, &slow], &request, &temp_dir.path().join("tool"))
            .await;

        assert_eq!(result.unwrap_err(), failure);
        // The successful sibling finished before the batch reported failure
        assert!(temp_dir.path().join("slow/done").exists());

        let errors: Vec<_> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| matches!(event, ProgressEvent::Error(_)))
            .cloned()
            .collect();
        assert_eq!(errors, vec![ProgressEvent::Error(failure)]);
    }

    #[tokio::test]
    async fn test_first_error_in_completion_order() {
        let temp_dir = tempdir().unwrap();
        let early = BinWrapError::network("early", "404");
        let late = BinWrapError::network("late", "500");
        let fetcher = Fetcher::new(
            Arc::new(MockFetcher {
                plans: HashMap::from([
                    ("late".to_string(), (vec![], Duration::from_millis(80), Err(late))),
                    ("early".to_string(), (vec![], Duration::ZERO, Err(early.clone()))),
                ]),
            }),
            ProgressBus::new(),
        );

        let late_entry = SourceEntry::new("late");
        let early_entry = SourceEntry::new("early");
        let request = ExtractRequest {
            destination: temp_dir.path().to_path_buf(),
            strip_components: 0,
        };
        let err = fetcher
            .fetch_all(&[&late_entry, &early_entry], &request, &temp_dir.path().join("tool"))
            .await
            .unwrap_err();
        assert_eq!(err, early);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_binary_path_is_filesystem_error() {
        let temp_dir = tempdir().unwrap();
        let fetcher = Fetcher::new(
            Arc::new(MockFetcher {
                plans: HashMap::from([("u".to_string(), (vec![1], Duration::ZERO, Ok("tool")))]),
            }),
            ProgressBus::new(),
        );

        let entry = SourceEntry::new("u");
        let request = ExtractRequest {
            destination: temp_dir.path().to_path_buf(),
            strip_components: 0,
        };
        // A regular file used as a directory fails with ENOTDIR, not NotFound
        let binary = temp_dir.path().join("tool/inner");
        let err = fetcher
            .fetch_all(&[&entry], &request, &binary)
            .await
            .unwrap_err();
        assert!(matches!(err, BinWrapError::FilesystemError { ref path, .. } if path.ends_with("inner")));
    }

    #[test]
    fn test_tracker_without_response_counts_from_zero() {
        let bus = ProgressBus::new();
        let events = record_events(&bus);
        let mut tracker = ProgressTracker::new(&bus, "u");
        tracker.on_chunk(7);

        assert_eq!(
            *events.lock().unwrap(),
            vec![ProgressEvent::Progress(ProgressRecord {
                total_bytes: None,
                completed_bytes: 7,
                resource_url: "u".to_string(),
            })]
        );
    }
}
