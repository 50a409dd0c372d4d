//! Batch coordinator
//!
//! Splits the file list into fixed-size batches and runs each file through
//! classify -> synthesize -> resolve on a bounded pool of tokio tasks.
//! Sequence numbers come from list position, so results are reassembled in
//! input order no matter which worker finishes first. A failure in one file
//! is recorded and never stops the others.

use super::progress::ProgressSink;
use crate::ai::ContentClassifier;
use crate::config::ProcessingSettings;
use crate::error::ProcessError;
use crate::models::{BatchResult, FileFailure, FileMetadata, MediaFile, RenameContext, Suggestion};
use crate::naming::{NameSynthesizer, ReservationRegistry};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub struct BatchCoordinator {
    classifier: Arc<dyn ContentClassifier>,
    synthesizer: Arc<NameSynthesizer>,
    batch_size: usize,
    max_workers: usize,
    project: Option<String>,
    abort: Option<Arc<AtomicBool>>,
}

impl BatchCoordinator {
    pub fn new(
        classifier: Arc<dyn ContentClassifier>,
        synthesizer: NameSynthesizer,
        settings: &ProcessingSettings,
    ) -> Self {
        Self {
            classifier,
            synthesizer: Arc::new(synthesizer),
            batch_size: settings.batch_size.max(1),
            max_workers: settings.max_workers.max(1),
            project: None,
            abort: None,
        }
    }

    /// Value for `{project}`, overriding the output settings
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Checked before each batch; setting it stops the run at the next boundary
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Produce one suggestion per file, in input order
    ///
    /// Names are reserved in a registry that lives for this call only, so two
    /// files in the same run never get the same target.
    pub async fn process(
        &self,
        files: &[MediaFile],
        template: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> BatchResult {
        let total = files.len();
        let registry = Arc::new(ReservationRegistry::new());
        let template: Arc<str> = Arc::from(template);
        let completed = Arc::new(AtomicUsize::new(0));

        let mut slots: Vec<Option<Result<Suggestion, ProcessError>>> =
            (0..total).map(|_| None).collect();
        let mut cancelled = false;

        info!(
            files = total,
            batch_size = self.batch_size,
            workers = self.max_workers,
            "Starting processing run"
        );

        for (batch_index, batch) in files.chunks(self.batch_size).enumerate() {
            if self.is_aborted() {
                warn!(batch = batch_index, "Processing aborted before batch");
                cancelled = true;
                break;
            }

            let offset = batch_index * self.batch_size;
            let semaphore = Arc::new(Semaphore::new(self.max_workers));
            let mut tasks = FuturesUnordered::new();

            for (i, file) in batch.iter().enumerate() {
                let index = offset + i;
                let job = FileJob {
                    file: file.clone(),
                    sequence: index + 1,
                    template: Arc::clone(&template),
                    classifier: Arc::clone(&self.classifier),
                    synthesizer: Arc::clone(&self.synthesizer),
                    registry: Arc::clone(&registry),
                    project: self.project.clone(),
                };
                let sem = Arc::clone(&semaphore);
                let completed = Arc::clone(&completed);
                let progress = Arc::clone(&progress);

                let handle = tokio::spawn(async move {
                    let result = match sem.acquire_owned().await {
                        Ok(_permit) => job.run().await,
                        Err(_) => Err(ProcessError::Task("worker pool closed".to_string())),
                    };
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress.report(done, total);
                    result
                });

                tasks.push(handle.map(move |joined| (index, joined)));
            }

            while let Some((index, joined)) = tasks.next().await {
                let result = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        // The task died before reporting, so report for it
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        progress.report(done, total);
                        Err(ProcessError::Task(if e.is_panic() {
                            "Task panicked".to_string()
                        } else {
                            e.to_string()
                        }))
                    }
                };
                slots[index] = Some(result);
            }
        }

        let mut result = BatchResult {
            total,
            cancelled,
            ..BatchResult::default()
        };

        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(suggestion)) => result.suggestions.push(suggestion),
                Some(Err(e)) => {
                    let path = files[index].path.clone();
                    error!(path = %path.display(), error = %e, "Failed to process file");
                    result.failures.push(FileFailure {
                        path,
                        sequence: index + 1,
                        error: e.to_string(),
                    });
                }
                None => {}
            }
        }

        result.succeeded = result.suggestions.len();
        result.failed = result.failures.len();

        info!(
            succeeded = result.succeeded,
            failed = result.failed,
            degraded = result.degraded_count(),
            cancelled = result.cancelled,
            "Processing run finished"
        );

        result
    }
}

/// Everything one worker needs, owned so it can move into a task
struct FileJob {
    file: MediaFile,
    sequence: usize,
    template: Arc<str>,
    classifier: Arc<dyn ContentClassifier>,
    synthesizer: Arc<NameSynthesizer>,
    registry: Arc<ReservationRegistry>,
    project: Option<String>,
}

impl FileJob {
    async fn run(self) -> Result<Suggestion, ProcessError> {
        let path = &self.file.path;
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|source| ProcessError::Metadata {
                path: path.clone(),
                source,
            })?;
        let metadata = FileMetadata::from_std(path, &meta);
        let parent = path
            .parent()
            .ok_or_else(|| ProcessError::NoParent(path.clone()))?;

        let analysis = self.classifier.classify(&self.file).await;

        let context = RenameContext::new(metadata.clone(), analysis.clone(), self.sequence)
            .with_project(self.project.clone());
        let stem = self.synthesizer.synthesize(&self.template, &context);

        // Keep the extension exactly as it is on disk
        let new_name = match path.extension() {
            Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
            None => stem,
        };
        let candidate = parent.join(&new_name);
        let registry = Arc::clone(&self.registry);
        let current = path.clone();
        // Resolution stats the disk while holding the registry lock
        let new_path: PathBuf =
            tokio::task::spawn_blocking(move || registry.resolve(&candidate, Some(&current)))
                .await
                .map_err(|e| ProcessError::Task(e.to_string()))?;

        Ok(Suggestion {
            original_name: self.file.file_name(),
            new_name: new_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or(new_name),
            original_path: self.file.path.clone(),
            new_path,
            sequence: self.sequence,
            analysis,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MediaAnalyzer;
    use crate::config::OutputSettings;
    use crate::models::{AnalysisResult, MediaKind};
    use crate::processing::progress::MaxProgress;
    use crate::processing::NoProgress;
    use async_trait::async_trait;
    use chrono::Local;
    use std::collections::HashSet;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Always answers with the same description after an optional delay
    struct FixedClassifier {
        description: String,
        delay_for: fn(&Path) -> Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(description: &str) -> Self {
            Self {
                description: description.to_string(),
                delay_for: |_| Duration::ZERO,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentClassifier for FixedClassifier {
        async fn classify(&self, file: &MediaFile) -> AnalysisResult {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep((self.delay_for)(&file.path)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            let mut analysis = AnalysisResult::fallback(&file.path, file.is_video());
            analysis.description = self.description.clone();
            analysis.analyzed = true;
            analysis
        }
    }

    struct PanickingClassifier;

    #[async_trait]
    impl ContentClassifier for PanickingClassifier {
        async fn classify(&self, file: &MediaFile) -> AnalysisResult {
            if file.path.ends_with("bad.jpg") {
                panic!("classifier blew up");
            }
            AnalysisResult::fallback(&file.path, false)
        }
    }

    fn media_files(dir: &Path, names: &[&str]) -> Vec<MediaFile> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"pixels").unwrap();
                MediaFile {
                    extension: path
                        .extension()
                        .map(|e| e.to_string_lossy().to_lowercase())
                        .unwrap_or_default(),
                    path,
                    size: 6,
                    modified: Local::now(),
                    kind: MediaKind::Image,
                }
            })
            .collect()
    }

    fn coordinator(classifier: Arc<dyn ContentClassifier>, batch_size: usize, max_workers: usize) -> BatchCoordinator {
        let settings = ProcessingSettings {
            batch_size,
            max_workers,
            ..ProcessingSettings::default()
        };
        BatchCoordinator::new(classifier, NameSynthesizer::new(OutputSettings::default()), &settings)
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let dir = TempDir::new().unwrap();
        let names = ["f0.jpg", "f1.jpg", "f2.jpg", "f3.jpg", "f4.jpg"];
        let files = media_files(dir.path(), &names);

        // Earlier files finish last
        let mut classifier = FixedClassifier::new("shot");
        classifier.delay_for = |path| {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            let n: u64 = name[1..2].parse().unwrap();
            Duration::from_millis(50 - n * 10)
        };

        let result = coordinator(Arc::new(classifier), 10, 4)
            .process(&files, "{original}_{sequence}", Arc::new(NoProgress))
            .await;

        assert_eq!(result.succeeded, 5);
        let new_names: Vec<_> = result.suggestions.iter().map(|s| s.new_name.clone()).collect();
        assert_eq!(
            new_names,
            vec!["f0_001.jpg", "f1_002.jpg", "f2_003.jpg", "f3_004.jpg", "f4_005.jpg"]
        );
        let sequences: Vec<_> = result.suggestions.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_identical_names_get_distinct_paths() {
        let dir = TempDir::new().unwrap();
        let files = media_files(dir.path(), &["a.jpg", "b.jpg", "c.jpg"]);

        let result = coordinator(Arc::new(FixedClassifier::new("beach")), 2, 3)
            .process(&files, "{description}", Arc::new(NoProgress))
            .await;

        let paths: HashSet<_> = result.suggestions.iter().map(|s| s.new_path.clone()).collect();
        assert_eq!(paths.len(), 3);
        assert!(paths.contains(&dir.path().join("beach.jpg")));
        assert!(paths.contains(&dir.path().join("beach_1.jpg")));
        assert!(paths.contains(&dir.path().join("beach_2.jpg")));
    }

    #[tokio::test]
    async fn test_names_on_disk_are_avoided() {
        let dir = TempDir::new().unwrap();
        let files = media_files(dir.path(), &["a.jpg", "b.jpg"]);
        std::fs::write(dir.path().join("beach.jpg"), b"taken").unwrap();

        let result = coordinator(Arc::new(FixedClassifier::new("beach")), 10, 2)
            .process(&files, "{description}", Arc::new(NoProgress))
            .await;

        let names: HashSet<_> = result.suggestions.iter().map(|s| s.new_name.clone()).collect();
        assert_eq!(result.succeeded, 2);
        assert!(names.contains("beach_1.jpg"));
        assert!(names.contains("beach_2.jpg"));
    }

    #[tokio::test]
    async fn test_offline_run_uses_fallback_names() {
        let dir = TempDir::new().unwrap();
        let files = media_files(dir.path(), &["IMG_0001.jpg", "IMG_0002.jpg"]);

        let result = coordinator(Arc::new(MediaAnalyzer::offline()), 10, 4)
            .process(&files, "{description}", Arc::new(NoProgress))
            .await;

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.degraded_count(), 2);
        // Fallback name equals the current name, which is not a collision
        assert!(result.suggestions.iter().all(|s| s.is_noop()));
    }

    #[tokio::test]
    async fn test_missing_file_is_isolated() {
        let dir = TempDir::new().unwrap();
        let files = media_files(dir.path(), &["a.jpg", "gone.jpg", "c.jpg"]);
        std::fs::remove_file(dir.path().join("gone.jpg")).unwrap();

        let result = coordinator(Arc::new(FixedClassifier::new("x")), 10, 2)
            .process(&files, "{description}_{sequence}", Arc::new(NoProgress))
            .await;

        assert_eq!(result.total, 3);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.failures[0].sequence, 2);
        assert!(result.failures[0].path.ends_with("gone.jpg"));
        assert_eq!(result.suggestions[1].new_name, "x_003.jpg");
    }

    #[tokio::test]
    async fn test_panicking_worker_is_isolated() {
        let dir = TempDir::new().unwrap();
        let files = media_files(dir.path(), &["a.jpg", "bad.jpg", "c.jpg"]);
        let progress = Arc::new(MaxProgress::new());

        let result = coordinator(Arc::new(PanickingClassifier), 10, 4)
            .process(&files, "{original}", progress.clone())
            .await;

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert!(result.failures[0].path.ends_with("bad.jpg"));
        assert_eq!(progress.current(), 3);
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..7).map(|i| format!("p{}.jpg", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let files = media_files(dir.path(), &refs);
        let progress = Arc::new(MaxProgress::new());

        coordinator(Arc::new(FixedClassifier::new("p")), 3, 2)
            .process(&files, "{description}", progress.clone())
            .await;

        assert_eq!(progress.current(), 7);
        assert_eq!(progress.total(), 7);
        assert_eq!(progress.updates(), 7);
    }

    #[tokio::test]
    async fn test_worker_cap_is_respected() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..8).map(|i| format!("w{}.jpg", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let files = media_files(dir.path(), &refs);

        let mut classifier = FixedClassifier::new("w");
        classifier.delay_for = |_| Duration::from_millis(20);
        let classifier = Arc::new(classifier);

        coordinator(classifier.clone(), 8, 2)
            .process(&files, "{description}", Arc::new(NoProgress))
            .await;

        assert!(classifier.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_abort_stops_before_next_batch() {
        let dir = TempDir::new().unwrap();
        let files = media_files(dir.path(), &["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        let flag = Arc::new(AtomicBool::new(false));

        let sink_flag = Arc::clone(&flag);
        let stop_after_first = move |_current: usize, _total: usize| {
            sink_flag.store(true, Ordering::SeqCst);
        };

        let result = coordinator(Arc::new(FixedClassifier::new("x")), 2, 2)
            .with_abort_flag(flag)
            .process(&files, "{description}", Arc::new(stop_after_first))
            .await;

        assert!(result.cancelled);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.total, 4);
    }

    #[tokio::test]
    async fn test_project_override() {
        let dir = TempDir::new().unwrap();
        let files = media_files(dir.path(), &["a.jpg"]);

        let result = coordinator(Arc::new(FixedClassifier::new("x")), 10, 1)
            .with_project("Doc")
            .process(&files, "{project}_{number}", Arc::new(NoProgress))
            .await;

        assert_eq!(result.suggestions[0].new_name, "Doc_001.jpg");
    }
}
