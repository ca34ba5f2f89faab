//! Pipeline entry points.
//!
//! [`run_pipeline`] wires the three stages together and blocks until every
//! one of them has drained:
//!
//! 1. enqueue all work items, then one end-of-stream marker per fetch worker;
//!    join the fetch pool
//! 2. one marker into the image queue; join the compose worker
//! 3. one marker per save worker into the canvas queue; join the save pool
//!
//! Each stage is sealed only after the stage feeding it has fully exited, so
//! a marker can never overtake real work.
//!
//! [`create_from_web`] and [`create_from_local`] are the convenience entry
//! points most callers want. The `_async` variants run the same blocking
//! pipeline on tokio's blocking pool.

use crate::config::PipelineConfig;
use crate::error::MgProxyError;
use crate::model::{Envelope, WorkItem};
use crate::pipeline::compose::{Canvas, Composer};
use crate::pipeline::fetch::{run_fetch_worker, FetchContext};
use crate::pipeline::pool::{seal, WorkerPool};
use crate::pipeline::save::{run_save_worker, JpegPageWriter, PageSink};
use crate::pipeline::source::{ImageSource, LocalSource, WebSource};
use crate::report::{Report, ReportSnapshot};
use crossbeam_channel::{bounded, unbounded};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Run the full fetch → compose → save pipeline over `items`.
///
/// Returns the final counters once every stage has exited. Individual card
/// and page failures are counted in `errors`; only setup problems (invalid
/// config, a worker thread that cannot be started) are returned as `Err`.
pub fn run_pipeline(
    items: Vec<WorkItem>,
    source: Arc<dyn ImageSource>,
    sink: Arc<dyn PageSink>,
    config: &PipelineConfig,
) -> Result<ReportSnapshot, MgProxyError> {
    config.validate()?;
    let started = Instant::now();
    let layout = config.layout();
    let report = Arc::new(Report::new());
    let progress = config.progress_callback.clone();

    info!(
        "Starting run: {} item(s) from {}, {} fetch / {} save worker(s), {}x{} grid",
        items.len(),
        source.describe(),
        config.fetch_workers,
        config.save_workers,
        layout.grid_x,
        layout.grid_y
    );

    let (item_tx, item_rx) = unbounded::<Envelope<WorkItem>>();
    let (image_tx, image_rx) = bounded(config.image_queue_capacity);
    let (page_tx, page_rx) = bounded::<Envelope<Canvas>>(config.canvas_queue_capacity);

    // ── Start stages, downstream first ───────────────────────────────────
    let save = {
        let report = Arc::clone(&report);
        let progress = progress.clone();
        WorkerPool::spawn("save", config.save_workers, move |worker| {
            run_save_worker(
                worker,
                &page_rx,
                sink.as_ref(),
                &report,
                progress.as_ref(),
            )
        })?
    };

    let compose = {
        let report = Arc::clone(&report);
        let progress = progress.clone();
        let pages = page_tx.clone();
        WorkerPool::spawn("compose", 1, move |_| {
            let composer = Composer::new(
                layout,
                pages.clone(),
                Arc::clone(&report),
                progress.clone(),
            );
            composer.run(&image_rx);
        })
    };
    let compose = match compose {
        Ok(pool) => pool,
        Err(e) => {
            // Save workers see a closed queue once the last sender is gone.
            drop(page_tx);
            save.join();
            return Err(e);
        }
    };

    let fetch = {
        let ctx = FetchContext {
            source,
            report: Arc::clone(&report),
            progress: progress.clone(),
        };
        let images = image_tx.clone();
        WorkerPool::spawn("fetch", config.fetch_workers, move |worker| {
            run_fetch_worker(worker, &item_rx, &images, &ctx)
        })
    };
    let fetch = match fetch {
        Ok(pool) => pool,
        Err(e) => {
            drop(item_tx);
            drop(image_tx);
            drop(page_tx);
            compose.join();
            save.join();
            return Err(e);
        }
    };

    // ── Feed ─────────────────────────────────────────────────────────────
    if let Some(cb) = &progress {
        // Zero-copy items are skipped without a card event.
        cb.on_run_start(items.iter().filter(|i| i.copies > 0).count());
    }
    for item in items {
        if item_tx.send(Envelope::Work(item)).is_err() {
            error!("Every fetch worker has exited, remaining items are not processed");
            break;
        }
    }

    // ── Drain, upstream first ────────────────────────────────────────────
    seal(&item_tx, fetch.size());
    record_panics(&report, fetch.join());
    debug!("Fetch stage drained");

    seal(&image_tx, compose.size());
    record_panics(&report, compose.join());
    debug!("Compose stage drained");

    seal(&page_tx, save.size());
    record_panics(&report, save.join());

    let snapshot = report.snapshot();
    info!(
        "Run finished in {:.1}s: {}",
        started.elapsed().as_secs_f64(),
        snapshot
    );
    if let Some(cb) = &progress {
        cb.on_run_complete(&snapshot);
    }
    Ok(snapshot)
}

fn record_panics(report: &Report, panicked: usize) {
    if panicked > 0 {
        warn!("{} worker(s) panicked; their in-flight work is lost", panicked);
    }
    for _ in 0..panicked {
        report.add_error();
    }
}

/// Download card images from the configured image service and write pages
/// to `output_dir/<base_name><n>.jpg`.
pub fn create_from_web(
    items: Vec<WorkItem>,
    output_dir: impl AsRef<Path>,
    base_name: &str,
    config: &PipelineConfig,
) -> Result<ReportSnapshot, MgProxyError> {
    config.validate()?;
    let source = WebSource::from_config(config)?;
    let sink = JpegPageWriter::create(output_dir, base_name, config.jpeg_quality)?;
    run_pipeline(items, Arc::new(source), Arc::new(sink), config)
}

/// Read card images from `source_dir` and write pages to
/// `output_dir/<base_name><n>.jpg`.
pub fn create_from_local(
    items: Vec<WorkItem>,
    source_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    base_name: &str,
    config: &PipelineConfig,
) -> Result<ReportSnapshot, MgProxyError> {
    config.validate()?;
    let source = LocalSource::new(source_dir)?;
    let sink = JpegPageWriter::create(output_dir, base_name, config.jpeg_quality)?;
    run_pipeline(items, Arc::new(source), Arc::new(sink), config)
}

/// [`create_from_web`] for callers already inside a tokio runtime.
pub async fn create_from_web_async(
    items: Vec<WorkItem>,
    output_dir: impl Into<PathBuf>,
    base_name: impl Into<String>,
    config: PipelineConfig,
) -> Result<ReportSnapshot, MgProxyError> {
    let output_dir = output_dir.into();
    let base_name = base_name.into();
    tokio::task::spawn_blocking(move || create_from_web(items, &output_dir, &base_name, &config))
        .await
        .map_err(|e| MgProxyError::Internal(format!("Pipeline task failed: {e}")))?
}

/// [`create_from_local`] for callers already inside a tokio runtime.
pub async fn create_from_local_async(
    items: Vec<WorkItem>,
    source_dir: impl Into<PathBuf>,
    output_dir: impl Into<PathBuf>,
    base_name: impl Into<String>,
    config: PipelineConfig,
) -> Result<ReportSnapshot, MgProxyError> {
    let source_dir = source_dir.into();
    let output_dir = output_dir.into();
    let base_name = base_name.into();
    tokio::task::spawn_blocking(move || {
        create_from_local(items, &source_dir, &output_dir, &base_name, &config)
    })
    .await
    .map_err(|e| MgProxyError::Internal(format!("Pipeline task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CardError, PageError};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    struct SolidSource;

    impl ImageSource for SolidSource {
        fn fetch(&self, item: &WorkItem) -> Result<Vec<u8>, CardError> {
            if item.name.starts_with("Bad") {
                return Err(CardError::NotFound {
                    card: item.name.clone(),
                    location: "memory".into(),
                });
            }
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 7, Rgb([9, 9, 9])));
            let mut buf = Vec::new();
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .unwrap();
            Ok(buf)
        }

        fn describe(&self) -> String {
            "memory".into()
        }
    }

    #[derive(Default)]
    struct MemorySink {
        pages: Mutex<Vec<(usize, usize)>>,
    }

    impl PageSink for MemorySink {
        fn save(&self, page_number: usize, canvas: &Canvas) -> Result<PathBuf, PageError> {
            self.pages
                .lock()
                .unwrap()
                .push((page_number, canvas.filled()));
            Ok(PathBuf::from(format!("{page_number}.jpg")))
        }
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig::builder()
            .dpi(10)
            .fetch_workers(3)
            .save_workers(2)
            .build()
            .unwrap()
    }

    #[test]
    fn counts_cards_pages_and_errors() {
        let sink = Arc::new(MemorySink::default());
        let items = vec![
            WorkItem::new(5, "Swamp"),
            WorkItem::new(2, "Bad Card"),
            WorkItem::new(4, "Forest"),
        ];

        let snapshot =
            run_pipeline(items, Arc::new(SolidSource), sink.clone(), &small_config()).unwrap();

        assert_eq!(snapshot.cards, 9);
        assert_eq!(snapshot.pages, 2);
        assert_eq!(snapshot.errors, 1);

        let mut numbers: Vec<usize> = sink.pages.lock().unwrap().iter().map(|p| p.0).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![0, 1]);
    }

    #[test]
    fn empty_input_produces_nothing() {
        let sink = Arc::new(MemorySink::default());
        let snapshot =
            run_pipeline(Vec::new(), Arc::new(SolidSource), sink.clone(), &small_config())
                .unwrap();
        assert_eq!(snapshot, ReportSnapshot::default());
        assert!(sink.pages.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_config_fails_before_any_work() {
        let mut config = small_config();
        config.grid_x = 0;
        let err = run_pipeline(
            vec![WorkItem::new(1, "Swamp")],
            Arc::new(SolidSource),
            Arc::new(MemorySink::default()),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, MgProxyError::InvalidConfig(_)));
    }

    #[test]
    fn local_entry_point_requires_source_dir() {
        let out = tempfile::tempdir().unwrap();
        let err = create_from_local(
            vec![WorkItem::new(1, "Swamp")],
            out.path().join("missing"),
            out.path(),
            "deck",
            &small_config(),
        )
        .unwrap_err();
        assert!(matches!(err, MgProxyError::SourceDirNotFound { .. }));
    }
}
