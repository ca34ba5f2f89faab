//! Save stage: write composed pages to disk.
//!
//! M workers share the canvas queue. Each page gets a unique number from
//! [`Report::next_page_number`] and only counts once it is on disk. A page
//! that fails to write is logged, counted as one error and discarded.

use crate::error::{MgProxyError, PageError};
use crate::model::Envelope;
use crate::pipeline::compose::Canvas;
use crate::progress::ProgressCallback;
use crate::report::Report;
use crossbeam_channel::Receiver;
use image::codecs::jpeg::JpegEncoder;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

/// Where finished pages go.
pub trait PageSink: Send + Sync {
    /// Persist `canvas` as page `page_number`, returning where it landed.
    fn save(&self, page_number: usize, canvas: &Canvas) -> Result<PathBuf, PageError>;
}

/// Writes pages as `<directory>/<base_name><n>.jpg`.
///
/// Each page is encoded into a temporary file in the same directory and then
/// renamed into place, so a crash never leaves a half-written page behind.
#[derive(Debug, Clone)]
pub struct JpegPageWriter {
    directory: PathBuf,
    base_name: String,
    quality: u8,
}

impl JpegPageWriter {
    /// Writer over an existing directory.
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>, quality: u8) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
            quality,
        }
    }

    /// Create `directory` (and parents) if needed, then build the writer.
    pub fn create(
        directory: impl AsRef<Path>,
        base_name: impl Into<String>,
        quality: u8,
    ) -> Result<Self, MgProxyError> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory).map_err(|source| MgProxyError::OutputDirFailed {
            path: directory.to_path_buf(),
            source,
        })?;
        Ok(Self::new(directory, base_name, quality))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File path for page `page_number`.
    pub fn page_path(&self, page_number: usize) -> PathBuf {
        self.directory
            .join(format!("{}{}.jpg", self.base_name, page_number))
    }

    fn write(&self, path: &Path, canvas: &Canvas) -> Result<(), String> {
        let mut tmp = NamedTempFile::new_in(&self.directory).map_err(|e| e.to_string())?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            let encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
            canvas
                .image()
                .write_with_encoder(encoder)
                .map_err(|e| e.to_string())?;
            out.flush().map_err(|e| e.to_string())?;
        }
        tmp.persist(path).map_err(|e| e.error.to_string())?;
        Ok(())
    }
}

impl PageSink for JpegPageWriter {
    fn save(&self, page_number: usize, canvas: &Canvas) -> Result<PathBuf, PageError> {
        let path = self.page_path(page_number);
        self.write(&path, canvas)
            .map_err(|detail| PageError::WriteFailed {
                page: page_number,
                path: path.clone(),
                detail,
            })?;
        Ok(path)
    }
}

/// Run one save worker until it receives its end-of-stream marker.
pub fn run_save_worker(
    worker: usize,
    pages: &Receiver<Envelope<Canvas>>,
    sink: &dyn PageSink,
    report: &Report,
    progress: Option<&ProgressCallback>,
) {
    loop {
        let canvas = match pages.recv() {
            Ok(Envelope::Work(canvas)) => canvas,
            Ok(Envelope::EndOfStream) => break,
            Err(_) => {
                warn!("save-{}: canvas queue closed without end-of-stream", worker);
                break;
            }
        };

        let page_number = report.next_page_number();
        let cards = canvas.filled();
        match sink.save(page_number, &canvas) {
            Ok(path) => {
                report.record_page(cards);
                info!("Saved page {} ({} cards) → {}", page_number, cards, path.display());
                if let Some(cb) = progress {
                    cb.on_page_saved(page_number, &path, cards);
                }
            }
            Err(e) => {
                error!("{}", e);
                report.add_error();
                if let Some(cb) = progress {
                    cb.on_page_error(&e);
                }
            }
        }
    }
    debug!("save-{}: done", worker);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageLayout;
    use crossbeam_channel::unbounded;
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    fn layout() -> PageLayout {
        PageLayout {
            cell_width: 8,
            cell_height: 10,
            grid_x: 2,
            grid_y: 1,
        }
    }

    fn canvas_with(cards: usize) -> Canvas {
        let mut canvas = Canvas::blank(layout());
        let cell = RgbImage::from_pixel(8, 10, Rgb([0, 0, 0]));
        for _ in 0..cards {
            canvas.paste(&cell);
        }
        canvas
    }

    struct FailingSink;

    impl PageSink for FailingSink {
        fn save(&self, page_number: usize, _canvas: &Canvas) -> Result<PathBuf, PageError> {
            Err(PageError::WriteFailed {
                page: page_number,
                path: PathBuf::from("/nowhere"),
                detail: "disk full".into(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        numbers: Mutex<Vec<usize>>,
    }

    impl PageSink for RecordingSink {
        fn save(&self, page_number: usize, _canvas: &Canvas) -> Result<PathBuf, PageError> {
            self.numbers.lock().unwrap().push(page_number);
            Ok(PathBuf::from(format!("page{page_number}.jpg")))
        }
    }

    #[test]
    fn page_path_numbers_from_base_name() {
        let writer = JpegPageWriter::new("/out", "deck", 90);
        assert_eq!(writer.page_path(0), PathBuf::from("/out/deck0.jpg"));
        assert_eq!(writer.page_path(12), PathBuf::from("/out/deck12.jpg"));
    }

    #[test]
    fn writes_decodable_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JpegPageWriter::create(dir.path().join("nested"), "deck", 85).unwrap();

        let path = writer.save(0, &canvas_with(1)).unwrap();
        assert_eq!(path, dir.path().join("nested").join("deck0.jpg"));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 10));
        // Only the finished page remains; no temp files.
        assert_eq!(std::fs::read_dir(writer.directory()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_is_a_page_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JpegPageWriter::new(dir.path().join("gone"), "deck", 90);
        let err = writer.save(3, &canvas_with(2)).unwrap_err();
        let PageError::WriteFailed { page, .. } = err;
        assert_eq!(page, 3);
    }

    #[test]
    fn worker_counts_cards_and_pages() {
        let (tx, rx) = unbounded();
        tx.send(Envelope::Work(canvas_with(2))).unwrap();
        tx.send(Envelope::Work(canvas_with(1))).unwrap();
        tx.send(Envelope::EndOfStream).unwrap();

        let sink = RecordingSink::default();
        let report = Report::new();
        run_save_worker(0, &rx, &sink, &report, None);

        assert_eq!(report.pages(), 2);
        assert_eq!(report.cards(), 3);
        assert_eq!(report.errors(), 0);
        assert_eq!(*sink.numbers.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn worker_counts_failed_pages_as_errors() {
        let (tx, rx) = unbounded();
        tx.send(Envelope::Work(canvas_with(2))).unwrap();
        tx.send(Envelope::EndOfStream).unwrap();

        let report = Report::new();
        run_save_worker(0, &rx, &FailingSink, &report, None);

        assert_eq!(report.pages(), 0);
        assert_eq!(report.cards(), 0);
        assert_eq!(report.errors(), 1);
    }
}
