//! Fetch stage: resolve and decode card images in parallel.
//!
//! N workers share one input queue. A card that fails anywhere here (network,
//! status, content type, corrupt bytes, missing file) is logged, counted once
//! in [`Report::add_error`] and dropped with all its copies. There is no retry.

use crate::error::CardError;
use crate::model::{Envelope, FetchedCard, WorkItem};
use crate::pipeline::decode::decode_card;
use crate::pipeline::source::ImageSource;
use crate::progress::ProgressCallback;
use crate::report::Report;
use crossbeam_channel::{Receiver, Sender};
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Everything a fetch worker shares with its siblings.
#[derive(Clone)]
pub struct FetchContext {
    pub source: Arc<dyn ImageSource>,
    pub report: Arc<Report>,
    pub progress: Option<ProgressCallback>,
}

/// Resolve and decode one card.
pub fn resolve(source: &dyn ImageSource, item: &WorkItem) -> Result<DynamicImage, CardError> {
    let bytes = source.fetch(item)?;
    decode_card(item, &bytes)
}

/// Run one fetch worker until it receives its end-of-stream marker.
pub fn run_fetch_worker(
    worker: usize,
    input: &Receiver<Envelope<WorkItem>>,
    images: &Sender<Envelope<FetchedCard>>,
    ctx: &FetchContext,
) {
    loop {
        let item = match input.recv() {
            Ok(Envelope::Work(item)) => item,
            Ok(Envelope::EndOfStream) => break,
            Err(_) => {
                warn!("fetch-{}: input queue closed without end-of-stream", worker);
                break;
            }
        };

        if item.copies == 0 {
            debug!("fetch-{}: skipping '{}' (0 copies)", worker, item.name);
            continue;
        }

        match resolve(ctx.source.as_ref(), &item) {
            Ok(image) => {
                if let Some(cb) = &ctx.progress {
                    cb.on_card_fetched(&item.name, item.copies);
                }
                // Blocks while the image queue is full.
                if images.send(Envelope::Work(FetchedCard { item, image })).is_err() {
                    error!("fetch-{}: compose stage is gone, stopping", worker);
                    ctx.report.add_error();
                    break;
                }
            }
            Err(e) => {
                warn!("Dropping {} × '{}' [{}]: {}", item.copies, item.name, e.kind(), e);
                ctx.report.add_error();
                if let Some(cb) = &ctx.progress {
                    cb.on_card_error(&e);
                }
            }
        }
    }
    debug!("fetch-{}: done", worker);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    struct StubSource;

    impl ImageSource for StubSource {
        fn fetch(&self, item: &WorkItem) -> Result<Vec<u8>, CardError> {
            if item.name == "Missing" {
                return Err(CardError::NotFound {
                    card: item.name.clone(),
                    location: "stub".into(),
                });
            }
            if item.name == "Garbage" {
                return Ok(b"garbage".to_vec());
            }
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])));
            let mut buf = Vec::new();
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| CardError::ImageCorrupt {
                    card: item.name.clone(),
                    detail: e.to_string(),
                })?;
            Ok(buf)
        }

        fn describe(&self) -> String {
            "stub".into()
        }
    }

    fn ctx() -> FetchContext {
        FetchContext {
            source: Arc::new(StubSource),
            report: Arc::new(Report::new()),
            progress: None,
        }
    }

    #[test]
    fn forwards_good_cards_and_counts_failures() {
        let ctx = ctx();
        let (in_tx, in_rx) = unbounded();
        let (img_tx, img_rx) = bounded(10);

        for name in ["Swamp", "Missing", "Garbage", "Forest"] {
            in_tx.send(Envelope::Work(WorkItem::new(2, name))).unwrap();
        }
        in_tx.send(Envelope::Work(WorkItem::new(0, "Missing"))).unwrap();
        in_tx.send(Envelope::EndOfStream).unwrap();

        run_fetch_worker(0, &in_rx, &img_tx, &ctx);
        drop(img_tx);

        let names: Vec<String> = img_rx
            .iter()
            .filter_map(|env| match env {
                Envelope::Work(card) => Some(card.item.name),
                Envelope::EndOfStream => None,
            })
            .collect();
        assert_eq!(names, vec!["Swamp", "Forest"]);
        // The zero-copy "Missing" is skipped, not counted.
        assert_eq!(ctx.report.errors(), 2);
    }

    #[test]
    fn stops_at_own_sentinel() {
        let ctx = ctx();
        let (in_tx, in_rx) = unbounded();
        let (img_tx, img_rx) = bounded(10);

        in_tx.send(Envelope::EndOfStream).unwrap();
        in_tx.send(Envelope::Work(WorkItem::new(1, "Swamp"))).unwrap();

        run_fetch_worker(0, &in_rx, &img_tx, &ctx);
        assert!(img_rx.try_recv().is_err());
        // The item behind the sentinel is left for a sibling worker.
        assert!(matches!(in_rx.try_recv(), Ok(Envelope::Work(_))));
    }
}
