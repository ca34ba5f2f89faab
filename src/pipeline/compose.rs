//! Compose stage: paste card images onto page-sized canvases.
//!
//! A single worker owns the one in-progress [`Canvas`]. Cards are resized to
//! the cell size once, then pasted `copies` times into the next free cells in
//! row-major order. A canvas is sent to the save queue the moment its last
//! cell is filled, so a multi-copy card can spill onto the next page. On
//! end-of-stream a partially filled canvas is flushed once.
//!
//! Sending to the bounded save queue blocks when it is full. That stall is
//! the backpressure that eventually throttles the fetch workers.

use crate::config::PageLayout;
use crate::model::{Envelope, FetchedCard};
use crate::progress::ProgressCallback;
use crate::report::Report;
use crossbeam_channel::{Receiver, Sender};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::Arc;
use tracing::{debug, error, warn};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// A page raster divided into a grid of equal card cells.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbImage,
    layout: PageLayout,
    filled: usize,
}

impl Canvas {
    /// A fresh white page with every cell free.
    pub fn blank(layout: PageLayout) -> Self {
        Self {
            image: RgbImage::from_pixel(layout.page_width(), layout.page_height(), WHITE),
            layout,
            filled: 0,
        }
    }

    /// Cells already holding a card.
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn capacity(&self) -> usize {
        self.layout.cells()
    }

    pub fn is_full(&self) -> bool {
        self.filled >= self.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Paste a cell-sized card into the next free cell.
    ///
    /// Returns `false` (and changes nothing) if the canvas is already full.
    pub fn paste(&mut self, card: &RgbImage) -> bool {
        if self.is_full() {
            return false;
        }
        let (x, y) = self.layout.cell_origin(self.filled);
        imageops::replace(&mut self.image, card, i64::from(x), i64::from(y));
        self.filled += 1;
        true
    }
}

/// Resize a decoded card to exactly one cell.
pub fn fit_to_cell(image: &DynamicImage, layout: &PageLayout) -> RgbImage {
    imageops::resize(
        &image.to_rgb8(),
        layout.cell_width,
        layout.cell_height,
        FilterType::Lanczos3,
    )
}

/// The compose worker's state.
pub struct Composer {
    layout: PageLayout,
    // Allocated on first paste, taken on flush.
    current: Option<Canvas>,
    pages: Sender<Envelope<Canvas>>,
    report: Arc<Report>,
    progress: Option<ProgressCallback>,
    flushed: usize,
}

impl Composer {
    pub fn new(
        layout: PageLayout,
        pages: Sender<Envelope<Canvas>>,
        report: Arc<Report>,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            layout,
            current: None,
            pages,
            report,
            progress,
            flushed: 0,
        }
    }

    /// Drain `images` until end-of-stream, then flush any partial page.
    ///
    /// Returns the number of pages handed to the save queue.
    pub fn run(mut self, images: &Receiver<Envelope<FetchedCard>>) -> usize {
        loop {
            match images.recv() {
                Ok(Envelope::Work(card)) => self.add(card),
                Ok(Envelope::EndOfStream) => break,
                Err(_) => {
                    warn!("compose: image queue closed without end-of-stream");
                    break;
                }
            }
        }
        self.finish()
    }

    /// Paste every copy of one card, flushing each page as it fills.
    pub fn add(&mut self, card: FetchedCard) {
        let cell = fit_to_cell(&card.image, &self.layout);
        drop(card.image);

        for _ in 0..card.item.copies {
            let layout = self.layout;
            let canvas = self.current.get_or_insert_with(|| Canvas::blank(layout));
            canvas.paste(&cell);
            if canvas.is_full() {
                self.flush();
            }
        }
        debug!("Pasted {} × '{}'", card.item.copies, card.item.name);
    }

    /// Flush a partially filled page, if any. Returns total pages flushed.
    pub fn finish(mut self) -> usize {
        if self.current.as_ref().is_some_and(|c| !c.is_empty()) {
            self.flush();
        }
        debug!("compose: done, {} page(s) flushed", self.flushed);
        self.flushed
    }

    fn flush(&mut self) {
        let Some(canvas) = self.current.take() else {
            return;
        };
        let cards = canvas.filled();

        // Blocks while the canvas queue is full.
        match self.pages.send(Envelope::Work(canvas)) {
            Ok(()) => {
                self.flushed += 1;
                if let Some(cb) = &self.progress {
                    cb.on_page_composed(cards);
                }
            }
            Err(_) => {
                error!("compose: save stage is gone, {} pasted card(s) lost", cards);
                self.report.add_error();
            }
        }
    }
}
