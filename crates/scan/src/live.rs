//! Continuous scanning of camera preview frames.

use image::GrayImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::reader::{BarcodeReader, Binarizer, FormatSet};
use crate::transform;

/// Receives payloads found by the asynchronous fallback.
pub type DetectionCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct LiveScannerConfig {
    /// Quiet period after any successful detection.
    pub cooldown: Duration,
    /// Only every `frame_stride`-th frame is examined.
    pub frame_stride: u64,
    /// Share of each frame dimension handed to the fast reader.
    pub roi_percent: u32,
}

impl Default for LiveScannerConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(1500),
            frame_stride: 2,
            roi_percent: 70,
        }
    }
}

/// Fast synchronous reads on a centred region, with at most one full-frame
/// fallback running on the blocking pool at a time.
pub struct LiveScanner {
    fast: Arc<dyn BarcodeReader>,
    scanner: Arc<dyn BarcodeReader>,
    on_detect: DetectionCallback,
    config: LiveScannerConfig,
    frames: AtomicU64,
    fallback_in_flight: Arc<AtomicBool>,
    last_success: Arc<Mutex<Option<Instant>>>,
}

impl LiveScanner {
    pub fn new(
        fast: Arc<dyn BarcodeReader>,
        scanner: Arc<dyn BarcodeReader>,
        on_detect: DetectionCallback,
    ) -> Self {
        Self::with_config(fast, scanner, on_detect, LiveScannerConfig::default())
    }

    pub fn with_config(
        fast: Arc<dyn BarcodeReader>,
        scanner: Arc<dyn BarcodeReader>,
        on_detect: DetectionCallback,
        config: LiveScannerConfig,
    ) -> Self {
        Self {
            fast,
            scanner,
            on_detect,
            config,
            frames: AtomicU64::new(0),
            fallback_in_flight: Arc::new(AtomicBool::new(false)),
            last_success: Arc::new(Mutex::new(None)),
        }
    }

    /// Examine one luminance frame. Returns a payload found on the fast path;
    /// fallback hits arrive through the callback instead.
    ///
    /// The fallback is only scheduled when called inside a Tokio runtime.
    pub fn on_frame(&self, frame: GrayImage) -> Option<String> {
        if in_cooldown(&self.last_success, self.config.cooldown) {
            return None;
        }
        let n = self.frames.fetch_add(1, Ordering::Relaxed);
        if n % self.config.frame_stride.max(1) != 0 {
            return None;
        }

        let roi = transform::center_crop(&frame, self.config.roi_percent);
        if let Some(payload) = self
            .fast
            .read(&roi, FormatSet::PaymentCodes, Binarizer::ContrastAdaptive)
            .filter(|p| !p.trim().is_empty())
        {
            if claim(&self.last_success, self.config.cooldown) {
                return Some(payload);
            }
            return None;
        }

        self.spawn_fallback(frame);
        None
    }

    pub fn fallback_in_flight(&self) -> bool {
        self.fallback_in_flight.load(Ordering::Acquire)
    }

    fn spawn_fallback(&self, frame: GrayImage) {
        if self.fallback_in_flight.swap(true, Ordering::AcqRel) {
            return;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                self.fallback_in_flight.store(false, Ordering::Release);
                warn!("Live scanner fallback skipped: no async runtime");
                return;
            }
        };

        let scanner = Arc::clone(&self.scanner);
        let in_flight = Arc::clone(&self.fallback_in_flight);
        let last_success = Arc::clone(&self.last_success);
        let on_detect = Arc::clone(&self.on_detect);
        let cooldown = self.config.cooldown;

        handle.spawn_blocking(move || {
            let found = scanner
                .read(&frame, FormatSet::PaymentCodes, Binarizer::ContrastAdaptive)
                .filter(|p| !p.trim().is_empty());
            in_flight.store(false, Ordering::Release);
            match found {
                Some(payload) if claim(&last_success, cooldown) => on_detect(payload),
                Some(_) => debug!("Late fallback detection discarded during cooldown"),
                None => {}
            }
        });
    }
}

fn in_cooldown(last: &Mutex<Option<Instant>>, cooldown: Duration) -> bool {
    let guard = last.lock().unwrap_or_else(PoisonError::into_inner);
    guard.is_some_and(|t| t.elapsed() < cooldown)
}

/// Records a success unless another one landed inside the cooldown window.
fn claim(last: &Mutex<Option<Instant>>, cooldown: Duration) -> bool {
    let mut guard = last.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_some_and(|t| t.elapsed() < cooldown) {
        return false;
    }
    *guard = Some(Instant::now());
    true
}
