use image::{DynamicImage, GrayImage};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::reader::{BarcodeReader, Binarizer, FormatSet};
use crate::transform::{self, Rotation};

/// Where an image came from. Images loaded from stored content (gallery,
/// files, attachments) can be arbitrarily large and get downsized copies tried
/// first, since very large bitmaps defeat some decoders outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    Stored,
    Captured,
}

const DOWNSCALE_EDGES: [u32; 4] = [256, 400, 512, 800];
const THRESHOLDS: [u8; 5] = [100, 128, 150, 180, 200];
const INVERTED_THRESHOLDS: [u8; 4] = [100, 128, 150, 180];
/// Height/width ratio above which the bottom half is tried on its own.
const TALL_RATIO_NUM: u64 = 6;
const TALL_RATIO_DEN: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Fast,
    Scanner,
}

#[derive(Debug, Clone, Copy)]
struct Attempt {
    role: Role,
    formats: FormatSet,
    binarizer: Binarizer,
}

const fn attempt(role: Role, formats: FormatSet, binarizer: Binarizer) -> Attempt {
    Attempt { role, formats, binarizer }
}

const FAST_BOTH_BINARIZERS: &[Attempt] = &[
    attempt(Role::Fast, FormatSet::PaymentCodes, Binarizer::ContrastAdaptive),
    attempt(Role::Fast, FormatSet::PaymentCodes, Binarizer::GlobalHistogram),
];
const SCANNER_ANY: &[Attempt] = &[attempt(Role::Scanner, FormatSet::Any, Binarizer::ContrastAdaptive)];
const SCANNER_PAYMENT: &[Attempt] =
    &[attempt(Role::Scanner, FormatSet::PaymentCodes, Binarizer::ContrastAdaptive)];
const FAST_THEN_SCANNER_ANY: &[Attempt] = &[
    attempt(Role::Fast, FormatSet::PaymentCodes, Binarizer::ContrastAdaptive),
    attempt(Role::Scanner, FormatSet::Any, Binarizer::ContrastAdaptive),
];
const FAST_THEN_SCANNER_PAYMENT: &[Attempt] = &[
    attempt(Role::Fast, FormatSet::PaymentCodes, Binarizer::ContrastAdaptive),
    attempt(Role::Scanner, FormatSet::PaymentCodes, Binarizer::ContrastAdaptive),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    Downscale(u32),
    Original,
    BottomHalf,
    BottomHalfUpscaled,
    Rotated(Rotation),
    Contrast(Rotation),
    Threshold(u8),
    InvertedThreshold(u8),
}

impl Transform {
    /// `None` when the transform does not apply to this image.
    fn apply<'a>(&self, img: &'a GrayImage) -> Option<Cow<'a, GrayImage>> {
        Some(match *self {
            Transform::Downscale(edge) => Cow::Owned(transform::downscale(img, edge)?),
            Transform::Original | Transform::Rotated(Rotation::Deg0) => Cow::Borrowed(img),
            Transform::BottomHalf => Cow::Owned(transform::bottom_half(img)),
            Transform::BottomHalfUpscaled => {
                Cow::Owned(transform::upscale(&transform::bottom_half(img), 2))
            }
            Transform::Rotated(r) => Cow::Owned(transform::rotate(img, r)),
            Transform::Contrast(r) => {
                Cow::Owned(transform::rotate(&transform::enhance_contrast(img), r))
            }
            Transform::Threshold(t) => Cow::Owned(transform::threshold(img, t)),
            Transform::InvertedThreshold(t) => Cow::Owned(transform::inverted_threshold(img, t)),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Stage {
    transform: Transform,
    attempts: &'static [Attempt],
}

fn stage(transform: Transform, attempts: &'static [Attempt]) -> Stage {
    Stage { transform, attempts }
}

/// The ordered strategy list for an image of the given shape.
fn plan(origin: ImageOrigin, width: u32, height: u32) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(32);

    if origin == ImageOrigin::Stored {
        stages.extend(DOWNSCALE_EDGES.iter().map(|&e| stage(Transform::Downscale(e), SCANNER_ANY)));
    }

    stages.push(stage(Transform::Original, FAST_BOTH_BINARIZERS));

    if height as u64 * TALL_RATIO_DEN > width as u64 * TALL_RATIO_NUM {
        stages.push(stage(Transform::BottomHalf, FAST_THEN_SCANNER_ANY));
        stages.push(stage(Transform::BottomHalfUpscaled, FAST_THEN_SCANNER_ANY));
    }

    for r in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
        stages.push(stage(Transform::Rotated(r), SCANNER_PAYMENT));
    }
    for r in [Rotation::Deg0, Rotation::Deg90] {
        stages.push(stage(Transform::Contrast(r), SCANNER_PAYMENT));
    }
    stages.extend(THRESHOLDS.iter().map(|&t| stage(Transform::Threshold(t), FAST_THEN_SCANNER_PAYMENT)));
    stages.extend(
        INVERTED_THRESHOLDS
            .iter()
            .map(|&t| stage(Transform::InvertedThreshold(t), FAST_THEN_SCANNER_PAYMENT)),
    );
    stages
}

/// Still-image barcode decoding: tries every strategy in order and returns the
/// first non-empty payload.
pub struct DecodeCascade {
    fast: Arc<dyn BarcodeReader>,
    scanner: Arc<dyn BarcodeReader>,
}

impl DecodeCascade {
    /// `fast` is the restricted-format decoder; `scanner` the general one.
    pub fn new(fast: Arc<dyn BarcodeReader>, scanner: Arc<dyn BarcodeReader>) -> Self {
        Self { fast, scanner }
    }

    /// Decode raw image bytes. Bytes that are not a decodable image yield `None`.
    pub fn decode_bytes(&self, data: &[u8], origin: ImageOrigin) -> Option<String> {
        match image::load_from_memory(data) {
            Ok(img) => self.decode(&img, origin),
            Err(e) => {
                warn!("Barcode decode skipped, unreadable image: {e}");
                None
            }
        }
    }

    pub fn decode(&self, image: &DynamicImage, origin: ImageOrigin) -> Option<String> {
        let luma = image.to_luma8();
        if luma.width() == 0 || luma.height() == 0 {
            return None;
        }

        for stage in plan(origin, luma.width(), luma.height()) {
            let Some(view) = stage.transform.apply(&luma) else {
                continue;
            };
            for a in stage.attempts {
                let reader = match a.role {
                    Role::Fast => &self.fast,
                    Role::Scanner => &self.scanner,
                };
                let hit = reader
                    .read(&view, a.formats, a.binarizer)
                    .filter(|p| !p.trim().is_empty());
                if let Some(payload) = hit {
                    debug!(transform = ?stage.transform, role = ?a.role, "barcode decoded");
                    return Some(payload);
                }
            }
        }
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
