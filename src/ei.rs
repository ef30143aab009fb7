// BreatheRight — Edge Impulse Inference Interface
//
// Continuous audio classification over fixed-size slices.
//
// Architecture:
//   1. STUB mode (default): a loudness / zero-crossing heuristic so the rest
//      of the firmware runs end-to-end without the C++ SDK compiled in.
//   2. FFI mode: enable the `edge-impulse` feature; build.rs compiles the
//      exported SDK plus csrc/ei_shim.cpp, which wraps
//      `run_classifier_continuous` behind a flat C interface.
//
// The inference task hands `classify` one slice of EI_SLICE_SIZE samples
// per call and gets back every label's score plus stage timings.

use crate::config::*;
use crate::ports::{Classification, Classifier, Inference, InferenceTiming};

/// Labels matching the Edge Impulse model output order.
pub const LABELS: [&str; EI_LABEL_COUNT] = ["cough", "noise", "sneeze"];

pub struct EdgeImpulse {
    slice_len: usize,
}

impl EdgeImpulse {
    /// Reset the continuous classifier's internal window.
    pub fn new() -> anyhow::Result<Self> {
        init_backend()?;
        log::info!(
            "Classifier ready: {} labels, {} samples/slice, {} slices/window",
            EI_LABEL_COUNT,
            EI_SLICE_SIZE,
            EI_SLICES_PER_MODEL_WINDOW
        );
        Ok(Self {
            slice_len: EI_SLICE_SIZE,
        })
    }
}

impl Classifier for EdgeImpulse {
    fn classify(&mut self, slice: &[i16]) -> anyhow::Result<Inference> {
        if slice.len() != self.slice_len {
            anyhow::bail!(
                "classifier expects {} samples per slice, got {}",
                self.slice_len,
                slice.len()
            );
        }

        let (scores, timing) = run_inference(slice)?;
        let classifications = LABELS
            .iter()
            .zip(scores)
            .map(|(label, confidence)| Classification {
                label: (*label).to_string(),
                confidence,
            })
            .collect();

        Ok(Inference {
            classifications,
            timing,
        })
    }
}

// ---------------------------------------------------------------------------
// Inference back-end (swap between stub / real FFI)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "edge-impulse"))]
fn init_backend() -> anyhow::Result<()> {
    Ok(())
}

#[cfg(not(feature = "edge-impulse"))]
fn run_inference(slice: &[i16]) -> anyhow::Result<([f32; EI_LABEL_COUNT], InferenceTiming)> {
    Ok((stub_scores(slice), InferenceTiming::default()))
}

#[cfg(feature = "edge-impulse")]
fn init_backend() -> anyhow::Result<()> {
    // SAFETY: resets static state inside the SDK; called before any
    // classification, from the single inference task.
    unsafe { ffi::ei_shim_init() };
    Ok(())
}

#[cfg(feature = "edge-impulse")]
fn run_inference(slice: &[i16]) -> anyhow::Result<([f32; EI_LABEL_COUNT], InferenceTiming)> {
    let mut scores = [0.0f32; EI_LABEL_COUNT];
    let mut timing = ffi::EiShimTiming::default();

    // SAFETY: the shim only reads `len` samples and writes at most
    // `EI_LABEL_COUNT` scores; both buffers outlive the call.
    let err = unsafe {
        ffi::ei_shim_classify_slice(
            slice.as_ptr(),
            slice.len(),
            scores.as_mut_ptr(),
            scores.len(),
            &mut timing,
        )
    };
    if err != 0 {
        anyhow::bail!("Edge Impulse classifier error: {}", err);
    }

    Ok((
        scores,
        InferenceTiming {
            dsp_ms: timing.dsp_ms.max(0) as u32,
            classification_ms: timing.classification_ms.max(0) as u32,
            anomaly_ms: timing.anomaly_ms.max(0) as u32,
        },
    ))
}

// ---------------------------------------------------------------------------
// Stub back-end: development / testing without the C++ SDK
// ---------------------------------------------------------------------------

/// Quiet audio is noise; loud bursts are coughs, unless they are hissy
/// (many zero crossings), which reads as a sneeze.
#[cfg(not(feature = "edge-impulse"))]
fn stub_scores(slice: &[i16]) -> [f32; EI_LABEL_COUNT] {
    const LOUD_RMS: f64 = 4000.0;
    const HISSY_CROSSINGS: f64 = 0.25;

    if slice.is_empty() {
        return [0.0, 1.0, 0.0];
    }

    let energy: f64 = slice.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let rms = (energy / slice.len() as f64).sqrt();
    let crossings = slice
        .windows(2)
        .filter(|w| (w[0] < 0) != (w[1] < 0))
        .count() as f64
        / slice.len() as f64;

    let scores = if rms < LOUD_RMS {
        [0.04, 0.93, 0.03]
    } else if crossings > HISSY_CROSSINGS {
        [0.06, 0.04, 0.90]
    } else {
        [0.91, 0.05, 0.04]
    };

    log::debug!(
        "STUB inference: rms = {:.0}, crossings = {:.2}, scores = {:?}",
        rms,
        crossings,
        scores
    );
    scores
}

// ---------------------------------------------------------------------------
// Real FFI back-end: calls the C++ shim around the Edge Impulse SDK
// ---------------------------------------------------------------------------
#[cfg(feature = "edge-impulse")]
mod ffi {
    #[repr(C)]
    #[derive(Default)]
    pub struct EiShimTiming {
        pub dsp_ms: i32,
        pub classification_ms: i32,
        pub anomaly_ms: i32,
    }

    extern "C" {
        pub fn ei_shim_init();
        pub fn ei_shim_classify_slice(
            samples: *const i16,
            len: usize,
            scores: *mut f32,
            score_count: usize,
            timing: *mut EiShimTiming,
        ) -> i32;
    }
}
