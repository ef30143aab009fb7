// BreatheRight — Cough / Sneeze Inference Task
//
// Blocks on the next audio slice, runs the continuous classifier on it and
// counts detections above the confidence threshold. Counts are kept per
// model window and flushed into the shared store once every window
// (EI_SLICES_PER_MODEL_WINDOW slices). Every classified slice above the
// threshold counts once, after the first window has filled.

use std::sync::Arc;

use crate::audio::{AudioError, SliceConsumer};
use crate::config::*;
use crate::events::{AudioEvent, EventCounters};
use crate::ports::{Classifier, Inference};
use crate::state::SharedState;

/// Labels above the threshold in one inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Detections {
    pub cough: bool,
    pub sneeze: bool,
}

/// Strictly greater than `threshold`; every other label is ignored.
pub fn detections(inference: &Inference, threshold: f32) -> Detections {
    let mut found = Detections::default();
    for c in inference
        .classifications
        .iter()
        .filter(|c| c.confidence > threshold)
    {
        match AudioEvent::from_label(&c.label) {
            AudioEvent::Cough => found.cough = true,
            AudioEvent::Sneeze => found.sneeze = true,
            AudioEvent::Noise => {}
        }
    }
    found
}

pub struct EventAccumulator<C> {
    classifier: C,
    state: Arc<SharedState>,
    window: u64,
    threshold: f32,
    cycles: u64,
    pending: EventCounters,
}

impl<C: Classifier> EventAccumulator<C> {
    pub fn new(classifier: C, state: Arc<SharedState>) -> Self {
        Self::with_window(classifier, state, EI_SLICES_PER_MODEL_WINDOW as u64)
    }

    pub fn with_window(classifier: C, state: Arc<SharedState>, window: u64) -> Self {
        Self {
            classifier,
            state,
            window: window.max(1),
            threshold: EI_CONFIDENCE_THRESHOLD,
            cycles: 0,
            pending: EventCounters::default(),
        }
    }

    /// Classified cycles so far, warm-up included.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Classify one slice. Returns the counts flushed to the store when this
    /// slice completes a window.
    pub fn process(&mut self, slice: &[i16]) -> anyhow::Result<Option<EventCounters>> {
        let inference = self.classifier.classify(slice)?;
        self.cycles += 1;

        log::debug!(
            "Predictions (DSP: {} ms., Classification: {} ms., Anomaly: {} ms.): {:?}",
            inference.timing.dsp_ms,
            inference.timing.classification_ms,
            inference.timing.anomaly_ms,
            inference
                .classifications
                .iter()
                .map(|c| (c.label.as_str(), c.confidence))
                .collect::<Vec<_>>()
        );

        // Until the first window has filled, the model sees mostly zeros.
        if self.cycles <= self.window {
            return Ok(None);
        }

        let found = detections(&inference, self.threshold);
        self.pending.add(EventCounters::new(
            u32::from(found.cough),
            u32::from(found.sneeze),
        ));

        if (self.cycles - self.window) % self.window != 0 {
            return Ok(None);
        }

        let flushed = std::mem::take(&mut self.pending);
        if !flushed.is_empty() {
            self.state.increment_events(flushed.coughs, flushed.sneezes);
            log::info!(
                "Window detections: {} cough(s), {} sneeze(s)",
                flushed.coughs,
                flushed.sneezes
            );
        }
        Ok(Some(flushed))
    }
}

pub fn inference_task<C: Classifier>(classifier: C, mut slices: SliceConsumer, state: Arc<SharedState>) {
    log::info!("Inference task started");

    let mut accumulator = EventAccumulator::new(classifier, state);

    loop {
        match slices.recv() {
            Ok(slice) => {
                if let Err(e) = accumulator.process(slice) {
                    log::error!("Classifier failed: {}", e);
                }
            }
            Err(AudioError::Overrun) => {
                log::warn!(
                    "Sample buffer overrun, skipping this slice. Decrease the number of slices \
                     per model window"
                );
            }
            Err(e) => {
                log::error!("Audio input lost, exiting inference task: {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Classification;
    use std::collections::VecDeque;

    /// Replays scripted cough / sneeze confidences, one pair per slice.
    struct Scripted(VecDeque<(f32, f32)>);

    impl Scripted {
        fn new(scores: &[(f32, f32)]) -> Self {
            Self(scores.iter().copied().collect())
        }
    }

    impl Classifier for Scripted {
        fn classify(&mut self, _slice: &[i16]) -> anyhow::Result<Inference> {
            let (cough, sneeze) = self.0.pop_front().unwrap_or((0.0, 0.0));
            Ok(inference(cough, sneeze))
        }
    }

    fn inference(cough: f32, sneeze: f32) -> Inference {
        let noise = (1.0 - cough - sneeze).max(0.0);
        Inference {
            classifications: vec![
                Classification {
                    label: "cough".into(),
                    confidence: cough,
                },
                Classification {
                    label: "noise".into(),
                    confidence: noise,
                },
                Classification {
                    label: "sneeze".into(),
                    confidence: sneeze,
                },
            ],
            timing: Default::default(),
        }
    }

    fn run(scores: &[(f32, f32)], window: u64) -> (Vec<Option<EventCounters>>, Arc<SharedState>) {
        let state = Arc::new(SharedState::new());
        let mut acc = EventAccumulator::with_window(Scripted::new(scores), Arc::clone(&state), window);
        let flushes = scores.iter().map(|_| acc.process(&[0; 4]).unwrap()).collect();
        (flushes, state)
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(detections(&inference(0.8, 0.0), 0.8), Detections::default());
        assert_eq!(
            detections(&inference(0.81, 0.0), 0.8),
            Detections {
                cough: true,
                sneeze: false
            }
        );
    }

    #[test]
    fn warm_up_window_is_not_counted() {
        let (flushes, state) = run(&[(0.95, 0.0), (0.0, 0.95)], 2);
        assert_eq!(flushes, vec![None, None]);
        assert!(state.peek_events().is_empty());
    }

    #[test]
    fn flushes_once_per_window() {
        let quiet = (0.0, 0.0);
        let cough = (0.9, 0.0);
        let sneeze = (0.0, 0.9);
        // Warm-up: 2 slices; then windows of 2.
        let (flushes, state) = run(&[quiet, quiet, cough, quiet, sneeze, cough], 2);

        assert_eq!(
            flushes,
            vec![
                None,
                None,
                None,
                Some(EventCounters::new(1, 0)),
                None,
                Some(EventCounters::new(1, 1)),
            ]
        );
        assert_eq!(state.drain_events(), EventCounters::new(2, 1));
    }

    #[test]
    fn every_cycle_above_threshold_counts() {
        let cough = (0.9, 0.0);
        let quiet = (0.1, 0.0);
        let (_, state) = run(&[cough, cough, cough, quiet, cough, cough, quiet], 1);
        // First slice is warm-up; the four coughing slices after it all count.
        assert_eq!(state.drain_events(), EventCounters::new(4, 0));
    }

    #[test]
    fn continuous_cough_counts_every_slice_after_warm_up() {
        let cough = (0.95, 0.0);
        let (flushes, state) = run(&[cough; 12], 4);

        assert_eq!(flushes[7], Some(EventCounters::new(4, 0)));
        assert_eq!(flushes[11], Some(EventCounters::new(4, 0)));
        assert_eq!(state.drain_events(), EventCounters::new(8, 0));
    }

    #[test]
    fn both_labels_can_count_in_one_cycle() {
        let both = (0.85, 0.85);
        let (_, state) = run(&[both, both], 1);
        assert_eq!(state.drain_events(), EventCounters::new(1, 1));
    }

    #[test]
    fn classifier_error_does_not_advance() {
        struct Failing;
        impl Classifier for Failing {
            fn classify(&mut self, _slice: &[i16]) -> anyhow::Result<Inference> {
                anyhow::bail!("dsp error")
            }
        }

        let mut acc = EventAccumulator::new(Failing, Arc::new(SharedState::new()));
        assert!(acc.process(&[0; 4]).is_err());
        assert_eq!(acc.cycles(), 0);
    }

    #[test]
    fn task_counts_slices_from_channel() {
        let state = Arc::new(SharedState::new());
        let (mut tx, rx) = crate::audio::slice_channel(2).unwrap();

        let mut scores = vec![(0.0, 0.0); EI_SLICES_PER_MODEL_WINDOW];
        scores.push((0.9, 0.0));
        scores.extend(vec![(0.0, 0.0); EI_SLICES_PER_MODEL_WINDOW - 1]);
        let total = scores.len();

        let task_state = Arc::clone(&state);
        let task = std::thread::spawn(move || inference_task(Scripted::new(&scores), rx, task_state));

        // One slice at a time, waiting for the consumer so nothing overruns.
        for _ in 0..total {
            let before = std::time::Instant::now();
            tx.push(&[1, 2]).unwrap();
            while before.elapsed() < std::time::Duration::from_millis(20) {
                std::thread::yield_now();
            }
        }
        drop(tx);
        task.join().unwrap();

        assert_eq!(state.drain_events(), EventCounters::new(1, 0));
    }
}
