//! Neural-network evaluator backed by ONNX Runtime.
//!
//! Expected graph signature:
//! - input `observation`: float32 `(1, 93)`, see [`games_connect4::Observation`]
//! - output `policy_logits`: float32 `(1, 7)`
//! - output `value`: float32 `(1, 1)`, in [-1, 1] for the player to move
//!
//! The logits go through a softmax over all seven columns. Full columns are
//! masked later, when the search renormalizes priors over legal moves.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use games_connect4::{Board, COLS, OBS_SIZE};
use ort::session::builder::SessionBuilder;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::evaluator::{EvalResult, Evaluator, EvaluatorError};

/// Log an inference summary after this many calls.
const STATS_LOG_EVERY: u64 = 10_000;

fn model_error<E: fmt::Display>(context: &'static str) -> impl Fn(E) -> EvaluatorError {
    move |e| EvaluatorError::ModelError(format!("{}: {}", context, e))
}

/// Policy/value network loaded into an ONNX Runtime session.
///
/// `Session::run` needs `&mut`, so the session sits behind a mutex and
/// concurrent searches sharing one evaluator take turns at inference.
pub struct OnnxEvaluator {
    session: Mutex<Session>,
    calls: AtomicU64,
    busy_us: AtomicU64,
}

impl fmt::Debug for OnnxEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxEvaluator")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Counters since the evaluator was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnnxStats {
    pub inference_count: u64,
    pub total_inference_time_us: u64,
}

impl OnnxEvaluator {
    /// Load a model file, running inference on `intra_threads` threads.
    pub fn load<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self, EvaluatorError> {
        let path = model_path.as_ref();
        let session = builder(intra_threads)?
            .commit_from_file(path)
            .map_err(model_error("cannot load model"))?;

        info!(path = %path.display(), intra_threads, "Loaded ONNX model");
        Ok(Self::from_session(session))
    }

    /// Load a model held in memory, single-threaded.
    pub fn load_from_memory(model_data: &[u8]) -> Result<Self, EvaluatorError> {
        let session = builder(1)?
            .commit_from_memory(model_data)
            .map_err(model_error("cannot load model from memory"))?;
        Ok(Self::from_session(session))
    }

    fn from_session(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
            calls: AtomicU64::new(0),
            busy_us: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> OnnxStats {
        OnnxStats {
            inference_count: self.calls.load(Ordering::Relaxed),
            total_inference_time_us: self.busy_us.load(Ordering::Relaxed),
        }
    }

    /// Run the graph once and copy both outputs out of the session.
    fn infer(&self, input: Tensor<f32>) -> Result<([f32; COLS], f32), EvaluatorError> {
        let mut session = self.session.lock().map_err(|e| {
            EvaluatorError::EvaluationFailed(format!("session lock poisoned: {}", e))
        })?;
        let outputs = session
            .run(ort::inputs!["observation" => input])
            .map_err(|e| EvaluatorError::EvaluationFailed(format!("inference failed: {}", e)))?;

        let (_, logits) = outputs
            .get("policy_logits")
            .ok_or_else(|| EvaluatorError::ModelError("no policy_logits output".into()))?
            .try_extract_tensor::<f32>()
            .map_err(model_error("policy_logits is not a float tensor"))?;
        let logits: [f32; COLS] = logits.try_into().map_err(|_| {
            EvaluatorError::ModelError(format!(
                "policy_logits has {} entries, expected {}",
                logits.len(),
                COLS
            ))
        })?;

        let (_, value) = outputs
            .get("value")
            .ok_or_else(|| EvaluatorError::ModelError("no value output".into()))?
            .try_extract_tensor::<f32>()
            .map_err(model_error("value is not a float tensor"))?;
        let value = *value
            .first()
            .ok_or_else(|| EvaluatorError::ModelError("value output is empty".into()))?;

        Ok((logits, value))
    }

    fn record_call(&self, started: Instant) {
        let elapsed = started.elapsed().as_micros() as u64;
        let busy = self.busy_us.fetch_add(elapsed, Ordering::Relaxed) + elapsed;
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if calls % STATS_LOG_EVERY == 0 {
            debug!(
                calls,
                avg_ms = (busy / calls) as f64 / 1000.0,
                "ONNX inference stats"
            );
        }
    }
}

fn builder(intra_threads: usize) -> Result<SessionBuilder, EvaluatorError> {
    Session::builder()
        .map_err(model_error("cannot create session builder"))?
        .with_intra_threads(intra_threads)
        .map_err(model_error("cannot set intra-op threads"))
}

/// Softmax shifted by the largest logit. All zeros when no logit is finite.
fn softmax(logits: &[f32; COLS]) -> [f32; COLS] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return [0.0; COLS];
    }

    let exps = logits.map(|l| (l - max).exp());
    let total: f32 = exps.iter().sum();
    exps.map(|e| e / total)
}

impl Evaluator for OnnxEvaluator {
    fn evaluate(&self, board: &Board) -> Result<EvalResult, EvaluatorError> {
        let input = ndarray::Array2::from_shape_vec((1, OBS_SIZE), board.observation().to_vec())
            .map_err(|e| EvaluatorError::InvalidState(format!("bad observation shape: {}", e)))?;
        let input = Tensor::from_array(input).map_err(model_error("cannot build input tensor"))?;

        let started = Instant::now();
        let (logits, value) = self.infer(input)?;
        self.record_call(started);

        Ok(EvalResult {
            policy: softmax(&logits),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_orders_logits() {
        let policy = softmax(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0]);

        assert!((policy.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(policy[0] < policy[1] && policy[1] < policy[2]);
    }

    #[test]
    fn test_softmax_large_logits() {
        let policy = softmax(&[1000.0, 1000.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!((policy[0] - 0.5).abs() < 1e-6);
        assert!(policy.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_softmax_non_finite() {
        let policy = softmax(&[f32::NEG_INFINITY; COLS]);
        assert_eq!(policy, [0.0; COLS]);
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let err = OnnxEvaluator::load("/nonexistent/model.onnx", 1).unwrap_err();
        assert!(matches!(err, EvaluatorError::ModelError(_)));
    }
}
