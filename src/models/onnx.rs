//! ONNX Runtime edge scorer for GNNs exported from training.
//!
//! The model takes `edge_index` (int64, `[2, E]`) and `edge_attr`
//! (float32, `[E, 3]`) and returns one scalar per edge.

use crate::error::{GraphGuardError, Result};
use crate::graph::edges::{TransactionGraph, EDGE_FEATURE_DIM};
use crate::models::inference::{EdgeScorer, OutputKind};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Edge scorer backed by an ONNX Runtime session.
pub struct OnnxEdgeScorer {
    session: Mutex<Session>,
    edge_index_input: String,
    edge_attr_input: String,
    output_name: String,
    output: OutputKind,
}

fn ort_error(e: impl std::fmt::Display) -> GraphGuardError {
    GraphGuardError::Scoring(e.to_string())
}

impl OnnxEdgeScorer {
    /// Load an exported model.
    pub fn load<P: AsRef<Path>>(path: P, threads: usize, output: OutputKind) -> Result<Self> {
        let path = path.as_ref();

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(ort_error)?;

        let input_named = |wanted: &str, position: usize| {
            session
                .inputs
                .iter()
                .find(|i| i.name == wanted)
                .or_else(|| session.inputs.get(position))
                .map(|i| i.name.clone())
                .ok_or_else(|| ort_error(format!("model has no input for {wanted}")))
        };
        let edge_index_input = input_named("edge_index", 0)?;
        let edge_attr_input = input_named("edge_attr", 1)?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| ort_error("model has no outputs"))?;

        info!(
            path = %path.display(),
            edge_index = %edge_index_input,
            edge_attr = %edge_attr_input,
            output = %output_name,
            threads,
            "ONNX edge scorer loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            edge_index_input,
            edge_attr_input,
            output_name,
            output,
        })
    }
}

impl EdgeScorer for OnnxEdgeScorer {
    fn name(&self) -> &str {
        "onnx"
    }

    fn score(&self, graph: &TransactionGraph) -> Result<Vec<f64>> {
        let edges = graph.edges();
        let num_edges = edges.len();

        let index: Vec<i64> = edges
            .sources()
            .iter()
            .chain(edges.destinations())
            .map(|&n| n as i64)
            .collect();
        let attr: Vec<f32> = edges
            .features()
            .iter()
            .flat_map(|row| row.iter().map(|&v| v as f32))
            .collect();

        let index_tensor =
            Tensor::from_array((vec![2_i64, num_edges as i64], index)).map_err(ort_error)?;
        let attr_tensor =
            Tensor::from_array((vec![num_edges as i64, EDGE_FEATURE_DIM as i64], attr))
                .map_err(ort_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ort_error(format!("session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                self.edge_index_input.as_str() => index_tensor,
                self.edge_attr_input.as_str() => attr_tensor,
            ])
            .map_err(ort_error)?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| ort_error(format!("missing output {}", self.output_name)))?;
        let (_, data) = output.try_extract_tensor::<f32>().map_err(ort_error)?;

        if data.len() != num_edges {
            return Err(GraphGuardError::ScoreCountMismatch {
                expected: num_edges,
                actual: data.len(),
            });
        }

        debug!(transactions = num_edges, "ONNX inference complete");
        Ok(data
            .iter()
            .map(|&raw| self.output.to_probability(raw as f64))
            .collect())
    }
}
