//! Native GraphSAGE + GAT edge scorer.
//!
//! Node embeddings are propagated along transaction edges (messages flow
//! source → destination) through two mean-aggregation GraphSAGE layers and
//! one multi-head attention layer. Each transaction is then scored from
//! `[h_src ‖ h_dst ‖ edge_features]` by a two-layer MLP.

use crate::error::{GraphGuardError, Result};
use crate::graph::edges::{TransactionGraph, EDGE_FEATURE_DIM};
use crate::models::inference::{EdgeScorer, OutputKind};
use crate::models::loader::{GatWeights, ModelWeights, SageWeights};
use tracing::debug;

const LEAKY_RELU_SLOPE: f32 = 0.2;

/// Edge scorer running the reference GNN architecture on the CPU.
pub struct GraphSageGat {
    weights: ModelWeights,
    output: OutputKind,
}

impl GraphSageGat {
    pub fn new(weights: ModelWeights, output: OutputKind) -> Self {
        Self { weights, output }
    }

    /// Final node embeddings after all message-passing rounds.
    pub fn node_embeddings(&self, graph: &TransactionGraph) -> Result<Vec<Vec<f32>>> {
        self.weights.validate(graph.num_nodes(), EDGE_FEATURE_DIM)?;

        let incoming = incoming_neighbours(graph);

        let x = self.weights.node_embedding.clone();
        let x = relu_all(sage_layer(&self.weights.sage1, &x, &incoming));
        let x = relu_all(sage_layer(&self.weights.sage2, &x, &incoming));
        let x = relu_all(gat_layer(&self.weights.gat, &x, &incoming));
        Ok(x)
    }

    /// Raw model output per transaction (before squashing).
    pub fn edge_outputs(&self, graph: &TransactionGraph) -> Result<Vec<f32>> {
        let h = self.node_embeddings(graph)?;
        let dim = self.weights.embedding_dim();

        let mut input = Vec::with_capacity(2 * dim + EDGE_FEATURE_DIM);
        let outputs = graph
            .edges()
            .iter()
            .map(|edge| {
                input.clear();
                input.extend_from_slice(&h[edge.src]);
                input.extend_from_slice(&h[edge.dst]);
                input.extend(edge.features.iter().map(|&f| f as f32));

                let hidden = relu_all_vec(self.weights.mlp_hidden.forward(&input));
                self.weights.mlp_out.forward(&hidden)[0]
            })
            .collect();
        Ok(outputs)
    }
}

impl EdgeScorer for GraphSageGat {
    fn name(&self) -> &str {
        "graphsage-gat"
    }

    fn score(&self, graph: &TransactionGraph) -> Result<Vec<f64>> {
        let outputs = self.edge_outputs(graph)?;
        let scores: Vec<f64> = outputs
            .iter()
            .map(|&raw| self.output.to_probability(raw as f64))
            .collect();

        if let Some(bad) = scores.iter().position(|s| s.is_nan()) {
            return Err(GraphGuardError::Scoring(format!(
                "model output for transaction {bad} is NaN"
            )));
        }

        debug!(
            transactions = scores.len(),
            dim = self.weights.embedding_dim(),
            heads = self.weights.gat.heads(),
            "GNN forward pass complete"
        );
        Ok(scores)
    }
}

/// For each node, the source node of every incoming edge (with repeats for
/// parallel transactions).
fn incoming_neighbours(graph: &TransactionGraph) -> Vec<Vec<usize>> {
    let mut incoming = vec![Vec::new(); graph.num_nodes()];
    for edge in graph.edges().iter() {
        incoming[edge.dst].push(edge.src);
    }
    incoming
}

/// `h_i = W_l · mean_{j→i} x_j + W_r · x_i`; nodes without incoming edges
/// aggregate a zero vector.
fn sage_layer(weights: &SageWeights, x: &[Vec<f32>], incoming: &[Vec<usize>]) -> Vec<Vec<f32>> {
    let dim = weights.lin_l.in_dim();

    x.iter()
        .zip(incoming)
        .map(|(xi, neighbours)| {
            let mut mean = vec![0.0f32; dim];
            if !neighbours.is_empty() {
                for &j in neighbours {
                    for (m, v) in mean.iter_mut().zip(&x[j]) {
                        *m += v;
                    }
                }
                let n = neighbours.len() as f32;
                mean.iter_mut().for_each(|m| *m /= n);
            }

            weights
                .lin_l
                .forward(&mean)
                .into_iter()
                .zip(weights.lin_r.forward(xi))
                .map(|(a, b)| a + b)
                .collect()
        })
        .collect()
}

/// Multi-head graph attention with one self loop per node (existing self
/// transfers are replaced by it). Heads are averaged, then the bias added.
fn gat_layer(weights: &GatWeights, x: &[Vec<f32>], incoming: &[Vec<usize>]) -> Vec<Vec<f32>> {
    let heads = weights.heads();
    let dim = weights.bias.len();

    let projected: Vec<Vec<f32>> = x.iter().map(|xi| weights.lin.forward(xi)).collect();
    let head_slice = |node: usize, h: usize| &projected[node][h * dim..(h + 1) * dim];
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(p, q)| p * q).sum::<f32>();

    let alpha_src: Vec<Vec<f32>> = (0..x.len())
        .map(|n| (0..heads).map(|h| dot(head_slice(n, h), &weights.att_src[h][..])).collect())
        .collect();
    let alpha_dst: Vec<Vec<f32>> = (0..x.len())
        .map(|n| (0..heads).map(|h| dot(head_slice(n, h), &weights.att_dst[h][..])).collect())
        .collect();

    (0..x.len())
        .map(|i| {
            let sources: Vec<usize> = incoming[i]
                .iter()
                .copied()
                .filter(|&j| j != i)
                .chain(std::iter::once(i))
                .collect();

            let mut out = vec![0.0f32; dim];
            for h in 0..heads {
                let logits: Vec<f32> = sources
                    .iter()
                    .map(|&j| leaky_relu(alpha_src[j][h] + alpha_dst[i][h]))
                    .collect();
                let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let exp: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
                let total: f32 = exp.iter().sum();

                for (&j, e) in sources.iter().zip(&exp) {
                    let attention = e / total;
                    for (o, v) in out.iter_mut().zip(head_slice(j, h)) {
                        *o += attention * v;
                    }
                }
            }

            out.iter()
                .zip(&weights.bias)
                .map(|(o, b)| o / heads as f32 + b)
                .collect()
        })
        .collect()
}

fn leaky_relu(v: f32) -> f32 {
    if v >= 0.0 {
        v
    } else {
        LEAKY_RELU_SLOPE * v
    }
}

fn relu_all(x: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
    x.into_iter().map(relu_all_vec).collect()
}

fn relu_all_vec(mut v: Vec<f32>) -> Vec<f32> {
    v.iter_mut().for_each(|x| *x = x.max(0.0));
    v
}
