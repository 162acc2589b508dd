//! GNN weight loading, validation and seeded initialisation.
//!
//! Weights are exchanged as JSON. Linear layers store `weight` as
//! `[out][in]` with an optional `bias[out]`, the layout of an exported
//! PyTorch state dict.

use crate::error::{GraphGuardError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Dense layer `y = W x + b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    pub weight: Vec<Vec<f32>>,
    #[serde(default)]
    pub bias: Option<Vec<f32>>,
}

impl Linear {
    /// Xavier-uniform initialisation; biases start at zero.
    pub fn xavier(rng: &mut StdRng, in_dim: usize, out_dim: usize, bias: bool) -> Self {
        let limit = (6.0 / (in_dim + out_dim).max(1) as f32).sqrt();
        let weight = (0..out_dim)
            .map(|_| (0..in_dim).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        Self {
            weight,
            bias: bias.then(|| vec![0.0; out_dim]),
        }
    }

    pub fn out_dim(&self) -> usize {
        self.weight.len()
    }

    pub fn in_dim(&self) -> usize {
        self.weight.first().map_or(0, Vec::len)
    }

    pub fn forward(&self, x: &[f32]) -> Vec<f32> {
        self.weight
            .iter()
            .enumerate()
            .map(|(o, row)| {
                let dot: f32 = row.iter().zip(x).map(|(w, v)| w * v).sum();
                dot + self.bias.as_ref().map_or(0.0, |b| b[o])
            })
            .collect()
    }

    fn validate(&self, name: &str, in_dim: usize, out_dim: usize) -> Result<()> {
        let rows_ok = self.weight.len() == out_dim;
        let cols_ok = self.weight.iter().all(|row| row.len() == in_dim);
        if !rows_ok || !cols_ok {
            return Err(shape_error(
                &format!("{name}.weight"),
                format!("[{out_dim}, {in_dim}]"),
                format!("[{}, {}]", self.out_dim(), self.in_dim()),
            ));
        }
        if let Some(bias) = &self.bias {
            if bias.len() != out_dim {
                return Err(shape_error(
                    &format!("{name}.bias"),
                    format!("[{out_dim}]"),
                    format!("[{}]", bias.len()),
                ));
            }
        }
        Ok(())
    }
}

/// GraphSAGE (mean aggregation) parameters: `lin_l` acts on the neighbour
/// mean, `lin_r` on the node itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SageWeights {
    pub lin_l: Linear,
    pub lin_r: Linear,
}

/// Graph attention parameters for `heads` heads of width `dim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatWeights {
    /// Shared projection, `[heads * dim][in]`
    pub lin: Linear,
    /// `[heads][dim]`
    pub att_src: Vec<Vec<f32>>,
    /// `[heads][dim]`
    pub att_dst: Vec<Vec<f32>>,
    /// `[dim]`, added after averaging heads
    pub bias: Vec<f32>,
}

impl GatWeights {
    pub fn heads(&self) -> usize {
        self.att_src.len()
    }
}

/// Complete parameter set of the edge-scoring GNN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    /// Learned node embedding table, `[num_nodes][dim]`
    pub node_embedding: Vec<Vec<f32>>,
    pub sage1: SageWeights,
    pub sage2: SageWeights,
    pub gat: GatWeights,
    /// `[hidden][2 * dim + edge_dim]`
    pub mlp_hidden: Linear,
    /// `[1][hidden]`
    pub mlp_out: Linear,
}

impl ModelWeights {
    /// Seeded initialisation for a graph of `num_nodes` nodes.
    pub fn initialize(
        num_nodes: usize,
        dim: usize,
        heads: usize,
        hidden: usize,
        edge_dim: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let node_embedding = (0..num_nodes)
            .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();

        let sage = |rng: &mut StdRng| SageWeights {
            lin_l: Linear::xavier(rng, dim, dim, true),
            lin_r: Linear::xavier(rng, dim, dim, false),
        };
        let sage1 = sage(&mut rng);
        let sage2 = sage(&mut rng);

        let att_limit = (6.0 / (dim + 1) as f32).sqrt();
        let attention = |rng: &mut StdRng| -> Vec<Vec<f32>> {
            (0..heads)
                .map(|_| (0..dim).map(|_| rng.gen_range(-att_limit..att_limit)).collect())
                .collect()
        };
        let gat = GatWeights {
            lin: Linear::xavier(&mut rng, dim, heads * dim, false),
            att_src: attention(&mut rng),
            att_dst: attention(&mut rng),
            bias: vec![0.0; dim],
        };

        Self {
            node_embedding,
            sage1,
            sage2,
            gat,
            mlp_hidden: Linear::xavier(&mut rng, 2 * dim + edge_dim, hidden, true),
            mlp_out: Linear::xavier(&mut rng, hidden, 1, true),
        }
    }

    /// Load weights from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let weights: Self = serde_json::from_reader(reader)?;
        info!(
            path = %path.display(),
            nodes = weights.num_nodes(),
            dim = weights.embedding_dim(),
            heads = weights.gat.heads(),
            "GNN weights loaded"
        );
        Ok(weights)
    }

    /// Save weights as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn num_nodes(&self) -> usize {
        self.node_embedding.len()
    }

    pub fn embedding_dim(&self) -> usize {
        self.node_embedding.first().map_or(self.sage1.lin_r.in_dim(), Vec::len)
    }

    pub fn hidden_dim(&self) -> usize {
        self.mlp_hidden.out_dim()
    }

    /// Check every tensor against the graph it will score.
    pub fn validate(&self, num_nodes: usize, edge_dim: usize) -> Result<()> {
        let dim = self.embedding_dim();
        let heads = self.gat.heads();

        if self.node_embedding.len() != num_nodes
            || self.node_embedding.iter().any(|row| row.len() != dim)
        {
            return Err(shape_error(
                "node_embedding",
                format!("[{num_nodes}, {dim}]"),
                format!("[{}, {}]", self.node_embedding.len(), dim),
            ));
        }

        self.sage1.lin_l.validate("sage1.lin_l", dim, dim)?;
        self.sage1.lin_r.validate("sage1.lin_r", dim, dim)?;
        self.sage2.lin_l.validate("sage2.lin_l", dim, dim)?;
        self.sage2.lin_r.validate("sage2.lin_r", dim, dim)?;
        self.gat.lin.validate("gat.lin", dim, heads * dim)?;

        for (name, att) in [("gat.att_src", &self.gat.att_src), ("gat.att_dst", &self.gat.att_dst)] {
            if att.len() != heads || att.iter().any(|row| row.len() != dim) {
                return Err(shape_error(
                    name,
                    format!("[{heads}, {dim}]"),
                    format!("[{}, ?]", att.len()),
                ));
            }
        }
        if heads == 0 {
            return Err(shape_error("gat.att_src", "[heads >= 1, dim]".to_string(), "[0, ?]".to_string()));
        }
        if self.gat.bias.len() != dim {
            return Err(shape_error(
                "gat.bias",
                format!("[{dim}]"),
                format!("[{}]", self.gat.bias.len()),
            ));
        }

        let hidden = self.hidden_dim();
        self.mlp_hidden.validate("mlp_hidden", 2 * dim + edge_dim, hidden)?;
        self.mlp_out.validate("mlp_out", hidden, 1)?;
        Ok(())
    }
}

fn shape_error(name: &str, expected: String, actual: String) -> GraphGuardError {
    GraphGuardError::ShapeMismatch {
        name: name.to_string(),
        expected,
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_valid_and_seeded() {
        let a = ModelWeights::initialize(5, 8, 2, 8, 3, 7);
        let b = ModelWeights::initialize(5, 8, 2, 8, 3, 7);
        let c = ModelWeights::initialize(5, 8, 2, 8, 3, 8);

        a.validate(5, 3).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.embedding_dim(), 8);
        assert_eq!(a.mlp_hidden.in_dim(), 19);
    }

    #[test]
    fn test_validate_rejects_wrong_node_count() {
        let weights = ModelWeights::initialize(5, 4, 1, 4, 3, 1);
        let err = weights.validate(6, 3).unwrap_err();
        assert!(matches!(err, GraphGuardError::ShapeMismatch { ref name, .. } if name == "node_embedding"));
    }

    #[test]
    fn test_validate_rejects_wrong_edge_dim() {
        let weights = ModelWeights::initialize(2, 4, 1, 4, 3, 1);
        let err = weights.validate(2, 5).unwrap_err();
        assert!(matches!(err, GraphGuardError::ShapeMismatch { ref name, .. } if name == "mlp_hidden.weight"));
    }

    #[test]
    fn test_linear_forward() {
        let layer = Linear {
            weight: vec![vec![1.0, 2.0], vec![0.5, -1.0]],
            bias: Some(vec![0.5, 0.0]),
        };
        assert_eq!(layer.forward(&[1.0, 1.0]), vec![3.5, -0.5]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let weights = ModelWeights::initialize(3, 4, 2, 4, 3, 11);

        weights.save(&path).unwrap();
        assert_eq!(ModelWeights::load(&path).unwrap(), weights);
    }
}
