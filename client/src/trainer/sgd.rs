use std::path::Path;

use ndarray::{Array1, Array2, Axis, Ix1, Ix2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use model::{ActFnSpec, LayerSpec, ModelDefinition, ParameterSet};

use super::{Dataset, Trainer, TrainerErr};

type Result<T> = std::result::Result<T, TrainerErr>;

/// The built-in training capability: batch gradient descent with MSE loss
/// over sigmoid-activated dense networks.
///
/// Definitions outside that family fail with an opaque `TrainerErr`; a
/// deployment with richer models plugs in its own `Trainer` instead.
#[derive(Debug, Clone, Copy)]
pub struct SgdTrainer {
    pub learning_rate: f32,
    /// Seed for weight initialization; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for SgdTrainer {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            seed: None,
        }
    }
}

impl Trainer for SgdTrainer {
    fn train(
        &mut self,
        def: &ModelDefinition,
        initial: Option<&ParameterSet>,
        dataset_dir: &Path,
        epochs: usize,
    ) -> Result<ParameterSet> {
        def.validate()
            .map_err(|e| TrainerErr::new(format!("invalid definition: {e}")))?;

        let mut net = DenseNet::build(def, initial, self.seed)?;
        let data = Dataset::load(dataset_dir, net.input_len(), net.output_len())?;

        for _ in 0..epochs {
            net.epoch(&data, self.learning_rate);
        }

        Ok(net.into_params())
    }
}

/// A plain feed-forward stack of dense sigmoid layers.
///
/// Kernels are `[fan_in, units]` so layer parameters line up one to one
/// with `ModelDefinition::trainable_shapes`.
struct DenseNet {
    weights: Vec<Array2<f32>>,
    biases: Vec<Array1<f32>>,
}

impl DenseNet {
    fn build(
        def: &ModelDefinition,
        initial: Option<&ParameterSet>,
        seed: Option<u64>,
    ) -> Result<Self> {
        for layer in &def.layers {
            match layer {
                LayerSpec::Dense { act_fn, .. } if *act_fn != ActFnSpec::Sigmoid => {
                    return Err(TrainerErr::new(format!(
                        "unsupported activation {act_fn:?} for the built-in trainer"
                    )));
                }
                // Dropout carries no parameters and is skipped here.
                _ => {}
            }
        }

        match initial {
            Some(params) => Self::from_params(def, params),
            None => Ok(Self::random(def, seed)),
        }
    }

    fn from_params(def: &ModelDefinition, params: &ParameterSet) -> Result<Self> {
        params
            .matches(def)
            .map_err(|e| TrainerErr::new(format!("initial parameters do not fit: {e}")))?;

        let mut weights = Vec::new();
        let mut biases = Vec::new();

        for pair in params.tensors().chunks(2) {
            let kernel = pair[0]
                .clone()
                .into_dimensionality::<Ix2>()
                .map_err(|e| TrainerErr::new(e.to_string()))?;
            let bias = pair[1]
                .clone()
                .into_dimensionality::<Ix1>()
                .map_err(|e| TrainerErr::new(e.to_string()))?;

            weights.push(kernel);
            biases.push(bias);
        }

        Ok(Self { weights, biases })
    }

    fn random(def: &ModelDefinition, seed: Option<u64>) -> Self {
        let mut rng = StdRng::seed_from_u64(seed.unwrap_or_else(rand::random));
        let mut weights = Vec::new();
        let mut biases = Vec::new();

        for pair in def.trainable_shapes().chunks(2) {
            let (fan_in, units) = (pair[0][0], pair[0][1]);
            let limit = 1.0 / (fan_in as f32).sqrt();

            let kernel =
                Array2::from_shape_fn((fan_in, units), |_| rng.random_range(-limit..limit));
            weights.push(kernel);
            biases.push(Array1::zeros(units));
        }

        Self { weights, biases }
    }

    fn input_len(&self) -> usize {
        self.weights[0].nrows()
    }

    fn output_len(&self) -> usize {
        self.biases[self.biases.len() - 1].len()
    }

    /// Forward pass keeping every layer's activation for backprop.
    fn forward(&self, x: &Array1<f32>) -> Vec<Array1<f32>> {
        let mut activations = vec![x.clone()];

        for (w, b) in self.weights.iter().zip(&self.biases) {
            let z = activations.last().unwrap().dot(w) + b;
            activations.push(z.mapv(sigmoid));
        }

        activations
    }

    /// One full-batch gradient step over the dataset.
    fn epoch(&mut self, data: &Dataset, eta: f32) {
        let mut grad_w: Vec<Array2<f32>> = self
            .weights
            .iter()
            .map(|w| Array2::zeros(w.dim()))
            .collect();
        let mut grad_b: Vec<Array1<f32>> = self
            .biases
            .iter()
            .map(|b| Array1::zeros(b.dim()))
            .collect();

        for (x, y) in &data.samples {
            let activations = self.forward(x);

            // Output delta for MSE through the sigmoid, using a(1-a) as
            // the activation derivative.
            let a_out = activations.last().unwrap();
            let mut delta = (a_out - y).mapv(|v| 2.0 * v) * a_out.mapv(|a| a * (1.0 - a));

            for idx in (0..self.weights.len()).rev() {
                grad_w[idx] += &outer(&activations[idx], &delta);
                grad_b[idx] += &delta;

                if idx > 0 {
                    let a = &activations[idx];
                    delta = self.weights[idx].dot(&delta) * a.mapv(|a| a * (1.0 - a));
                }
            }
        }

        let scale = -eta / data.len() as f32;
        for (w, gw) in self.weights.iter_mut().zip(&grad_w) {
            w.scaled_add(scale, gw);
        }
        for (b, gb) in self.biases.iter_mut().zip(&grad_b) {
            b.scaled_add(scale, gb);
        }
    }

    fn into_params(self) -> ParameterSet {
        let mut tensors = Vec::with_capacity(self.weights.len() * 2);

        for (w, b) in self.weights.into_iter().zip(self.biases) {
            tensors.push(w.into_dyn());
            tensors.push(b.into_dyn());
        }

        ParameterSet::new(tensors)
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

fn outer(a: &Array1<f32>, b: &Array1<f32>) -> Array2<f32> {
    let col = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    col.dot(&row)
}
