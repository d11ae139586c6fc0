use serde::{Deserialize, Serialize};

use crate::error::{ModelErr, Result};

/// Activation function selection for a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid,
    Relu,
    Softmax,
}

/// One layer of the declarative architecture description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense { units: usize, act_fn: ActFnSpec },
    Dropout { rate: f32 },
    Flatten,
}

/// The declarative network architecture shared by every contribution of a
/// project.
///
/// Created once at project initialization and never mutated afterward; an
/// architecture change means a new project. The JSON form of this struct is
/// the structured-text representation served by the definition endpoint and
/// stored as `definition.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub input_shape: Vec<usize>,
    pub layers: Vec<LayerSpec>,
}

impl ModelDefinition {
    /// Parses a definition from its structured-text form.
    pub fn from_json(text: &str) -> Result<Self> {
        let def: Self = serde_json::from_str(text)?;
        def.validate()?;
        Ok(def)
    }

    /// Renders the definition into its structured-text form.
    pub fn to_json(&self) -> String {
        // SAFETY: Serialize impl is derived and has no non string-key map.
        serde_json::to_string_pretty(self).unwrap()
    }

    /// Checks the structural invariants of the definition.
    ///
    /// # Returns
    /// `InvalidDefinition` naming the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.input_shape.is_empty() || self.input_shape.contains(&0) {
            return Err(ModelErr::InvalidDefinition(
                "input shape must be non-empty with non-zero dimensions",
            ));
        }

        let mut trainable = 0;
        for layer in &self.layers {
            match layer {
                LayerSpec::Dense { units, .. } => {
                    if *units == 0 {
                        return Err(ModelErr::InvalidDefinition(
                            "dense layer must have at least one unit",
                        ));
                    }
                    trainable += 1;
                }
                LayerSpec::Dropout { rate } => {
                    if !(0.0..1.0).contains(rate) {
                        return Err(ModelErr::InvalidDefinition(
                            "dropout rate must be in [0, 1)",
                        ));
                    }
                }
                LayerSpec::Flatten => {}
            }
        }

        if trainable == 0 {
            return Err(ModelErr::InvalidDefinition(
                "definition has no trainable layers",
            ));
        }

        Ok(())
    }

    /// Derives the tensor shapes every conforming parameter set must carry.
    ///
    /// Each dense layer contributes a kernel `[fan_in, units]` followed by a
    /// bias `[units]`; dropout and flatten layers carry no parameters. The
    /// input is treated as flattened, mirroring the architectures this
    /// system trains.
    pub fn trainable_shapes(&self) -> Vec<Vec<usize>> {
        let mut shapes = Vec::new();
        let mut fan_in: usize = self.input_shape.iter().product();

        for layer in &self.layers {
            if let LayerSpec::Dense { units, .. } = layer {
                shapes.push(vec![fan_in, *units]);
                shapes.push(vec![*units]);
                fan_in = *units;
            }
        }

        shapes
    }

    /// Returns the width of the final dense layer.
    pub fn output_units(&self) -> usize {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| match layer {
                LayerSpec::Dense { units, .. } => Some(*units),
                _ => None,
            })
            .unwrap_or_default()
    }
}
