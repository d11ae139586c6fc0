use ndarray::{ArrayD, IxDyn};

use crate::{
    definition::ModelDefinition,
    error::{ModelErr, Result},
};

const MAGIC: u32 = u32::from_le_bytes(*b"PSET");

/// The numeric parameters of a trained model, one tensor per trainable slot.
///
/// A parameter set is never mutated in place: merging produces a new one.
/// The binary encoding below is the single persisted/wire form, and it is
/// byte-stable — identical numeric content always encodes to identical
/// bytes, which is what makes content addressing by digest sound. Every
/// field of the encoding is a little-endian 32-bit word, so all offsets
/// stay 4-byte aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    tensors: Vec<ArrayD<f32>>,
}

impl ParameterSet {
    pub fn new(tensors: Vec<ArrayD<f32>>) -> Self {
        Self { tensors }
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn tensors(&self) -> &[ArrayD<f32>] {
        &self.tensors
    }

    pub fn into_tensors(self) -> Vec<ArrayD<f32>> {
        self.tensors
    }

    /// Checks that this set carries exactly the shapes `def` prescribes.
    pub fn matches(&self, def: &ModelDefinition) -> Result<()> {
        let expected = def.trainable_shapes();
        self.check_shapes(expected.iter().map(Vec::as_slice))
    }

    /// Checks that `other` is layer-for-layer shape compatible with `self`.
    pub fn compatible(&self, other: &Self) -> Result<()> {
        other.check_shapes(self.tensors.iter().map(|t| t.shape()))
    }

    fn check_shapes<'a>(&self, expected: impl ExactSizeIterator<Item = &'a [usize]>) -> Result<()> {
        if self.tensors.len() != expected.len() {
            return Err(ModelErr::LayerCountMismatch {
                got: self.tensors.len(),
                expected: expected.len(),
            });
        }

        for (layer, (tensor, shape)) in self.tensors.iter().zip(expected).enumerate() {
            if tensor.shape() != shape {
                return Err(ModelErr::ShapeMismatch {
                    layer,
                    got: tensor.shape().to_vec(),
                    expected: shape.to_vec(),
                });
            }
        }

        Ok(())
    }

    /// Encodes the set into its persisted/wire byte form.
    ///
    /// Layout: magic, tensor count, per-tensor rank + dims, then every
    /// tensor's f32 data block in sequence order.
    pub fn encode(&self) -> Vec<u8> {
        let dim_words: usize = self.tensors.iter().map(|t| 1 + t.ndim()).sum();
        let data_words: usize = self.tensors.iter().map(ArrayD::len).sum();
        let mut out = Vec::with_capacity((2 + dim_words + data_words) * 4);

        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&(self.tensors.len() as u32).to_le_bytes());

        for tensor in &self.tensors {
            out.extend_from_slice(&(tensor.ndim() as u32).to_le_bytes());
            for &dim in tensor.shape() {
                out.extend_from_slice(&(dim as u32).to_le_bytes());
            }
        }

        for tensor in &self.tensors {
            let data = tensor.as_standard_layout();

            // SAFETY: `as_standard_layout` guarantees a contiguous slice.
            out.extend_from_slice(bytemuck::cast_slice(data.as_slice().unwrap()));
        }

        out
    }

    /// Decodes a byte form produced by [`ParameterSet::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);

        if cursor.read_u32()? != MAGIC {
            return Err(ModelErr::Malformed("bad magic"));
        }

        let count = cursor.read_u32()? as usize;
        let mut shapes = Vec::with_capacity(count);

        for _ in 0..count {
            let rank = cursor.read_u32()? as usize;
            let mut dims = Vec::with_capacity(rank);
            for _ in 0..rank {
                dims.push(cursor.read_u32()? as usize);
            }
            shapes.push(dims);
        }

        let mut tensors = Vec::with_capacity(count);
        for dims in shapes {
            let elems = dims
                .iter()
                .try_fold(1_usize, |acc, &d| acc.checked_mul(d))
                .ok_or(ModelErr::Malformed("tensor too large"))?;

            let data = cursor.read_f32s(elems)?;
            let tensor = ArrayD::from_shape_vec(IxDyn(&dims), data)
                .map_err(|_| ModelErr::Malformed("shape and data disagree"))?;
            tensors.push(tensor);
        }

        if !cursor.is_done() {
            return Err(ModelErr::Malformed("trailing bytes"));
        }

        Ok(Self { tensors })
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, off: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .off
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(ModelErr::Malformed("truncated"))?;

        let slice = &self.bytes[self.off..end];
        self.off = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let word = self.take(4)?;

        // SAFETY: `take` returned exactly four bytes.
        Ok(u32::from_le_bytes(word.try_into().unwrap()))
    }

    fn read_f32s(&mut self, count: usize) -> Result<Vec<f32>> {
        let len = count
            .checked_mul(4)
            .ok_or(ModelErr::Malformed("tensor too large"))?;

        let raw = self.take(len)?;
        let data = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();

        Ok(data)
    }

    fn is_done(&self) -> bool {
        self.off == self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::definition::{ActFnSpec, LayerSpec};

    fn sample() -> ParameterSet {
        ParameterSet::new(vec![
            array![[1.0_f32, 2.0], [3.0, 4.0]].into_dyn(),
            array![0.5_f32, -0.5].into_dyn(),
        ])
    }

    #[test]
    fn encoding_roundtrips() {
        let params = sample();
        let bytes = params.encode();
        let decoded = ParameterSet::decode(&bytes).unwrap();

        assert_eq!(decoded, params);
    }

    #[test]
    fn encoding_is_byte_stable() {
        assert_eq!(sample().encode(), sample().encode());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(ParameterSet::decode(&[]).is_err());
        assert!(ParameterSet::decode(b"not a parameter set").is_err());

        let mut bytes = sample().encode();
        bytes.push(0);
        assert!(matches!(
            ParameterSet::decode(&bytes),
            Err(ModelErr::Malformed("trailing bytes"))
        ));

        let bytes = sample().encode();
        assert!(ParameterSet::decode(&bytes[..bytes.len() - 2]).is_err());
    }

    #[test]
    fn definition_conformance() {
        let def = ModelDefinition {
            name: "tiny".into(),
            input_shape: vec![2],
            layers: vec![LayerSpec::Dense {
                units: 2,
                act_fn: ActFnSpec::Sigmoid,
            }],
        };

        assert!(sample().matches(&def).is_ok());

        let short = ParameterSet::new(vec![array![0.0_f32, 0.0].into_dyn()]);
        assert!(matches!(
            short.matches(&def),
            Err(ModelErr::LayerCountMismatch { got: 1, expected: 2 })
        ));
    }

    #[test]
    fn compatibility_checks_shapes_per_layer() {
        let a = sample();
        let mut tensors = a.clone().into_tensors();
        tensors[1] = array![0.5_f32, -0.5, 1.0].into_dyn();
        let b = ParameterSet::new(tensors);

        assert!(a.compatible(&a.clone()).is_ok());
        assert!(matches!(
            a.compatible(&b),
            Err(ModelErr::ShapeMismatch { layer: 1, .. })
        ));
    }
}
