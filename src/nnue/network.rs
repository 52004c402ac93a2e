//! NNUE weight storage, file I/O, and the single-layer inference formula
//! (spec.md §4.3, §6 "NNUE file format").
//!
//! The `nnue-multilayer` feature names the richer L1/L2/L3 architecture as
//! an alternative; per spec.md §9 ("which one is canonical is a build-time
//! decision, not a runtime one") this single-hidden-layer variant is the one
//! implemented, and the alternative is left as a gated stub.

use std::io::{self, Read};
use std::path::Path;

use super::{HL_SIZE, INPUT_BUCKETS, NUM_OUTPUT_BUCKETS};

pub const QA: i32 = 255;
pub const QB: i32 = 64;
pub const EVAL_SCALE: i32 = 400;

const FT_ROWS: usize = INPUT_BUCKETS * 768;

/// FT weights `[FT_ROWS][HL_SIZE]`, FT bias `[HL_SIZE]`, per-output-bucket
/// transposed L1 weights `[NUM_OUTPUT_BUCKETS][HL_SIZE * 2]`, L1 biases
/// `[NUM_OUTPUT_BUCKETS]` — exactly the layout spec.md §6 describes.
pub struct NnueNetwork {
    pub feature_weights: Box<[[i16; HL_SIZE]; FT_ROWS]>,
    pub feature_bias: [i16; HL_SIZE],
    pub output_weights: Box<[[i16; HL_SIZE * 2]; NUM_OUTPUT_BUCKETS]>,
    pub output_bias: [i16; NUM_OUTPUT_BUCKETS],
}

impl NnueNetwork {
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(&mut io::BufReader::new(file))
    }

    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        Self::from_reader(&mut io::Cursor::new(data))
    }

    fn from_reader<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut feature_weights = Box::new([[0i16; HL_SIZE]; FT_ROWS]);
        for row in feature_weights.iter_mut() {
            read_i16_slice(reader, row)?;
        }

        let mut feature_bias = [0i16; HL_SIZE];
        read_i16_slice(reader, &mut feature_bias)?;

        let mut output_weights = Box::new([[0i16; HL_SIZE * 2]; NUM_OUTPUT_BUCKETS]);
        for bucket in output_weights.iter_mut() {
            read_i16_slice(reader, bucket)?;
        }

        let mut output_bias = [0i16; NUM_OUTPUT_BUCKETS];
        read_i16_slice(reader, &mut output_bias)?;

        Ok(NnueNetwork {
            feature_weights,
            feature_bias,
            output_weights,
            output_bias,
        })
    }

    /// Output bucket = `(popcount(occupancy) - 2) / (32 / NUM_OUTPUT_BUCKETS)`
    /// (spec.md §4.3).
    #[inline]
    #[must_use]
    pub fn output_bucket(piece_count: u32) -> usize {
        let divisor = 32 / NUM_OUTPUT_BUCKETS as u32;
        (piece_count.saturating_sub(2) / divisor).min(NUM_OUTPUT_BUCKETS as u32 - 1) as usize
    }

    /// `(sum / QA + bias) * EVAL_SCALE / (QA * QB)` with the stm accumulator
    /// contributing the first `HL_SIZE` output weights and the nstm
    /// accumulator the second `HL_SIZE` (spec.md §4.3).
    #[must_use]
    pub fn evaluate(&self, us: &[i16; HL_SIZE], them: &[i16; HL_SIZE], output_bucket: usize) -> i32 {
        let weights = &self.output_weights[output_bucket];
        let (us_weights, them_weights) = weights.split_at(HL_SIZE);
        let us_weights: &[i16; HL_SIZE] = us_weights.try_into().unwrap();
        let them_weights: &[i16; HL_SIZE] = them_weights.try_into().unwrap();

        let us_sum = super::simd::screlu_dot(us, us_weights);
        let them_sum = super::simd::screlu_dot(them, them_weights);
        let sum = us_sum + them_sum;

        (sum / QA + i32::from(self.output_bias[output_bucket])) * EVAL_SCALE / (QA * QB)
    }
}

fn read_i16_slice<R: Read>(reader: &mut R, out: &mut [i16]) -> io::Result<()> {
    let mut buf = [0u8; 2];
    for slot in out {
        reader.read_exact(&mut buf)?;
        *slot = i16::from_le_bytes(buf);
    }
    Ok(())
}

#[cfg(feature = "embedded_nnue")]
pub static EMBEDDED_NETWORK: &[u8] = include_bytes!("nets/default.nnue");

#[cfg(feature = "embedded_nnue")]
impl NnueNetwork {
    #[must_use]
    pub fn from_embedded() -> Self {
        Self::from_bytes(EMBEDDED_NETWORK).expect("embedded NNUE is malformed")
    }
}

#[cfg(feature = "nnue-multilayer")]
compile_error!(
    "the L1/L2/L3 NNUE architecture is a build-time alternative not yet implemented; see DESIGN.md"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_bucket_matches_formula() {
        assert_eq!(NnueNetwork::output_bucket(2), 0);
        assert_eq!(NnueNetwork::output_bucket(32), NUM_OUTPUT_BUCKETS - 1);
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut bytes = Vec::new();
        for _ in 0..FT_ROWS {
            for j in 0..HL_SIZE {
                bytes.extend_from_slice(&((j as i16) % 7 - 3).to_le_bytes());
            }
        }
        for i in 0..HL_SIZE {
            bytes.extend_from_slice(&((i as i16) % 5).to_le_bytes());
        }
        for _ in 0..NUM_OUTPUT_BUCKETS {
            for j in 0..HL_SIZE * 2 {
                bytes.extend_from_slice(&((j as i16) % 11 - 5).to_le_bytes());
            }
        }
        for i in 0..NUM_OUTPUT_BUCKETS {
            bytes.extend_from_slice(&(i as i16).to_le_bytes());
        }
        let net = NnueNetwork::from_bytes(&bytes).unwrap();
        assert_eq!(net.feature_bias[1], 1);
        assert_eq!(net.output_bias[3], 3);
    }
}
