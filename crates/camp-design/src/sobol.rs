//! Gray-code Sobol sequence generator with Joe–Kuo direction numbers.
//!
//! The first dimension is the van der Corput sequence in base 2; further
//! dimensions use the primitive polynomials and initial direction numbers of
//! the `new-joe-kuo-6.21201` table. Points are 32-bit binary fractions, so a
//! sequence yields at most `2^32` distinct points.

use camp_core::derive_substream_seed;
use camp_core::errors::{CampaignError, ErrorInfo};

const BITS: usize = 32;
const SCALE: f64 = 4_294_967_296.0; // 2^32

/// `(degree, polynomial interior coefficients, initial direction numbers)` for
/// dimensions 2 and above.
const JOE_KUO: [(u32, u32, &[u32]); 39] = [
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
    (5, 4, &[1, 1, 5, 5, 5]),
    (5, 7, &[1, 1, 7, 11, 19]),
    (5, 11, &[1, 1, 5, 1, 1]),
    (5, 13, &[1, 1, 1, 3, 11]),
    (5, 14, &[1, 3, 5, 5, 31]),
    (6, 1, &[1, 3, 3, 9, 7, 49]),
    (6, 13, &[1, 1, 1, 15, 21, 21]),
    (6, 16, &[1, 3, 1, 13, 27, 49]),
    (6, 19, &[1, 1, 1, 15, 7, 5]),
    (6, 22, &[1, 3, 1, 15, 13, 25]),
    (6, 25, &[1, 1, 5, 5, 19, 61]),
    (7, 1, &[1, 3, 7, 11, 23, 15, 103]),
    (7, 4, &[1, 3, 7, 13, 13, 15, 69]),
    (7, 7, &[1, 1, 3, 13, 7, 35, 63]),
    (7, 8, &[1, 3, 5, 9, 1, 25, 53]),
    (7, 14, &[1, 3, 1, 13, 9, 35, 107]),
    (7, 19, &[1, 3, 1, 5, 27, 61, 31]),
    (7, 21, &[1, 1, 5, 11, 19, 41, 61]),
    (7, 28, &[1, 3, 5, 3, 3, 13, 69]),
    (7, 31, &[1, 1, 7, 13, 1, 19, 1]),
    (7, 32, &[1, 3, 7, 5, 13, 19, 59]),
    (7, 37, &[1, 1, 3, 9, 25, 29, 41]),
    (7, 41, &[1, 3, 5, 13, 23, 1, 55]),
    (7, 42, &[1, 3, 7, 3, 13, 59, 17]),
    (7, 50, &[1, 3, 1, 3, 5, 53, 69]),
    (7, 55, &[1, 1, 5, 5, 23, 33, 13]),
    (7, 56, &[1, 1, 7, 7, 1, 61, 123]),
    (7, 59, &[1, 1, 7, 9, 13, 61, 49]),
    (7, 62, &[1, 3, 3, 5, 3, 55, 33]),
    (8, 14, &[1, 3, 1, 15, 31, 13, 49, 245]),
    (8, 21, &[1, 3, 5, 15, 31, 59, 63, 97]),
    (8, 22, &[1, 3, 1, 11, 11, 11, 77, 249]),
];

/// Highest dimension supported by the embedded direction-number table.
pub const MAX_DIMENSIONS: usize = JOE_KUO.len() + 1;

/// Stateful Sobol point generator.
#[derive(Debug, Clone)]
pub struct SobolSequence {
    directions: Vec<[u32; BITS]>,
    shift: Vec<u32>,
    state: Vec<u32>,
    index: u64,
}

impl SobolSequence {
    /// Creates an unscrambled generator of the given dimension.
    pub fn new(dimensions: usize) -> Result<Self, CampaignError> {
        if dimensions == 0 || dimensions > MAX_DIMENSIONS {
            return Err(CampaignError::SensitivityLookup(
                ErrorInfo::new("sobol-dimensions", "unsupported Sobol dimension")
                    .with_context("dimensions", dimensions.to_string())
                    .with_context("max", MAX_DIMENSIONS.to_string()),
            ));
        }
        let directions = (0..dimensions).map(direction_numbers).collect();
        Ok(Self {
            directions,
            shift: vec![0; dimensions],
            state: vec![0; dimensions],
            index: 0,
        })
    }

    /// Creates a generator whose points are XOR-shifted by per-dimension
    /// offsets derived from `seed`.
    ///
    /// A digital shift keeps the net structure of the sequence, so balance at
    /// power-of-two sizes is preserved.
    pub fn scrambled(dimensions: usize, seed: u64) -> Result<Self, CampaignError> {
        let mut sequence = Self::new(dimensions)?;
        sequence.shift = (0..dimensions as u64)
            .map(|dim| (derive_substream_seed(seed, dim) >> 32) as u32)
            .collect();
        Ok(sequence)
    }

    /// Number of coordinates per point.
    pub fn dimensions(&self) -> usize {
        self.directions.len()
    }

    /// Returns the next point in `[0, 1)^d`.
    ///
    /// The first point of an unscrambled sequence is the origin.
    pub fn next_point(&mut self) -> Vec<f64> {
        if self.index > 0 {
            let bit = (self.index - 1).trailing_ones() as usize;
            for (value, directions) in self.state.iter_mut().zip(&self.directions) {
                *value ^= directions[bit.min(BITS - 1)];
            }
        }
        self.index += 1;
        self.state
            .iter()
            .zip(&self.shift)
            .map(|(value, shift)| f64::from(value ^ shift) / SCALE)
            .collect()
    }

    /// Draws `count` consecutive points.
    pub fn take_points(&mut self, count: usize) -> Vec<Vec<f64>> {
        (0..count).map(|_| self.next_point()).collect()
    }
}

fn direction_numbers(dimension: usize) -> [u32; BITS] {
    let mut v = [0u32; BITS];
    if dimension == 0 {
        for (k, slot) in v.iter_mut().enumerate() {
            *slot = 1 << (BITS - 1 - k);
        }
        return v;
    }
    let (degree, coeffs, initial) = JOE_KUO[dimension - 1];
    let s = degree as usize;
    for k in 0..s.min(BITS) {
        v[k] = initial[k] << (BITS - 1 - k);
    }
    for k in s..BITS {
        let mut value = v[k - s] ^ (v[k - s] >> s);
        for j in 1..s {
            if (coeffs >> (s - 1 - j)) & 1 == 1 {
                value ^= v[k - j];
            }
        }
        v[k] = value;
    }
    v
}
