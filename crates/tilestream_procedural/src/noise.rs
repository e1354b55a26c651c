//! # Simplex Noise
//!
//! Deterministic 2D gradient noise used to score world cells.
//!
//! Given the same `NoiseSeed`, every sample is bit-identical on any
//! platform: the permutation table is shuffled with a fixed xorshift
//! stream and sampling is plain `f64` arithmetic with no global state.
//! A `SimplexNoise` is immutable after construction and is `Send + Sync`,
//! so one instance may be sampled from every generation worker at once.

/// Seed for deterministic content generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoiseSeed(u64);

impl NoiseSeed {
    /// Creates a new seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl Default for NoiseSeed {
    fn default() -> Self {
        Self(0x7111_E57E_A000_0001)
    }
}

/// Shuffled permutation table, doubled so lookups never wrap.
struct PermutationTable {
    perm: [u8; 512],
}

impl PermutationTable {
    /// Gradient directions for 2D simplex corners.
    const GRADIENTS: [[i8; 2]; 12] = [
        [1, 0], [1, 1], [0, 1], [-1, 1],
        [-1, 0], [-1, -1], [0, -1], [1, -1],
        [1, 0], [0, 1], [-1, 0], [0, -1],
    ];

    #[allow(clippy::cast_possible_truncation)]
    fn new(seed: NoiseSeed) -> Self {
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates driven by xorshift64. A zero state would stay zero.
        let mut state = seed.value() | 1;
        for i in (1..256).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            perm.swap(i, j);
        }

        let (low, high) = perm.split_at_mut(256);
        high.copy_from_slice(low);

        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> u8 {
        self.perm[index & 511]
    }

    #[inline]
    fn gradient(hash: u8) -> [i8; 2] {
        Self::GRADIENTS[(hash % 12) as usize]
    }
}

/// 2D simplex noise generator.
///
/// `sample` returns values in `[-1, 1]`; `sample_unit` remaps to `[0, 1]`
/// for threshold-based classification.
pub struct SimplexNoise {
    table: PermutationTable,
}

impl SimplexNoise {
    /// Skewing factor, (sqrt(3) - 1) / 2.
    const F2: f64 = 0.366_025_403_784_439;
    /// Unskewing factor, (3 - sqrt(3)) / 6.
    const G2: f64 = 0.211_324_865_405_187;
    /// Normalizes the summed corner contributions to [-1, 1].
    const SCALE: f64 = 70.0;

    /// Creates a new noise generator from a seed.
    #[must_use]
    pub fn new(seed: NoiseSeed) -> Self {
        Self {
            table: PermutationTable::new(seed),
        }
    }

    /// Samples noise at the given coordinates, in `[-1, 1]`.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::similar_names)]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * Self::F2;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);

        let unskew = f64::from(i.wrapping_add(j)) * Self::G2;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);

        // Upper or lower triangle of the skewed cell
        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - f64::from(i1 as u8) + Self::G2;
        let y1 = y0 - f64::from(j1 as u8) + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;

        let t = &self.table;
        let g0 = t.get(ii + t.get(jj) as usize);
        let g1 = t.get(ii + i1 + t.get(jj + j1) as usize);
        let g2 = t.get(ii + 1 + t.get(jj + 1) as usize);

        let n = Self::corner(x0, y0, g0) + Self::corner(x1, y1, g1) + Self::corner(x2, y2, g2);
        (Self::SCALE * n).clamp(-1.0, 1.0)
    }

    /// Samples noise remapped to `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn sample_unit(&self, x: f64, y: f64) -> f64 {
        (self.sample(x, y) + 1.0) * 0.5
    }

    /// Fractal (octaved) noise, normalized back to `[-1, 1]`.
    ///
    /// Each octave doubles frequency and multiplies amplitude by `persistence`.
    #[must_use]
    pub fn fbm(&self, x: f64, y: f64, octaves: u32, persistence: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves.max(1) {
            total += self.sample(x * frequency, y * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        total / max_amplitude
    }

    #[inline]
    fn corner(x: f64, y: f64, hash: u8) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            0.0
        } else {
            let grad = PermutationTable::gradient(hash);
            let t2 = t * t;
            t2 * t2 * (x * f64::from(grad[0]) + y * f64::from(grad[1]))
        }
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn fast_floor(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) {
        xi - 1
    } else {
        xi
    }
}
