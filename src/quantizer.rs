//! Per-tile adaptive quantization of block coefficients.
//!
//! Every coefficient index gets a `[min, max]` range spanning all blocks of a
//! tile. Values are mapped linearly onto `BIT_ALLOCATION[i]` bits and packed
//! into one fixed-size record per block.

use crate::consts::{resolution, BIT_ALLOCATION, NUM_COEFFICIENTS, RECORD_SIZE};
use crate::transform::CoefficientVector;

/// One packed block: `RECORD_SIZE` bytes holding every coefficient code.
pub type QuantizedRecord = [u8; RECORD_SIZE];

/// Integer code per coefficient, before packing.
pub type Codes = [u32; NUM_COEFFICIENTS];

const fn reference_allocation() -> bool {
    let expected = [8u8, 8, 4, 4, 2, 2, 2, 2];
    let mut i = 0;
    while i < NUM_COEFFICIENTS {
        if BIT_ALLOCATION[i] != expected[i] {
            return false;
        }
        i += 1;
    }
    true
}

// pack_record/unpack_record hard-code this layout
const _: () = assert!(reference_allocation());

/// Tile-wide coefficient range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min: CoefficientVector,
    pub max: CoefficientVector,
}

impl TileBounds {
    /// Empty bounds: any real sample replaces both sentinels.
    pub fn new() -> Self {
        Self {
            min: [f32::INFINITY; NUM_COEFFICIENTS],
            max: [f32::NEG_INFINITY; NUM_COEFFICIENTS],
        }
    }

    /// Widen the range so it contains every value of `coefficients`.
    #[inline]
    pub fn accumulate(&mut self, coefficients: &CoefficientVector) {
        for i in 0..NUM_COEFFICIENTS {
            self.min[i] = self.min[i].min(coefficients[i]);
            self.max[i] = self.max[i].max(coefficients[i]);
        }
    }

    pub fn contains(&self, coefficients: &CoefficientVector) -> bool {
        (0..NUM_COEFFICIENTS).all(|i| self.min[i] <= coefficients[i] && coefficients[i] <= self.max[i])
    }
}

impl Default for TileBounds {
    fn default() -> Self {
        Self::new()
    }
}

/// Map `x` from `[min_x, max_x]` onto `0..=res`. An empty or inverted range
/// yields 0.
#[inline(always)]
pub fn quantize_value(x: f32, min_x: f32, max_x: f32, res: u32) -> u32 {
    if res == 0 {
        return 0;
    }

    let denom = max_x - min_x;
    if !(denom > 0.0) {
        return 0;
    }

    let t = ((x - min_x) / denom).clamp(0.0, 1.0);
    // NaN saturates to 0 in the cast
    ((t * res as f32).round_ties_even() as u32).min(res)
}

/// Inverse of [`quantize_value`]. Code 0 gives `min_x` and code `res` gives
/// `max_x` exactly.
#[inline(always)]
pub fn dequantize_value(q: u32, min_x: f32, max_x: f32, res: u32) -> f32 {
    if res == 0 {
        return min_x;
    }

    let q = q.min(res);
    if q == 0 {
        return min_x;
    }
    if q == res {
        return max_x;
    }

    let t = q as f32 / res as f32;
    min_x * (1.0 - t) + max_x * t
}

/// Pack codes as: byte0 = q0, byte1 = q1, byte2 = q2:q3 (high:low nibble),
/// byte3 = q7:q6:q5:q4 (q4 in the low bits).
#[inline(always)]
pub fn pack_record(q: &Codes) -> QuantizedRecord {
    [
        (q[0] & 0xFF) as u8,
        (q[1] & 0xFF) as u8,
        (((q[2] & 0x0F) << 4) | (q[3] & 0x0F)) as u8,
        ((q[4] & 0x03) | ((q[5] & 0x03) << 2) | ((q[6] & 0x03) << 4) | ((q[7] & 0x03) << 6)) as u8,
    ]
}

#[inline(always)]
pub fn unpack_record(bits: &QuantizedRecord) -> Codes {
    let [b0, b1, b2, b3] = *bits;
    [
        b0 as u32,
        b1 as u32,
        ((b2 >> 4) & 0x0F) as u32,
        (b2 & 0x0F) as u32,
        (b3 & 0x03) as u32,
        ((b3 >> 2) & 0x03) as u32,
        ((b3 >> 4) & 0x03) as u32,
        ((b3 >> 6) & 0x03) as u32,
    ]
}

pub fn quantize(coefficients: &CoefficientVector, bounds: &TileBounds) -> QuantizedRecord {
    let mut codes = [0u32; NUM_COEFFICIENTS];
    for (i, code) in codes.iter_mut().enumerate() {
        *code = quantize_value(
            coefficients[i],
            bounds.min[i],
            bounds.max[i],
            resolution(BIT_ALLOCATION[i]),
        );
    }
    pack_record(&codes)
}

pub fn dequantize(record: &QuantizedRecord, bounds: &TileBounds) -> CoefficientVector {
    let codes = unpack_record(record);
    let mut out = [0f32; NUM_COEFFICIENTS];
    for (i, value) in out.iter_mut().enumerate() {
        *value = dequantize_value(codes[i], bounds.min[i], bounds.max[i], resolution(BIT_ALLOCATION[i]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_start_empty() {
        let mut bounds = TileBounds::new();
        let negative = [-3.0f32; NUM_COEFFICIENTS];
        bounds.accumulate(&negative);

        // a zero-initialized range would have kept max at 0
        assert_eq!(bounds.min, negative);
        assert_eq!(bounds.max, negative);
    }

    #[test]
    fn test_bounds_contain_every_sample() {
        let samples = [
            [0.5, -0.2, 0.1, 0.0, 1.0, -1.0, 0.3, 0.3],
            [-0.5, 0.2, 0.4, -0.1, 0.0, 2.0, 0.3, -7.0],
            [0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1],
        ];
        let mut bounds = TileBounds::new();
        for s in &samples {
            bounds.accumulate(s);
        }
        for s in &samples {
            assert!(bounds.contains(s));
        }
        assert_eq!(bounds.min[7], -7.0);
        assert_eq!(bounds.max[5], 2.0);
    }

    #[test]
    fn test_quantize_endpoints() {
        for bits in [2u8, 4, 8] {
            let res = resolution(bits);
            assert_eq!(quantize_value(-1.5, -1.5, 2.5, res), 0);
            assert_eq!(quantize_value(2.5, -1.5, 2.5, res), res);
            assert_eq!(dequantize_value(0, -1.5, 2.5, res), -1.5);
            assert_eq!(dequantize_value(res, -1.5, 2.5, res), 2.5);
        }
    }

    #[test]
    fn test_quantize_clamps_out_of_range() {
        assert_eq!(quantize_value(-10.0, 0.0, 1.0, 255), 0);
        assert_eq!(quantize_value(10.0, 0.0, 1.0, 255), 255);
        assert_eq!(quantize_value(f32::NAN, 0.0, 1.0, 255), 0);
        assert_eq!(dequantize_value(999, 0.0, 1.0, 15), 1.0);
    }

    #[test]
    fn test_degenerate_range_yields_zero() {
        assert_eq!(quantize_value(0.25, 0.25, 0.25, 255), 0);
        assert_eq!(quantize_value(0.25, 1.0, 0.0, 255), 0);
        assert_eq!(dequantize_value(0, 0.25, 0.25, 255), 0.25);
    }

    #[test]
    fn test_codes_are_evenly_spaced() {
        let res = resolution(4);
        let step = 3.0 / res as f32;
        for q in 0..=res {
            let v = dequantize_value(q, 0.0, 3.0, res);
            assert!((v - q as f32 * step).abs() < 1e-5);
        }
    }

    #[test]
    fn test_eight_bit_error_bound() {
        let (lo, hi) = (-0.8f32, 1.7f32);
        let width = hi - lo;
        for i in 0..=1000 {
            let x = lo + width * i as f32 / 1000.0;
            let q = quantize_value(x, lo, hi, 255);
            let back = dequantize_value(q, lo, hi, 255);
            assert!((back - x).abs() <= width / 510.0 + 1e-5, "x={} back={}", x, back);
        }
    }

    #[test]
    fn test_record_layout() {
        let codes = [0xAB, 0x12, 0x9, 0x4, 0x1, 0x2, 0x3, 0x0];
        let record = pack_record(&codes);
        assert_eq!(record, [0xAB, 0x12, 0x94, 0b00_11_10_01]);
        assert_eq!(unpack_record(&record), codes);
    }

    #[test]
    fn test_record_fields_do_not_overlap() {
        for i in 0..NUM_COEFFICIENTS {
            let mut codes = [0u32; NUM_COEFFICIENTS];
            codes[i] = resolution(BIT_ALLOCATION[i]);
            let unpacked = unpack_record(&pack_record(&codes));
            assert_eq!(unpacked, codes, "field {} leaks into its neighbours", i);
        }
    }

    #[test]
    fn test_quantize_dequantize_with_bounds() {
        let a = [0.9, -0.3, 0.2, 0.1, -0.05, 0.04, -0.02, 0.01];
        let b = [-0.4, 0.6, -0.2, 0.3, 0.05, -0.04, 0.02, 0.03];
        let mut bounds = TileBounds::new();
        bounds.accumulate(&a);
        bounds.accumulate(&b);

        // each sample sits on an endpoint of every range
        assert_eq!(dequantize(&quantize(&a, &bounds), &bounds), a);
        assert_eq!(dequantize(&quantize(&b, &bounds), &bounds), b);
    }
}
