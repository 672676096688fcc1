// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! Rendering of register values as text literals
//!
//! Trace annotations carry raw bit patterns. Small integer values are more
//! readable as signed decimals while addresses and large magnitudes are more
//! readable as hex; [`integer`] implements that policy. Values produced by
//! the FPU come in one of five bit layouts described by [`FloatFormat`],
//! which [`float`] decodes and renders with a bounded significant width.

#[cfg(test)]
mod tests;

/// Largest absolute value rendered as a signed decimal literal
pub const MAX_SIGNED_LIT: u64 = 0xFFFF;

/// Width selector for integer literals
///
/// The selector encodes the operand width as transported in trace
/// annotations: `8 * 2^n` bits for selector `n`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IntWidth {
    Byte,
    Half,
    Word,
    Double,
}

impl IntWidth {
    /// Width in bits
    pub const fn bits(self) -> u32 {
        match self {
            Self::Byte => 8,
            Self::Half => 16,
            Self::Word => 32,
            Self::Double => 64,
        }
    }
}

impl TryFrom<u64> for IntWidth {
    type Error = u64;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Byte),
            1 => Ok(Self::Half),
            2 => Ok(Self::Word),
            3 => Ok(Self::Double),
            err => Err(err),
        }
    }
}

/// Render an integer register value
///
/// The value is masked to the given width. It renders as a zero-padded
/// lowercase hex literal of the full width if `force_hex` is set or the
/// two's-complement reading's magnitude exceeds [`MAX_SIGNED_LIT`], and as a
/// signed decimal otherwise.
pub fn integer(value: u64, width: IntWidth, force_hex: bool) -> String {
    let bits = width.bits();
    let masked = if bits == 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    };
    let signed = masked as i64;
    if force_hex || signed.unsigned_abs() > MAX_SIGNED_LIT {
        let digits = (bits / 4) as usize;
        format!("0x{masked:0digits$x}")
    } else {
        signed.to_string()
    }
}

/// Floating-point bit layouts understood by the FPU
///
/// Annotation fields identify a layout by index. All layouts follow the
/// usual sign/biased-exponent/mantissa scheme with bias `2^(e-1) - 1` for an
/// `e`-bit exponent field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FloatFormat {
    /// IEEE 754 binary32
    Single,
    /// IEEE 754 binary64
    Double,
    /// IEEE 754 binary16
    Half,
    /// 8-bit minifloat with a 5-bit exponent
    Quarter,
    /// bfloat16-style alternate half precision
    HalfAlt,
}

impl FloatFormat {
    /// Widths of the exponent and mantissa fields in bits
    pub const fn widths(self) -> (u32, u32) {
        match self {
            Self::Single => (8, 23),
            Self::Double => (11, 52),
            Self::Half => (5, 10),
            Self::Quarter => (5, 2),
            Self::HalfAlt => (8, 7),
        }
    }

    /// Decode a raw bit pattern into its numeric value
    ///
    /// Decoding is exact: every value representable in the source layout is
    /// representable as [`f64`].
    pub fn decode(self, bits: u64) -> f64 {
        let (we, wm) = self.widths();
        let total = 1 + we + wm;
        let bits = if total == 64 {
            bits
        } else {
            bits & ((1u64 << total) - 1)
        };
        let sign = if (bits >> (total - 1)) & 1 != 0 {
            -1.0
        } else {
            1.0
        };
        let exp_mask = (1u64 << we) - 1;
        let exp_raw = (bits >> wm) & exp_mask;
        let mnt = bits & ((1u64 << wm) - 1);
        let bias = (1i64 << (we - 1)) - 1;
        if exp_raw == exp_mask {
            return if mnt == 0 { sign * f64::INFINITY } else { f64::NAN };
        }
        let frac = mnt as f64 * pow2(-i64::from(wm));
        if exp_raw == 0 {
            // signed zero or subnormal
            sign * frac * pow2(1 - bias)
        } else {
            sign * (1.0 + frac) * pow2(exp_raw as i64 - bias)
        }
    }
}

impl TryFrom<u64> for FloatFormat {
    type Error = u64;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Single),
            1 => Ok(Self::Double),
            2 => Ok(Self::Half),
            3 => Ok(Self::Quarter),
            4 => Ok(Self::HalfAlt),
            err => Err(err),
        }
    }
}

/// 2^exp, exact
///
/// Valid for the normal exponent range of binary64, which covers every
/// exponent the supported layouts can produce.
fn pow2(exp: i64) -> f64 {
    debug_assert!((-1022..=1023).contains(&exp));
    f64::from_bits(((exp + 1023) as u64) << 52)
}

/// Render a floating-point register value
///
/// Decodes `bits` according to `format` and renders the result with at most
/// `width` significant digits, see [`format_float`].
pub fn float(bits: u64, format: FloatFormat, width: usize) -> String {
    format_float(format.decode(bits), width)
}

/// Render a numeric value within a significant-digit budget
///
/// The shortest default rendering is used verbatim if it fits the budget.
/// Otherwise values with a decimal exponent in `-1..=width` render in fixed
/// point with `width` significant digits and everything else falls back to
/// scientific notation.
pub fn format_float(value: f64, width: usize) -> String {
    let default = format!("{value}");
    if default.len().saturating_sub(1) <= width {
        return default;
    }
    if value.is_finite() && value != 0.0 {
        let exp = value.abs().log10().floor() as i32;
        if (-1..=width as i32).contains(&exp) {
            let precision = (width as i32 - 1 - exp).max(0) as usize;
            return format!("{value:.precision$}");
        }
    }
    let precision = width.saturating_sub(3);
    format!("{value:.precision$e}")
}
