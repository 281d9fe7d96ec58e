//! Exact note and rest lengths.
//!
//! A [`Duration`] is a rational number of whole notes. Standard notation
//! lengths are written as an exponent (`2^(exp - BASE)` whole notes) with
//! an optional number of dots, tuplets add an `enumerator / denominator`
//! ratio on top of that.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use num_rational::Rational64;
use serde::{Deserialize, Serialize};

/// Exponent of a whole note.
pub const BASE: u8 = 7;
/// Largest exponent that can be encoded.
pub const MAX_EXPONENT: u8 = 15;
/// Dots added greedily during decomposition.
pub const MAX_DOTS: u8 = 8;
/// Bit width of the tuplet enumerator/denominator fields.
pub const TUPLET_BITS: u32 = 5;
const TUPLET_MAX: i64 = (1 << TUPLET_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Duration(Rational64);

impl Duration {
    pub fn zero() -> Self {
        Duration(Rational64::from_integer(0))
    }

    pub fn whole() -> Self {
        Duration(Rational64::from_integer(1))
    }

    /// `numer / denom` whole notes. Returns `None` for a zero denominator.
    pub fn new(numer: i64, denom: i64) -> Option<Self> {
        if denom == 0 {
            None
        } else {
            Some(Duration(Rational64::new(numer, denom)))
        }
    }

    /// Length of a plain note: `2^(exp - BASE)` whole notes with `dots` dots.
    pub fn from_exponent(exp: u8, dots: u8) -> Self {
        let exp = exp.min(MAX_EXPONENT) as i32 - BASE as i32;
        let base = if exp >= 0 {
            Rational64::from_integer(1 << exp)
        } else {
            Rational64::new(1, 1 << (-exp))
        };
        // 2 - 2^-dots
        let dots = dots.min(MAX_DOTS) as u32;
        let factor = Rational64::new((1 << (dots + 1)) - 1, 1 << dots);
        Duration(base * factor)
    }

    /// Length of an irregular note. A zero field is treated as `1`.
    pub fn tuplet(exp: u8, dots: u8, enumerator: u8, denominator: u8) -> Self {
        let plain = Self::from_exponent(exp, dots);
        let (e, d) = (enumerator.max(1) as i64, denominator.max(1) as i64);
        Duration(plain.0 * Rational64::new(e, d))
    }

    pub fn from_encoding(enc: &DurationEncoding) -> Self {
        Self::tuplet(enc.exponent, enc.dots, enc.enumerator, enc.denominator)
    }

    pub fn numer(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denom(&self) -> i64 {
        *self.0.denom()
    }

    pub fn is_zero(&self) -> bool {
        *self.0.numer() == 0
    }

    /// Lossy conversion, only for graphical spacing.
    pub fn to_f64(&self) -> f64 {
        self.numer() as f64 / self.denom() as f64
    }

    /// Decompose into the closest `(exponent, dots, enumerator, denominator)`
    /// encoding. The returned error is the (non-negative) part of `self` that
    /// the encoding could not represent.
    pub fn decompose(&self) -> (DurationEncoding, Duration) {
        let value = self.0;
        if value <= Rational64::from_integer(0) {
            return (DurationEncoding::default(), Duration(abs_diff(value, Rational64::from_integer(0))));
        }

        // Largest exponent not exceeding the value.
        let mut exponent = 0u8;
        for exp in (0..=MAX_EXPONENT).rev() {
            if Self::from_exponent(exp, 0).0 <= value {
                exponent = exp;
                break;
            }
        }
        let plain = Self::from_exponent(exponent, 0).0;

        // Greedy dots: every dot adds half of the previous addition.
        let mut dots = 0u8;
        let mut reached = plain;
        let mut step = plain / 2;
        while dots < MAX_DOTS && reached + step <= value {
            reached += step;
            step /= 2;
            dots += 1;
        }

        let mut encoding = DurationEncoding {
            exponent,
            dots,
            enumerator: 1,
            denominator: 1,
        };
        if reached == value {
            return (encoding, Duration::zero());
        }

        // Remaining ratio becomes a tuplet; dots are dropped in favor of the
        // plain length, which keeps the ratio in [1, 2).
        encoding.dots = 0;
        let ratio = value / plain;
        let (mut e, mut d) = (*ratio.numer(), *ratio.denom());
        while e > TUPLET_MAX || d > TUPLET_MAX {
            e >>= 1;
            d >>= 1;
        }
        let (e, d) = (e.max(1), d.max(1));
        encoding.enumerator = e as u8;
        encoding.denominator = d as u8;

        let encoded = plain * Rational64::new(e, d);
        let tuplet_error = abs_diff(value, encoded);
        let dotted_error = value - reached;
        if dotted_error < tuplet_error {
            return (DurationEncoding::new(exponent, dots), Duration(dotted_error));
        }
        (encoding, Duration(tuplet_error))
    }
}

fn abs_diff(a: Rational64, b: Rational64) -> Rational64 {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Self) -> Self::Output {
        Duration(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Self) -> Self::Output {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Symbolic form of a [`Duration`] as it is stored on notes and rests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DurationEncoding {
    pub exponent: u8,
    pub dots: u8,
    pub enumerator: u8,
    pub denominator: u8,
}

impl DurationEncoding {
    pub fn new(exponent: u8, dots: u8) -> Self {
        Self {
            exponent,
            dots,
            enumerator: 1,
            denominator: 1,
        }
    }

    pub fn with_tuplet(mut self, enumerator: u8, denominator: u8) -> Self {
        self.enumerator = enumerator;
        self.denominator = denominator;
        self
    }

    pub fn value(&self) -> Duration {
        Duration::from_encoding(self)
    }

    /// Number of flags (or beams) a note of this length carries.
    pub fn flag_count(&self) -> u8 {
        (BASE - 2).saturating_sub(self.exponent)
    }
}

impl Default for DurationEncoding {
    /// A quarter note.
    fn default() -> Self {
        Self::new(BASE - 2, 0)
    }
}
