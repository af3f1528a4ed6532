//! Fixed-width bitvector constants and constant folding.
//!
//! A [`BitVec`] is an unsigned value always kept reduced modulo `2^width`.
//! Signed operations reinterpret it in two's complement.
//!
//! Division by zero follows the SMT-LIB convention so that folding is total:
//!
//! ```text
//! x udiv 0 = ~0        x urem 0 = x
//! x sdiv 0 = x < 0 ? 1 : ~0
//! x srem 0 = x
//! ```

use std::cmp::Ordering;
use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};

use crate::types::{Width, BOOL};

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct BitVec {
    width: Width,
    value: BigUint,
}

fn modulus(width: Width) -> BigUint {
    BigUint::one() << width
}

fn mask(width: Width) -> BigUint {
    modulus(width) - 1u32
}

impl BitVec {
    /// Create a constant, truncating `value` to `width` bits.
    pub fn new(value: BigUint, width: Width) -> Self {
        assert!(width > 0, "Width should be positive");
        let value = value & mask(width);
        Self { width, value }
    }

    pub fn from_u64(value: u64, width: Width) -> Self {
        Self::new(BigUint::from(value), width)
    }

    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(value as u64, BOOL)
    }

    /// Create a constant from a signed value, wrapping into two's complement.
    pub fn from_signed(value: &BigInt, width: Width) -> Self {
        let m = BigInt::from_biguint(Sign::Plus, modulus(width));
        let r = ((value % &m) + &m) % &m;
        let value = r.to_biguint().unwrap_or_default();
        Self::new(value, width)
    }

    pub fn zero(width: Width) -> Self {
        Self::new(BigUint::zero(), width)
    }
    pub fn one(width: Width) -> Self {
        Self::from_u64(1, width)
    }
    pub fn all_ones(width: Width) -> Self {
        Self::new(mask(width), width)
    }

    pub fn width(&self) -> Width {
        self.width
    }
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
    pub fn is_one(&self) -> bool {
        self.value.is_one()
    }
    pub fn is_all_ones(&self) -> bool {
        self.value == mask(self.width)
    }
    pub fn is_true(&self) -> bool {
        self.width == BOOL && self.is_one()
    }
    pub fn is_false(&self) -> bool {
        self.width == BOOL && self.is_zero()
    }

    /// The value as `u64`, if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }

    /// The low 64 bits of the value.
    pub fn low_u64(&self) -> u64 {
        self.value.iter_u64_digits().next().unwrap_or(0)
    }

    /// Words of the value, least significant first. Used for hashing.
    pub fn digits(&self) -> impl Iterator<Item = u64> + '_ {
        self.value.iter_u64_digits()
    }

    pub fn bit(&self, index: Width) -> bool {
        self.value.bit(index as u64)
    }
    pub fn sign_bit(&self) -> bool {
        self.bit(self.width - 1)
    }

    /// Two's-complement interpretation of the value.
    pub fn to_signed(&self) -> BigInt {
        let v = BigInt::from_biguint(Sign::Plus, self.value.clone());
        if self.sign_bit() {
            v - BigInt::from_biguint(Sign::Plus, modulus(self.width))
        } else {
            v
        }
    }

    /// If the value is `2^k - 1` for some `0 < k < width`, return `k`.
    pub fn low_mask_bits(&self) -> Option<Width> {
        if self.is_zero() || self.is_all_ones() {
            return None;
        }
        let plus_one = &self.value + 1u32;
        if (&plus_one & &self.value).is_zero() {
            Some(plus_one.bits() as Width - 1)
        } else {
            None
        }
    }

    /// Whether the value is representable in `width` bits when zero-extended.
    pub fn fits_unsigned(&self, width: Width) -> bool {
        self.value.bits() <= width as u64
    }

    fn check_width(&self, other: &Self) {
        assert_eq!(
            self.width, other.width,
            "Operand widths should match: {} vs {}",
            self.width, other.width
        );
    }

    fn shift_amount(&self) -> Option<Width> {
        self.value.to_u32().filter(|&s| s < self.width)
    }

    pub fn add(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::new(&self.value + &other.value, self.width)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::new(&self.value + modulus(self.width) - &other.value, self.width)
    }

    pub fn neg(&self) -> Self {
        Self::zero(self.width).sub(self)
    }

    pub fn mul(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::new(&self.value * &other.value, self.width)
    }

    pub fn udiv(&self, other: &Self) -> Self {
        self.check_width(other);
        if other.is_zero() {
            return Self::all_ones(self.width);
        }
        Self::new(&self.value / &other.value, self.width)
    }

    pub fn urem(&self, other: &Self) -> Self {
        self.check_width(other);
        if other.is_zero() {
            return self.clone();
        }
        Self::new(&self.value % &other.value, self.width)
    }

    pub fn sdiv(&self, other: &Self) -> Self {
        self.check_width(other);
        if other.is_zero() {
            return if self.sign_bit() {
                Self::one(self.width)
            } else {
                Self::all_ones(self.width)
            };
        }
        // BigInt division truncates toward zero.
        Self::from_signed(&(self.to_signed() / other.to_signed()), self.width)
    }

    pub fn srem(&self, other: &Self) -> Self {
        self.check_width(other);
        if other.is_zero() {
            return self.clone();
        }
        Self::from_signed(&(self.to_signed() % other.to_signed()), self.width)
    }

    pub fn and(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::new(&self.value & &other.value, self.width)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::new(&self.value | &other.value, self.width)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::new(&self.value ^ &other.value, self.width)
    }

    pub fn not(&self) -> Self {
        Self::new(&self.value ^ mask(self.width), self.width)
    }

    pub fn shl(&self, other: &Self) -> Self {
        self.check_width(other);
        match other.shift_amount() {
            Some(s) => Self::new(&self.value << s, self.width),
            None => Self::zero(self.width),
        }
    }

    pub fn lshr(&self, other: &Self) -> Self {
        self.check_width(other);
        match other.shift_amount() {
            Some(s) => Self::new(&self.value >> s, self.width),
            None => Self::zero(self.width),
        }
    }

    pub fn ashr(&self, other: &Self) -> Self {
        self.check_width(other);
        let s = other.shift_amount().unwrap_or(self.width - 1);
        // BigInt right shift rounds toward negative infinity.
        Self::from_signed(&(self.to_signed() >> s), self.width)
    }

    /// Concatenate: `self` becomes the high part.
    pub fn concat(&self, low: &Self) -> Self {
        Self::new(
            (&self.value << low.width) | &low.value,
            self.width + low.width,
        )
    }

    pub fn extract(&self, offset: Width, width: Width) -> Self {
        assert!(
            offset + width <= self.width,
            "Extract out of range: {}+{} > {}",
            offset,
            width,
            self.width
        );
        Self::new(&self.value >> offset, width)
    }

    pub fn zext(&self, width: Width) -> Self {
        Self::new(self.value.clone(), width)
    }

    pub fn sext(&self, width: Width) -> Self {
        Self::from_signed(&self.to_signed(), width)
    }

    pub fn eq(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::from_bool(self.value == other.value)
    }

    pub fn ult(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::from_bool(self.value < other.value)
    }

    pub fn ule(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::from_bool(self.value <= other.value)
    }

    pub fn slt(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::from_bool(self.to_signed() < other.to_signed())
    }

    pub fn sle(&self, other: &Self) -> Self {
        self.check_width(other);
        Self::from_bool(self.to_signed() <= other.to_signed())
    }

    /// Order by width, then by unsigned value.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.width
            .cmp(&other.width)
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl fmt::Display for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width == BOOL {
            write!(f, "{}", if self.is_one() { "true" } else { "false" })
        } else {
            write!(f, "{}", self.value)
        }
    }
}
