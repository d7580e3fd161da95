//! GF(2^8) arithmetic
//!
//! Elements are bytes; addition is XOR and multiplication is carry-less
//! multiplication reduced by the AES polynomial x^8 + x^4 + x^3 + x + 1.

use std::ops::{Add, Div, Mul};

/// Low byte of the reduction polynomial (the x^8 term is implicit)
const REDUCTION: u8 = 0x1B;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Gf256(pub(crate) u8);

impl Gf256 {
    pub(crate) const ZERO: Self = Self(0);
    pub(crate) const ONE: Self = Self(1);

    /// Multiplicative inverse, computed as a^254
    ///
    /// Zero maps to zero; callers never divide by zero because share
    /// x-coordinates are distinct and non-zero.
    pub(crate) fn inverse(self) -> Self {
        // 254 = 0b1111_1110
        let mut result = Self::ONE;
        let mut base = self;
        let mut exp = 254u8;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result * base;
            }
            base = base * base;
            exp >>= 1;
        }
        result
    }

    /// Evaluate `coeffs[0] + coeffs[1]·x + …` with Horner's rule
    pub(crate) fn eval_poly(coeffs: &[u8], x: Self) -> Self {
        coeffs
            .iter()
            .rev()
            .fold(Self::ZERO, |acc, &c| acc * x + Self(c))
    }

    /// Lagrange interpolation of the polynomial through `points` at x = 0
    pub(crate) fn interpolate_at_zero(points: &[(Self, Self)]) -> Self {
        points
            .iter()
            .enumerate()
            .fold(Self::ZERO, |acc, (i, &(xi, yi))| {
                let (num, den) = points.iter().enumerate().filter(|(j, _)| *j != i).fold(
                    (Self::ONE, Self::ONE),
                    |(num, den), (_, &(xj, _))| (num * xj, den * (xj + xi)),
                );
                acc + yi * (num / den)
            })
    }
}

impl Add for Gf256 {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl Mul for Gf256 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let (mut a, mut b, mut product) = (self.0, rhs.0, 0u8);
        while b != 0 {
            if b & 1 != 0 {
                product ^= a;
            }
            let carry = a & 0x80 != 0;
            a <<= 1;
            if carry {
                a ^= REDUCTION;
            }
            b >>= 1;
        }
        Self(product)
    }
}

impl Div for Gf256 {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn div(self, rhs: Self) -> Self {
        self * rhs.inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_products() {
        // FIPS-197 section 4.2 example
        assert_eq!(Gf256(0x57) * Gf256(0x83), Gf256(0xC1));
        assert_eq!(Gf256(0x57) * Gf256(0x13), Gf256(0xFE));
    }

    #[test]
    fn test_every_nonzero_element_has_inverse() {
        for a in 1..=255u8 {
            assert_eq!(Gf256(a) * Gf256(a).inverse(), Gf256::ONE, "a = {a:#04x}");
        }
    }

    #[test]
    fn test_interpolation_recovers_constant_term() {
        let coeffs = [0x42, 0x17, 0xA9];
        let points: Vec<_> = [1u8, 5, 200]
            .iter()
            .map(|&x| (Gf256(x), Gf256::eval_poly(&coeffs, Gf256(x))))
            .collect();
        assert_eq!(Gf256::interpolate_at_zero(&points), Gf256(0x42));
    }
}
