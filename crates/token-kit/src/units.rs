//! Display amounts and their conversion to on-chain base units.
//!
//! A token with `decimals = d` stores balances as integers where one display
//! unit is `10^d` base units. Conversion is exact: display amounts are held as
//! an integer mantissa and a decimal scale, never as floats.

use std::fmt;
use std::str::FromStr;

use crate::error::TokenError;

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Decimal places of the native SOL unit.
pub const SOL_DECIMALS: u8 = 9;

/// An exact, non-negative decimal amount in display units.
///
/// The value is `mantissa / 10^scale`, kept normalized (no trailing zero
/// digits in the fraction) so that equal values compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UiAmount {
    mantissa: u128,
    scale: u8,
}

impl UiAmount {
    pub const ZERO: UiAmount = UiAmount {
        mantissa: 0,
        scale: 0,
    };

    /// `mantissa / 10^scale`, normalized.
    pub fn new(mantissa: u128, scale: u8) -> Self {
        let mut amount = Self { mantissa, scale };
        while amount.scale > 0 && amount.mantissa % 10 == 0 {
            amount.mantissa /= 10;
            amount.scale -= 1;
        }
        if amount.mantissa == 0 {
            amount.scale = 0;
        }
        amount
    }

    pub fn whole(units: u64) -> Self {
        Self::new(units as u128, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn mantissa(&self) -> u128 {
        self.mantissa
    }

    /// Number of fractional digits after normalization.
    pub fn scale(&self) -> u8 {
        self.scale
    }
}

impl From<u64> for UiAmount {
    fn from(units: u64) -> Self {
        Self::whole(units)
    }
}

impl FromStr for UiAmount {
    type Err = TokenError;

    /// Accepts `123`, `123.45`, `0.001`. Rejects signs, exponents, empty
    /// parts (`.5`, `5.`) and separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TokenError::InvalidAmount(format!("'{s}' is not a decimal amount"));

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        let has_point = s.contains('.');

        if int_part.is_empty() || (has_point && frac_part.is_empty()) {
            return Err(invalid());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let frac_part = frac_part.trim_end_matches('0');
        let scale = u8::try_from(frac_part.len())
            .map_err(|_| TokenError::InvalidAmount(format!("'{s}' has too many decimal places")))?;

        let mantissa = int_part
            .bytes()
            .chain(frac_part.bytes())
            .try_fold(0u128, |acc, digit| {
                acc.checked_mul(10)?.checked_add((digit - b'0') as u128)
            })
            .ok_or_else(|| TokenError::InvalidAmount(format!("'{s}' has too many digits")))?;

        Ok(Self::new(mantissa, scale))
    }
}

impl fmt::Display for UiAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }

        let scale = self.scale as usize;
        let digits = format!("{:0>width$}", self.mantissa, width = scale + 1);
        let (int_part, frac_part) = digits.split_at(digits.len() - scale);
        write!(f, "{int_part}.{frac_part}")
    }
}

/// Convert a display amount into integer base units.
///
/// Fails with `PrecisionLoss` when the amount has more fractional digits than
/// the token supports, and `AmountOverflow` when the result exceeds `u64`.
pub fn to_base_units(amount: &UiAmount, decimals: u8) -> Result<u64, TokenError> {
    if amount.is_zero() {
        return Ok(0);
    }
    if amount.scale > decimals {
        return Err(TokenError::PrecisionLoss {
            amount: amount.to_string(),
            decimals,
        });
    }

    10u128
        .checked_pow((decimals - amount.scale) as u32)
        .and_then(|factor| amount.mantissa.checked_mul(factor))
        .and_then(|base| u64::try_from(base).ok())
        .ok_or_else(|| TokenError::AmountOverflow {
            amount: amount.to_string(),
            decimals,
        })
}

/// Convert integer base units into a display amount.
pub fn from_base_units(base_units: u64, decimals: u8) -> UiAmount {
    UiAmount::new(base_units as u128, decimals)
}

pub fn sol_to_lamports(sol: &UiAmount) -> Result<u64, TokenError> {
    to_base_units(sol, SOL_DECIMALS)
}

pub fn lamports_to_sol(lamports: u64) -> UiAmount {
    from_base_units(lamports, SOL_DECIMALS)
}
