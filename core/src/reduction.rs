use crate::{
    ctx::{RainbowTableCtx, ReductionPolicy},
    CompressedPassword, Password,
};

/// Reduces a digest into a password.
///
/// The digest is read as a big-endian integer and brought back into the
/// reduction space `[0, n)`. With the step-dependent policy the column is
/// added before the modulo, so every column uses its own reduction and two
/// chains only merge if they collide at the same column.
#[inline]
pub fn reduce(digest: &[u8], iteration: u64, ctx: &RainbowTableCtx) -> CompressedPassword {
    let n = ctx.n as u128;

    // n <= 2^64 so the accumulator never exceeds 2^72
    let seed = digest
        .iter()
        .fold(0u128, |acc, &byte| ((acc << 8) | byte as u128) % n);

    let offset = match ctx.reduction {
        ReductionPolicy::StepDependent => iteration as u128 % n,
        ReductionPolicy::Fixed => 0,
    };

    ((seed + offset) % n) as CompressedPassword
}

/// Creates a plaintext from a counter.
/// Counters are ordered by length first, then by little-endian charset position.
#[inline]
pub fn counter_to_plaintext(mut counter: CompressedPassword, ctx: &RainbowTableCtx) -> Password {
    let len = ctx
        .search_spaces
        .iter()
        .rposition(|&space| counter >= space)
        .unwrap_or(0);

    counter -= ctx.search_spaces[len];

    let charset_len = ctx.charset.len() as u64;
    let mut plaintext = Password::with_capacity(len);
    for _ in 0..len {
        plaintext.push(charset_to_ascii(counter % charset_len, &ctx.charset));
        counter /= charset_len;
    }

    plaintext
}

/// Creates a counter from a plaintext.
/// Returns `None` if the plaintext is too long or uses a character outside of the charset.
#[inline]
pub fn plaintext_to_counter(plaintext: &[u8], ctx: &RainbowTableCtx) -> Option<CompressedPassword> {
    let mut counter = *ctx.search_spaces.get(plaintext.len())?;
    let mut charset_base = 1;

    for &c in plaintext {
        counter += ascii_to_charset(c, &ctx.charset)? as u64 * charset_base;
        charset_base *= ctx.charset.len() as u64;
    }

    Some(counter)
}

/// Converts a character from a charset to its ASCII representation.
#[inline]
pub fn charset_to_ascii(n: u64, charset: &[u8]) -> u8 {
    charset[n as usize]
}

/// Converts an ASCII character to the given charset.
#[inline]
pub fn ascii_to_charset(c: u8, charset: &[u8]) -> Option<u8> {
    charset.iter().position(|x| *x == c).map(|i| i as u8)
}
