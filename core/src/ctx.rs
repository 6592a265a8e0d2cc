use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, PrismError, PrismResult},
    hash::HashFunction,
    reduction::{ascii_to_charset, plaintext_to_counter},
    CompressedPassword, DEFAULT_CHAIN_LENGTH, DEFAULT_CHARSET, DEFAULT_MAX_PASSWORD_LENGTH,
};

/// How the reduction function varies along a chain.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReductionPolicy {
    /// A distinct reduction per column: `R_i(d) = (d + i) mod n`.
    #[default]
    StepDependent,
    /// The same reduction at every column: `R(d) = d mod n`.
    /// Chains merge as soon as they collide, so coverage is much worse.
    Fixed,
}

/// A builder for a rainbow table context.
#[derive(Clone, Debug)]
pub struct RainbowTableCtxBuilder {
    hash_function: HashFunction,
    charset: Vec<u8>,
    t: u64,
    max_password_length: u8,
    reduction: ReductionPolicy,
}

impl Default for RainbowTableCtxBuilder {
    fn default() -> Self {
        Self {
            hash_function: HashFunction::Sha1,
            charset: DEFAULT_CHARSET.to_owned(),
            max_password_length: DEFAULT_MAX_PASSWORD_LENGTH,
            t: DEFAULT_CHAIN_LENGTH,
            reduction: ReductionPolicy::default(),
        }
    }
}

impl RainbowTableCtxBuilder {
    /// Creates a new RainbowTableCtxBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hash function of the context.
    pub fn hash(mut self, hash_function: HashFunction) -> Self {
        self.hash_function = hash_function;

        self
    }

    /// Sets the charset of the context.
    /// The order of the symbols matters: it defines the reduction mapping.
    pub fn charset(mut self, charset: &[u8]) -> Self {
        self.charset = charset.to_owned();

        self
    }

    /// Sets the length of the chain of the context.
    /// Increasing the chain length will reduce the memory used
    /// to store the table but increase the time taken to attack.
    pub fn chain_length(mut self, chain_length: u64) -> Self {
        self.t = chain_length;

        self
    }

    /// Sets the maximum password length of the context.
    pub fn max_password_length(mut self, max_password_length: u8) -> Self {
        self.max_password_length = max_password_length;

        self
    }

    /// Sets the reduction policy of the context.
    pub fn reduction(mut self, reduction: ReductionPolicy) -> Self {
        self.reduction = reduction;

        self
    }

    /// Builds a RainbowTableCtx with the specified parameters.
    pub fn build(self) -> PrismResult<RainbowTableCtx> {
        if self.charset.is_empty() {
            return Err(ConfigError::EmptyCharset.into());
        }

        if let Some(&c) = self.charset.iter().duplicates().next() {
            return Err(ConfigError::DuplicateCharacter(c as char).into());
        }

        if self.max_password_length < 1 {
            return Err(ConfigError::MaxPasswordLength.into());
        }

        if self.t < 1 {
            return Err(ConfigError::ChainLength.into());
        }

        // create the search spaces
        let charset_len = self.charset.len() as u128;
        let space_error = || {
            let bits = (self.max_password_length as f64 * (charset_len as f64).log2()).ceil();
            ConfigError::Space(bits.min(u8::MAX as f64) as u8)
        };

        let mut n: u128 = 0;
        let mut search_spaces = vec![0];
        for i in 0..=self.max_password_length as u32 {
            n = charset_len
                .checked_pow(i)
                .and_then(|passwords| n.checked_add(passwords))
                .filter(|&n| n <= u64::MAX as u128)
                .ok_or_else(space_error)?;

            if i < self.max_password_length as u32 {
                search_spaces.push(n as u64);
            }
        }

        Ok(RainbowTableCtx {
            search_spaces,
            n: n as u64,
            hash_function: self.hash_function,
            charset: self.charset,
            max_password_length: self.max_password_length,
            t: self.t,
            reduction: self.reduction,
        })
    }
}

/// Context used to store all parameters used to generate a rainbow table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RainbowTableCtx {
    /// The hash function used.
    pub hash_function: HashFunction,
    /// The charset used.
    pub charset: Vec<u8>,
    /// The length of a chain.
    pub t: u64,
    /// The maximum password length.
    pub max_password_length: u8,
    /// The reduction policy.
    pub reduction: ReductionPolicy,
    /// The size of the reduction space, the empty password included.
    pub n: u64,
    /// A rainbow table has to search through passwords of a variable length.
    /// This is used to determine the search space for each password length.
    pub search_spaces: Vec<u64>,
}

impl RainbowTableCtx {
    /// The number of passwords a seed or a target can be, i.e. all passwords
    /// with a length in `1..=max_password_length`.
    pub fn password_space(&self) -> u64 {
        self.n - 1
    }

    /// Checks that a password is made of the charset and is between 1 and
    /// `max_password_length` characters long, and compresses it.
    pub fn validate(&self, password: &[u8]) -> PrismResult<CompressedPassword> {
        if password.is_empty() || password.len() > self.max_password_length as usize {
            return Err(PrismError::Validation(format!(
                "\"{}\" should be between 1 and {} characters long",
                String::from_utf8_lossy(password),
                self.max_password_length
            )));
        }

        plaintext_to_counter(password, self).ok_or_else(|| {
            let c = password
                .iter()
                .find(|&&c| ascii_to_charset(c, &self.charset).is_none())
                .copied()
                .unwrap_or_default();

            PrismError::Validation(format!(
                "\"{}\" contains {:?} which is not in the charset",
                String::from_utf8_lossy(password),
                c as char
            ))
        })
    }

    /// Checks that a digest could have been produced by the hash function of the context.
    pub fn validate_digest(&self, digest: &[u8]) -> PrismResult<()> {
        if digest.len() != self.hash_function.digest_size() {
            return Err(PrismError::Validation(format!(
                "a {} digest is {} bytes long, got {} bytes",
                self.hash_function,
                self.hash_function.digest_size(),
                digest.len()
            )));
        }

        Ok(())
    }

    /// Finds the number of startpoints to use for the given maximality factor (alpha).
    /// The maximality factor is an indicator of how well the table will perform
    /// compared to a maximum table.
    pub fn startpoints_for_alpha(&self, alpha: f64) -> u64 {
        let mtmax = (2. * self.n as f64) / (self.t + 2) as f64;
        let space = self.password_space() as f64;

        if alpha >= 1. {
            self.password_space()
        } else {
            let m0 = alpha / (1. - alpha) * mtmax;
            m0.clamp(1., space) as u64
        }
    }
}

#[cfg(test)]
pub fn build_test_ctx() -> RainbowTableCtx {
    RainbowTableCtxBuilder::new()
        .hash(HashFunction::Sha1)
        .charset(b"abc")
        .max_password_length(3)
        .chain_length(3)
        .build()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::{build_test_ctx, RainbowTableCtxBuilder};
    use crate::error::{ConfigError, PrismError};

    fn config_error(builder: RainbowTableCtxBuilder) -> ConfigError {
        match builder.build() {
            Err(PrismError::Configuration(err)) => err,
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_search_spaces() {
        let ctx = build_test_ctx();

        assert_eq!(vec![0, 1, 4, 13], ctx.search_spaces);
        assert_eq!(40, ctx.n);
        assert_eq!(39, ctx.password_space());
    }

    #[test]
    fn test_invalid_configurations() {
        assert_eq!(
            ConfigError::EmptyCharset,
            config_error(RainbowTableCtxBuilder::new().charset(b""))
        );
        assert_eq!(
            ConfigError::DuplicateCharacter('a'),
            config_error(RainbowTableCtxBuilder::new().charset(b"aba"))
        );
        assert_eq!(
            ConfigError::MaxPasswordLength,
            config_error(RainbowTableCtxBuilder::new().max_password_length(0))
        );
        assert_eq!(
            ConfigError::ChainLength,
            config_error(RainbowTableCtxBuilder::new().chain_length(0))
        );
        assert!(matches!(
            config_error(
                RainbowTableCtxBuilder::new()
                    .charset(&(0..=255).collect::<Vec<u8>>())
                    .max_password_length(9)
            ),
            ConfigError::Space(_)
        ));
    }

    #[test]
    fn test_validate() {
        let ctx = build_test_ctx();

        assert_eq!(1, ctx.validate(b"a").unwrap());
        assert_eq!(13, ctx.validate(b"aaa").unwrap());
        assert!(matches!(ctx.validate(b""), Err(PrismError::Validation(_))));
        assert!(matches!(ctx.validate(b"abca"), Err(PrismError::Validation(_))));
        assert!(matches!(ctx.validate(b"abd"), Err(PrismError::Validation(_))));
    }

    #[test]
    fn test_startpoints_for_alpha() {
        let ctx = build_test_ctx();

        assert_eq!(39, ctx.startpoints_for_alpha(1.));
        assert_eq!(1, ctx.startpoints_for_alpha(0.));
        // 0.5 / 0.5 * 2 * 40 / 5
        assert_eq!(16, ctx.startpoints_for_alpha(0.5));
    }
}
