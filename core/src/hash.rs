use std::{fmt::Display, str::FromStr};

use blake2::{Blake2b512, Blake2s256};
use digest::{Digest as _, ExtendableOutput, Update, XofReader};
use md4::Md4;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512, Shake128, Shake256};

use crate::{error::ConfigError, Digest};

/// The output length used for SHAKE128, in bytes.
pub const SHAKE_128_OUTPUT_SIZE: usize = 16;

/// The output length used for SHAKE256, in bytes.
pub const SHAKE_256_OUTPUT_SIZE: usize = 32;

/// All the supported hash functions.
///
/// Extendable-output functions are truncated to a fixed length so that every
/// digest produced for a table has the same size.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum HashFunction {
    Ntlm,
    Md4,
    Md5,
    Sha1,
    Sha2_224,
    Sha2_256,
    Sha2_384,
    Sha2_512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Shake128,
    Shake256,
    Blake2b,
    Blake2s,
}

impl HashFunction {
    /// Every supported hash function.
    pub const ALL: [HashFunction; 16] = [
        Self::Ntlm,
        Self::Md4,
        Self::Md5,
        Self::Sha1,
        Self::Sha2_224,
        Self::Sha2_256,
        Self::Sha2_384,
        Self::Sha2_512,
        Self::Sha3_224,
        Self::Sha3_256,
        Self::Sha3_384,
        Self::Sha3_512,
        Self::Shake128,
        Self::Shake256,
        Self::Blake2b,
        Self::Blake2s,
    ];

    /// Hashes a password.
    #[inline]
    pub fn hash(&self, password: &[u8]) -> Digest {
        match self {
            Self::Ntlm => Md4::digest(utf16_le(password)).to_vec(),
            Self::Md4 => Md4::digest(password).to_vec(),
            Self::Md5 => Md5::digest(password).to_vec(),
            Self::Sha1 => Sha1::digest(password).to_vec(),
            Self::Sha2_224 => Sha224::digest(password).to_vec(),
            Self::Sha2_256 => Sha256::digest(password).to_vec(),
            Self::Sha2_384 => Sha384::digest(password).to_vec(),
            Self::Sha2_512 => Sha512::digest(password).to_vec(),
            Self::Sha3_224 => Sha3_224::digest(password).to_vec(),
            Self::Sha3_256 => Sha3_256::digest(password).to_vec(),
            Self::Sha3_384 => Sha3_384::digest(password).to_vec(),
            Self::Sha3_512 => Sha3_512::digest(password).to_vec(),
            Self::Shake128 => xof::<Shake128>(password, SHAKE_128_OUTPUT_SIZE),
            Self::Shake256 => xof::<Shake256>(password, SHAKE_256_OUTPUT_SIZE),
            Self::Blake2b => Blake2b512::digest(password).to_vec(),
            Self::Blake2s => Blake2s256::digest(password).to_vec(),
        }
    }

    /// Gets the digest size in bytes.
    pub fn digest_size(&self) -> usize {
        match self {
            Self::Ntlm | Self::Md4 | Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha2_224 | Self::Sha3_224 => 28,
            Self::Sha2_256 | Self::Sha3_256 => 32,
            Self::Sha2_384 | Self::Sha3_384 => 48,
            Self::Sha2_512 | Self::Sha3_512 => 64,
            Self::Shake128 => SHAKE_128_OUTPUT_SIZE,
            Self::Shake256 => SHAKE_256_OUTPUT_SIZE,
            Self::Blake2b => 64,
            Self::Blake2s => 32,
        }
    }

    /// The canonical name of the hash function.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ntlm => "ntlm",
            Self::Md4 => "md4",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha2_224 => "sha224",
            Self::Sha2_256 => "sha256",
            Self::Sha2_384 => "sha384",
            Self::Sha2_512 => "sha512",
            Self::Sha3_224 => "sha3_224",
            Self::Sha3_256 => "sha3_256",
            Self::Sha3_384 => "sha3_384",
            Self::Sha3_512 => "sha3_512",
            Self::Shake128 => "shake_128",
            Self::Shake256 => "shake_256",
            Self::Blake2b => "blake2b",
            Self::Blake2s => "blake2s",
        }
    }
}

impl Display for HashFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashFunction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");

        Self::ALL
            .into_iter()
            .find(|hash_function| hash_function.name() == normalized)
            .ok_or_else(|| ConfigError::UnknownHashFunction(s.to_owned()))
    }
}

/// UTF-16LE encodes an ASCII password.
#[inline]
fn utf16_le(password: &[u8]) -> Vec<u8> {
    password.iter().flat_map(|&c| [c, 0]).collect()
}

/// Reads a fixed amount of output from an extendable-output function.
#[inline]
fn xof<H: Default + Update + ExtendableOutput>(password: &[u8], len: usize) -> Digest {
    let mut hasher = H::default();
    Update::update(&mut hasher, password);

    let mut digest = vec![0; len];
    hasher.finalize_xof().read(&mut digest);
    digest
}
