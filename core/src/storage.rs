use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::{
    ctx::{RainbowTableCtxBuilder, ReductionPolicy},
    error::{PrismError, PrismResult},
    hash::HashFunction,
    rainbow_table::{RainbowTable, SimpleTable},
    reduction::{counter_to_plaintext, plaintext_to_counter},
    Password,
};

/// Identifies a rainbow table file.
const MAGIC: [u8; 4] = *b"PRSM";

/// The version of the table file layout.
pub const FORMAT_VERSION: u16 = 1;

const BUFFER_CAPACITY: usize = 1024 * 1024 * 16;

/// The on-disk representation of a table.
/// Passwords are stored in plaintext so that a file does not depend on the
/// internal numbering of the reduction space.
#[derive(Serialize, Deserialize)]
struct TableFile {
    magic: [u8; 4],
    version: u16,
    hash_function: HashFunction,
    charset: Vec<u8>,
    max_password_length: u8,
    t: u64,
    reduction: ReductionPolicy,
    /// `(endpoint, startpoint)` pairs, sorted by endpoint.
    chains: Vec<(Password, Password)>,
}

impl SimpleTable {
    /// Stores this rainbow table to the given path.
    /// The file is written next to its destination and moved in place once
    /// complete, so an existing table is never left half written.
    pub fn store(&self, path: &Path) -> PrismResult<()> {
        let mut chains: Vec<_> = self.chains.iter().collect();
        chains.sort_unstable();

        let table_file = TableFile {
            magic: MAGIC,
            version: FORMAT_VERSION,
            hash_function: self.ctx.hash_function,
            charset: self.ctx.charset.clone(),
            max_password_length: self.ctx.max_password_length,
            t: self.ctx.t,
            reduction: self.ctx.reduction,
            chains: chains
                .into_iter()
                .map(|(&endpoint, &startpoint)| {
                    (
                        counter_to_plaintext(endpoint, &self.ctx),
                        counter_to_plaintext(startpoint, &self.ctx),
                    )
                })
                .collect(),
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp_file = NamedTempFile::new_in(dir)?;

        let mut buf_writer = BufWriter::with_capacity(BUFFER_CAPACITY, temp_file.as_file());
        bincode::serialize_into(&mut buf_writer, &table_file).map_err(|_| PrismError::Serialize)?;
        buf_writer.flush()?;
        drop(buf_writer);

        temp_file.as_file().sync_all()?;
        temp_file.persist(path).map_err(|e| e.error)?;

        info!(path = %path.display(), chains = self.len(), "table stored");

        Ok(())
    }

    /// Loads a rainbow table from the given path.
    /// Every parameter and every chain is checked, but chains are not replayed.
    pub fn load(path: &Path) -> PrismResult<Self> {
        let file = File::open(path)?;
        let buf_reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let table_file: TableFile = bincode::deserialize_from(buf_reader)
            .map_err(|e| PrismError::Format(format!("unable to decode the table ({e})")))?;

        if table_file.magic != MAGIC {
            return Err(PrismError::Format("not a rainbow table file".to_owned()));
        }
        if table_file.version != FORMAT_VERSION {
            return Err(PrismError::Format(format!(
                "unsupported format version {}, expected {FORMAT_VERSION}",
                table_file.version
            )));
        }

        let ctx = RainbowTableCtxBuilder::new()
            .hash(table_file.hash_function)
            .charset(&table_file.charset)
            .max_password_length(table_file.max_password_length)
            .chain_length(table_file.t)
            .reduction(table_file.reduction)
            .build()
            .map_err(|e| PrismError::Format(e.to_string()))?;

        let mut table = SimpleTable::new(ctx);
        table.chains.reserve(table_file.chains.len());

        for (endpoint, startpoint) in table_file.chains {
            // an endpoint can be the empty password, a startpoint cannot
            let endpoint = plaintext_to_counter(&endpoint, &table.ctx).ok_or_else(|| {
                PrismError::Format(format!(
                    "invalid endpoint \"{}\"",
                    String::from_utf8_lossy(&endpoint)
                ))
            })?;
            let startpoint = table
                .ctx
                .validate(&startpoint)
                .map_err(|e| PrismError::Format(e.to_string()))?;

            if table.chains.insert(endpoint, startpoint).is_some() {
                return Err(PrismError::Format(format!(
                    "the endpoint \"{}\" is stored twice",
                    String::from_utf8_lossy(&counter_to_plaintext(endpoint, &table.ctx))
                )));
            }
        }

        info!(path = %path.display(), chains = table.len(), "table loaded");

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::tempdir;

    use super::{TableFile, FORMAT_VERSION, MAGIC};
    use crate::{
        ctx::{build_test_ctx, RainbowTableCtxBuilder, ReductionPolicy},
        error::PrismError,
        hash::HashFunction,
        rainbow_table::{RainbowTable, SimpleTable},
    };

    fn table_file(version: u16, chains: Vec<(&[u8], &[u8])>) -> TableFile {
        TableFile {
            magic: MAGIC,
            version,
            hash_function: HashFunction::Sha1,
            charset: b"abc".to_vec(),
            max_password_length: 3,
            t: 3,
            reduction: ReductionPolicy::StepDependent,
            chains: chains
                .into_iter()
                .map(|(e, s)| (e.to_vec(), s.to_vec()))
                .collect(),
        }
    }

    #[test]
    fn test_store_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.prism");
        let table = SimpleTable::build(["a", "bb", "ccc"], build_test_ctx()).unwrap();

        table.store(&path).unwrap();
        let loaded = SimpleTable::load(&path).unwrap();

        assert_eq!(table, loaded);
        let digest = loaded.ctx().hash_function.hash(b"bbb");
        assert_eq!(Some(b"bbb".to_vec()), loaded.search(&digest));
    }

    #[test]
    fn test_store_load_every_parameter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.prism");
        let mut rng = StdRng::seed_from_u64(11);

        for hash_function in HashFunction::ALL {
            for reduction in [ReductionPolicy::StepDependent, ReductionPolicy::Fixed] {
                let ctx = RainbowTableCtxBuilder::new()
                    .hash(hash_function)
                    .charset(b"xyz01")
                    .max_password_length(4)
                    .chain_length(9)
                    .reduction(reduction)
                    .build()
                    .unwrap();
                let table = SimpleTable::build_random(&mut rng, 200, ctx).unwrap();

                table.store(&path).unwrap();
                let loaded = SimpleTable::load(&path).unwrap();

                assert_eq!(table, loaded, "{hash_function} {reduction:?}");
                assert!(loaded.verify().is_ok(), "{hash_function} {reduction:?}");
            }
        }
    }

    #[test]
    fn test_store_is_deterministic() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        let table = SimpleTable::build_compressed(&(1..40).collect::<Vec<_>>(), build_test_ctx())
            .unwrap();

        table.store(&first).unwrap();
        table.clone().store(&second).unwrap();

        assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
    }

    #[test]
    fn test_store_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.prism");
        fs::write(&path, b"previous content").unwrap();
        let table = SimpleTable::build(["a"], build_test_ctx()).unwrap();

        table.store(&path).unwrap();

        assert_eq!(table, SimpleTable::load(&path).unwrap());
        // only the table remains in the directory
        assert_eq!(1, fs::read_dir(dir.path()).unwrap().count());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();

        assert!(matches!(
            SimpleTable::load(&dir.path().join("missing")),
            Err(PrismError::Io(_))
        ));
    }

    #[test]
    fn test_load_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.prism");
        SimpleTable::build(["a", "bb", "ccc"], build_test_ctx())
            .unwrap()
            .store(&path)
            .unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        assert!(matches!(
            SimpleTable::load(&path),
            Err(PrismError::Format(_))
        ));
    }

    #[test]
    fn test_load_rejects_bad_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.prism");

        let mut bad_magic = table_file(FORMAT_VERSION, vec![]);
        bad_magic.magic = *b"NOPE";
        fs::write(&path, bincode::serialize(&bad_magic).unwrap()).unwrap();
        assert!(matches!(SimpleTable::load(&path), Err(PrismError::Format(_))));

        let bad_version = table_file(FORMAT_VERSION + 1, vec![]);
        fs::write(&path, bincode::serialize(&bad_version).unwrap()).unwrap();
        assert!(matches!(SimpleTable::load(&path), Err(PrismError::Format(_))));

        let mut bad_charset = table_file(FORMAT_VERSION, vec![]);
        bad_charset.charset = b"aa".to_vec();
        fs::write(&path, bincode::serialize(&bad_charset).unwrap()).unwrap();
        assert!(matches!(SimpleTable::load(&path), Err(PrismError::Format(_))));
    }

    #[test]
    fn test_load_rejects_bad_chains() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.prism");

        let cases = [
            vec![(&b"bcd"[..], &b"a"[..])],
            vec![(&b"bcc"[..], &b""[..])],
            vec![(&b"bcc"[..], &b"abca"[..])],
            vec![(&b"bcc"[..], &b"a"[..]), (&b"bcc"[..], &b"ca"[..])],
        ];

        for chains in cases {
            fs::write(
                &path,
                bincode::serialize(&table_file(FORMAT_VERSION, chains)).unwrap(),
            )
            .unwrap();

            assert!(matches!(SimpleTable::load(&path), Err(PrismError::Format(_))));
        }
    }

    #[test]
    fn test_load_accepts_empty_endpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.prism");
        fs::write(
            &path,
            bincode::serialize(&table_file(FORMAT_VERSION, vec![(&b""[..], &b"a"[..])])).unwrap(),
        )
        .unwrap();

        let table = SimpleTable::load(&path).unwrap();

        assert_eq!(Some(1), table.search_endpoints(0));
    }
}
