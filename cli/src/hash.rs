use anyhow::Result;

use crate::Hash;

pub fn hash(hsh: Hash) -> Result<()> {
    let digest = hsh.hash_function.hash(hsh.password.as_bytes());
    println!("{}", hex::encode(digest));

    Ok(())
}
