use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Color, Table};
use prism_core::{Digest, RainbowTable, SimpleTable};

use crate::{print_trace, read_lines, Attack};

pub fn attack(atk: Attack) -> Result<()> {
    let table = SimpleTable::load(&atk.table).context("Unable to load the rainbow table")?;

    let decode = |hex_digest: &str| -> Result<Digest> {
        let digest = hex::decode(hex_digest).context("The digest is not valid hexadecimal")?;
        table.ctx().validate_digest(&digest)?;
        Ok(digest)
    };

    let (hex_digests, digests): (Vec<_>, Vec<_>) = if atk.digests.is_empty() {
        // a bad line is reported and the rest of the batch still runs
        read_lines(Path::new("-"))?
            .into_iter()
            .map(|line| line.trim().to_owned())
            .filter_map(|line| match decode(&line) {
                Ok(digest) => Some((line, digest)),
                Err(e) => {
                    eprintln!("Invalid digest {line}: {e:#}");
                    None
                }
            })
            .unzip()
    } else {
        atk.digests
            .into_iter()
            .map(|hex_digest| {
                let digest =
                    decode(&hex_digest).with_context(|| format!("Invalid digest {hex_digest}"))?;
                Ok((hex_digest, digest))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip()
    };

    let passwords = if atk.trace {
        digests
            .iter()
            .map(|digest| {
                println!("lookup {}", hex::encode(digest));
                table.search_traced(digest, &mut print_trace).0
            })
            .collect()
    } else {
        table.search_many(&digests)
    };

    let mut display_table = Table::new();
    display_table.load_preset(UTF8_BORDERS_ONLY);
    display_table.set_header(vec!["Digest", "Password"]);

    for (hex_digest, password) in hex_digests.iter().zip(&passwords) {
        let password = password
            .as_ref()
            .map(|password| Cell::new(String::from_utf8_lossy(password)).fg(Color::Green))
            .unwrap_or_else(|| Cell::new("No password found").fg(Color::Red));

        display_table.add_row(vec![Cell::new(hex_digest), password]);
    }

    println!("{display_table}");

    let cracked = passwords.iter().filter(|password| password.is_some()).count();
    println!("Cracked {cracked}/{}", passwords.len());

    Ok(())
}
