//! Generate fixture command implementation.
//!
//! Writes a synthetic process table plus the totals it must aggregate to.

use anyhow::{bail, Result};
use nix::unistd::getuid;
use std::path::PathBuf;
use tracing::debug;

use herakles_procinf::fixture::{
    generate, write_binary_table, write_text_table, Expected, GeneratorOptions, EXPECTED_FILE,
};
use herakles_procinf::process::psinfo::PRFNSZ;
use herakles_procinf::process::PAGE_SIZE;

use crate::config::Config;

/// Generates a fixture process table under `output`.
pub fn command_generate_fixture(
    output: PathBuf,
    processes: usize,
    name: String,
    seed: Option<u64>,
    binary: bool,
    config: &Config,
) -> Result<()> {
    if name.is_empty() {
        bail!("Process name must not be empty");
    }
    // Decoys append one byte to the name and must still fit pr_fname
    if binary && name.len() + 1 >= PRFNSZ {
        bail!(
            "Binary tables need names shorter than {} bytes, got '{}'",
            PRFNSZ - 1,
            name
        );
    }
    let page_size = config.page_size.unwrap_or(*PAGE_SIZE);
    if binary && page_size % 1024 != 0 {
        bail!(
            "Binary tables store resident size in KB, page size {} is not a multiple of 1024",
            page_size
        );
    }

    let opts = GeneratorOptions {
        processes,
        name,
        seed,
        page_size,
    };
    debug!(
        "Generating fixture: processes={}, name={}, seed={:?}, output={}",
        opts.processes,
        opts.name,
        opts.seed,
        output.display()
    );

    let table = generate(&opts);
    if binary {
        write_binary_table(&output, &table, page_size, getuid().as_raw())?;
    } else {
        write_text_table(&output, &table, page_size)?;
    }

    let expected = Expected::compute(&opts.name, &table, page_size);
    let manifest = output.join(EXPECTED_FILE);
    expected.save(&manifest)?;

    println!(
        "✅ Generated {} table: {} processes ({} named '{}') in {}",
        if binary { "solaris" } else { "linux" },
        table.len(),
        expected.processes,
        opts.name,
        output.display()
    );
    println!("   Expected totals: {}", manifest.display());
    Ok(())
}
