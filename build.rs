//! Renders the `reposectl(1)` man page from the clap definition.
//!
//! Packaging picks the page up from `OUT_DIR`.

use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout();
    for watched in ["build.rs", "src/cli/mod.rs"] {
        writeln!(stdout, "cargo:rerun-if-changed={watched}")?;
    }

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR was not set"))?;
    let page_name = format!("{}.1", env!("CARGO_PKG_NAME"));

    let mut page = BufWriter::new(File::create(out_dir.join(page_name))?);
    Man::new(cli::Cli::command()).render(&mut page)?;
    page.flush()?;

    Ok(())
}
