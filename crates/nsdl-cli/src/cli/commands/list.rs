//! List command: catalog archives and their presence in the output directory.

use anyhow::Result;
use nsdl_core::inventory;

use crate::cli::Context;

pub fn run_list(ctx: &Context) -> Result<()> {
    let output_dir = ctx.output_dir();
    println!("Output directory: {}", output_dir.display());
    println!("{:<5} | {:<28} | {:<32} | local", "index", "filename", "md5");
    for row in inventory::inventory(&output_dir) {
        let local = match &row.present {
            Some(path) => format!("exists ({})", path.display()),
            None => "missing".to_string(),
        };
        println!(
            "{:<5} | {:<28} | {:<32} | {}",
            row.index, row.spec.filename, row.spec.expected_md5, local
        );
    }
    Ok(())
}
