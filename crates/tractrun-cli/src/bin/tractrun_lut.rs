//! tractrun-lut
//!
//! Generates the VEP parcellation lookup-table family consumed by the
//! pipeline binaries: the merged FreeSurfer+VEP color LUT, the MRtrix
//! node LUT, the subcortical label list and the aparc color LUT.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use tractrun_core::lut::{self, LutOutputs};
use tractrun_core::tracing_init;

#[derive(Parser, Debug)]
#[command(name = "tractrun-lut")]
#[command(version, about = "Generate the VEP parcellation lookup tables", long_about = None)]
struct Cli {
    /// FreeSurfer color LUT (FreeSurferColorLUT.txt)
    fs_lut: PathBuf,

    /// VEP atlas rules table
    rules: PathBuf,

    /// VEP region table (iscort, name, RGBA per line)
    regions: PathBuf,

    /// Directory the four generated files are written to
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,

    /// Emit structured JSON log lines
    #[arg(long)]
    log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_init::init_tracing("tractrun=info", cli.log_json);

    std::fs::create_dir_all(&cli.out_dir)?;
    let outputs = LutOutputs::in_dir(&cli.out_dir);
    lut::create_luts(&cli.fs_lut, &cli.rules, &cli.regions, &outputs)?;

    info!(out_dir = %cli.out_dir.display(), "LUT family generated");
    Ok(())
}
