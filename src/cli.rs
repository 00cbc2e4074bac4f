use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// JSON configuration describing hosts, device, switches and topology.
    pub config: PathBuf,

    /// Trace file of `<hex-addr> <R|W> <hostid>` records, one per line.
    pub trace: PathBuf,
}
