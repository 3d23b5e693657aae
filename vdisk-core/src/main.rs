//! Binary entry point: initializes logging, loads (or creates) the
//! filesystem rooted at an optional base directory, and runs the
//! interactive command surface until `exit` or EOF.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info};

fn main() -> ExitCode {
    env_logger::init();

    let base_dir = match env::args().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    info!("starting vdisk at {}", base_dir.display());

    let vfs = match vdisk_core::fs::VirtualFs::open(base_dir) {
        Ok(vfs) => vfs,
        Err(e) => {
            error!("fatal: {}", e);
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = vdisk_core::cli::run(vfs) {
        error!("fatal I/O error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
