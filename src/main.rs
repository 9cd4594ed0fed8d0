use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

use weft::term::{RawModeGuard, StdConsole};
use weft::{Image, RunState};

/// Weft is a lightweight virtual machine for assembled LC3 program images.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// `.lc3` or `.obj` image file to run
    image: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!(
        "{:>12} image {}",
        "Loading".green().bold(),
        args.image.display()
    );
    let image = match Image::read_from(&args.image) {
        Ok(image) => image,
        Err(report) => {
            eprintln!("{:?}", report);
            std::process::exit(1);
        }
    };
    println!(
        "{:>12} {} bytes at 0x{:04x}",
        "Loaded".green().bold(),
        image.size_in_bytes(),
        image.origin
    );

    let mut state = RunState::new(&image, Box::new(StdConsole::new()));

    println!("{:>12} binary", "Running".green().bold());
    let guard = RawModeGuard::enable().into_diagnostic()?;
    let result = state.run();
    drop(guard);
    result?;

    println!(
        "{:>12} target {}",
        "Completed".green().bold(),
        args.image.display()
    );
    Ok(())
}
