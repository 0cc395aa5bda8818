#![forbid(unsafe_code)]

use clap::Parser;
use tribute_os::telemetry;
use tribute_tools::wall_cli::{execute_wall_command, open_default_wall, WallCli};

fn main() {
    let cli = WallCli::parse();
    telemetry::init_tracing();
    if let Err(err) = run(cli) {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run(cli: WallCli) -> Result<(), String> {
    let wall = open_default_wall()?;
    let output = execute_wall_command(&wall, &cli.command)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
