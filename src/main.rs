use std::env;
use std::process;

use irondome::config::Config;
use irondome::orchestrator;

fn main() {
    if let Err(e) = run() {
        eprintln!("irondome: {:#}", e);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = Config::from_args(env::args().skip(1))?;
    orchestrator::run(config)?;
    Ok(())
}
