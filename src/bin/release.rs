use std::io;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};

use f2b_control::release::git::SystemRunner;
use f2b_control::release::{find_root, Release, ReleaseOptions};

fn run() -> Result<()> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let root = find_root(&cwd).ok_or_else(|| anyhow!("no Cargo.toml found above {}", cwd.display()))?;
    let options = ReleaseOptions::from_env(root.clone());
    log::info!("Releasing from {} (tag: {})", root.display(), options.tag);

    let mut runner = SystemRunner::new(&root);
    let stdin = io::stdin();
    let outcome = Release::new(options, &mut runner, stdin.lock(), io::stdout())
        .run(chrono::Local::now().date_naive())?;

    println!();
    println!("🎉 Released v{} (was {})", outcome.version, outcome.previous);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::from(1)
        },
    }
}
