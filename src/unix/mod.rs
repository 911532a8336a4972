mod config_unix;
mod environment;
mod error;
mod launcher;
mod process;

use crate::config;
use error::Result;
use launcher::Launcher;
use log::{debug, error, info};
use std::time::{Duration, Instant};

pub fn run(config: &config::Config, args: Vec<String>) -> ! {
    let exitcode = match run_impl(config, args) {
        Ok(exitcode) => exitcode,
        Err(err) => {
            error!("{}", err);
            err.exit_code()
        }
    };

    std::process::exit(exitcode)
}

/// Checks the plan without running anything.
pub fn validate(config: &config::Config) -> Result<()> {
    config_unix::validate(config)
}

fn run_impl(config: &config::Config, args: Vec<String>) -> Result<i32> {
    config_unix::validate(config)?;

    let mut launcher = Launcher::new(config.clone(), args);

    let start_time = Instant::now();
    let exitcode = launcher.run()?;

    collect_status(&launcher, exitcode, start_time.elapsed());

    Ok(exitcode)
}

fn collect_status(launcher: &Launcher, exitcode: i32, wall_time: Duration) {
    for process in launcher.processes() {
        info!(
            "{} {} after {:?}",
            process.name(),
            process.status(),
            process.wall_time().unwrap_or_default()
        );
    }
    debug!(
        "ROS_DISTRO={}",
        launcher.environment().get("ROS_DISTRO").unwrap_or("unset")
    );
    info!("exit {} after {:?}", exitcode, wall_time);
}
