use super::error::{Error, Result};
use crate::config::{Config, Mode};

/// Splits a `KEY=VALUE` entry at the first `=`.
pub fn parse_env_var(entry: &str) -> Result<(String, String)> {
    let mut splitter = entry.splitn(2, '=');
    match (splitter.next(), splitter.next()) {
        (Some(key), Some(value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(Error::InvalidEnv {
            entry: entry.to_string(),
        }),
    }
}

/// Index of the foreground process, which must be the last one declared.
pub fn foreground_index(config: &Config) -> Result<usize> {
    let foreground: Vec<usize> = config
        .processes
        .iter()
        .enumerate()
        .filter(|(_, p)| p.mode == Mode::Foreground)
        .map(|(i, _)| i)
        .collect();

    match foreground.as_slice() {
        [] => Err(Error::NoForeground),
        [index] if *index + 1 == config.processes.len() => Ok(*index),
        [index] => Err(Error::ForegroundNotLast {
            name: config.processes[*index].name.clone(),
        }),
        _ => Err(Error::MultipleForeground {
            names: foreground
                .iter()
                .map(|&i| config.processes[i].name.clone())
                .collect(),
        }),
    }
}

pub fn validate(config: &Config) -> Result<()> {
    for step in config.steps.iter() {
        if step.command.is_empty() {
            return Err(Error::EmptyCommand {
                name: step.name.clone(),
            });
        }
    }

    for process in config.processes.iter() {
        if process.command.is_empty() {
            return Err(Error::EmptyCommand {
                name: process.name.clone(),
            });
        }
    }

    for entry in config.env.vars.iter() {
        parse_env_var(entry)?;
    }

    foreground_index(config)?;
    Ok(())
}
