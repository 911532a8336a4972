use super::config_unix::foreground_index;
use super::environment::Environment;
use super::error::{Error, Result};
use super::process::UnixProcess;
use crate::config::{Config, FailurePolicy, Step};
use crate::process::ProcessStatus;
use log::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// After the source sync (first step), before the build.
    Setup,
    /// After the last step, before processes start.
    Overlay,
}

#[derive(Debug)]
pub struct Launcher {
    config: Config,

    /// Appended to the foreground command.
    extra_args: Vec<String>,

    env: Environment,

    processes: Vec<UnixProcess>,
}

impl Launcher {
    pub fn new(config: Config, extra_args: Vec<String>) -> Launcher {
        let env = if config.env.inherit {
            Environment::inherit()
        } else {
            Environment::empty()
        };
        Launcher {
            config,
            extra_args,
            env,
            processes: Vec::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Handles of every launched process, in launch order.
    pub fn processes(&self) -> &[UnixProcess] {
        &self.processes
    }

    /// Runs the whole plan and returns the foreground's exit code.
    pub fn run(&mut self) -> Result<i32> {
        let foreground = foreground_index(&self.config)?;

        // sync may pull the very scripts the setup phase sources
        if let Some(sync) = self.config.steps.first() {
            self.run_step(sync)?;
        }

        self.apply_env(Phase::Setup)?;

        for step in self.config.steps.iter().skip(1) {
            self.run_step(step)?;
        }

        self.apply_env(Phase::Overlay)?;

        self.spawn_all();
        self.join_all(foreground)
    }

    fn apply_env(&mut self, phase: Phase) -> Result<()> {
        let scripts = match phase {
            Phase::Setup => &self.config.env.setup,
            Phase::Overlay => &self.config.env.overlay,
        };
        debug!("applying {:?} environment", phase);
        self.env
            .source_all(&self.config.env.shell, scripts, &self.config.workdir);
        self.env.apply_vars(&self.config.env.vars)
    }

    fn run_step(&self, step: &Step) -> Result<()> {
        info!("running {}: {}", step.name, step.command.join(" "));
        let mut process = UnixProcess::new(
            step.name.clone(),
            step.command.clone(),
            self.env.clone(),
            self.config.workdir.clone(),
        );

        let status = match process.start() {
            Ok(()) => match process.wait() {
                Ok(status) => status,
                Err(err) => {
                    error!("cannot wait for {}: {}", step.name, err);
                    ProcessStatus::Exited(1)
                }
            },
            Err(err) => {
                debug!("{}", err);
                process.status()
            }
        };

        if status.success() {
            return Ok(());
        }

        match step.on_failure {
            FailurePolicy::Abort => Err(Error::StepFailed {
                name: step.name.clone(),
                status,
            }),
            FailurePolicy::Warn => {
                warn!("step {} {}, continuing", step.name, status);
                Ok(())
            }
            FailurePolicy::Ignore => {
                debug!("step {} {}, ignored", step.name, status);
                Ok(())
            }
        }
    }

    /// Starts every process in declaration order. Launch failures are logged
    /// and leave the handle finished; nothing is retried.
    fn spawn_all(&mut self) {
        let count = self.config.processes.len();
        for (index, spec) in self.config.processes.iter().enumerate() {
            let mut command = spec.command.clone();
            if index + 1 == count {
                command.extend(self.extra_args.iter().cloned());
            }

            let mut process = UnixProcess::new(
                spec.name.clone(),
                command,
                self.env.clone(),
                self.config.workdir.clone(),
            );
            match process.start() {
                Ok(()) => info!(
                    "started {} ({}) as pid {}: {}",
                    spec.name,
                    spec.mode,
                    process.pid().map(|p| p.as_raw()).unwrap_or_default(),
                    process.command().join(" ")
                ),
                Err(err) => error!("{}: {}", err, process_error_source(&err)),
            }
            self.processes.push(process);
        }
    }

    /// Waits on the foreground first, then on every background process. The
    /// backgrounds are joined even when the foreground wait fails.
    fn join_all(&mut self, foreground: usize) -> Result<i32> {
        let result = self.processes[foreground].wait();
        match &result {
            Ok(status) => info!("{} {}", self.processes[foreground].name(), status),
            Err(err) => error!("cannot wait for {}: {}", self.processes[foreground].name(), err),
        }

        for (index, process) in self.processes.iter_mut().enumerate() {
            if index == foreground {
                continue;
            }
            match process.wait() {
                Ok(status) => info!("{} {}", process.name(), status),
                Err(err) => error!("cannot wait for {}: {}", process.name(), err),
            }
        }

        Ok(result?.exit_code().unwrap_or(1))
    }
}

fn process_error_source(err: &Error) -> String {
    match std::error::Error::source(err) {
        Some(source) => source.to_string(),
        None => String::from("unknown cause"),
    }
}
