use super::environment::Environment;
use super::error::{Error, Result};
use crate::process::ProcessStatus;
use nix::errno::Errno;
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct UnixProcess {
    name: String,
    command: Vec<String>,
    env: Environment,
    cwd: PathBuf,

    pid: Option<Pid>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,

    status: ProcessStatus,
}

impl UnixProcess {
    pub fn new(name: String, command: Vec<String>, env: Environment, cwd: PathBuf) -> UnixProcess {
        UnixProcess {
            name,
            command,
            env,
            cwd,
            pid: None,
            started_at: None,
            finished_at: None,
            status: ProcessStatus::Ready,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    /// Time between spawn and the observed exit.
    pub fn wall_time(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Spawns the command with exactly the configured environment. stdio is
    /// inherited so the child writes straight to the console.
    ///
    /// On failure the handle is marked finished with the shell's 126/127 code.
    pub fn start(&mut self) -> Result<()> {
        let (program, args) = match self.command.split_first() {
            Some(split) => split,
            None => {
                return Err(Error::EmptyCommand {
                    name: self.name.clone(),
                })
            }
        };

        self.started_at = Some(Instant::now());
        let spawned = Command::new(program)
            .args(args)
            .env_clear()
            .envs(self.env.iter())
            .current_dir(&self.cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn();

        match spawned {
            Ok(child) => {
                // Reaped through waitpid below; dropping the handle neither
                // kills nor waits for the child.
                self.pid = Some(Pid::from_raw(child.id() as libc::pid_t));
                self.status = ProcessStatus::Running;
                Ok(())
            }
            Err(err) => {
                self.status = ProcessStatus::launch_failure(&err);
                self.finished_at = self.started_at;
                Err(Error::Spawn {
                    name: self.name.clone(),
                    source: err,
                })
            }
        }
    }

    /// Blocks until the process exits. A finished handle returns its cached
    /// status without waiting again.
    pub fn wait(&mut self) -> Result<ProcessStatus> {
        if self.status.is_finished() {
            return Ok(self.status);
        }

        let pid = match (self.status, self.pid) {
            (ProcessStatus::Running, Some(pid)) => pid,
            _ => {
                return Err(Error::NotStarted {
                    name: self.name.clone(),
                })
            }
        };

        // nix::sys::wait::waitpid reaps the child and then fails with EINVAL
        // on real-time signals it cannot map, so the raw status is decoded here.
        loop {
            let mut raw: libc::c_int = 0;
            let res = unsafe { libc::waitpid(pid.as_raw(), &mut raw, 0) };
            match Errno::result(res) {
                Err(nix::Error::Sys(Errno::EINTR)) => {}
                Err(err) => return Err(Error::Nix(err)),
                Ok(x) => {
                    assert_eq!(x, pid.as_raw());
                    // Stopped/continued only show up with WUNTRACED/WCONTINUED.
                    if let Some(status) = ProcessStatus::from_wait_status(raw) {
                        return Ok(self.finish(status));
                    }
                }
            }
        }
    }

    fn finish(&mut self, status: ProcessStatus) -> ProcessStatus {
        self.status = status;
        self.finished_at = Some(Instant::now());
        status
    }
}
