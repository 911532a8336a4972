use std::convert::TryFrom;
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProcessStatus {
    /// The process is ready to run
    Ready,

    /// The process is running
    Running,

    /// The process exited normally with the given exit code.
    Exited(u8),

    /// The process was killed by the given signal.
    Signaled(nix::sys::signal::Signal),
}

impl ProcessStatus {
    /// Status recorded for a process that could not be spawned at all.
    /// Mirrors the shell: 127 when the program is missing, 126 otherwise.
    pub fn launch_failure(err: &io::Error) -> ProcessStatus {
        match err.kind() {
            io::ErrorKind::NotFound => ProcessStatus::Exited(127),
            _ => ProcessStatus::Exited(126),
        }
    }

    /// Status of a process terminated by `signo`. Signals nix has no variant
    /// for (real-time signals) are kept as the shell's `128 + signo` code.
    pub fn from_signal(signo: i32) -> ProcessStatus {
        match nix::sys::signal::Signal::try_from(signo) {
            Ok(signal) => ProcessStatus::Signaled(signal),
            Err(_) => ProcessStatus::Exited((128 + signo) as u8),
        }
    }

    /// Decodes a raw `waitpid` status word. `None` for stopped or continued
    /// children, which are still alive.
    pub fn from_wait_status(raw: libc::c_int) -> Option<ProcessStatus> {
        let signo = raw & 0x7f;
        if signo == 0 {
            Some(ProcessStatus::Exited(((raw >> 8) & 0xff) as u8))
        } else if signo != 0x7f && (raw & 0xffff) != 0xffff {
            Some(ProcessStatus::from_signal(signo))
        } else {
            None
        }
    }

    pub fn from_exit_status(status: std::process::ExitStatus) -> ProcessStatus {
        match (status.code(), status.signal()) {
            (Some(code), _) => ProcessStatus::Exited(code as u8),
            (None, Some(signo)) => ProcessStatus::from_signal(signo),
            (None, None) => ProcessStatus::Exited(1),
        }
    }

    /// Exit code as a shell would report it. `None` while not finished.
    pub fn exit_code(&self) -> Option<i32> {
        match *self {
            ProcessStatus::Exited(code) => Some(code as i32),
            ProcessStatus::Signaled(signal) => Some(signal as i32 + 128),
            ProcessStatus::Ready | ProcessStatus::Running => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.exit_code().is_some()
    }

    pub fn success(&self) -> bool {
        *self == ProcessStatus::Exited(0)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Ready => write!(f, "ready"),
            ProcessStatus::Running => write!(f, "running"),
            ProcessStatus::Exited(code) => write!(f, "exited with code {}", code),
            ProcessStatus::Signaled(signal) => write!(f, "killed by {:?}", signal),
        }
    }
}
