use crate::process::ProcessStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("posix error: {0}")]
    Nix(#[from] nix::Error),

    #[error("cannot start {name}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} has not been started")]
    NotStarted { name: String },

    #[error("{name} has an empty command")]
    EmptyCommand { name: String },

    #[error("environment entry {entry:?} is not KEY=VALUE")]
    InvalidEnv { entry: String },

    #[error("no foreground process configured")]
    NoForeground,

    #[error("only one foreground process is allowed, found {names:?}")]
    MultipleForeground { names: Vec<String> },

    #[error("foreground process {name} must be declared last")]
    ForegroundNotLast { name: String },

    #[error("environment script {path:?} does not exist")]
    EnvScriptMissing { path: std::path::PathBuf },

    #[error("environment script {path:?} exported nothing")]
    EnvScriptEmpty { path: std::path::PathBuf },

    #[error("environment script {path:?} {status}")]
    EnvScript {
        path: std::path::PathBuf,
        status: ProcessStatus,
    },

    #[error("step {name} {status}")]
    StepFailed { name: String, status: ProcessStatus },
}

impl Error {
    /// Exit code the launcher reports when it stops on this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::StepFailed { status, .. } => match status.exit_code() {
                Some(code) if code != 0 => code,
                _ => 1,
            },
            _ => 1,
        }
    }
}
