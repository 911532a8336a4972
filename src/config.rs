use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Working directory shared by every step and process.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    #[serde(default)]
    pub env: Env,

    #[serde(default)]
    pub steps: Vec<Step>,

    pub processes: Vec<Process>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Env {
    /// Start from the launcher's own environment instead of an empty one.
    #[serde(default = "default_true")]
    pub inherit: bool,

    /// Shell used to source setup scripts.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Sourced after the first step (source sync), before the remaining steps.
    #[serde(default)]
    pub setup: Vec<PathBuf>,

    /// Sourced after the last step, before any process is started.
    #[serde(default)]
    pub overlay: Vec<PathBuf>,

    /// `KEY=VALUE` entries applied after each sourcing phase.
    #[serde(default)]
    pub vars: Vec<String>,
}

impl Default for Env {
    fn default() -> Self {
        Env {
            inherit: true,
            shell: default_shell(),
            setup: Vec::new(),
            overlay: Vec::new(),
            vars: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Step {
    pub name: String,

    pub command: Vec<String>,

    #[serde(default, alias = "onFailure")]
    pub on_failure: FailurePolicy,
}

/// What to do when a step exits non-zero or cannot be started.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop before any process is started, exiting with the step's code.
    Abort,
    /// Log a warning and carry on.
    Warn,
    /// Carry on silently.
    Ignore,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Warn
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Process {
    pub name: String,

    pub command: Vec<String>,

    #[serde(default)]
    pub mode: Mode,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Background,
    Foreground,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Background
    }
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_shell() -> String {
    String::from("bash")
}

fn default_true() -> bool {
    true
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

impl Config {
    pub fn parse(raw: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(raw)
    }
}

impl Default for Config {
    /// Pull, build and bring up the bottle picking robot.
    fn default() -> Self {
        Config {
            workdir: default_workdir(),
            env: Env {
                setup: vec![PathBuf::from("/opt/ros/eloquent/setup.bash")],
                overlay: vec![PathBuf::from("install/setup.bash")],
                ..Env::default()
            },
            steps: vec![
                Step {
                    name: String::from("sync"),
                    command: strings(&["git", "pull"]),
                    on_failure: FailurePolicy::Warn,
                },
                Step {
                    name: String::from("build"),
                    command: strings(&["colcon", "build", "--symlink-install"]),
                    on_failure: FailurePolicy::Warn,
                },
            ],
            processes: vec![
                // vision_analyser, uart_reader and uart_sender
                Process {
                    name: String::from("nodes"),
                    command: strings(&["ros2", "launch", "robottle", "bottle_picking.launch.py"]),
                    mode: Mode::Background,
                },
                Process {
                    name: String::from("detectnet"),
                    command: strings(&[
                        "ros2",
                        "launch",
                        "ros_deep_learning",
                        "detectnet.ros2.launch",
                    ]),
                    mode: Mode::Background,
                },
                Process {
                    name: String::from("controller"),
                    command: strings(&["ros2", "run", "robottle", "controller1"]),
                    mode: Mode::Foreground,
                },
            ],
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => write!(f, "abort"),
            FailurePolicy::Warn => write!(f, "warn"),
            FailurePolicy::Ignore => write!(f, "ignore"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Background => write!(f, "background"),
            Mode::Foreground => write!(f, "foreground"),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "workdir: {}", self.workdir.display())?;
        for script in self.env.setup.iter() {
            writeln!(f, "setup: {}", script.display())?;
        }
        for step in self.steps.iter() {
            writeln!(
                f,
                "step {} ({}): {}",
                step.name,
                step.on_failure,
                step.command.join(" ")
            )?;
        }
        for script in self.env.overlay.iter() {
            writeln!(f, "overlay: {}", script.display())?;
        }
        for var in self.env.vars.iter() {
            writeln!(f, "var: {}", var)?;
        }
        for process in self.processes.iter() {
            writeln!(
                f,
                "process {} ({}): {}",
                process.name,
                process.mode,
                process.command.join(" ")
            )?;
        }
        Ok(())
    }
}
