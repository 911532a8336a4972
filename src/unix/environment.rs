use super::config_unix::parse_env_var;
use super::error::{Error, Result};
use crate::process::ProcessStatus;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

// Sources "$1" with its output sent to stderr, then dumps the resulting
// environment NUL-separated on stdout.
const SOURCE_AND_DUMP: &str = ". \"$1\" 1>&2 && env -0";

/// Environment handed to every spawned step and process.
///
/// The launcher never mutates its own process environment; setup scripts are
/// evaluated in a child shell and the result is captured here instead.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn empty() -> Environment {
        Environment::default()
    }

    /// Snapshot of the launcher's own environment.
    pub fn inherit() -> Environment {
        Environment {
            vars: std::env::vars_os()
                .map(|(key, value)| {
                    (
                        key.to_string_lossy().into_owned(),
                        value.to_string_lossy().into_owned(),
                    )
                })
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    /// Applies `KEY=VALUE` entries, later entries winning.
    pub fn apply_vars(&mut self, entries: &[String]) -> Result<()> {
        for entry in entries.iter() {
            let (key, value) = parse_env_var(entry)?;
            self.vars.insert(key, value);
        }
        Ok(())
    }

    /// Sources `script` with `shell` on top of this environment and replaces
    /// it with whatever the shell ends up exporting.
    pub fn source(&mut self, shell: &str, script: &Path, cwd: &Path) -> Result<()> {
        let path = resolve(script, cwd);
        if !path.is_file() {
            return Err(Error::EnvScriptMissing { path });
        }
        // the shell runs inside cwd, so a cwd-relative path would resolve twice
        let path = path.canonicalize()?;

        let output = Command::new(shell)
            .arg("-c")
            .arg(SOURCE_AND_DUMP)
            .arg("launcher")
            .arg(&path)
            .env_clear()
            .envs(self.vars.iter())
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()?;

        if !output.status.success() {
            return Err(Error::EnvScript {
                path,
                status: ProcessStatus::from_exit_status(output.status),
            });
        }

        // A script that calls `exit` or a top-level `return` ends the shell
        // before the dump runs.
        let vars = parse_env_block(&output.stdout);
        if vars.is_empty() {
            return Err(Error::EnvScriptEmpty { path });
        }

        self.vars = vars;
        debug!("sourced {:?}, {} variables", path, self.vars.len());
        Ok(())
    }

    /// Sources every script in order. Failures are reported and skipped so a
    /// missing overlay (for instance after a failed build) does not stop the
    /// launch.
    pub fn source_all(&mut self, shell: &str, scripts: &[PathBuf], cwd: &Path) {
        for script in scripts.iter() {
            if let Err(err) = self.source(shell, script, cwd) {
                warn!("skipping environment script: {}", err);
            }
        }
    }
}

fn resolve(script: &Path, cwd: &Path) -> PathBuf {
    if script.is_absolute() {
        script.to_path_buf()
    } else {
        cwd.join(script)
    }
}

fn parse_env_block(block: &[u8]) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for entry in block.split(|&b| b == 0) {
        if entry.is_empty() {
            continue;
        }
        let entry = String::from_utf8_lossy(entry);
        let mut splitter = entry.splitn(2, '=');
        if let (Some(key), Some(value)) = (splitter.next(), splitter.next()) {
            // "_" is the shell's last-argument variable, not part of the setup.
            if !key.is_empty() && key != "_" {
                vars.insert(key.to_string(), value.to_string());
            }
        }
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use std::io::Write;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn parses_nul_separated_block() {
        let vars = parse_env_block(b"A=1\0B=x=y\0_=/usr/bin/env\0\0MULTI=line1\nline2\0");
        assert_eq!(vars.get("A").map(String::as_str), Some("1"));
        assert_eq!(vars.get("B").map(String::as_str), Some("x=y"));
        assert_eq!(vars.get("MULTI").map(String::as_str), Some("line1\nline2"));
        assert!(!vars.contains_key("_"));
    }

    #[test]
    fn vars_override_in_order() {
        let mut env = Environment::empty();
        env.apply_vars(&["A=1".to_string(), "A=2".to_string(), "B=".to_string()])
            .unwrap();
        assert_eq!(env.get("A"), Some("2"));
        assert_eq!(env.get("B"), Some(""));
        assert!(env.apply_vars(&["broken".to_string()]).is_err());
    }

    #[test]
    fn sourcing_captures_exports_without_touching_own_env() {
        let dir = tempfile::tempdir().unwrap();
        let setup = script(
            dir.path(),
            "setup.sh",
            "export LAUNCHER_TEST_SOURCED=robottle\necho noise",
        );

        let mut env = Environment::inherit();
        env.apply_vars(&["LAUNCHER_TEST_KEPT=yes".to_string()])
            .unwrap();
        env.source("/bin/sh", &setup, dir.path()).unwrap();

        assert_eq!(env.get("LAUNCHER_TEST_SOURCED"), Some("robottle"));
        assert_eq!(env.get("LAUNCHER_TEST_KEPT"), Some("yes"));
        assert!(std::env::var("LAUNCHER_TEST_SOURCED").is_err());
    }

    #[test]
    fn relative_scripts_resolve_against_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("install")).unwrap();
        script(
            &dir.path().join("install"),
            "setup.sh",
            "export LAUNCHER_TEST_OVERLAY=1",
        );

        let mut env = Environment::inherit();
        env.source("/bin/sh", Path::new("install/setup.sh"), dir.path())
            .unwrap();
        assert_eq!(env.get("LAUNCHER_TEST_OVERLAY"), Some("1"));
    }

    #[test]
    fn missing_script_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = Environment::inherit();
        let err = env
            .source("/bin/sh", Path::new("install/setup.sh"), dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::EnvScriptMissing { .. }));
    }

    #[test]
    fn failing_script_leaves_environment_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let broken = script(dir.path(), "broken.sh", "export LAUNCHER_TEST_HALF=1\nfalse");
        let good = script(dir.path(), "good.sh", "export LAUNCHER_TEST_GOOD=1");

        let mut env = Environment::inherit();
        let before = env.clone();
        assert!(matches!(
            env.source("/bin/sh", &broken, dir.path()),
            Err(Error::EnvScript { .. })
        ));
        assert_eq!(env, before);

        env.source_all("/bin/sh", &[broken, dir.path().join("absent.sh"), good], dir.path());
        assert_eq!(env.get("LAUNCHER_TEST_GOOD"), Some("1"));
        assert_eq!(env.get("LAUNCHER_TEST_HALF"), None);
    }

    #[test]
    fn script_exiting_early_leaves_environment_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let early = script(dir.path(), "early.sh", "export LAUNCHER_TEST_EARLY=1\nexit 0");

        let mut env = Environment::inherit();
        env.apply_vars(&["LAUNCHER_TEST_KEPT=yes".to_string()])
            .unwrap();
        let before = env.clone();
        assert!(matches!(
            env.source("/bin/sh", &early, dir.path()),
            Err(Error::EnvScriptEmpty { .. })
        ));
        assert_eq!(env, before);
    }

    #[test]
    fn killed_shell_reports_the_signal() {
        let dir = tempfile::tempdir().unwrap();
        let killed = script(dir.path(), "killed.sh", "kill -TERM $$");

        let mut env = Environment::inherit();
        match env.source("/bin/sh", &killed, dir.path()) {
            Err(Error::EnvScript { status, .. }) => {
                assert_eq!(status, ProcessStatus::Signaled(Signal::SIGTERM))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
