use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tt_api_types::{AuthMethod, ConnectionConfig};

use super::{RemoteConnector, RemoteError, RemoteSession};

const ASKPASS_ENV: &str = "TETHER_SSH_ASKPASS_VALUE";
const READY_POLL: Duration = Duration::from_millis(250);

/// Prints the password handed over through the environment, for password
/// and passphrase prompts only.
const ASKPASS_SCRIPT: &str = r#"#!/bin/sh
case "$1" in
  *assword*|*passphrase*) printf '%s\n' "$TETHER_SSH_ASKPASS_VALUE" ;;
  *) exit 1 ;;
esac
"#;

/// Connector that runs the system `ssh` client as a ControlMaster.
///
/// The master process stays up for the life of the session; readiness and
/// teardown go through `ssh -O check` / `ssh -O exit` on its control socket.
/// Passwords reach `ssh` through a private askpass helper and never appear
/// on a command line.
pub struct OpenSshConnector {
    ssh_binary: String,
    runtime_dir: PathBuf,
}

impl OpenSshConnector {
    pub fn new(ssh_binary: impl Into<String>) -> Self {
        Self::with_runtime_dir(ssh_binary, std::env::temp_dir())
    }

    /// Place control sockets and the askpass helper in `dir`.
    pub fn with_runtime_dir(ssh_binary: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            ssh_binary: ssh_binary.into(),
            runtime_dir: dir.into(),
        }
    }

    /// Control socket for one session. Every call yields a fresh path, so a
    /// second session to the same destination never multiplexes onto (or
    /// tears down) an existing master.
    fn control_path(&self, config: &ConnectionConfig) -> PathBuf {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        config.destination().hash(&mut hasher);
        config.port.hash(&mut hasher);
        Uuid::new_v4().hash(&mut hasher);
        self.runtime_dir
            .join(format!("tether-ssh-{:x}.sock", hasher.finish()))
    }

    /// Write the askpass helper into a private directory that lives as long
    /// as the returned handle.
    async fn write_askpass(&self) -> Result<(TempDir, PathBuf), RemoteError> {
        let dir = tempfile::Builder::new()
            .prefix("tether-askpass-")
            .tempdir_in(&self.runtime_dir)
            .map_err(|e| RemoteError::Connect(format!("cannot create askpass directory: {e}")))?;
        let path = dir.path().join("askpass.sh");
        tokio::fs::write(&path, ASKPASS_SCRIPT)
            .await
            .map_err(|e| RemoteError::Connect(format!("cannot write askpass helper: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))
                .await
                .map_err(|e| RemoteError::Connect(format!("cannot protect askpass helper: {e}")))?;
        }
        Ok((dir, path))
    }

    fn base_args(config: &ConnectionConfig, control_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!("ControlPath={}", control_path.display()),
            "-p".to_string(),
            config.port.to_string(),
        ];
        if !config.username.is_empty() {
            args.push("-l".to_string());
            args.push(config.username.clone());
        }
        args
    }

    fn master_command(
        &self,
        config: &ConnectionConfig,
        control_path: &Path,
        askpass: Option<&Path>,
    ) -> Command {
        let mut cmd = Command::new(&self.ssh_binary);
        cmd.args(Self::base_args(config, control_path))
            .args(["-o", "ControlMaster=yes", "-o", "ControlPersist=no"])
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .args(["-o", "ServerAliveInterval=30"])
            .arg("-N");

        match config.auth_method {
            AuthMethod::Key => {
                if let Some(key) = &config.private_key_path {
                    cmd.args(["-i", key.as_str(), "-o", "IdentitiesOnly=yes"]);
                }
                cmd.args(["-o", "BatchMode=yes"]);
            }
            AuthMethod::Agent => {
                cmd.args(["-o", "BatchMode=yes"]);
            }
            AuthMethod::Password => {
                cmd.args([
                    "-o",
                    "PreferredAuthentications=password,keyboard-interactive",
                    "-o",
                    "PubkeyAuthentication=no",
                    "-o",
                    "NumberOfPasswordPrompts=1",
                ]);
            }
        }
        cmd.arg(&config.host);

        if let (Some(askpass), Some(password)) = (askpass, config.password.as_deref()) {
            cmd.env("SSH_ASKPASS", askpass)
                .env("SSH_ASKPASS_REQUIRE", "force")
                .env("DISPLAY", ":0")
                .env(ASKPASS_ENV, password);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RemoteConnector for OpenSshConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let control_path = self.control_path(config);
        let (askpass_dir, askpass) = match config.auth_method {
            AuthMethod::Password => {
                let (dir, path) = self.write_askpass().await?;
                (Some(dir), Some(path))
            }
            _ => (None, None),
        };

        let mut master = self
            .master_command(config, &control_path, askpass.as_deref())
            .spawn()
            .map_err(|e| RemoteError::Connect(format!("failed to start {}: {e}", self.ssh_binary)))?;
        debug!(host = %config.host, control = %control_path.display(), "ssh master spawned");

        let session = OpenSshSession {
            ssh_binary: self.ssh_binary.clone(),
            host: config.host.clone(),
            base_args: Self::base_args(config, &control_path),
            control_path,
            master: None,
            askpass_dir,
        };

        loop {
            if session.control_op("check").await {
                info!(host = %config.host, "ssh control master ready");
                return Ok(Box::new(OpenSshSession {
                    master: Some(master),
                    ..session
                }));
            }

            if let Ok(Some(status)) = master.try_wait() {
                let mut stderr = String::new();
                if let Some(mut pipe) = master.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                let stderr = stderr.trim();
                return Err(RemoteError::Connect(if stderr.is_empty() {
                    format!("ssh exited before the connection was ready ({status})")
                } else {
                    stderr.to_string()
                }));
            }

            tokio::time::sleep(READY_POLL).await;
        }
    }
}

/// A live ControlMaster session.
pub struct OpenSshSession {
    ssh_binary: String,
    host: String,
    base_args: Vec<String>,
    control_path: PathBuf,
    master: Option<Child>,
    askpass_dir: Option<TempDir>,
}

impl OpenSshSession {
    /// Run `ssh -O <op>` against the control socket; true on exit status 0.
    async fn control_op(&self, op: &str) -> bool {
        Command::new(&self.ssh_binary)
            .args(&self.base_args)
            .args(["-o", "BatchMode=yes", "-O", op])
            .arg(&self.host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn close(mut self: Box<Self>) -> Result<(), RemoteError> {
        if !self.control_op("exit").await {
            debug!(host = %self.host, "control master did not acknowledge exit");
        }
        let result = match self.master.take() {
            Some(mut child) => match child.kill().await {
                Ok(()) => Ok(()),
                // Already gone after `-O exit`.
                Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
                Err(e) => Err(RemoteError::Teardown(e.to_string())),
            },
            None => Ok(()),
        };
        if let Err(e) = tokio::fs::remove_file(&self.control_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.control_path.display(), error = %e, "stale control socket left behind");
            }
        }
        if let Some(dir) = self.askpass_dir.take() {
            if let Err(e) = dir.close() {
                warn!(error = %e, "askpass helper left behind");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ConnectionConfig {
        ConnectionConfig {
            host: "example.org".into(),
            port: 2222,
            username: "deploy".into(),
            auth_method: AuthMethod::Password,
            private_key_path: None,
            password: Some("hunter2".into()),
        }
    }

    #[test]
    fn password_never_on_command_line() {
        let connector = OpenSshConnector::with_runtime_dir("ssh", "/tmp");
        let control = connector.control_path(&cfg());
        let cmd = connector.master_command(&cfg(), &control, Some(Path::new("/tmp/askpass.sh")));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(!args.iter().any(|a| a.contains("hunter2")));
        assert!(args.contains(&"ControlMaster=yes".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-p" && w[1] == "2222"));
        assert!(args.windows(2).any(|w| w[0] == "-l" && w[1] == "deploy"));
        assert_eq!(args.last().map(String::as_str), Some("example.org"));

        let envs: Vec<_> = cmd.as_std().get_envs().collect();
        assert!(envs
            .iter()
            .any(|(k, v)| *k == ASKPASS_ENV && v.is_some_and(|v| v == "hunter2")));
    }

    #[test]
    fn control_path_is_unique_per_session() {
        let connector = OpenSshConnector::with_runtime_dir("ssh", "/tmp");
        let a = connector.control_path(&cfg());
        let b = connector.control_path(&cfg());
        assert_ne!(a, b);
        assert!(a.starts_with("/tmp"));
    }

    #[tokio::test]
    async fn askpass_helper_lives_in_private_dir() {
        let runtime = tempfile::tempdir().unwrap();
        let connector = OpenSshConnector::with_runtime_dir("ssh", runtime.path());
        let (first, first_path) = connector.write_askpass().await.unwrap();
        let (second, second_path) = connector.write_askpass().await.unwrap();

        assert_ne!(first_path, second_path);
        assert!(first_path.starts_with(first.path()));
        assert_eq!(std::fs::read_to_string(&first_path).unwrap(), ASKPASS_SCRIPT);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(first.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o077, 0);
        }

        let dir = first.path().to_path_buf();
        first.close().unwrap();
        assert!(!dir.exists());
        assert!(second_path.exists());
        drop(second);
        assert!(!second_path.exists());
    }

    #[tokio::test]
    async fn missing_binary_fails_to_connect() {
        let dir = tempfile::tempdir().unwrap();
        let connector =
            OpenSshConnector::with_runtime_dir("/nonexistent/tether-ssh-binary", dir.path());
        let mut c = cfg();
        c.auth_method = AuthMethod::Agent;
        c.password = None;
        match connector.open(&c).await {
            Err(RemoteError::Connect(msg)) => assert!(msg.contains("failed to start")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connected without an ssh binary"),
        }
    }
}
