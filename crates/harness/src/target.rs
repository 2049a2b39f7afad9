//! Target application management
//!
//! The application under test is an externally served web app. The harness
//! either attaches to a running instance or spawns one (typically the Vite dev
//! server) and in both cases blocks until the app answers HTTP before any
//! browser step runs.

use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{HarnessError, HarnessResult};

/// How to start the application, when the harness owns its lifecycle
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    /// Program to run (e.g. `npm`)
    pub program: String,

    /// Arguments (e.g. `["run", "dev"]`)
    pub args: Vec<String>,

    /// Environment variable to pass the chosen port through, if any
    pub port_env: Option<String>,
}

/// Configuration for reaching the application under test
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// Base URL of the application
    pub base_url: String,

    /// Spawn the application instead of attaching to a running one
    pub spawn: Option<SpawnSpec>,

    /// Path probed for readiness, relative to the base URL
    pub health_path: String,

    /// How long to wait for the application to answer
    pub startup_timeout: Duration,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5173".to_string(),
            spawn: None,
            health_path: "/".to_string(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle to the application under test
///
/// Dropping the handle releases the spawned process unconditionally; an
/// attached instance is left alone.
pub struct TargetHandle {
    child: Option<Child>,
    base_url: String,
}

impl TargetHandle {
    /// Reach the application, spawning it first if configured
    pub async fn acquire(config: TargetConfig) -> HarnessResult<Self> {
        let child = match &config.spawn {
            Some(spec) => {
                info!("Spawning target application: {} {}", spec.program, spec.args.join(" "));

                let mut cmd = Command::new(&spec.program);
                cmd.args(&spec.args)
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());

                if let Some(port_env) = &spec.port_env {
                    if let Some(port) = port_from_url(&config.base_url) {
                        cmd.env(port_env, port.to_string());
                    }
                }

                Some(cmd.spawn().map_err(|e| {
                    HarnessError::TargetSpawn(format!("{}: {}", spec.program, e))
                })?)
            }
            None => None,
        };

        let handle = Self {
            child,
            base_url: config.base_url.clone(),
        };

        handle
            .wait_for_ready(&config.health_path, config.startup_timeout)
            .await?;

        info!("Target application ready at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the application until it answers or the timeout elapses
    async fn wait_for_ready(&self, health_path: &str, timeout: Duration) -> HarnessResult<()> {
        let url = format!("{}{}", self.base_url, health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    warn!("Readiness probe returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for target application...");
                    }
                    // Connection refused is expected while the app is starting
                    if !e.is_connect() {
                        warn!("Readiness probe error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(HarnessError::TargetUnreachable {
            url: self.base_url.clone(),
            attempts,
        })
    }

    /// Base URL of the application
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the spawned application, if the harness owns one
    pub fn stop(&mut self) -> HarnessResult<()> {
        if let Some(mut child) = self.child.take() {
            info!("Stopping target application (pid: {})", child.id());

            // Graceful shutdown first, then force
            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                let pid = Pid::from_raw(child.id() as i32);
                if kill(pid, Signal::SIGTERM).is_ok() {
                    std::thread::sleep(Duration::from_millis(500));
                }
            }

            let _ = child.kill();
            let _ = child.wait();
        }
        Ok(())
    }
}

impl Drop for TargetHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Extract the port from an http(s) base URL
fn port_from_url(url: &str) -> Option<u16> {
    let rest = url.strip_prefix("http://").or_else(|| url.strip_prefix("https://"))?;
    let authority = rest.split('/').next()?;
    authority.rsplit_once(':')?.1.parse().ok()
}

/// Find a free port for spawned-mode runs
pub fn find_free_port() -> HarnessResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_find_free_port() {
        let port1 = find_free_port().unwrap();
        let port2 = find_free_port().unwrap();

        assert!(port1 > 1024);
        assert!(port2 > 1024);
    }

    #[test_case("http://127.0.0.1:5173", Some(5173); "plain http")]
    #[test_case("https://localhost:8443/app", Some(8443); "https with path")]
    #[test_case("http://localhost", None; "no port")]
    fn test_port_from_url(url: &str, expected: Option<u16>) {
        assert_eq!(port_from_url(url), expected);
    }

    #[test]
    fn test_default_config_targets_dev_server() {
        let config = TargetConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:5173");
        assert!(config.spawn.is_none());
    }

    #[tokio::test]
    async fn test_attach_unreachable_fails() {
        // Nothing listens on this port; the probe must fail within the timeout
        let port = find_free_port().unwrap();
        let config = TargetConfig {
            base_url: format!("http://127.0.0.1:{}", port),
            startup_timeout: Duration::from_millis(300),
            ..Default::default()
        };

        let err = TargetHandle::acquire(config).await.err().expect("must fail");
        assert!(matches!(err, HarnessError::TargetUnreachable { .. }));
    }
}
