//! End-to-end tests for the block-runtime binary
//!
//! These tests run the real binary with XDG directories redirected to a
//! temporary directory, so they never touch the user's config or socket.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

/// Isolated config, data and runtime directories for one test
struct TestContext {
    _temp: tempfile::TempDir,
    config_home: PathBuf,
    data_home: PathBuf,
    runtime_dir: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let config_home = temp.path().join("config");
        let data_home = temp.path().join("data");
        let runtime_dir = temp.path().join("runtime");
        for dir in [&config_home, &data_home, &runtime_dir] {
            std::fs::create_dir_all(dir).expect("Failed to create test dir");
        }
        Self {
            _temp: temp,
            config_home,
            data_home,
            runtime_dir,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_block-runtime"));
        cmd.env("XDG_CONFIG_HOME", &self.config_home)
            .env("XDG_DATA_HOME", &self.data_home)
            .env("XDG_RUNTIME_DIR", &self.runtime_dir)
            .env("RUST_LOG", "warn");
        cmd
    }

    /// Run a one-shot subcommand
    fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .expect("Failed to run block-runtime")
    }

    fn write_config(&self, content: &str) {
        let dir = self.config_home.join("block-runtime");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), content).unwrap();
    }

    fn socket_path(&self) -> PathBuf {
        self.runtime_dir.join("block-runtime").join("runtime.sock")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn wait_for_file(path: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn test_config_shows_file_values() {
    let ctx = TestContext::new();
    ctx.write_config("[queues]\nmax_messages = 16\n");

    let output = ctx.run(&["config"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("max_messages = 16"), "stdout: {out}");
    assert!(out.contains("push_msg_secs = 3"), "stdout: {out}");
}

#[test]
fn test_config_rejects_invalid_file() {
    let ctx = TestContext::new();
    ctx.write_config("[queues]\nmax_input_text = 0\n");

    let output = ctx.run(&["config"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("max_input_text"));
}

#[test]
fn test_controller_without_runtime() {
    let ctx = TestContext::new();
    let output = ctx.run(&["threads"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Runtime is not running"));
}

#[cfg(unix)]
struct Server(Child);

#[cfg(unix)]
impl Server {
    fn start(ctx: &TestContext) -> Self {
        let child = ctx
            .command()
            .arg("serve")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn runtime");
        let server = Server(child);
        assert!(
            wait_for_file(&ctx.socket_path(), Duration::from_secs(10)),
            "runtime socket never appeared"
        );
        server
    }

    /// Send SIGTERM and wait for a clean exit
    fn stop(mut self) -> std::process::ExitStatus {
        unsafe {
            libc::kill(self.0.id() as libc::pid_t, libc::SIGTERM);
        }
        self.0.wait().expect("Failed to wait for runtime")
    }
}

#[cfg(unix)]
#[test]
fn test_controller_session_against_served_runtime() {
    let ctx = TestContext::new();
    let server = Server::start(&ctx);

    let output = ctx.run(&["entry-points"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("No entry points"));

    let output = ctx.run(&["threads"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("No threads"));

    let output = ctx.run(&["breakpoint", "add", "blockA", "blockB"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Added 2 breakpoint(s)"));

    let output = ctx.run(&["globals"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("No variables"));

    let output = ctx.run(&["resume", "42"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("NO_SUCH_THREAD"), "stderr: {}", stderr(&output));

    let output = ctx.run(&["list", "missing", "--start", "-2", "--length", "-3"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("missing"), "stderr: {}", stderr(&output));

    let output = ctx.run(&["input", "hello"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let status = server.stop();
    assert!(status.success());
    assert!(!ctx.socket_path().exists());
}
