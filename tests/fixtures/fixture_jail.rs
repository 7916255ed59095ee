use anyhow::Result;
use log::{error, warn};
use rand::Rng;
use rstest::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Unprivileged account every test runs its sandboxed commands as.
pub const TEST_USER: &str = "nobody";

pub fn rid() -> String {
    let mut rng = rand::rng();
    let rid: String = (0..10)
        .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
        .collect();
    rid
}

pub fn get_jail_bin() -> String {
    env!("CARGO_BIN_EXE_overjail").to_string()
}

pub struct JailManager {
    pub base_dir: PathBuf,
    pub last_stdout: String,
    pub last_stderr: String,
    pub last_code: Option<i32>,
    /* already root, so there is no need to go through sudo */
    pub no_sudo: bool,
    pub jail_bin: String,
    pub no_default_options: bool,
    mount_capable: Option<bool>,
}

impl JailManager {
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from(format!("/tmp/overjail-test-{}", rid())),
            last_stdout: String::new(),
            last_stderr: String::new(),
            last_code: None,
            no_sudo: nix::unistd::geteuid().is_root(),
            jail_bin: get_jail_bin(),
            no_default_options: false,
            mount_capable: None,
        }
    }

    /* `wrapper` runs the binary on our behalf, after sudo if there is one */
    fn command(&self, wrapper: &[String], args: &[&str]) -> Command {
        let mut argv: Vec<String> = vec![];
        if !self.no_sudo {
            argv.extend(["sudo", "-n", "-E"].map(String::from));
        }
        argv.extend(wrapper.iter().cloned());
        argv.push(self.jail_bin.clone());

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);

        if !self.no_default_options {
            if !args.iter().any(|arg| arg.starts_with("--base-dir")) {
                cmd.arg(format!("--base-dir={}", self.base_dir.display()));
            }
            if !args.iter().any(|arg| arg.starts_with("--user=")) {
                cmd.arg(format!("--user={}", TEST_USER));
            }
            cmd.arg("--no-config");
            if !args.iter().any(|arg| {
                arg.starts_with("--log-level") || arg.starts_with("-v")
            }) {
                cmd.arg("-v");
            }
        }
        cmd.args(args);
        cmd
    }

    fn execute(&mut self, mut cmd: Command) -> Result<std::process::Output> {
        println!(
            "Running command: {} {}",
            cmd.get_program().to_string_lossy(),
            cmd.get_args()
                .map(|c| c.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        let output = cmd
            .output()
            .map_err(|e| anyhow::anyhow!("Command failed: {}", e))?;
        self.last_stdout = String::from_utf8_lossy(&output.stdout).to_string();
        self.last_stderr = String::from_utf8_lossy(&output.stderr).to_string();
        self.last_code = output.status.code();
        Ok(output)
    }

    /// Runs the binary and records its output, whatever the exit status.
    pub fn run_raw(&mut self, args: &[&str]) -> Result<std::process::Output> {
        let cmd = self.command(&[], args);
        self.execute(cmd)
    }

    /// Same as `run_raw`, but the binary itself runs as `TEST_USER` instead of
    /// root.
    #[allow(dead_code)]
    pub fn run_as_test_user(
        &mut self,
        args: &[&str],
    ) -> Result<std::process::Output> {
        let user = nix::unistd::User::from_name(TEST_USER)?
            .ok_or_else(|| anyhow::anyhow!("{} does not exist", TEST_USER))?;
        let wrapper = vec![
            "setpriv".to_string(),
            format!("--reuid={}", user.uid),
            format!("--regid={}", user.gid),
            "--clear-groups".to_string(),
        ];
        let cmd = self.command(&wrapper, args);
        self.execute(cmd)
    }

    /**
     * Whether `TEST_USER` can run the binary and create user namespaces here.
     * setpriv has to exist, the build directory has to be reachable by that
     * user, and the host must not restrict unprivileged user namespaces.
     */
    #[allow(dead_code)]
    pub fn can_use_user_namespace(&mut self) -> bool {
        let restricted = [
            ("/proc/sys/kernel/unprivileged_userns_clone", "0"),
            ("/proc/sys/user/max_user_namespaces", "0"),
            ("/proc/sys/kernel/apparmor_restrict_unprivileged_userns", "1"),
        ]
        .iter()
        .any(|(knob, value)| {
            std::fs::read_to_string(knob)
                .map(|current| current.trim() == *value)
                .unwrap_or(false)
        });
        if restricted {
            println!("Skipping, unprivileged user namespaces are restricted");
            return false;
        }

        let reachable = matches!(
            self.run_as_test_user(&["--version"]),
            Ok(output) if output.status.success()
        );
        if !reachable {
            println!(
                "Skipping, {} cannot run {}: {}",
                TEST_USER, self.jail_bin, self.last_stderr
            );
        }
        reachable
    }

    pub fn run(&mut self, args: &[&str]) -> Result<std::process::Output> {
        let output = self.run_raw(args)?;
        match output.status.code() {
            Some(0) => Ok(output),
            Some(code) => Err(anyhow::anyhow!(
                "Command returned non-zero exit code: {}\nstdout: {}\nstderr: {}",
                code,
                self.last_stdout,
                self.last_stderr
            )),
            None => Err(anyhow::anyhow!(
                "Command did not return a valid exit code\nstdout: {}\nstderr: {}",
                self.last_stdout,
                self.last_stderr
            )),
        }
    }

    #[allow(dead_code)]
    pub fn pass(&mut self, args: &[&str]) -> bool {
        if self.run(args).is_ok() {
            return true;
        }
        println!("last_stderr: {}", self.last_stderr);
        println!("last_stdout: {}", self.last_stdout);
        false
    }

    #[allow(dead_code)]
    pub fn xfail(&mut self, args: &[&str]) -> bool {
        if self.run(args).is_ok() {
            println!("last_stderr: {}", self.last_stderr);
            println!("last_stdout: {}", self.last_stdout);
            return false;
        }
        true
    }

    /**
     * Whether this host lets us build a sandbox at all: we need root (directly
     * or through passwordless sudo), overlayfs and mount namespaces. Tests that
     * need mounts return early when this is false.
     */
    #[allow(dead_code)]
    pub fn can_mount(&mut self) -> bool {
        if let Some(capable) = self.mount_capable {
            return capable;
        }
        let capable = self.pass(&["prepare"]) && self.pass(&["run", "true"]);
        if !capable {
            warn!(
                "Skipping, unable to build a sandbox here: {}",
                self.last_stderr
            );
            println!("Skipping, unable to build a sandbox on this host");
        }
        let _ = self.run(&["destroy"]);
        self.mount_capable = Some(capable);
        capable
    }

    #[allow(dead_code)]
    pub fn overlay_dir(&self) -> PathBuf {
        self.base_dir.join("overlay")
    }

    /// Whether a host path shows up inside the prepared overlay. Only the root
    /// filesystem is overlaid, so paths on other mounts do not.
    #[allow(dead_code)]
    pub fn visible_in_overlay(&self, path: &Path) -> bool {
        match path.strip_prefix("/") {
            Ok(rel) => self.overlay_dir().join(rel).exists(),
            Err(_) => false,
        }
    }

    #[allow(dead_code)]
    pub fn mounts_below_base(&self) -> Result<Vec<String>> {
        let mounts = std::fs::read_to_string("/proc/mounts")?;
        Ok(mounts
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .filter(|dir| Path::new(dir).starts_with(&self.base_dir))
            .map(String::from)
            .collect())
    }
}

impl Drop for JailManager {
    fn drop(&mut self) {
        if self.mount_capable != Some(true) {
            return;
        }
        self.no_default_options = false;
        if let Err(e) = self.run(&["destroy"]) {
            error!("Failed to destroy sandbox: {}", e);
            error!("last_stderr: {}", self.last_stderr);
            error!("last_stdout: {}", self.last_stdout);
        }
    }
}

#[fixture]
pub fn jail() -> JailManager {
    JailManager::new()
}
