use super::{classify_stderr, ErrorClass, SandboxError};
use crate::config::{PathMappingMode, SandboxConfig, SandboxMode};
use crate::provider::ProviderKind;
use crate::queue::PathMapping;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub const MAPPED_CONTAINER_WORKDIR: &str = "/workspace";
pub const CONTAINER_HOME_DIR: &str = ".tinyclaw-home";
pub const DOCTOR_REMEDIATION: &str =
    "Run the sandbox doctor to install or repair the container runtime.";

#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub agent_id: String,
    pub provider: ProviderKind,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone)]
pub struct SandboxRun {
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub mode: SandboxMode,
    pub path_mappings: Vec<PathMapping>,
}

pub fn run_sandboxed(request: &SandboxRequest) -> Result<SandboxRun, SandboxError> {
    match request.sandbox.mode {
        SandboxMode::Host => run_host(request),
        SandboxMode::Docker | SandboxMode::Apple => run_container(request),
    }
}

fn run_host(request: &SandboxRequest) -> Result<SandboxRun, SandboxError> {
    let mut command = Command::new(&request.command);
    command
        .current_dir(&request.working_dir)
        .args(&request.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = command.spawn().map_err(|err| {
        SandboxError::transient(
            format!("failed to spawn `{}`: {err}", request.command),
            "The agent could not be started. Please try again.",
        )
    })?;

    let collected = wait_with_timeout(child, timeout_of(request))?;
    let workdir = request.working_dir.display().to_string();
    let mappings = vec![PathMapping::same(&workdir)];

    if !collected.exit_success {
        return Err(SandboxError::transient(
            format!(
                "agent process for `{}` exited with code {}: {}",
                request.agent_id, collected.exit_code, collected.stderr
            ),
            "The agent failed to produce a response. Please try again.",
        ));
    }

    Ok(SandboxRun {
        stdout: collected.stdout,
        stderr: collected.stderr,
        duration_ms: collected.duration_ms,
        mode: SandboxMode::Host,
        path_mappings: mappings,
    })
}

fn run_container(request: &SandboxRequest) -> Result<SandboxRun, SandboxError> {
    let plan = build_container_plan(request)?;

    let home_dir = request.working_dir.join(CONTAINER_HOME_DIR);
    fs::create_dir_all(&home_dir).map_err(|err| {
        SandboxError::transient(
            format!("failed to create {}: {err}", home_dir.display()),
            "The agent workspace could not be prepared. Please try again.",
        )
    })?;

    let mut command = Command::new(&plan.binary);
    command
        .args(&plan.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SandboxError::terminal(
                format!(
                    "container runtime `{}` is not installed or not on PATH",
                    plan.binary
                ),
                Some(DOCTOR_REMEDIATION.to_string()),
                "The agent sandbox runtime is not available on this machine.",
            ));
        }
        Err(err) => {
            return Err(SandboxError::transient(
                format!("failed to spawn `{}`: {err}", plan.binary),
                "The agent sandbox could not be started. Please try again.",
            ));
        }
    };

    let collected = wait_with_timeout(child, timeout_of(request))?;

    if !collected.exit_success {
        let reason = format!(
            "container for `{}` exited with code {}: {}",
            request.agent_id, collected.exit_code, collected.stderr
        );
        return Err(match classify_stderr(&collected.stderr) {
            ErrorClass::Terminal => SandboxError::terminal(
                reason,
                Some(DOCTOR_REMEDIATION.to_string()),
                "The agent sandbox is misconfigured and could not run.",
            ),
            ErrorClass::Transient => SandboxError::transient(
                reason,
                "The agent failed inside its sandbox. Please try again.",
            ),
        });
    }

    Ok(SandboxRun {
        stdout: collected.stdout,
        stderr: collected.stderr,
        duration_ms: collected.duration_ms,
        mode: request.sandbox.mode,
        path_mappings: plan.path_mappings,
    })
}

struct ContainerPlan {
    binary: String,
    args: Vec<String>,
    path_mappings: Vec<PathMapping>,
}

fn build_container_plan(request: &SandboxRequest) -> Result<ContainerPlan, SandboxError> {
    let sandbox = &request.sandbox;
    let required_key = request.provider.required_env_key();

    if !sandbox.env_allowlist.iter().any(|key| key == required_key) {
        return Err(SandboxError::terminal(
            format!(
                "sandbox env allowlist does not include `{required_key}`, required by the {} provider",
                request.provider
            ),
            Some(format!("Add `{required_key}` to `sandbox.env_allowlist`.")),
            "The agent sandbox is not allowed to pass the provider API key.",
        ));
    }
    if std::env::var_os(required_key).is_none() {
        return Err(SandboxError::terminal(
            format!("`{required_key}` is not set in the environment"),
            Some(format!("Export `{required_key}` before starting the processor.")),
            "The provider API key is not configured on this machine.",
        ));
    }

    let (binary, image, network, memory, cpus, pids_limit) = match sandbox.mode {
        SandboxMode::Docker => (
            "docker".to_string(),
            sandbox.docker.image.clone(),
            sandbox.docker.network.clone(),
            sandbox.docker.memory.clone(),
            sandbox.docker.cpus.clone(),
            Some(sandbox.docker.pids_limit),
        ),
        SandboxMode::Apple => (
            sandbox.apple.runtime_command.clone(),
            sandbox.apple.image.clone(),
            sandbox.apple.network.clone(),
            sandbox.apple.memory.clone(),
            sandbox.apple.cpus.clone(),
            None,
        ),
        SandboxMode::Host => unreachable!("host mode never builds a container plan"),
    };

    match network.as_str() {
        "default" | "restricted" => {}
        "none" => {
            return Err(SandboxError::terminal(
                format!(
                    "sandbox network is `none`, which blocks the {} provider",
                    request.provider
                ),
                Some("Set the sandbox network to `default` or `restricted`.".to_string()),
                "The agent sandbox has no network access to reach its provider.",
            ));
        }
        other => {
            return Err(SandboxError::terminal(
                format!("unknown sandbox network `{other}`"),
                Some("Set the sandbox network to `default` or `restricted`.".to_string()),
                "The agent sandbox network setting is invalid.",
            ));
        }
    }

    let host_workdir = request.working_dir.display().to_string();
    let (container_workdir, path_mappings) = match sandbox.path_mapping_mode {
        PathMappingMode::SamePath => (host_workdir.clone(), vec![PathMapping::same(&host_workdir)]),
        PathMappingMode::Mapped => (
            MAPPED_CONTAINER_WORKDIR.to_string(),
            vec![PathMapping {
                container_prefix: MAPPED_CONTAINER_WORKDIR.to_string(),
                host_prefix: host_workdir.clone(),
            }],
        ),
    };

    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--workdir".to_string(),
        container_workdir.clone(),
        "--network".to_string(),
        "bridge".to_string(),
        "--memory".to_string(),
        memory,
        "--cpus".to_string(),
        cpus,
    ];
    if let Some(pids_limit) = pids_limit {
        args.extend([
            "--pull".to_string(),
            "missing".to_string(),
            "--pids-limit".to_string(),
            pids_limit.to_string(),
            "--security-opt".to_string(),
            "no-new-privileges".to_string(),
            "--cap-drop".to_string(),
            "ALL".to_string(),
            "--read-only".to_string(),
            "--tmpfs".to_string(),
            "/tmp:rw,noexec,nosuid,size=256m".to_string(),
        ]);
    }
    args.extend([
        "--user".to_string(),
        "1000:1000".to_string(),
        "-v".to_string(),
        format!("{host_workdir}:{container_workdir}"),
        "--env".to_string(),
        format!("HOME={container_workdir}/{CONTAINER_HOME_DIR}"),
    ]);
    for key in &sandbox.env_allowlist {
        if let Ok(value) = std::env::var(key) {
            args.push("--env".to_string());
            args.push(format!("{key}={value}"));
        }
    }
    args.push(image);
    args.push(request.command.clone());
    args.extend(request.args.iter().cloned());

    Ok(ContainerPlan {
        binary,
        args,
        path_mappings,
    })
}

struct CollectedOutput {
    exit_success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
    duration_ms: u64,
}

fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<CollectedOutput, SandboxError> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_reader = thread::spawn(move || read_to_string_opt(stdout));
    let stderr_reader = thread::spawn(move || read_to_string_opt(stderr));

    let start = Instant::now();
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Err(SandboxError::transient(
                        format!("invocation timed out after {}ms", timeout.as_millis()),
                        "The agent took too long to respond. Please try again.",
                    ));
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(err) => {
                return Err(SandboxError::transient(
                    format!("failed to wait for agent process: {err}"),
                    "The agent process could not be monitored. Please try again.",
                ));
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(CollectedOutput {
        exit_success: exit_status.success(),
        exit_code: exit_status.code().unwrap_or(-1),
        stdout,
        stderr,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn read_to_string_opt(pipe: Option<impl Read>) -> String {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_string(&mut buf);
    }
    buf
}

fn timeout_of(request: &SandboxRequest) -> Duration {
    Duration::from_secs(request.sandbox.timeout_seconds)
}
