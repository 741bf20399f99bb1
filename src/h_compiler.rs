use anyhow::{anyhow, bail, Context, Result};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use which::which;

/// Escape analysis with flow explanations.
pub const DEFAULT_GCFLAGS: &str = "-m=2";

#[cfg(windows)]
pub const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
pub const NULL_DEVICE: &str = "/dev/null";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A builder that constructs the `go build` invocation producing escape diagnostics.
#[derive(Debug, Clone)]
pub struct GoBuildCommandBuilder {
    pub packages: Vec<String>,
    pub gcflags: String,
    pub go_binary: Option<PathBuf>,
    pub execution_dir: Option<PathBuf>,
}

impl Default for GoBuildCommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GoBuildCommandBuilder {
    pub fn new() -> Self {
        GoBuildCommandBuilder {
            packages: Vec::new(),
            gcflags: DEFAULT_GCFLAGS.to_string(),
            go_binary: None,
            execution_dir: None,
        }
    }

    pub fn with_packages<S: AsRef<str>>(mut self, packages: &[S]) -> Self {
        self.packages
            .extend(packages.iter().map(|p| p.as_ref().to_string()));
        self
    }

    pub fn with_gcflags(mut self, gcflags: impl Into<String>) -> Self {
        self.gcflags = gcflags.into();
        self
    }

    /// Use this compiler instead of the `go` found on PATH.
    pub fn with_go_binary(mut self, go: Option<PathBuf>) -> Self {
        self.go_binary = go;
        self
    }

    pub fn with_execution_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.execution_dir = dir;
        self
    }

    /// Arguments passed after the compiler binary.
    pub fn build(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            format!("-gcflags={}", self.gcflags),
            "-o".to_string(),
            NULL_DEVICE.to_string(),
        ];
        if self.packages.is_empty() {
            args.push("./...".to_string());
        } else {
            args.extend(self.packages.iter().cloned());
        }
        args
    }

    /// The compiler binary, resolving `go` on PATH when none was given.
    pub fn resolve_program(&self) -> Result<PathBuf> {
        match &self.go_binary {
            Some(path) => Ok(path.clone()),
            None => which("go").map_err(|_| anyhow!("go toolchain not found on PATH")),
        }
    }

    pub fn build_command(&self) -> Result<Command> {
        let mut cmd = Command::new(self.resolve_program()?);
        cmd.args(self.build());
        if let Some(dir) = &self.execution_dir {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

/// The compiler leads its own process group, so a timeout can take its
/// compile and link children down with it.
fn isolate_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }
}

fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            log::debug!("failed to kill process group {}: {}", child.id(), e);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// What one compiler run produced.
#[derive(Debug)]
pub struct CompilerOutput {
    pub diagnostics: String,
    pub status: ExitStatus,
    pub elapsed: Duration,
}

/// Run the compiler and collect its diagnostic stream.
///
/// The Go compiler exits non-zero when a package fails to build, yet the
/// escape diagnostics for the packages that did compile are still on stderr,
/// so only an empty stream with a failure status is an error.
pub fn run_compiler(
    builder: &GoBuildCommandBuilder,
    timeout: Option<Duration>,
) -> Result<CompilerOutput> {
    let mut cmd = builder.build_command()?;
    let program = cmd.get_program().to_string_lossy().into_owned();
    log::info!("running {} {}", program, builder.build().join(" "));
    isolate_process_group(&mut cmd);
    let start = Instant::now();
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {}", program))?;

    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("compiler stderr was not captured"))?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).map(|_| buf)
    });

    let status = loop {
        if let Some(status) = child.try_wait().context("failed to poll compiler")? {
            break status;
        }
        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                log::warn!("killing compiler after {:?}", limit);
                kill_process_group(&mut child);
                // Anything that escaped the group may still hold stderr open.
                drop(reader);
                bail!("compiler timed out after {} s", limit.as_secs());
            }
        }
        thread::sleep(POLL_INTERVAL);
    };

    let bytes = reader
        .join()
        .map_err(|_| anyhow!("stderr reader thread panicked"))?
        .context("failed to read compiler output")?;
    let diagnostics = String::from_utf8_lossy(&bytes).into_owned();
    let elapsed = start.elapsed();

    if !status.success() {
        if diagnostics.trim().is_empty() {
            bail!("go build failed: {}", status);
        }
        log::warn!("go build exited with {}; analysing partial diagnostics", status);
    }
    log::debug!(
        "compiler finished in {} with {} bytes of diagnostics",
        crate::h_fmt::format_duration_secs(elapsed),
        diagnostics.len()
    );
    Ok(CompilerOutput {
        diagnostics,
        status,
        elapsed,
    })
}
