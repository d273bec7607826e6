use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::{CommandOutput, ExecCallback, ExecConfig, ExecEvent, StreamType};
use taskpilot_plan::PlatformFamily;

/// How a shell line is handed to the operating system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInvocation {
    /// `cmd.exe /C <line>`
    WindowsCmd,
    /// The system command interpreter (`COMSPEC`), no interpreter forced
    WindowsSystemDefault,
    /// `sh -c <line>`
    Posix,
}

impl ShellInvocation {
    /// Pick the invocation for a line on the given platform.
    ///
    /// On Windows, lines mentioning PowerShell are left to the system
    /// interpreter instead of being forced through `cmd.exe`.
    pub fn for_line(family: PlatformFamily, line: &str) -> Self {
        if !family.is_windows() {
            return ShellInvocation::Posix;
        }
        if line.to_lowercase().contains("powershell") {
            ShellInvocation::WindowsSystemDefault
        } else {
            ShellInvocation::WindowsCmd
        }
    }

    /// Program and the arguments preceding the shell line
    pub fn program(&self) -> (String, &'static [&'static str]) {
        match self {
            ShellInvocation::WindowsCmd => ("cmd.exe".to_string(), &["/C"]),
            ShellInvocation::WindowsSystemDefault => (
                std::env::var("COMSPEC").unwrap_or_else(|_| "cmd".to_string()),
                &["/C"],
            ),
            ShellInvocation::Posix => ("sh".to_string(), &["-c"]),
        }
    }

    fn command(&self, line: &str) -> Command {
        let (program, args) = self.program();
        let mut cmd = Command::new(program);
        cmd.args(args);
        push_line(&mut cmd, self, line);
        cmd
    }
}

#[cfg(windows)]
fn push_line(cmd: &mut Command, invocation: &ShellInvocation, line: &str) {
    match invocation {
        // cmd.exe does its own parsing of the remainder of the command line
        ShellInvocation::WindowsCmd | ShellInvocation::WindowsSystemDefault => {
            cmd.raw_arg(line);
        }
        ShellInvocation::Posix => {
            cmd.arg(line);
        }
    }
}

#[cfg(not(windows))]
fn push_line(cmd: &mut Command, _invocation: &ShellInvocation, line: &str) {
    cmd.arg(line);
}

/// Run one shell line to completion, capturing its output.
///
/// Returns `Err` only when the process could not be launched. Once it is
/// running, the child is always waited on.
pub(crate) async fn run_line(
    index: usize,
    line: &str,
    config: &ExecConfig,
    on_event: Option<&ExecCallback>,
) -> std::io::Result<CommandOutput> {
    let start = Instant::now();
    let invocation = ShellInvocation::for_line(config.platform.family, line);

    debug!(
        index,
        command = line,
        invocation = ?invocation,
        working_dir = %config.working_dir.display(),
        "Spawning shell command"
    );

    let mut cmd = invocation.command(line);
    cmd.current_dir(&config.working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    for (key, value) in &config.env_vars {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn()?;

    let stdout_handle = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
    let stderr_handle = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

    let mut stdout_reader = BufReader::new(stdout_handle);
    let mut stderr_reader = BufReader::new(stderr_handle);
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut stdout_open = true;
    let mut stderr_open = true;

    // Read both streams concurrently. Output is decoded lossily so that
    // non-UTF-8 bytes never turn a finished command into a launch error.
    while stdout_open || stderr_open {
        tokio::select! {
            result = next_line(&mut stdout_reader, &mut stdout_buf), if stdout_open => {
                match result {
                    Some(line) => {
                        trace!(line = %line, "stdout");
                        emit_line(on_event, index, StreamType::Stdout, &line);
                        append_line(&mut stdout, &line);
                    }
                    None => stdout_open = false,
                }
            }
            result = next_line(&mut stderr_reader, &mut stderr_buf), if stderr_open => {
                match result {
                    Some(line) => {
                        trace!(line = %line, "stderr");
                        emit_line(on_event, index, StreamType::Stderr, &line);
                        append_line(&mut stderr, &line);
                    }
                    None => stderr_open = false,
                }
            }
        }
    }

    let status = child.wait().await?;
    let duration = start.elapsed();

    debug!(
        index,
        exit_code = ?status.code(),
        duration_ms = duration.as_millis(),
        "Shell command completed"
    );

    Ok(CommandOutput {
        index,
        command: line.to_string(),
        stdout,
        stderr,
        exit_code: status.code(),
        duration,
    })
}

/// Read one line, decoding invalid UTF-8 lossily. `None` at end of stream
/// or on a read error; the exit status still decides success.
///
/// Bytes of a partially read line stay in `buf` when the future is dropped
/// by `select!`, so the next call continues that line.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    match reader.read_until(b'\n', buf).await {
        Ok(0) if buf.is_empty() => None,
        Ok(_) => {
            let mut end = buf.len();
            if buf[..end].ends_with(b"\n") {
                end -= 1;
            }
            if buf[..end].ends_with(b"\r") {
                end -= 1;
            }
            let line = String::from_utf8_lossy(&buf[..end]).into_owned();
            buf.clear();
            Some(line)
        }
        Err(e) => {
            warn!(error = %e, "Failed to read command output; ignoring the rest of the stream");
            None
        }
    }
}

fn emit_line(on_event: Option<&ExecCallback>, index: usize, stream: StreamType, line: &str) {
    if let Some(callback) = on_event {
        callback(ExecEvent::OutputLine {
            index,
            stream,
            line,
        });
    }
}

fn append_line(buffer: &mut String, line: &str) {
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_platforms_always_use_sh() {
        for family in [PlatformFamily::Linux, PlatformFamily::MacOs, PlatformFamily::Other] {
            assert_eq!(
                ShellInvocation::for_line(family, "powershell -Command ls"),
                ShellInvocation::Posix
            );
        }
        assert_eq!(ShellInvocation::Posix.program(), ("sh".to_string(), &["-c"][..]));
    }

    #[test]
    fn test_windows_forces_cmd() {
        assert_eq!(
            ShellInvocation::for_line(PlatformFamily::Windows, "dir /b"),
            ShellInvocation::WindowsCmd
        );
        assert_eq!(ShellInvocation::WindowsCmd.program().0, "cmd.exe");
    }

    #[test]
    fn test_windows_powershell_detection_is_case_insensitive() {
        for line in [
            "powershell -Command Get-ChildItem",
            "PowerShell -Command Get-Date",
            "echo hi | POWERSHELL -",
        ] {
            assert_eq!(
                ShellInvocation::for_line(PlatformFamily::Windows, line),
                ShellInvocation::WindowsSystemDefault
            );
        }
    }
}
