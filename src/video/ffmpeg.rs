//! Shared plumbing for driving the `ffmpeg` and `ffprobe` executables.

use std::io::Read;
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread::JoinHandle;

use tracing::debug;

use crate::error::{Result, VideoError};

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Fail with [`VideoError::ToolMissing`] unless `tool -version` runs cleanly
pub fn ensure_tool(tool: &str) -> Result<()> {
    let available = Command::new(tool)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);

    if available {
        Ok(())
    } else {
        Err(VideoError::ToolMissing { tool: tool.to_string() }.into())
    }
}

/// Log a command line the way it would be typed in a shell
pub fn log_command(cmd: &Command) {
    let args: Vec<String> = cmd
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    debug!("Running: {} {}", cmd.get_program().to_string_lossy(), args.join(" "));
}

/// Drains a child's stderr on a helper thread; the pipe must never fill up
/// while frames are flowing through stdin/stdout.
pub struct StderrCollector {
    handle: Option<JoinHandle<String>>,
}

impl StderrCollector {
    pub fn spawn(stderr: Option<ChildStderr>) -> Self {
        let handle = stderr.map(|mut stderr| {
            std::thread::spawn(move || {
                let mut output = String::new();
                let _ = stderr.read_to_string(&mut output);
                output
            })
        });
        Self { handle }
    }

    /// Everything the child wrote to stderr; only complete once it has exited
    pub fn collect(&mut self) -> String {
        self.handle
            .take()
            .and_then(|handle| handle.join().ok())
            .map(|output| output.trim().to_string())
            .unwrap_or_default()
    }
}

/// Kill a child that is still running and reap it
pub fn terminate(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        let _ = child.kill();
    }
    let _ = child.wait();
}
