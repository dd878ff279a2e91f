use std::fmt::Write as _;
use std::io::Write as _;

use loadgen_core::{ProgressSink, Snapshot};

/// Redraws the in-flight prompts on stdout by pushing the previous frame
/// out of view.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn render(&self, snapshot: &Snapshot) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(frame(snapshot).as_bytes());
        let _ = out.flush();
    }
}

pub fn frame(snapshot: &Snapshot) -> String {
    let mut text = "\n".repeat(30);
    let _ = writeln!(text, "Running: {:?}", snapshot.indices());
    for prompt in &snapshot.running {
        let _ = writeln!(text, "Prompt {}: {}", prompt.index + 1, prompt.text);
    }
    text
}
