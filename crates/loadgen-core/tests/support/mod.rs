#![allow(dead_code)]

use std::sync::Mutex;

use loadgen_core::{ProgressSink, PromptSource, Snapshot};

/// Keeps every frame the monitor renders.
#[derive(Default)]
pub struct Frames(Mutex<Vec<Snapshot>>);

impl Frames {
    pub fn taken(&self) -> Vec<Snapshot> { self.0.lock().unwrap().clone() }
}

impl ProgressSink for Frames {
    fn render(&self, snapshot: &Snapshot) { self.0.lock().unwrap().push(snapshot.clone()); }
}

/// Predictable prompt text: call n yields `count` copies of `wn`.
#[derive(Default)]
pub struct NumberedWords {
    calls: usize,
}

impl PromptSource for NumberedWords {
    fn words(&mut self, count: usize) -> String {
        let word = format!("w{}", self.calls);
        self.calls += 1;
        vec![word; count].join(" ")
    }
}
