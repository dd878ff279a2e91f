use rand::prelude::*;
use serde::Serialize;

/// A prompt and its 0-based position within the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub index: usize,
    pub text: String,
}

impl Prompt {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self { index, text: text.into() }
    }

    /// Whitespace-delimited word count, standing in for the prompt token count.
    /// No tokenizer is consulted.
    pub fn word_count(&self) -> u64 {
        self.text.split_whitespace().count() as u64
    }
}

/// Outcome of one prompt. A failed prompt carries zero for both counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub completion_token_count: u64,
    pub prompt_token_count: u64,
    pub failed: bool,
}

impl RunResult {
    pub fn succeeded(completion_token_count: u64, prompt_token_count: u64) -> Self {
        Self { completion_token_count, prompt_token_count, failed: false }
    }

    pub fn failed() -> Self {
        Self { completion_token_count: 0, prompt_token_count: 0, failed: true }
    }
}

/// Produces filler text for prompts.
pub trait PromptSource: Send {
    /// Returns exactly `count` words joined by single spaces.
    fn words(&mut self, count: usize) -> String;
}

pub struct RandomWords {
    rng: StdRng,
}

impl RandomWords {
    pub fn new() -> Self { Self { rng: StdRng::from_entropy() } }

    pub fn seeded(seed: u64) -> Self { Self { rng: StdRng::seed_from_u64(seed) } }
}

impl Default for RandomWords {
    fn default() -> Self { Self::new() }
}

impl PromptSource for RandomWords {
    fn words(&mut self, count: usize) -> String {
        (0..count)
            .map(|_| WORDS[self.rng.gen_range(0..WORDS.len())])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builds `batch_size` prompts of `prefix` followed by `num_words` generated words.
pub fn build_prompts(source: &mut dyn PromptSource, prefix: &str, batch_size: usize, num_words: usize) -> Vec<Prompt> {
    (0..batch_size)
        .map(|index| Prompt::new(index, format!("{prefix}{}", source.words(num_words))))
        .collect()
}

const WORDS: &[&str] = &[
    "anchor", "harbor", "lantern", "meadow", "copper", "whisper", "glacier", "orchard", "falcon", "ember",
    "thunder", "velvet", "compass", "riddle", "canyon", "marble", "willow", "saffron", "beacon", "tundra",
    "quarry", "lagoon", "ivory", "prairie", "cobalt", "mosaic", "nectar", "summit", "drizzle", "pepper",
    "tapestry", "ribbon", "signal", "meteor", "pebble", "garnet", "cavern", "feather", "juniper", "bramble",
    "clockwork", "voyage", "lattice", "monsoon", "parchment", "sparrow", "thistle", "umbrella", "walnut", "zephyr",
    "blizzard", "cinder", "dynamo", "estuary", "fjord", "gondola", "hammock", "inkwell", "jigsaw", "kettle",
    "labyrinth", "mirage", "nomad", "obelisk", "pendulum", "quill", "rampart", "satchel", "trellis", "unicorn",
    "vineyard", "wagon", "yonder", "zenith", "acorn", "bonfire", "cathedral", "dune", "eclipse", "fable",
    "geyser", "hollow", "island", "jasmine", "kingdom", "lighthouse", "mariner", "nebula", "oasis", "pilgrim",
    "quartz", "reef", "sapphire", "tide", "utopia", "vortex", "wander", "xylophone", "yeoman", "zodiac",
    "ballad", "cipher", "dragon", "engine", "fortress", "garden", "horizon", "igloo", "jungle", "kite",
    "legend", "machine", "needle", "ocean", "palace", "quest", "river", "shadow", "temple", "valley",
    "winter", "forest", "silver", "castle", "rocket", "violin", "planet", "candle", "mirror", "bridge",
];
