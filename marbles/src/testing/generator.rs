//! Seeded generator of well-formed diagrams.
//!
//! Generated diagrams are in the form the encoder writes back verbatim:
//! every group holds at least two tokens, groups contain no `-`, and the
//! diagram ends in a Complete (bare or as the last token of a group).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for diagram generation.
#[derive(Debug, Clone)]
pub struct DiagramGenConfig {
    /// Maximum number of columns before the terminal token.
    pub max_length: usize,
    /// Probability that a column holds a single value.
    pub event_rate: f64,
    /// Probability that a column opens a group.
    pub group_rate: f64,
    /// Maximum number of tokens in a group (at least 2).
    pub max_group_size: usize,
    /// Probability that the terminal `|` is folded into a final group.
    pub terminal_group_rate: f64,
    /// Characters used as values.
    pub alphabet: Vec<char>,
}

impl Default for DiagramGenConfig {
    fn default() -> Self {
        Self {
            max_length: 24,
            event_rate: 0.35,
            group_rate: 0.1,
            max_group_size: 3,
            terminal_group_rate: 0.2,
            alphabet: ('a'..='z').chain('0'..='9').collect(),
        }
    }
}

/// Produces the same sequence of diagrams for the same seed.
pub struct DiagramGenerator {
    rng: StdRng,
    config: DiagramGenConfig,
}

impl DiagramGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, DiagramGenConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: DiagramGenConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DiagramGenConfig {
        &self.config
    }

    /// Generate the next diagram.
    pub fn next_diagram(&mut self) -> String {
        let length = self.rng.random_range(0..=self.config.max_length);
        let max_group = self.config.max_group_size.max(2);

        let mut diagram = String::new();
        let mut column = 0;
        while column < length {
            let roll = self.rng.random::<f64>();
            if roll < self.config.group_rate && column + 4 <= length {
                let size = self.rng.random_range(2..=max_group);
                let group = self.group(size, false);
                column += group.chars().count();
                diagram.push_str(&group);
            } else if roll < self.config.group_rate + self.config.event_rate {
                diagram.push(self.value());
                column += 1;
            } else {
                diagram.push('-');
                column += 1;
            }
        }

        if self.rng.random::<f64>() < self.config.terminal_group_rate {
            let values = self.rng.random_range(1..max_group);
            let group = self.group(values, true);
            diagram.push_str(&group);
        } else {
            diagram.push('|');
        }
        diagram
    }

    fn group(&mut self, values: usize, terminal: bool) -> String {
        let mut group = String::from("(");
        for _ in 0..values {
            group.push(self.value());
        }
        if terminal {
            group.push('|');
        }
        group.push(')');
        group
    }

    fn value(&mut self) -> char {
        let alphabet = &self.config.alphabet;
        if alphabet.is_empty() {
            return 'a';
        }
        alphabet[self.rng.random_range(0..alphabet.len())]
    }
}
