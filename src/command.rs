//! Ordered shell command groups for one module build.

/// Joins commands so the shell aborts the chain on the first failure.
pub const CONJUNCTION: &str = " && ";

/// Commands emitted by one invocation, grouped by phase.
///
/// A fresh value is created per invocation and passed by `&mut` through the
/// stages, so nothing leaks between module builds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSequence {
    /// Setup: working directory, permissions, key generation.
    pub prep: Vec<String>,
    /// Filelist generation and signing.
    pub main: Vec<String>,
    /// Final move and key removal.
    pub cleanup: Vec<String>,
}

impl CommandSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.prep.is_empty() && self.main.is_empty() && self.cleanup.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prep.len() + self.main.len() + self.cleanup.len()
    }

    /// All commands in execution order: prep, main, cleanup.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prep
            .iter()
            .chain(&self.main)
            .chain(&self.cleanup)
            .map(String::as_str)
    }

    /// Render the single command line handed to the container build.
    pub fn join(&self) -> String {
        self.iter().collect::<Vec<_>>().join(CONJUNCTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sequence() {
        let seq = CommandSequence::new();
        assert!(seq.is_empty());
        assert_eq!(seq.join(), "");
    }

    #[test]
    fn test_join_orders_groups() {
        let mut seq = CommandSequence::new();
        seq.cleanup.push("c1".into());
        seq.main.push("m1".into());
        seq.prep.push("p1".into());
        seq.prep.push("p2".into());
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.join(), "p1 && p2 && m1 && c1");
    }
}
