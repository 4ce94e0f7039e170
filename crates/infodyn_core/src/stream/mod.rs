//! Line-oriented, self-describing ensemble protocol.
//!
//! ```text
//! # BEGIN ARGUMENTS
//! key = value
//! # END ARGUMENTS
//! # AGENT <id>
//! # DIMENSIONS <N> <inputCount> <outputCount>
//! # BEGIN NERVES
//! <label> <count>
//! # END NERVES
//! # BEGIN SYNAPSES
//! <pre> <post> [<post> ...]
//! # END SYNAPSES
//! # BEGIN ENSEMBLE
//! # BEGIN TIME SERIES
//! <N whitespace separated values>
//! # END TIME SERIES
//! # END ENSEMBLE
//! ```
//!
//! The agent block repeats until the input ends.

mod reader;
mod writer;

pub use reader::EnsembleReader;
pub use writer::StreamWriter;

pub(crate) const ARGUMENTS: &str = "ARGUMENTS";
pub(crate) const NERVES: &str = "NERVES";
pub(crate) const SYNAPSES: &str = "SYNAPSES";
pub(crate) const ENSEMBLE: &str = "ENSEMBLE";
pub(crate) const TIME_SERIES: &str = "TIME SERIES";

/// Outcome of pulling one item out of a section.
#[derive(Debug, Clone, PartialEq)]
pub enum Next<T> {
    Record(T),
    EndOfSection,
    EndOfStream,
}

/// Classification of a single protocol line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker<'a> {
    Begin(&'a str),
    End(&'a str),
    Agent(&'a str),
    Dimensions(&'a str),
    Data(&'a str),
}

impl<'a> Marker<'a> {
    pub(crate) fn classify(line: &'a str) -> Self {
        if let Some(rest) = line.strip_prefix("# BEGIN ") {
            Marker::Begin(rest.trim())
        } else if let Some(rest) = line.strip_prefix("# END ") {
            Marker::End(rest.trim())
        } else if let Some(rest) = line.strip_prefix("# AGENT ") {
            Marker::Agent(rest.trim())
        } else if let Some(rest) = line.strip_prefix("# DIMENSIONS ") {
            Marker::Dimensions(rest.trim())
        } else {
            Marker::Data(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_classification() {
        assert_eq!(Marker::classify("# BEGIN TIME SERIES"), Marker::Begin("TIME SERIES"));
        assert_eq!(Marker::classify("# END NERVES"), Marker::End("NERVES"));
        assert_eq!(Marker::classify("# AGENT 12"), Marker::Agent("12"));
        assert_eq!(Marker::classify("# DIMENSIONS 5 2 1"), Marker::Dimensions("5 2 1"));
        assert_eq!(Marker::classify("0.1 0.2"), Marker::Data("0.1 0.2"));
    }
}
