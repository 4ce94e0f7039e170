use std::io::{BufRead, Write};

use tracing::debug;

use super::{Marker, Next, ARGUMENTS, ENSEMBLE, NERVES, SYNAPSES, TIME_SERIES};
use crate::ensemble::{Ensemble, TimeSeries};
use crate::error::{InfodynError, Result};
use crate::topology::{Nerve, Synapse, Topology};

/// Streaming parser yielding one [`Ensemble`] per agent.
///
/// Only the current agent is held in memory. Any structural mismatch is a
/// fatal [`InfodynError::Protocol`] carrying the offending line.
pub struct EnsembleReader<R> {
    input: R,
    buffer: String,
    line_number: usize,
    arguments: Option<Vec<String>>,
    echoed: bool,
    finished: bool,
}

impl<R: BufRead> EnsembleReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            buffer: String::new(),
            line_number: 0,
            arguments: None,
            echoed: false,
            finished: false,
        }
    }

    /// Number of lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reads the leading ARGUMENTS block (once) and returns its lines.
    pub fn read_arguments(&mut self) -> Result<&[String]> {
        if self.arguments.is_none() {
            let line = self.expect_line("expected # BEGIN ARGUMENTS")?;
            if Marker::classify(&line) != Marker::Begin(ARGUMENTS) {
                return Err(self.error(&line, "expected # BEGIN ARGUMENTS"));
            }
            let mut arguments = Vec::new();
            while let Next::Record(line) = self.section_line(ARGUMENTS)? {
                let keyed = matches!(line.split_once('='), Some((key, _)) if !key.trim().is_empty());
                if !keyed {
                    return Err(self.error(&line, "expected <key> = <value>"));
                }
                arguments.push(line);
            }
            self.arguments = Some(arguments);
        }
        Ok(self.arguments.as_deref().unwrap_or_default())
    }

    /// Writes the ARGUMENTS block to `out` as `# `-prefixed provenance
    /// lines. Subsequent calls write nothing.
    pub fn echo_arguments<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.echoed {
            return Ok(());
        }
        for line in self.read_arguments()? {
            writeln!(out, "# {}", line)?;
        }
        self.echoed = true;
        Ok(())
    }

    /// Reads the next agent. `Ok(None)` once the stream is exhausted.
    pub fn read_ensemble(&mut self) -> Result<Option<Ensemble>> {
        self.read_arguments()?;

        let agent_id = match self.agent_header()? {
            Next::Record(agent_id) => agent_id,
            _ => {
                self.finished = true;
                return Ok(None);
            }
        };
        let topology = self.read_topology()?;
        let mut ensemble = Ensemble::new(agent_id, topology);

        let line = self.expect_line("expected # BEGIN ENSEMBLE")?;
        if Marker::classify(&line) != Marker::Begin(ENSEMBLE) {
            return Err(self.error(&line, "expected # BEGIN ENSEMBLE"));
        }
        while let Next::Record(trial) = self.read_time_series(ensemble.topology().neuron_count())? {
            ensemble.push(trial)?;
        }

        debug!(
            agent = agent_id,
            trials = ensemble.trials().len(),
            observations = ensemble.observation_count(),
            "Ensemble read"
        );
        Ok(Some(ensemble))
    }

    fn agent_header(&mut self) -> Result<Next<u64>> {
        loop {
            let Some(line) = self.next_line()? else {
                return Ok(Next::EndOfStream);
            };
            if line.trim().is_empty() {
                continue;
            }
            return match Marker::classify(&line) {
                Marker::Agent(id) => id
                    .parse::<u64>()
                    .map(Next::Record)
                    .map_err(|_| self.error(&line, "malformed agent id")),
                _ => Err(self.error(&line, "expected # AGENT <id>")),
            };
        }
    }

    fn read_topology(&mut self) -> Result<Topology> {
        let line = self.expect_line("expected # DIMENSIONS")?;
        let (neuron_count, input_count, output_count) = match Marker::classify(&line) {
            Marker::Dimensions(fields) => {
                let parsed: Vec<usize> = fields
                    .split_whitespace()
                    .map(str::parse)
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| self.error(&line, "malformed dimension triple"))?;
                match parsed[..] {
                    [n, i, o] => (n, i, o),
                    _ => return Err(self.error(&line, "malformed dimension triple")),
                }
            }
            _ => return Err(self.error(&line, "expected # DIMENSIONS <N> <input> <output>")),
        };

        self.expect_begin(NERVES)?;
        let mut declarations = Vec::new();
        while let Next::Record(line) = self.section_line(NERVES)? {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let count = match fields[..] {
                [_, count] => count
                    .parse::<usize>()
                    .map_err(|_| self.error(&line, "malformed nerve neuron count"))?,
                _ => return Err(self.error(&line, "expected <label> <count>")),
            };
            declarations.push((fields[0].to_string(), count));
        }
        let nerves = Nerve::contiguous(declarations.iter().map(|(label, count)| (label.as_str(), *count)));

        self.expect_begin(SYNAPSES)?;
        let mut synapses = Vec::new();
        while let Next::Record(line) = self.section_line(SYNAPSES)? {
            let indices: Vec<usize> = line
                .split_whitespace()
                .map(str::parse)
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| self.error(&line, "malformed neuron index"))?;
            match indices.split_first() {
                Some((&pre, posts)) if !posts.is_empty() => {
                    synapses.extend(posts.iter().map(|&post| Synapse::new(pre, post)));
                }
                _ => return Err(self.error(&line, "expected <pre> <post>+")),
            }
        }

        Topology::new(neuron_count, input_count, output_count, nerves, synapses)
    }

    fn read_time_series(&mut self, dimension: usize) -> Result<Next<TimeSeries>> {
        let line = self.expect_line("expected # BEGIN TIME SERIES or # END ENSEMBLE")?;
        match Marker::classify(&line) {
            Marker::End(ENSEMBLE) => return Ok(Next::EndOfSection),
            Marker::Begin(TIME_SERIES) => {}
            _ => return Err(self.error(&line, "expected # BEGIN TIME SERIES or # END ENSEMBLE")),
        }

        let mut series = TimeSeries::new(dimension);
        let mut row = Vec::new();
        while let Next::Record(line) = self.section_line(TIME_SERIES)? {
            row.clear();
            for field in line.split_whitespace() {
                let value = field
                    .parse::<f64>()
                    .map_err(|_| self.error(&line, "malformed observation value"))?;
                row.push(value);
            }
            if row.len() != dimension {
                let message = format!("expected {} values, found {}", dimension, row.len());
                return Err(self.error(&line, message));
            }
            series.push(&row)?;
        }
        Ok(Next::Record(series))
    }

    fn expect_begin(&mut self, section: &str) -> Result<()> {
        let message = format!("expected # BEGIN {}", section);
        let line = self.expect_line(&message)?;
        if Marker::classify(&line) != Marker::Begin(section) {
            return Err(self.error(&line, message));
        }
        Ok(())
    }

    /// Next data line of `section`, or `EndOfSection` at its END marker.
    /// Any other marker, or the end of input, is a protocol error.
    fn section_line(&mut self, section: &str) -> Result<Next<String>> {
        let message = format!("unterminated {} section", section);
        let line = self.expect_line(&message)?;
        match Marker::classify(&line) {
            Marker::End(name) if name == section => Ok(Next::EndOfSection),
            Marker::Data(_) => Ok(Next::Record(line)),
            _ => Err(self.error(&line, format!("unexpected marker in {} section", section))),
        }
    }

    fn expect_line(&mut self, message: &str) -> Result<String> {
        match self.next_line()? {
            Some(line) => Ok(line),
            None => Err(self.error("<end of stream>", message)),
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        if self.input.read_line(&mut self.buffer)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(self.buffer.trim_end_matches(|c| c == '\n' || c == '\r').to_string()))
    }

    fn error(&self, line: &str, message: impl Into<String>) -> InfodynError {
        InfodynError::protocol(self.line_number, line, message)
    }
}

impl<R: BufRead> Iterator for EnsembleReader<R> {
    type Item = Result<Ensemble>;

    /// Yields agents until the stream ends; stops after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_ensemble() {
            Ok(Some(ensemble)) => Some(Ok(ensemble)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
