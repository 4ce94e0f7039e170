use std::io::Write;

use super::{ARGUMENTS, ENSEMBLE, NERVES, SYNAPSES, TIME_SERIES};
use crate::ensemble::Ensemble;
use crate::error::{InfodynError, Result};

/// Serialises ensembles into the stream grammar read by
/// [`EnsembleReader`](super::EnsembleReader).
///
/// Values are written with Rust's shortest round-trip formatting, so a
/// written stream reads back bit-identical.
pub struct StreamWriter<W> {
    out: W,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_arguments<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<()> {
        writeln!(self.out, "# BEGIN {}", ARGUMENTS)?;
        for line in lines {
            writeln!(self.out, "{}", line.as_ref())?;
        }
        writeln!(self.out, "# END {}", ARGUMENTS)?;
        Ok(())
    }

    /// Writes one agent block. Nerves must be laid out contiguously from
    /// neuron 0, since the stream only carries their sizes.
    pub fn write_ensemble(&mut self, ensemble: &Ensemble) -> Result<()> {
        let topology = ensemble.topology();
        writeln!(self.out, "# AGENT {}", ensemble.agent_id())?;
        writeln!(
            self.out,
            "# DIMENSIONS {} {} {}",
            topology.neuron_count(),
            topology.input_count(),
            topology.output_count()
        )?;

        writeln!(self.out, "# BEGIN {}", NERVES)?;
        let mut expected_start = 0;
        for nerve in topology.all_nerves() {
            if nerve.start != expected_start {
                return Err(InfodynError::Topology(format!(
                    "nerve {} starts at {}, stream layout requires {}",
                    nerve.label, nerve.start, expected_start
                )));
            }
            writeln!(self.out, "{} {}", nerve.label, nerve.count)?;
            expected_start += nerve.count;
        }
        writeln!(self.out, "# END {}", NERVES)?;

        writeln!(self.out, "# BEGIN {}", SYNAPSES)?;
        // Runs of synapses sharing a pre neuron share a line; order is kept.
        let synapses = topology.synapses();
        let mut start = 0;
        while start < synapses.len() {
            let pre = synapses[start].pre;
            let mut end = start + 1;
            while end < synapses.len() && synapses[end].pre == pre {
                end += 1;
            }
            write!(self.out, "{}", pre)?;
            for synapse in &synapses[start..end] {
                write!(self.out, " {}", synapse.post)?;
            }
            writeln!(self.out)?;
            start = end;
        }
        writeln!(self.out, "# END {}", SYNAPSES)?;

        writeln!(self.out, "# BEGIN {}", ENSEMBLE)?;
        for trial in ensemble.trials() {
            writeln!(self.out, "# BEGIN {}", TIME_SERIES)?;
            for row in trial.rows() {
                let fields: Vec<String> = row.iter().map(|value| value.to_string()).collect();
                writeln!(self.out, "{}", fields.join(" "))?;
            }
            writeln!(self.out, "# END {}", TIME_SERIES)?;
        }
        writeln!(self.out, "# END {}", ENSEMBLE)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
