//! Standard-output rendering. Statistics go to stdout only; diagnostics
//! are tracing events on stderr.

use std::fmt::Display;
use std::io::{self, Write};

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Whitespace separated columns, C `%g` numbers
    Text,
    /// One JSON object per row
    Json,
}

pub struct Emitter<W: Write> {
    out: W,
    format: Format,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W, format: Format) -> Self {
        Self { out, format }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    /// `# key = value` provenance line, identical in both formats.
    pub fn property(&mut self, key: &str, value: impl Display) -> io::Result<()> {
        writeln!(self.out, "# {} = {}", key, value)
    }

    /// Column header; JSON rows name their own fields.
    pub fn header(&mut self, header: &str) -> io::Result<()> {
        match self.format {
            Format::Text => writeln!(self.out, "{}", header),
            Format::Json => Ok(()),
        }
    }

    pub fn row<T: Display + Serialize>(&mut self, row: &T) -> io::Result<()> {
        match self.format {
            Format::Text => writeln!(self.out, "{}", row),
            Format::Json => {
                serde_json::to_writer(&mut self.out, row)?;
                writeln!(self.out)
            }
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
