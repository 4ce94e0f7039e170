//! Output rows and their text rendering.

use std::fmt;

use serde::Serialize;

use crate::aggregate::{Group, Tally};

/// Statistic identifiers as they appear in output rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    #[serde(rename = "AIS")]
    ActiveInfoStorage,
    #[serde(rename = "ATE")]
    ApparentTransfer,
    #[serde(rename = "CTE")]
    CompleteTransfer,
    #[serde(rename = "CollTE")]
    CollectiveTransfer,
    #[serde(rename = "SI")]
    SeparableInfo,
    #[serde(rename = "SI_TRIVIAL")]
    SeparableTrivial,
    #[serde(rename = "SI_NONTRIVIAL")]
    SeparableNontrivial,
}

impl Metric {
    pub fn id(self) -> &'static str {
        match self {
            Metric::ActiveInfoStorage => "AIS",
            Metric::ApparentTransfer => "ATE",
            Metric::CompleteTransfer => "CTE",
            Metric::CollectiveTransfer => "CollTE",
            Metric::SeparableInfo => "SI",
            Metric::SeparableTrivial => "SI_TRIVIAL",
            Metric::SeparableNontrivial => "SI_NONTRIVIAL",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One `(count, sum)` statistic for one agent and group.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Row {
    pub agent: u64,
    pub metric: Metric,
    pub group: Group,
    pub count: usize,
    pub value: f64,
}

impl Row {
    pub fn new(agent: u64, metric: Metric, group: Group, tally: Tally) -> Self {
        Self {
            agent,
            metric,
            group,
            count: tally.count,
            value: tally.sum,
        }
    }

    pub fn tally(&self) -> Tally {
        Tally {
            count: self.count,
            sum: self.value,
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}[{}] {} {}",
            self.agent,
            self.metric,
            self.group,
            self.count,
            format_g(self.value)
        )
    }
}

pub const ROW_HEADER: &str = "agent metric count value";
pub const COMPLEXITY_HEADER: &str = "agent count integration complexity";

/// Integration and complexity of one agent's processing neurons.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComplexityRow {
    pub agent: u64,
    pub count: usize,
    pub integration: f64,
    pub complexity: f64,
}

impl fmt::Display for ComplexityRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.agent,
            self.count,
            format_g(self.integration),
            format_g(self.complexity)
        )
    }
}

/// C `printf("%g")`: six significant digits, trailing zeros removed,
/// scientific notation when the exponent is below -4 or at least 6.
pub fn format_g(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Rounding to six digits may carry into the next power of ten, so the
    // exponent is read back from the rounded scientific form.
    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_fraction_zeros(mantissa),
            sign,
            exponent.abs()
        )
    } else {
        let decimals = (PRECISION - 1 - exponent).max(0) as usize;
        strip_fraction_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_fraction_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Layer;

    #[test]
    fn test_format_g_matches_printf() {
        let cases = [
            (0.0, "0"),
            (1.0, "1"),
            (-2.5, "-2.5"),
            (0.1, "0.1"),
            (1.0 / 3.0, "0.333333"),
            (0.0001, "0.0001"),
            (0.00001234, "1.234e-05"),
            (123456.7, "123457"),
            (999999.7, "1e+06"),
            (1234567.0, "1.23457e+06"),
            (1e100, "1e+100"),
            (-3.0e-7, "-3e-07"),
            (f64::NAN, "nan"),
            (f64::NEG_INFINITY, "-inf"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_g(value), expected, "formatting {}", value);
        }
    }

    #[test]
    fn test_row_display() {
        let row = Row::new(
            7,
            Metric::ApparentTransfer,
            Group::Layer(Layer::Processing),
            Tally { count: 3, sum: 0.125 },
        );
        assert_eq!(row.to_string(), "7 ATE[Processing] 3 0.125");

        let row = Row::new(7, Metric::SeparableTrivial, Group::Total, Tally::default());
        assert_eq!(row.to_string(), "7 SI_TRIVIAL[*] 0 0");

        let row = Row::new(2, Metric::ActiveInfoStorage, Group::Neuron(4), Tally::of(1.5));
        assert_eq!(row.to_string(), "2 AIS[n4] 1 1.5");
    }

    #[test]
    fn test_complexity_row_display() {
        let row = ComplexityRow {
            agent: 12,
            count: 4,
            integration: 0.75,
            complexity: 0.0125,
        };
        assert_eq!(row.to_string(), "12 4 0.75 0.0125");
    }
}
