use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PipelineError;
use crate::sheets::{CellValue, Row};

/// Column holding the number of inbound calls per row.
pub const INCOME_COLUMN: &str = "income_call";
/// Column holding the number of answered calls per row.
pub const ANSWER_COLUMN: &str = "answer_call";

/// SLA grade, ordered S > A > B > C > D > DD.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    DD,
}

impl Grade {
    /// Ordinal score used for goal comparison. DD is always 0.
    pub fn score(self) -> u8 {
        match self {
            Grade::S => 5,
            Grade::A => 4,
            Grade::B => 3,
            Grade::C => 2,
            Grade::D => 1,
            Grade::DD => 0,
        }
    }
}

impl Ord for Grade {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score().cmp(&other.score())
    }
}

impl PartialOrd for Grade {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::DD => "DD",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" => Ok(Grade::S),
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "DD" => Ok(Grade::DD),
            other => Err(format!("unknown SLA grade `{other}` (expected S, A, B, C, D or DD)")),
        }
    }
}

/// Inclusive lower bounds, scanned high to low. Anything below the last band is DD.
const GRADE_THRESHOLDS: &[(Grade, f64)] = &[
    (Grade::S, 95.0),
    (Grade::A, 90.0),
    (Grade::B, 85.0),
    (Grade::C, 80.0),
    (Grade::D, 75.0),
];

/// Aggregated call volume for the graded period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YesterdayData {
    pub income_call: u64,
    pub answer_call: u64,
    pub sla_result: Grade,
}

impl Default for YesterdayData {
    fn default() -> Self {
        Self {
            income_call: 0,
            answer_call: 0,
            sla_result: Grade::DD,
        }
    }
}

/// Maps a response rate (percent) to its grade. The first satisfied threshold wins.
pub fn grade_for_rate(rate: f64) -> Grade {
    GRADE_THRESHOLDS
        .iter()
        .find(|&&(_, threshold)| rate >= threshold)
        .map(|&(grade, _)| grade)
        .unwrap_or(Grade::DD)
}

/// `answer / income * 100`, rounded half-to-even at two decimals.
///
/// Rounding is done on the exact rational in integer arithmetic, so ties such
/// as 12.345 are decided without binary floating point error.
pub fn response_rate(income_call: u64, answer_call: u64) -> Result<f64, PipelineError> {
    if income_call == 0 {
        return Err(PipelineError::ZeroDenominator);
    }

    let numerator = u128::from(answer_call) * 10_000;
    let denominator = u128::from(income_call);
    let mut hundredths = numerator / denominator;
    let remainder = numerator % denominator;

    match (remainder * 2).cmp(&denominator) {
        Ordering::Greater => hundredths += 1,
        Ordering::Equal if hundredths % 2 == 1 => hundredths += 1,
        _ => {}
    }

    Ok(hundredths as f64 / 100.0)
}

/// Whether `current` meets or beats `goal`.
pub fn is_goal_achieved(current: Grade, goal: Grade) -> bool {
    current.score() >= goal.score()
}

/// Sums the call columns over `rows` and grades the resulting response rate.
///
/// Rows are only read. Order does not matter.
pub fn grade(rows: &[Row]) -> Result<YesterdayData, PipelineError> {
    let mut income_call: u64 = 0;
    let mut answer_call: u64 = 0;

    for (index, row) in rows.iter().enumerate() {
        income_call = accumulate(income_call, row, INCOME_COLUMN, index)?;
        answer_call = accumulate(answer_call, row, ANSWER_COLUMN, index)?;
    }

    let rate = response_rate(income_call, answer_call)?;
    if answer_call > income_call {
        warn!(income_call, answer_call, rate, "answered calls exceed inbound calls");
    }

    Ok(YesterdayData {
        income_call,
        answer_call,
        sla_result: grade_for_rate(rate),
    })
}

fn accumulate(total: u64, row: &Row, column: &str, index: usize) -> Result<u64, PipelineError> {
    let count = coerce_count(row, column, index)?;
    total
        .checked_add(count)
        .ok_or_else(|| PipelineError::DataType {
            column: column.to_string(),
            row: index,
            value: format!("{count} (column total overflows u64)"),
        })
}

fn coerce_count(row: &Row, column: &str, index: usize) -> Result<u64, PipelineError> {
    let invalid = |value: String| PipelineError::DataType {
        column: column.to_string(),
        row: index,
        value,
    };

    let Some(cell) = row.get(column) else {
        return Err(invalid("<missing>".to_string()));
    };

    match cell {
        CellValue::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                    Ok(f as u64)
                }
                _ => Err(invalid(n.to_string())),
            }
        }
        CellValue::Text(s) => {
            let digits = s.trim();
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(format!("{s:?}")));
            }
            digits.parse::<u64>().map_err(|_| invalid(format!("{s:?}")))
        }
        CellValue::Null => Err(invalid("null".to_string())),
    }
}
