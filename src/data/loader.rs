// ============================================================
// Layer 4 - Interaction Loader
// ============================================================
// Reads a delimited text file (CSV by default) with a header
// row into Interaction records.
//
// Column names are configuration, not code: MovieLens-style
// exports use `timestamp`, ReChorus-style exports use `time`,
// so the time column accepts either spelling. The required
// columns are checked against the header BEFORE any row is
// parsed: a missing column is a configuration error and no
// partial data is returned.
//
// Feedback is required by default. Implicit-feedback datasets set
// the feedback column to `None`, and every record gets 1.0; a
// configured feedback column that is missing is an error, so a
// header typo cannot turn ratings into constants.
//
// The same format is used for writing split files, so
// `{dataset}_train.csv` can be read back with this loader.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::interaction::Interaction;
use crate::domain::traits::InteractionSource;

/// Header names of the columns the loader looks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub user:     String,
    pub item:     String,
    /// `None` for implicit feedback (every record scores 1.0)
    pub feedback: Option<String>,
    pub time:     String,
    /// Field separator, usually ',' or '\t'
    pub separator: char,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            user:      "user_id".to_string(),
            item:      "item_id".to_string(),
            feedback:  Some("rating".to_string()),
            time:      "timestamp".to_string(),
            separator: ',',
        }
    }
}

/// Accepted alternatives for the time column header
const TIME_ALIASES: [&str; 2] = ["timestamp", "time"];

/// Resolved column positions for one header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnIndex {
    user:     usize,
    item:     usize,
    feedback: Option<usize>,
    time:     usize,
    width:    usize,
}

impl ColumnConfig {
    fn resolve(&self, header: &str) -> PipelineResult<ColumnIndex> {
        let names: Vec<&str> = header.split(self.separator).map(str::trim).collect();
        let find = |name: &str| names.iter().position(|n| *n == name);

        let require = |name: &str| {
            find(name).ok_or_else(|| {
                PipelineError::malformed(format!(
                    "missing required column '{}' (header: {:?})",
                    name, names
                ))
            })
        };

        let user = require(self.user.as_str())?;
        let item = require(self.item.as_str())?;

        // Try the configured name first, then the well-known aliases
        let time = find(self.time.as_str())
            .or_else(|| TIME_ALIASES.iter().find_map(|alias| find(*alias)))
            .ok_or_else(|| {
                PipelineError::malformed(format!(
                    "missing required time column '{}' (header: {:?})",
                    self.time, names
                ))
            })?;

        let feedback = match &self.feedback {
            Some(name) => Some(require(name.as_str())?),
            None => None,
        };

        Ok(ColumnIndex {
            user,
            item,
            feedback,
            time,
            width: names.len(),
        })
    }
}

/// Parse delimited text into interactions, in file order.
pub fn parse_interactions(text: &str, columns: &ColumnConfig) -> PipelineResult<Vec<Interaction>> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        // A completely empty file has no header to validate
        return Err(PipelineError::malformed("interaction file has no header row"));
    };
    let idx = columns.resolve(header)?;

    let mut records = Vec::new();
    for (line_no, line) in lines {
        let cells: Vec<&str> = line.split(columns.separator).map(str::trim).collect();
        if cells.len() != idx.width {
            return Err(PipelineError::malformed(format!(
                "line {}: expected {} fields, found {}",
                line_no + 1,
                idx.width,
                cells.len()
            )));
        }

        let int_cell = |pos: usize, what: &str| -> PipelineResult<i64> {
            parse_int(cells[pos]).ok_or_else(|| {
                PipelineError::malformed(format!(
                    "line {}: cannot parse {} '{}'",
                    line_no + 1,
                    what,
                    cells[pos]
                ))
            })
        };

        let feedback = match idx.feedback {
            Some(pos) => cells[pos].parse::<f64>().map_err(|_| {
                PipelineError::malformed(format!(
                    "line {}: cannot parse feedback '{}'",
                    line_no + 1,
                    cells[pos]
                ))
            })?,
            None => 1.0,
        };

        records.push(Interaction {
            user_id:   int_cell(idx.user, "user id")?,
            item_id:   int_cell(idx.item, "item id")?,
            feedback,
            timestamp: int_cell(idx.time, "timestamp")?,
        });
    }

    Ok(records)
}

/// Integers exported by pandas sometimes carry a trailing ".0"
fn parse_int(cell: &str) -> Option<i64> {
    cell.parse::<i64>().ok().or_else(|| {
        let f = cell.parse::<f64>().ok()?;
        (f.fract() == 0.0 && f.is_finite()).then_some(f as i64)
    })
}

/// Write interactions with a header row using the configured names.
pub fn write_interactions(
    path:    &Path,
    records: &[Interaction],
    columns: &ColumnConfig,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
    }
    let file = fs::File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    let mut out = BufWriter::new(file);
    let sep = columns.separator;

    match &columns.feedback {
        Some(feedback) => {
            writeln!(out, "{}{sep}{}{sep}{}{sep}{}", columns.user, columns.item, feedback, columns.time)?;
            for r in records {
                writeln!(out, "{}{sep}{}{sep}{}{sep}{}", r.user_id, r.item_id, r.feedback, r.timestamp)?;
            }
        }
        None => {
            writeln!(out, "{}{sep}{}{sep}{}", columns.user, columns.item, columns.time)?;
            for r in records {
                writeln!(out, "{}{sep}{}{sep}{}", r.user_id, r.item_id, r.timestamp)?;
            }
        }
    }
    out.flush()?;

    tracing::debug!("Wrote {} interactions to '{}'", records.len(), path.display());
    Ok(())
}

/// Loads interactions from one delimited text file.
pub struct CsvInteractionLoader {
    path:    PathBuf,
    columns: ColumnConfig,
}

impl CsvInteractionLoader {
    pub fn new(path: impl Into<PathBuf>, columns: ColumnConfig) -> Self {
        Self { path: path.into(), columns }
    }
}

impl InteractionSource for CsvInteractionLoader {
    fn load_all(&self) -> Result<Vec<Interaction>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read interactions from '{}'", self.path.display()))?;

        let records = parse_interactions(&text, &self.columns)
            .with_context(|| format!("Invalid interaction file '{}'", self.path.display()))?;

        tracing::info!("Loaded {} interactions from '{}'", records.len(), self.path.display());
        Ok(records)
    }
}
