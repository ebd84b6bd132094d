use std::{
    collections::BTreeSet,
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};
use thiserror::Error;

/// The matplotlib default colour cycle.
pub const PALETTE: [(u8, u8, u8); 10] = [
    (0x1f, 0x77, 0xb4),
    (0xff, 0x7f, 0x0e),
    (0x2c, 0xa0, 0x2c),
    (0xd6, 0x27, 0x28),
    (0x94, 0x67, 0xbd),
    (0x8c, 0x56, 0x4b),
    (0xe3, 0x77, 0xc2),
    (0x7f, 0x7f, 0x7f),
    (0xbc, 0xbd, 0x22),
    (0x17, 0xbe, 0xcf),
];

const TRAIN_PREFIX: &str = "train_";
const VAL_PREFIX: &str = "val_";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to load {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("Failed to load {path}: no columns")]
    Empty { path: String },
}

/// Column-major contents of one CSV log. Blank or non-numeric cells are NaN.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogTable {
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
    rows: usize,
}

impl LogTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut values = vec![Vec::new(); columns.len()];
        let mut rows = 0;
        for record in reader.records() {
            let record = record?;
            // Short rows are padded with NaN; surplus cells have no column.
            if record.len() > columns.len() {
                let line = record.position().map_or(0, |pos| pos.line());
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "line {line}: expected {} fields, found {}",
                        columns.len(),
                        record.len()
                    ),
                )
                .into());
            }
            for (idx, column) in values.iter_mut().enumerate() {
                let cell = record.get(idx).unwrap_or("");
                column.push(cell.parse::<f64>().unwrap_or(f64::NAN));
            }
            rows += 1;
        }
        Ok(Self {
            columns,
            values,
            rows,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let csv_err = |source| LoadError::Csv {
            path: path.display().to_string(),
            source,
        };
        let file = fs::File::open(path).map_err(|err| csv_err(err.into()))?;
        let table = Self::from_reader(file).map_err(csv_err)?;
        if table.columns.is_empty() {
            return Err(LoadError::Empty {
                path: path.display().to_string(),
            });
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|column| column == name)
            .map(|idx| self.values[idx].as_slice())
    }

    /// Values of `metric` for one variant, matching the prefix
    /// case-insensitively as metric detection does.
    pub fn variant(&self, variant: Variant, metric: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|column| split_column(column) == Some((variant, metric)))
            .map(|idx| self.values[idx].as_slice())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Train,
    Val,
    Bare,
}

impl Variant {
    pub fn column_name(self, metric: &str) -> String {
        match self {
            Variant::Train => format!("{TRAIN_PREFIX}{metric}"),
            Variant::Val => format!("{VAL_PREFIX}{metric}"),
            Variant::Bare => metric.to_string(),
        }
    }
}

fn strip_prefix_ignore_case<'a>(column: &'a str, prefix: &str) -> Option<&'a str> {
    column
        .get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &column[prefix.len()..])
}

/// Splits a column name into its variant and metric name. The `epoch`
/// column is not a metric.
pub fn split_column(column: &str) -> Option<(Variant, &str)> {
    let (variant, metric) = if let Some(rest) = strip_prefix_ignore_case(column, TRAIN_PREFIX) {
        (Variant::Train, rest)
    } else if let Some(rest) = strip_prefix_ignore_case(column, VAL_PREFIX) {
        (Variant::Val, rest)
    } else if column.eq_ignore_ascii_case("epoch") {
        return None;
    } else {
        (Variant::Bare, column)
    };
    (!metric.is_empty()).then_some((variant, metric))
}

/// One loaded CSV file.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub path: PathBuf,
    pub name: String,
    pub table: LogTable,
}

impl LogEntry {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let table = LogTable::from_path(path)?;
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { path, name, table })
    }

    /// Re-reads the file; the current table is kept when that fails.
    pub fn reload(&mut self) -> Result<(), LoadError> {
        self.table = LogTable::from_path(&self.path)?;
        Ok(())
    }
}

/// Sorted, de-duplicated metric names across a set of logs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    names: Vec<String>,
}

impl Metrics {
    pub fn detect(logs: &[LogEntry]) -> Self {
        let names: BTreeSet<String> = logs
            .iter()
            .flat_map(|log| log.table.columns())
            .filter_map(|column| split_column(column))
            .map(|(_, metric)| metric.to_string())
            .collect();
        Self {
            names: names.into_iter().collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Palette slot of `metric`: its sorted position modulo the palette size.
    pub fn color_index(&self, metric: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|name| name == metric)
            .map(|idx| idx % PALETTE.len())
    }
}
