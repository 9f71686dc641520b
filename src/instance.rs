use std::fmt;

/// On-disk and in-memory record syntax for training and query instances.
///
/// `Tabbed` separates columns with a tab, `Columns` with a single space.
/// The last column of a training line is the class label; query lines may
/// carry a trailing placeholder column (conventionally `?`) in its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceFormat {
    Tabbed,
    Columns,
}

impl Default for InstanceFormat {
    fn default() -> Self {
        InstanceFormat::Tabbed
    }
}

impl InstanceFormat {
    /// Returns the column delimiter for this format
    pub fn delimiter(&self) -> char {
        match self {
            InstanceFormat::Tabbed => '\t',
            InstanceFormat::Columns => ' ',
        }
    }
}

impl fmt::Display for InstanceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceFormat::Tabbed => write!(f, "Tabbed"),
            InstanceFormat::Columns => write!(f, "Columns"),
        }
    }
}

/// A single training instance: a fixed-arity feature vector plus its class label.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub features: Vec<String>,
    pub label: String,
}

/// Validates that no feature value contains the format's delimiter.
///
/// Returns the offending feature index on failure. Numeric features should be
/// stringified by the caller before validation.
pub fn validate_features(features: &[String], format: InstanceFormat) -> Result<(), usize> {
    let delimiter = format.delimiter();
    match features.iter().position(|f| f.contains(delimiter)) {
        Some(pos) => Err(pos),
        None => Ok(()),
    }
}

/// Joins a feature vector and class label into a training line.
pub fn join_instance(features: &[String], label: &str, format: InstanceFormat) -> String {
    let delimiter = format.delimiter();
    let mut line = features.join(&delimiter.to_string());
    line.push(delimiter);
    line.push_str(label);
    line
}

/// Joins a feature vector into a query line with a trailing `?` column.
pub fn join_query(features: &[String], format: InstanceFormat) -> String {
    join_instance(features, "?", format)
}

/// Parses a training line into an instance. The last column is the label.
///
/// Returns `None` for lines with fewer than two columns.
pub fn parse_instance(line: &str, format: InstanceFormat) -> Option<Instance> {
    let mut columns: Vec<String> = split_columns(line, format);
    if columns.len() < 2 {
        return None;
    }
    let label = columns.pop()?;
    Some(Instance {
        features: columns,
        label,
    })
}

/// Parses a query line into its feature vector, given the model's arity.
///
/// Accepts `arity` columns, or `arity + 1` columns where the trailing column
/// (a label placeholder such as `?`) is discarded. Anything else is malformed
/// and yields `None`.
pub fn parse_query(line: &str, arity: usize, format: InstanceFormat) -> Option<Vec<String>> {
    if line.is_empty() || arity == 0 {
        return None;
    }
    let mut columns = split_columns(line, format);
    if columns.len() == arity + 1 {
        columns.pop();
    }
    if columns.len() == arity {
        Some(columns)
    } else {
        None
    }
}

fn split_columns(line: &str, format: InstanceFormat) -> Vec<String> {
    line.split(format.delimiter())
        .map(|c| c.to_string())
        .collect()
}
