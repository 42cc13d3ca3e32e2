use std::fmt;

use serde::{Deserialize, Serialize};

/// Data type of a tool argument's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Float,
    String,
    Bool,
    Flag,
}

impl DataType {
    /// True if `value` can be interpreted as this data type.
    pub fn accepts(self, value: &str) -> bool {
        match self {
            Self::Integer => value.parse::<i64>().is_ok(),
            Self::Float => value.parse::<f64>().is_ok(),
            Self::String => true,
            Self::Bool | Self::Flag => matches!(value, "true" | "false"),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Flag => "flag",
        };
        f.write_str(s)
    }
}

/// Which section of the configuration an argument was declared in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
    #[default]
    Option,
}

impl Direction {
    /// Inputs and outputs are backed by files; options are plain values.
    pub fn is_file(self) -> bool {
        matches!(self, Self::Input | Self::Output)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Option => "option",
        };
        f.write_str(s)
    }
}

/// What to do with an argument when its file is replaced by a pipe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamHandling {
    /// Leave the argument off the command line entirely.
    Omit,
    /// Pass this text instead of the filename (usually "-").
    Replace(String),
}

/// A scalar JSON value in a parameter set.
/// Everything ends up as a string on a command line, so that's how we expose it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_accepts() {
        assert!(DataType::Integer.accepts("12"));
        assert!(!DataType::Integer.accepts("1.5"));
        assert!(DataType::Float.accepts("1.5"));
        assert!(DataType::Bool.accepts("false"));
        assert!(!DataType::Flag.accepts("yes"));
        assert!(DataType::String.accepts("anything"));
    }

    #[test]
    fn test_scalar_from_json() -> anyhow::Result<()> {
        let vals: Vec<Scalar> = serde_json::from_str(r#"[1, 2.5, true, "x.bam"]"#)?;
        let strs: Vec<String> = vals.iter().map(|v| v.to_string()).collect();
        assert_eq!(strs, vec!["1", "2.5", "true", "x.bam"]);
        Ok(())
    }

    #[test]
    fn test_stream_handling() -> anyhow::Result<()> {
        let omit: StreamHandling = serde_json::from_str(r#""omit""#)?;
        assert_eq!(omit, StreamHandling::Omit);
        let replace: StreamHandling = serde_json::from_str(r#"{"replace": "-"}"#)?;
        assert_eq!(replace, StreamHandling::Replace("-".to_owned()));
        Ok(())
    }
}
