//! Output formatting for different formats.

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed tables with colors
    #[default]
    #[value(alias = "table")]
    #[serde(alias = "table")]
    Pretty,
    /// JSON output
    Json,
    /// CSV output, one row per engine
    Csv,
    /// YAML output
    #[value(alias = "yml")]
    #[serde(alias = "yml")]
    Yaml,
}

/// Print `value` in a machine-readable format. Returns `false` for `Pretty`,
/// which each command renders itself. CSV rows come from `rows`.
pub fn print_structured<T, R>(format: OutputFormat, value: &T, rows: &[R]) -> Result<bool>
where
    T: Serialize + ?Sized,
    R: Serialize,
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        OutputFormat::Pretty => return Ok(false),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_values_accept_aliases() {
        #[derive(Deserialize)]
        struct Doc {
            output_format: OutputFormat,
        }

        let doc: Doc = toml::from_str("output_format = \"table\"").unwrap();
        assert_eq!(doc.output_format, OutputFormat::Pretty);
        let doc: Doc = toml::from_str("output_format = \"yml\"").unwrap();
        assert_eq!(doc.output_format, OutputFormat::Yaml);
        assert!(toml::from_str::<Doc>("output_format = \"xml\"").is_err());
    }

    #[test]
    fn pretty_is_rendered_by_the_caller() {
        let printed = print_structured(OutputFormat::Pretty, &1, &[0u8; 0]).unwrap();
        assert!(!printed);
    }
}
