//! Credential connectors
//!
//! A connector answers one question for a security check: which record, if
//! any, belongs to a presented key, token or user name.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::io::Read;

use crate::core::{Error, Result};
use crate::openapi::ConnectorConfig;

/// A credential record, keyed by column name or by mapped role name
pub type CredentialRecord = IndexMap<String, String>;

/// Lookup of credential records by their identifier
pub trait CredentialStore: Send + Sync {
    /// Returns the record stored under `id`; an empty id never matches
    fn get(&self, id: &str) -> Option<CredentialRecord>;
}

/// Opens the connector described by an `x-connector` entry
pub fn open(config: &ConnectorConfig) -> Result<Box<dyn CredentialStore>> {
    match config.kind.as_str() {
        "csv" => Ok(Box::new(CsvConnector::load(config)?)),
        other => Err(Error::config(format!("Unsupported connector type '{other}'"))),
    }
}

/// Credentials read once from a delimited text file
#[derive(Debug, Clone)]
pub struct CsvConnector {
    columns: Vec<String>,
    records: HashMap<String, Vec<String>>,
    /// Role name to column position
    mapping: Vec<(String, usize)>,
}

impl CsvConnector {
    /// Reads the file named by `config.source`
    pub fn load(config: &ConnectorConfig) -> Result<Self> {
        let file = std::fs::File::open(&config.source).map_err(|e| {
            Error::config(format!(
                "Unable to open credential source {}: {e}",
                config.source
            ))
        })?;
        let connector = Self::from_reader(file, config)?;
        tracing::debug!(
            "Loaded {} credential records from {}",
            connector.len(),
            config.source
        );
        Ok(connector)
    }

    /// Parses records from any reader; `config.source` is only used in messages
    pub fn from_reader<R: Read>(reader: R, config: &ConnectorConfig) -> Result<Self> {
        let delimiter = match config.options.delimiter.as_bytes() {
            [byte] => *byte,
            _ => {
                return Err(Error::config(format!(
                    "CSV delimiter must be a single byte, got '{}'",
                    config.options.delimiter
                )));
            }
        };
        let read_error =
            |e: csv::Error| Error::config(format!("Invalid credential source {}: {e}", config.source));

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(config.options.columns.is_none())
            .flexible(true)
            .from_reader(reader);

        let columns = match &config.options.columns {
            Some(columns) => columns.clone(),
            None => reader
                .headers()
                .map_err(read_error)?
                .iter()
                .map(str::to_string)
                .collect(),
        };

        let index = match &config.index {
            Some(column) => column_position(&columns, column)?,
            None => 0,
        };
        let mapping = config
            .mapping
            .iter()
            .map(|(role, column)| Ok((role.clone(), column_position(&columns, column)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut records = HashMap::new();
        for row in reader.records() {
            let row: Vec<String> = row.map_err(read_error)?.iter().map(str::to_string).collect();
            if let Some(id) = row.get(index) {
                records.insert(id.clone(), row);
            }
        }

        Ok(Self {
            columns,
            records,
            mapping,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CredentialStore for CsvConnector {
    fn get(&self, id: &str) -> Option<CredentialRecord> {
        if id.is_empty() {
            return None;
        }
        let row = self.records.get(id)?;
        let record = if self.mapping.is_empty() {
            self.columns
                .iter()
                .zip(row)
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect()
        } else {
            self.mapping
                .iter()
                .filter_map(|(role, position)| Some((role.clone(), row.get(*position)?.clone())))
                .collect()
        };
        Some(record)
    }
}

fn column_position(columns: &[String], column: &JsonValue) -> Result<usize> {
    match column {
        JsonValue::String(name) => columns
            .iter()
            .position(|candidate| candidate == name)
            .ok_or_else(|| Error::config(format!("Unknown credential column '{name}'"))),
        JsonValue::Number(number) => number
            .as_u64()
            .and_then(|position| usize::try_from(position).ok())
            .ok_or_else(|| Error::config(format!("Invalid credential column {number}"))),
        other => Err(Error::config(format!("Invalid credential column {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi::CsvOptions;
    use serde_json::json;

    fn config(index: JsonValue, mapping: JsonValue, options: CsvOptions) -> ConnectorConfig {
        ConnectorConfig {
            kind: "csv".to_string(),
            source: "inline.csv".to_string(),
            index: Some(index),
            mapping: serde_json::from_value(mapping).unwrap(),
            options,
        }
    }

    #[test]
    fn test_records_keyed_by_header_column() {
        let data = "user,salt,password\nhans,abc,123\nfranz,def,456\n";
        let connector =
            CsvConnector::from_reader(data.as_bytes(), &config(json!("user"), json!({}), CsvOptions::default()))
                .unwrap();

        assert_eq!(connector.len(), 2);
        let record = connector.get("franz").unwrap();
        assert_eq!(record["salt"], "def");
        assert_eq!(record["password"], "456");
        assert!(connector.get("sepp").is_none());
        assert!(connector.get("").is_none());
    }

    #[test]
    fn test_explicit_columns_and_delimiter() {
        let data = "key-1;alice\nkey-2;bob\n";
        let options = CsvOptions {
            delimiter: ";".to_string(),
            columns: Some(vec!["key".to_string(), "owner".to_string()]),
        };
        let connector =
            CsvConnector::from_reader(data.as_bytes(), &config(json!(0), json!({}), options)).unwrap();

        assert_eq!(connector.get("key-2").unwrap()["owner"], "bob");
    }

    #[test]
    fn test_mapping_renames_columns() {
        let data = "name,s,hash\nhans,abc,123\n";
        let connector = CsvConnector::from_reader(
            data.as_bytes(),
            &config(json!("name"), json!({"salt": "s", "password": 2}), CsvOptions::default()),
        )
        .unwrap();

        let record = connector.get("hans").unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record["salt"], "abc");
        assert_eq!(record["password"], "123");
    }

    #[test]
    fn test_unknown_index_column() {
        let data = "user,password\n";
        let err = CsvConnector::from_reader(
            data.as_bytes(),
            &config(json!("login"), json!({}), CsvOptions::default()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown credential column 'login'"
        );
    }

    #[test]
    fn test_multi_byte_delimiter_rejected() {
        let options = CsvOptions {
            delimiter: "::".to_string(),
            columns: None,
        };
        assert!(CsvConnector::from_reader("a\n".as_bytes(), &config(json!(0), json!({}), options)).is_err());
    }

    #[test]
    fn test_open_rejects_unknown_kind() {
        let mut config = config(json!(0), json!({}), CsvOptions::default());
        config.kind = "ldap".to_string();
        assert!(open(&config).is_err());
    }
}
