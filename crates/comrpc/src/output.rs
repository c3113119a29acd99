use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};

use bytes::Bytes;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One decoded envelope.
#[derive(Debug, Serialize)]
pub struct MessageRecord {
    pub index: usize,
    pub tag: String,
    pub message: &'static str,
    pub size: usize,
    pub fields: BTreeMap<&'static str, Value>,
    #[serde(skip)]
    pub payload: Bytes,
}

pub fn print_records(records: &[MessageRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for record in records {
                println!(
                    "{}",
                    serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "TAG", "MESSAGE", "SIZE", "FIELDS"]);
            for record in records {
                table.add_row(vec![
                    record.index.to_string(),
                    record.tag.clone(),
                    record.message.to_string(),
                    record.size.to_string(),
                    fields_text(&record.fields, "\n"),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for record in records {
                println!(
                    "#{} {} ({}) size={} {}",
                    record.index,
                    record.message,
                    record.tag,
                    record.size,
                    fields_text(&record.fields, " ")
                );
            }
        }
        OutputFormat::Raw => {
            for record in records {
                print_raw(&record.payload);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn fields_text(fields: &BTreeMap<&'static str, Value>, separator: &str) -> String {
    fields
        .iter()
        .map(|(name, value)| match value {
            Value::String(text) => format!("{name}={text}"),
            other => format!("{name}={other}"),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_fields_print_unquoted() {
        let mut fields = BTreeMap::new();
        fields.insert("class_name", Value::from("Engine"));
        fields.insert("id", Value::from(7u32));
        assert_eq!(fields_text(&fields, " "), "class_name=Engine id=7");
    }

    #[test]
    fn payload_is_not_serialized() {
        let record = MessageRecord {
            index: 0,
            tag: "ANNOUNCE request".to_string(),
            message: "Init",
            size: 3,
            fields: BTreeMap::new(),
            payload: Bytes::from_static(b"abc"),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"message\":\"Init\""));
        assert!(!json.contains("payload"));
    }
}
