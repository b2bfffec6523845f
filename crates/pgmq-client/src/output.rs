//! Output formatting for the pgmq CLI.
//!
//! ## What
//!
//! - [`OutputWriter`] picks between [`JsonOutputWriter`] and [`TableOutputWriter`].
//! - [`MessageId`] and [`Outcome`] are small row types for commands that return ids or flags.
//!
//! ## How
//!
//! Every command hands its result to `write_list` or `write_item`, so the `--format` flag applies
//! uniformly.

use serde::Serialize;
use tabled::{Table, Tabled};

pub enum OutputWriter {
    /// Display results in a human-readable table
    Table(TableOutputWriter),
    /// Display results as JSON
    Json(JsonOutputWriter),
}

impl OutputWriter {
    /// Writer for a `--format` value; anything but `json` is a table.
    pub fn for_format(format: &str) -> Self {
        match format.to_lowercase().as_str() {
            "json" => OutputWriter::Json(JsonOutputWriter),
            _ => OutputWriter::Table(TableOutputWriter),
        }
    }

    /// Write a list of items using the configured output format.
    pub fn write_list<T: Serialize + Tabled>(
        &self,
        items: &[T],
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        match self {
            OutputWriter::Table(writer) => writer.write_list(items, out),
            OutputWriter::Json(writer) => writer.write_list(items, out),
        }
    }

    /// Write a single item using the configured output format.
    pub fn write_item<T: Serialize + Tabled>(
        &self,
        item: &T,
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        match self {
            OutputWriter::Table(writer) => writer.write_item(item, out),
            OutputWriter::Json(writer) => writer.write_item(item, out),
        }
    }

    /// Write an optional item; `None` prints a short notice in table mode and `null` in JSON.
    pub fn write_optional<T: Serialize + Tabled>(
        &self,
        item: Option<&T>,
        empty: &str,
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        match (self, item) {
            (_, Some(item)) => self.write_item(item, out),
            (OutputWriter::Table(_), None) => {
                writeln!(out, "{}", empty)?;
                Ok(())
            }
            (OutputWriter::Json(_), None) => {
                writeln!(out, "null")?;
                Ok(())
            }
        }
    }
}

/// Writer for formatting output as human-readable tables
pub struct TableOutputWriter;
impl TableOutputWriter {
    pub fn write_list<T: Serialize + Tabled>(
        &self,
        items: &[T],
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        let table = Table::new(items);
        writeln!(out, "{}", table)?;
        Ok(())
    }

    pub fn write_item<T: Serialize + Tabled>(
        &self,
        item: &T,
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        self.write_list(std::slice::from_ref(item), out)
    }
}

/// Writer for formatting output as JSON
pub struct JsonOutputWriter;
impl JsonOutputWriter {
    /// Write items as pretty-printed JSON.
    pub fn write_list<T: Serialize>(
        &self,
        items: &[T],
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(items)?;
        writeln!(out, "{}", json)?;
        Ok(())
    }

    /// Write a single item as pretty-printed JSON.
    pub fn write_item<T: Serialize>(
        &self,
        item: &T,
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(item)?;
        writeln!(out, "{}", json)?;
        Ok(())
    }
}

/// A message id returned by send, archive or delete.
#[derive(Debug, Serialize, Tabled)]
pub struct MessageId {
    pub msg_id: i64,
}

impl MessageId {
    pub fn list(ids: &[i64]) -> Vec<Self> {
        ids.iter().map(|&msg_id| Self { msg_id }).collect()
    }
}

/// Result of a single-message archive or delete.
#[derive(Debug, Serialize, Tabled)]
pub struct Outcome {
    pub queue: String,
    pub msg_id: i64,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgmq_client::{json_value, Message};

    fn sample_message() -> Message {
        let now = chrono::Utc::now();
        Message {
            msg_id: 1,
            read_ct: 2,
            enqueued_at: now,
            vt: now,
            message: json_value!({"foo": "bar"}),
        }
    }

    #[test]
    fn test_json_writer_list() {
        let writer = OutputWriter::for_format("json");
        let mut cursor = std::io::Cursor::new(Vec::new());
        writer
            .write_list(&[sample_message()], &mut cursor)
            .unwrap();
        let output = String::from_utf8(cursor.into_inner()).unwrap();
        assert!(output.contains("\"foo\": \"bar\""));
        assert!(output.contains("msg_id"));
    }

    #[test]
    fn test_table_writer_list() {
        let writer = OutputWriter::for_format("table");
        let mut cursor = std::io::Cursor::new(Vec::new());
        writer
            .write_list(&[sample_message()], &mut cursor)
            .unwrap();
        let output = String::from_utf8(cursor.into_inner()).unwrap();

        assert!(output.contains("msg_id"), "Should contain msg_id column header");
        assert!(output.contains("read_ct"), "Should contain read_ct column header");
        assert!(output.contains(r#"{"foo":"bar"}"#), "Should contain the payload");
        assert!(output.contains('|'), "Should contain table border characters");
    }

    #[test]
    fn test_message_ids_as_table() {
        let writer = OutputWriter::for_format("table");
        let mut cursor = std::io::Cursor::new(Vec::new());
        writer
            .write_list(&MessageId::list(&[4, 9]), &mut cursor)
            .unwrap();
        let output = String::from_utf8(cursor.into_inner()).unwrap();
        assert!(output.contains("msg_id"));
        assert!(output.contains('4'));
        assert!(output.contains('9'));
    }

    #[test]
    fn test_write_optional_none() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        OutputWriter::for_format("json")
            .write_optional::<Message>(None, "No message available", &mut cursor)
            .unwrap();
        assert_eq!(String::from_utf8(cursor.into_inner()).unwrap(), "null\n");

        let mut cursor = std::io::Cursor::new(Vec::new());
        OutputWriter::for_format("table")
            .write_optional::<Message>(None, "No message available", &mut cursor)
            .unwrap();
        assert_eq!(
            String::from_utf8(cursor.into_inner()).unwrap(),
            "No message available\n"
        );
    }
}
