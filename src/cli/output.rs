use std::fmt::Write as FmtWrite;

use uuid::Uuid;

use crate::models::{MatchCandidate, OutputFormat, RecordCounts, SyncReport};

pub trait Formatter {
    fn format_sync_report(&self, report: &SyncReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_matches(&self, probe: Uuid, candidates: &[MatchCandidate]) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub store_url: String,
    pub store_connected: bool,
    pub collection: String,
    pub counts: Option<RecordCounts>,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_dimension: u32,
    pub embedding_reachable: bool,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_sync_report(&self, report: &SyncReport) -> String {
        let mut output = String::new();
        writeln!(output, "Sync Complete").unwrap();
        writeln!(output, "-------------").unwrap();
        writeln!(output, "Pending records: {}", report.pending).unwrap();
        writeln!(output, "Embedded:        {}", report.embedded).unwrap();
        writeln!(output, "Batches:         {}", report.batches).unwrap();
        writeln!(output, "Failed records:  {}", report.failed_records()).unwrap();
        writeln!(output, "Duration:        {}ms", report.duration_ms).unwrap();

        if !report.failures.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "Failures").unwrap();
            writeln!(output, "--------").unwrap();
            for failure in &report.failures {
                writeln!(
                    output,
                    "  batch {} ({}, {} records): {}",
                    failure.batch_index,
                    failure.kind,
                    failure.record_ids.len(),
                    failure.error
                )
                .unwrap();
            }
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let store_status = if status.store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(output, "Record Store:  {}", store_status).unwrap();
        writeln!(output, "  URL:         {}", status.store_url).unwrap();
        writeln!(output, "  Collection:  {}", status.collection).unwrap();
        if let Some(counts) = status.counts {
            writeln!(output, "  Records:     {}", counts.total).unwrap();
            writeln!(output, "  Embedded:    {}", counts.embedded).unwrap();
            writeln!(output, "  Pending:     {}", counts.pending).unwrap();
        }
        writeln!(output).unwrap();

        let api_status = if status.embedding_reachable {
            "[REACHABLE]"
        } else {
            "[UNREACHABLE]"
        };
        writeln!(output, "Embedding API: {}", api_status).unwrap();
        writeln!(output, "  URL:         {}", status.embedding_url).unwrap();
        writeln!(output, "  Model:       {}", status.embedding_model).unwrap();
        writeln!(output, "  Dimension:   {}", status.embedding_dimension).unwrap();

        output
    }

    fn format_matches(&self, probe: Uuid, candidates: &[MatchCandidate]) -> String {
        if candidates.is_empty() {
            return format!("No match candidates found for: {}\n", probe);
        }

        let mut output = String::new();
        writeln!(output, "Match candidates for: {}\n", probe).unwrap();

        for (i, candidate) in candidates.iter().enumerate() {
            writeln!(
                output,
                "{}. [Score: {:.3}] {}",
                i + 1,
                candidate.score,
                candidate.display_name()
            )
            .unwrap();
            if let Some(ref birth_date) = candidate.birth_date {
                writeln!(output, "   Birth date: {}", birth_date).unwrap();
            }
            if let Some(ref group) = candidate.member_group_id {
                writeln!(output, "   Group:      {}", group).unwrap();
            }
            writeln!(output, "   Id:         {}", candidate.id).unwrap();
            writeln!(output).unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn serialize(&self, value: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_sync_report(&self, report: &SyncReport) -> String {
        let json = serde_json::json!({
            "pending": report.pending,
            "embedded": report.embedded,
            "batches": report.batches,
            "failed_records": report.failed_records(),
            "failures": report.failures,
            "duration_ms": report.duration_ms,
        });
        self.serialize(&json)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "store": {
                "url": status.store_url,
                "connected": status.store_connected,
                "collection": status.collection,
                "counts": status.counts,
            },
            "embedding": {
                "url": status.embedding_url,
                "model": status.embedding_model,
                "dimension": status.embedding_dimension,
                "reachable": status.embedding_reachable,
            }
        });
        self.serialize(&json)
    }

    fn format_matches(&self, probe: Uuid, candidates: &[MatchCandidate]) -> String {
        let json = serde_json::json!({
            "probe": probe,
            "candidates": candidates,
        });
        self.serialize(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
