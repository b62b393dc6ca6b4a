use chrono::{DateTime, Local};

use crate::records::Record;

/// Render the final transcript: title, generation line, one numbered
/// section per record in input order. Pure; same inputs give the same
/// bytes. `observed_at` is deliberately not rendered.
pub fn build(subject: &str, records: &[Record], generated_at: DateTime<Local>) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Tweets from @{subject}\n"));
    out.push_str(&format!(
        "Generated: {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));

    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!("\n## Tweet {}\n{}\n", i + 1, record.content));
    }

    out
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(content: &str, observed_at: Option<&str>) -> Record {
        Record {
            content: content.to_string(),
            observed_at: observed_at.map(str::to_string),
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn empty_records_still_yield_a_header() {
        let doc = build("someone", &[], fixed_time());
        assert_eq!(
            doc,
            "# Tweets from @someone\nGenerated: 2024-03-09 14:05:00\n"
        );
    }

    #[test]
    fn sections_are_one_indexed_in_input_order() {
        let records = vec![record("first tweet", None), record("second tweet", None)];
        let doc = build("someone", &records, fixed_time());
        assert!(doc.contains("## Tweet 1\nfirst tweet\n"));
        assert!(doc.contains("## Tweet 2\nsecond tweet\n"));
        assert!(doc.find("Tweet 1").unwrap() < doc.find("Tweet 2").unwrap());
    }

    #[test]
    fn observed_at_is_not_rendered() {
        let records = vec![record("hello", Some("2024-01-01T00:00:00Z"))];
        let doc = build("someone", &records, fixed_time());
        assert!(!doc.contains("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn build_is_idempotent() {
        let records = vec![record("a", None), record("b", Some("t"))];
        let first = build("someone", &records, fixed_time());
        let second = build("someone", &records, fixed_time());
        assert_eq!(first, second);
    }
}
