//! CSV rendering for the admin export.

use chrono::{DateTime, Utc};

use crate::models::Submission;

pub const BOM: &[u8] = b"\xEF\xBB\xBF";
pub const HEADER: [&str; 7] = ["ID", "Name", "Email", "Message", "IP Address", "User Agent", "Submitted At"];

/// `feedback-export-YYYY-mm-dd-HH-MM-SS.csv`
pub fn file_name(now: DateTime<Utc>) -> String {
    format!("feedback-export-{}.csv", now.format("%Y-%m-%d-%H-%M-%S"))
}

/// BOM, header row, then one record per submission in the given order.
pub fn render_csv(rows: &[Submission]) -> Result<Vec<u8>, csv::Error> {
    let mut out = BOM.to_vec();
    {
        let mut w = csv::WriterBuilder::new().terminator(csv::Terminator::Any(b'\n')).from_writer(&mut out);
        w.write_record(HEADER)?;
        for r in rows {
            w.write_record([
                r.id.to_string().as_str(),
                r.name.as_str(),
                r.email.as_str(),
                r.message.as_str(),
                r.ip_address.as_deref().unwrap_or(""),
                r.user_agent.as_deref().unwrap_or(""),
                r.created_at.format("%Y-%m-%d %H:%M:%S").to_string().as_str(),
            ])?;
        }
        w.flush()?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(id: i64, message: &str) -> Submission {
        Submission {
            id,
            name: "Ana".into(),
            email: "ana@x.com".into(),
            message: message.into(),
            ip_address: Some("1.2.3.4".into()),
            user_agent: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn empty_export_has_bom_and_header() {
        let bytes = render_csv(&[]).unwrap();
        assert!(bytes.starts_with(BOM));
        let text = std::str::from_utf8(&bytes[BOM.len()..]).unwrap();
        assert_eq!(text, "ID,Name,Email,Message,IP Address,User Agent,Submitted At\n");
    }

    #[test]
    fn one_line_per_row_plus_header() {
        let rows = vec![row(2, "second"), row(1, "first")];
        let bytes = render_csv(&rows).unwrap();
        let text = std::str::from_utf8(&bytes[BOM.len()..]).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2,Ana,ana@x.com,second,1.2.3.4,,2024-05-01 09:30:00");
    }

    #[test]
    fn embedded_quotes_and_commas_are_quoted() {
        let bytes = render_csv(&[row(1, "said \"hi\", left")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"said \"\"hi\"\", left\""));
    }

    #[test]
    fn file_name_uses_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap();
        assert_eq!(file_name(now), "feedback-export-2024-05-01-09-30-05.csv");
    }
}
