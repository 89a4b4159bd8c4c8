use std::io::Read;

use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{ApplicantId, CandidateFields, CandidateProfile, JobId};

/// Row-level failure while reading a job-board export.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("line {line}: malformed row: {source}")]
    Malformed {
        line: u64,
        #[source]
        source: csv::Error,
    },
    #[error("line {line}: {reason}")]
    Invalid { line: u64, reason: String },
}

impl ImportError {
    pub fn line(&self) -> u64 {
        match self {
            Self::Malformed { line, .. } | Self::Invalid { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    pub line: u64,
    pub code: String,
    pub reason: String,
}

/// Outcome of a bulk import; rows fail independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub job_id: JobId,
    pub imported: Vec<ApplicantId>,
    pub rejected: Vec<ImportRowError>,
}

#[derive(Debug)]
pub(crate) struct ImportedCandidate {
    pub(crate) line: u64,
    pub(crate) fields: CandidateFields,
}

/// Parse an export with `First Name, Last Name, Email, Phone, Headline, Skills, Years Experience`
/// columns. Each row reports the physical line it starts on, so quoted multi-line fields do not
/// shift the numbers of later rows.
pub(crate) fn parse_candidates<R: Read>(reader: R) -> Vec<Result<ImportedCandidate, ImportError>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = match csv_reader.headers() {
        Ok(headers) => headers.clone(),
        Err(source) => return vec![Err(ImportError::Malformed { line: 1, source })],
    };

    csv_reader
        .records()
        .map(|record| {
            let record = record.map_err(|source| ImportError::Malformed {
                line: source.position().map_or(0, csv::Position::line),
                source,
            })?;
            let line = record.position().map_or(0, csv::Position::line);
            let row: CandidateRow = record
                .deserialize(Some(&headers))
                .map_err(|source| ImportError::Malformed { line, source })?;
            row.into_fields()
                .map(|fields| ImportedCandidate { line, fields })
                .map_err(|reason| ImportError::Invalid { line, reason })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct CandidateRow {
    #[serde(rename = "First Name")]
    first_name: String,
    #[serde(rename = "Last Name")]
    last_name: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Phone", default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
    #[serde(rename = "Headline", default, deserialize_with = "empty_string_as_none")]
    headline: Option<String>,
    #[serde(rename = "Skills", default, deserialize_with = "empty_string_as_none")]
    skills: Option<String>,
    #[serde(
        rename = "Years Experience",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    years_experience: Option<String>,
}

impl CandidateRow {
    fn into_fields(self) -> Result<CandidateFields, String> {
        let years_experience = match self.years_experience.as_deref() {
            Some(raw) => Some(
                raw.parse::<u8>()
                    .map_err(|_| format!("years experience '{raw}' is not a whole number"))?,
            ),
            None => None,
        };

        Ok(CandidateFields {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            resume_ref: None,
            cover_letter_ref: None,
            profile: CandidateProfile {
                headline: self.headline,
                skills: self.skills.as_deref().map(split_skills).unwrap_or_default(),
                years_experience,
            },
        })
    }
}

fn split_skills(raw: &str) -> Vec<String> {
    raw.split([';', '|', ','])
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "First Name,Last Name,Email,Phone,Headline,Skills,Years Experience\n";

    #[test]
    fn parses_rows_and_splits_skills() {
        let csv = format!(
            "{HEADER}Ada,Lovelace,ada@example.com,,Analyst,rust; sql | math,7\n"
        );
        let rows = parse_candidates(Cursor::new(csv));
        assert_eq!(rows.len(), 1);
        let candidate = rows.into_iter().next().expect("one row").expect("row parses");
        assert_eq!(candidate.line, 2);
        assert_eq!(candidate.fields.phone, None);
        assert_eq!(candidate.fields.profile.skills, vec!["rust", "sql", "math"]);
        assert_eq!(candidate.fields.profile.years_experience, Some(7));
    }

    #[test]
    fn reports_bad_experience_with_its_line() {
        let csv = format!(
            "{HEADER}Ada,Lovelace,ada@example.com,,,,7\nGrace,Hopper,grace@example.com,,,,many\n"
        );
        let rows = parse_candidates(Cursor::new(csv));
        assert!(rows[0].is_ok());
        let err = rows[1].as_ref().expect_err("second row rejected");
        assert_eq!(err.line(), 3);
        assert!(err.to_string().contains("many"));
    }

    #[test]
    fn multi_line_fields_keep_later_lines_accurate() {
        let csv = format!(
            "{HEADER}Ada,Lovelace,ada@example.com,,\"Analyst,\nmathematician\",,7\n\
             Grace,Hopper,grace@example.com,,,,many\n"
        );
        let rows = parse_candidates(Cursor::new(csv));
        assert_eq!(rows.len(), 2);
        let first = rows[0].as_ref().expect("first row parses");
        assert_eq!(first.line, 2);
        assert_eq!(
            first.fields.profile.headline.as_deref(),
            Some("Analyst,\nmathematician")
        );
        let err = rows[1].as_ref().expect_err("second row rejected");
        assert_eq!(err.line(), 4);
    }

    #[test]
    fn short_rows_are_malformed_at_their_line() {
        let csv = format!("{HEADER}Ada,Lovelace,ada@example.com,,,,7\nGrace,Hopper\n");
        let rows = parse_candidates(Cursor::new(csv));
        match &rows[1] {
            Err(ImportError::Malformed { line, .. }) => assert_eq!(*line, 3),
            other => panic!("expected malformed row, got {other:?}"),
        }
    }
}
