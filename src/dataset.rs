//! # Dataset Parsing Module
//!
//! Turns uploaded files into rows for the stores. Plain response lists
//! accept text, CSV and JSON; question/answer datasets accept JSON and
//! blank-line separated text blocks. A file without usable entries parses
//! to an empty list, which callers report separately from parse errors.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::store::QaPair;

lazy_static! {
    static ref SEPARATOR_LINE: Regex =
        Regex::new(r"^\s*(={3,}\s*)?$").expect("Separator line pattern should be valid");
}

/// Upload format, derived from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Text,
    Csv,
    Json,
    Other,
}

impl FileFormat {
    pub fn from_file_name(file_name: &str) -> Self {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "txt" | "text" => FileFormat::Text,
            "csv" => FileFormat::Csv,
            "json" => FileFormat::Json,
            _ => FileFormat::Other,
        }
    }
}

/// Errors raised while parsing an uploaded file
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// The file is not valid JSON
    InvalidJson(String),
    /// A quoted CSV field is never closed
    InvalidCsv(String),
    /// The format cannot hold a question/answer dataset
    UnsupportedFormat(String),
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::InvalidJson(msg) => write!(f, "Invalid JSON: {msg}"),
            DatasetError::InvalidCsv(msg) => write!(f, "Invalid CSV: {msg}"),
            DatasetError::UnsupportedFormat(name) => write!(f, "Unsupported dataset file: {name}"),
        }
    }
}

impl std::error::Error for DatasetError {}

/// Parse a plain response list
pub fn parse_responses(file_name: &str, content: &str) -> Result<Vec<String>, DatasetError> {
    let responses = match FileFormat::from_file_name(file_name) {
        FileFormat::Text | FileFormat::Other => text_lines(content),
        FileFormat::Csv => csv_first_column(content)?,
        FileFormat::Json => json_responses(content)?,
    };

    let responses: Vec<String> = responses.into_iter().filter(|r| !r.is_empty()).collect();
    debug!(file_name = %file_name, responses = responses.len(), "Parsed responses file");
    Ok(responses)
}

/// Parse a question/answer dataset
pub fn parse_qa_dataset(file_name: &str, content: &str) -> Result<Vec<QaPair>, DatasetError> {
    let pairs = match FileFormat::from_file_name(file_name) {
        FileFormat::Json => json_pairs(content)?,
        FileFormat::Text => text_pairs(content),
        FileFormat::Csv | FileFormat::Other => {
            return Err(DatasetError::UnsupportedFormat(file_name.to_string()))
        }
    };
    debug!(file_name = %file_name, pairs = pairs.len(), "Parsed dataset file");
    Ok(pairs)
}

fn text_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// First field of every non-empty record; quoted fields may span lines
fn csv_first_column(content: &str) -> Result<Vec<String>, DatasetError> {
    let mut values = Vec::new();
    let mut chars = content.chars().peekable();

    while chars.peek().is_some() {
        let mut field = String::new();
        let quoted = chars.peek() == Some(&'"');

        if quoted {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => {
                        return Err(DatasetError::InvalidCsv(format!(
                            "unterminated quoted field after record {}",
                            values.len()
                        )))
                    }
                }
            }
        }

        // Only the first column is kept; the rest of the record is skipped,
        // including quoted fields that span lines
        let mut in_first = !quoted;
        let mut in_quotes = false;
        for c in chars.by_ref() {
            match c {
                '"' if !in_first => in_quotes = !in_quotes,
                '\n' if !in_quotes => break,
                ',' if !in_quotes => in_first = false,
                _ if in_first => field.push(c),
                _ => {}
            }
        }

        let first = field.trim().to_string();
        if !first.is_empty() {
            values.push(first);
        }
    }

    Ok(values)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn json_responses(content: &str) -> Result<Vec<String>, DatasetError> {
    let data: Value =
        serde_json::from_str(content).map_err(|e| DatasetError::InvalidJson(e.to_string()))?;

    let items = match &data {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("responses") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(obj) => obj.get("text").map(value_to_string),
            _ => None,
        })
        .collect())
}

fn json_pairs(content: &str) -> Result<Vec<QaPair>, DatasetError> {
    let data: Value =
        serde_json::from_str(content).map_err(|e| DatasetError::InvalidJson(e.to_string()))?;

    let raw: Vec<(String, String)> = match &data {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                let question = value_to_string(obj.get("question")?);
                let answer = value_to_string(obj.get("answer")?);
                Some((question, answer))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(question, answer)| (question.trim().to_string(), value_to_string(answer)))
            .collect(),
        _ => Vec::new(),
    };

    Ok(raw
        .into_iter()
        .filter(|(question, answer)| !question.is_empty() && !answer.is_empty())
        .map(|(question, answer)| QaPair::new(question, answer))
        .collect())
}

/// Blocks separated by a blank line or a `===` line; first line is the question
fn text_pairs(content: &str) -> Vec<QaPair> {
    let mut pairs = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in content.lines().chain(std::iter::once("")) {
        if SEPARATOR_LINE.is_match(line) {
            if let Some((question, answer)) = block.split_first() {
                if !answer.is_empty() {
                    pairs.push(QaPair::new(*question, answer.join("\n")));
                }
            }
            block.clear();
        } else {
            block.push(line.trim());
        }
    }

    pairs
}

/// Summary of a question/answer dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub total: usize,
    /// Average question length in characters
    pub avg_question_len: f64,
    /// Average answer length in characters
    pub avg_answer_len: f64,
}

impl DatasetStats {
    pub fn from_pairs(pairs: &[QaPair]) -> Self {
        let total = pairs.len();
        if total == 0 {
            return Self {
                total,
                avg_question_len: 0.0,
                avg_answer_len: 0.0,
            };
        }

        let question_chars: usize = pairs.iter().map(|p| p.question.chars().count()).sum();
        let answer_chars: usize = pairs.iter().map(|p| p.answer.chars().count()).sum();
        Self {
            total,
            avg_question_len: question_chars as f64 / total as f64,
            avg_answer_len: answer_chars as f64 / total as f64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
