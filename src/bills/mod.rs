pub mod normalize;
pub mod search;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

pub use search::BillLookup;

/// Source keys for the bill number, highest priority first.
const NUMBER_KEYS: [&str; 3] = ["bill_number", "number", "billId"];
const URL_KEYS: [&str; 2] = ["url", "link"];
const DATE_KEYS: [&str; 6] = [
    "date",
    "registration_date",
    "reg_date",
    "introduced",
    "introduced_date",
    "submitted",
];

const SOZD_BILL_URL: &str = "https://sozd.duma.gov.ru/bill/";

/// Reference URL for a bill that has no explicit link in the dataset.
pub fn bill_url(number: &str) -> String {
    format!("{}{}", SOZD_BILL_URL, number)
}

/// A bill in canonical shape. The dataset's flexible key names are
/// collapsed here once, at load time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BillRecord {
    pub number: String,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub date: Option<String>,
}

impl BillRecord {
    /// Build a record from one dataset object. Returns None for non-objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            number: first_field(obj, &NUMBER_KEYS).unwrap_or_default(),
            title: first_field(obj, &["title"]).unwrap_or_default(),
            description: first_field(obj, &["description"]).unwrap_or_default(),
            url: first_field(obj, &URL_KEYS),
            date: first_field(obj, &DATE_KEYS),
        })
    }

    pub fn resolved_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => bill_url(&self.number),
        }
    }

    /// Date as `dd.mm.yyyy` when it parses, otherwise the raw value.
    pub fn formatted_date(&self) -> Option<String> {
        let raw = self.date.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(format_date(raw).unwrap_or_else(|| raw.to_string()))
    }

    /// Inline button label: the number, plus the date when known.
    pub fn button_label(&self) -> String {
        match self.formatted_date() {
            Some(date) => format!("{} от {}", self.number, date),
            None => self.number.clone(),
        }
    }
}

fn first_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn format_date(raw: &str) -> Option<String> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d.%m.%Y"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })?;
    Some(date.format("%d.%m.%Y").to_string())
}

/// Immutable, ordered collection of bills loaded once per process.
#[derive(Debug, Clone, Default)]
pub struct BillStore {
    bills: Vec<BillRecord>,
}

impl BillStore {
    pub fn new(bills: Vec<BillRecord>) -> Self {
        Self { bills }
    }

    /// Parse a dataset: either a bare JSON array or `{"bills": [...]}`.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).context("Bill dataset is not valid JSON")?;

        let items = match &value {
            Value::Array(items) => items,
            Value::Object(obj) => match obj.get("bills") {
                Some(Value::Array(items)) => items,
                _ => bail!("Bill dataset object has no \"bills\" array"),
            },
            _ => bail!("Bill dataset must be a JSON array"),
        };

        let bills: Vec<BillRecord> = items.iter().filter_map(BillRecord::from_json).collect();
        let skipped = items.len() - bills.len();
        if skipped > 0 {
            warn!("Skipped {} non-object entries in bill dataset", skipped);
        }

        Ok(Self::new(bills))
    }

    /// Load the dataset from disk. A missing or broken file yields an empty
    /// store so the bot keeps answering commands.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Bill dataset {} not readable: {}", path.display(), e);
                return Self::default();
            }
        };

        match Self::from_json_str(&content) {
            Ok(store) => {
                info!("Loaded {} bills from {}", store.len(), path.display());
                store
            }
            Err(e) => {
                warn!("Failed to parse bill dataset {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BillRecord> {
        self.bills.iter()
    }

    pub fn len(&self) -> usize {
        self.bills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bills.is_empty()
    }
}
