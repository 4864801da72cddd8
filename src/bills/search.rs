use super::normalize::{contains_bill_number, extract_bill_number, strip_markup};
use super::{BillRecord, BillStore};

/// Maximum number of records a text search returns.
pub const SEARCH_LIMIT: usize = 10;

/// Outcome of resolving a message against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum BillLookup<'a> {
    /// The text carries no bill number at all.
    NoNumber,
    /// A well-formed number that the dataset doesn't know.
    Unknown { number: String },
    Found {
        number: String,
        record: &'a BillRecord,
    },
}

impl BillStore {
    /// First record whose number equals `number`.
    pub fn find_by_number(&self, number: &str) -> Option<&BillRecord> {
        self.iter().find(|bill| bill.number == number)
    }

    pub fn find_bill(&self, text: &str) -> BillLookup<'_> {
        let Some(number) = extract_bill_number(Some(text)) else {
            return BillLookup::NoNumber;
        };

        match self.find_by_number(&number) {
            Some(record) => BillLookup::Found { number, record },
            None => BillLookup::Unknown { number },
        }
    }

    /// Case-insensitive substring search over titles and descriptions.
    ///
    /// Markup is stripped from the query first. Returns the first
    /// [`SEARCH_LIMIT`] hits in store order and stops scanning once the limit
    /// is reached. Queries containing a bill number are rejected (empty
    /// result); those go through [`BillStore::find_bill`].
    pub fn search(&self, query: &str) -> Vec<&BillRecord> {
        let query = strip_markup(query);
        let query = query.trim();
        if query.is_empty() || contains_bill_number(query) {
            return Vec::new();
        }

        let needle = query.to_lowercase();
        self.iter()
            .filter(|bill| {
                bill.title.to_lowercase().contains(&needle)
                    || bill.description.to_lowercase().contains(&needle)
            })
            .take(SEARCH_LIMIT)
            .collect()
    }
}
