//! Local quote store.
//!
//! An ordered, in-memory collection of quotes mirrored to a [`Persistence`]
//! backend together with the last-sync timestamp. User edits (`add_quote`,
//! `edit_quote`) are persisted immediately; bulk sync updates are written by
//! the caller with [`LocalStore::save`] once a cycle has been applied.

use rand::seq::SliceRandom;

use crate::error::{QuoteError, QuoteResult};
use crate::models::{Origin, Quote};
use crate::persistence::Persistence;
use crate::validation::{
    validate_author, validate_category, validate_quote_id, validate_quote_text, validate_unique_ids,
    ALL_CATEGORIES,
};

/// Quotes shipped with a fresh install: (text, category)
const DEFAULT_QUOTES: &[(&str, &str)] = &[
    ("The only way to do great work is to love what you do.", "Work"),
    ("Life is what happens to you while you're busy making other plans.", "Life"),
    ("The future belongs to those who believe in the beauty of their dreams.", "Dreams"),
    ("Be the change that you wish to see in the world.", "Inspiration"),
    ("The only true wisdom is in knowing you know nothing.", "Wisdom"),
    ("In the middle of difficulty lies opportunity.", "Opportunity"),
    ("Success is not final, failure is not fatal: it is the courage to continue that counts.", "Success"),
    ("The greatest glory in living lies not in never falling, but in rising every time we fall.", "Perseverance"),
];

/// The built-in quote collection.
pub fn default_quotes() -> Vec<Quote> {
    DEFAULT_QUOTES
        .iter()
        .enumerate()
        .map(|(i, (text, category))| Quote {
            id: format!("default-{}", i + 1),
            text: (*text).to_string(),
            author: String::new(),
            category: (*category).to_string(),
            version: 1,
            dirty: false,
            conflict: false,
            origin: Origin::Local,
        })
        .collect()
}

/// In-memory quote collection with a persistent mirror
pub struct LocalStore {
    quotes: Vec<Quote>,
    last_sync: Option<i64>,
    persistence: Box<dyn Persistence>,
}

impl LocalStore {
    /// Load the store from persistence, seeding the default quotes when the
    /// quote slot has never been written.
    pub fn open(persistence: Box<dyn Persistence>) -> QuoteResult<Self> {
        let (quotes, seeded) = match persistence.load()? {
            Some(quotes) => (quotes, false),
            None => (default_quotes(), true),
        };
        validate_unique_ids(&quotes)?;
        let last_sync = persistence.load_timestamp()?;

        let store = Self {
            quotes,
            last_sync,
            persistence,
        };
        if seeded {
            tracing::debug!("Seeded local store with {} default quotes", store.quotes.len());
            store.save()?;
        }
        Ok(store)
    }

    /// Write the current collection to persistence
    pub fn save(&self) -> QuoteResult<()> {
        self.persistence.save(&self.quotes)
    }

    pub fn persistence(&self) -> &dyn Persistence {
        self.persistence.as_ref()
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Quote> {
        self.quotes.iter().find(|q| q.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Quote> {
        self.quotes.iter_mut().find(|q| q.id == id)
    }

    /// Add a new locally authored quote. Text and category are required.
    pub fn add_quote(&mut self, text: &str, category: &str, author: &str) -> QuoteResult<Quote> {
        validate_quote_text(text)?;
        validate_category(category)?;
        validate_author(author)?;

        let quote = Quote::new(text.trim(), category.trim(), author.trim());
        self.quotes.push(quote.clone());
        self.save()?;

        tracing::debug!("Added quote {} in category {}", quote.id, quote.category);
        Ok(quote)
    }

    /// Edit an existing quote, bumping its version and marking it dirty.
    pub fn edit_quote(
        &mut self,
        id: &str,
        text: &str,
        category: &str,
        author: &str,
    ) -> QuoteResult<Quote> {
        validate_quote_id(id)?;
        validate_quote_text(text)?;
        validate_category(category)?;
        validate_author(author)?;

        let quote = self
            .get_mut(id)
            .ok_or_else(|| QuoteError::NotFound(format!("quote {}", id)))?;
        quote.text = text.trim().to_string();
        quote.category = category.trim().to_string();
        quote.author = author.trim().to_string();
        quote.version += 1;
        quote.dirty = true;
        let edited = quote.clone();

        self.save()?;
        tracing::debug!("Edited quote {} (version {})", edited.id, edited.version);
        Ok(edited)
    }

    /// Copies of every quote with the dirty flag set
    pub fn dirty_quotes(&self) -> Vec<Quote> {
        self.quotes.iter().filter(|q| q.dirty).cloned().collect()
    }

    /// Clear the dirty flag on every currently-dirty quote. Returns how many
    /// were cleared. Not persisted until [`LocalStore::save`].
    pub fn clear_dirty(&mut self) -> usize {
        let mut cleared = 0;
        for quote in self.quotes.iter_mut().filter(|q| q.dirty) {
            quote.dirty = false;
            cleared += 1;
        }
        cleared
    }

    /// Replace the whole collection. Not persisted until [`LocalStore::save`].
    pub fn replace_all(&mut self, quotes: Vec<Quote>) -> QuoteResult<()> {
        validate_unique_ids(&quotes)?;
        self.quotes = quotes;
        Ok(())
    }

    /// Distinct categories in order of first appearance
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for quote in &self.quotes {
            if !categories.iter().any(|c| c == &quote.category) {
                categories.push(quote.category.clone());
            }
        }
        categories
    }

    /// A uniformly random quote, optionally restricted to one category.
    ///
    /// `None` or `"All"` means no filter.
    pub fn random_quote(&self, category: Option<&str>) -> Option<&Quote> {
        let filter = category.filter(|c| *c != ALL_CATEGORIES);
        let candidates: Vec<&Quote> = self
            .quotes
            .iter()
            .filter(|q| filter.map_or(true, |c| q.category == c))
            .collect();
        candidates.choose(&mut rand::thread_rng()).copied()
    }

    /// Unix milliseconds of the last completed sync
    pub fn last_sync(&self) -> Option<i64> {
        self.last_sync
    }

    pub fn set_last_sync(&mut self, timestamp: i64) -> QuoteResult<()> {
        self.last_sync = Some(timestamp);
        self.persistence.save_timestamp(timestamp)
    }
}
