//! Persistence of generated records.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Flashcard, JournalEntry, PaymentRecord, Recipe};

/// A recipe to be stored.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub content: String,
    pub ingredients: Option<String>,
}

/// A payment session to be stored.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reference: String,
    pub amount_minor: i64,
    pub currency: String,
    pub email: String,
}

/// Storage for the records each operation produces.
///
/// Batch inserts are all-or-nothing.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn insert_journal_entry(&self, text: &str, score: u8) -> Result<JournalEntry>;

    async fn insert_flashcards(&self, cards: &[(String, String)]) -> Result<Vec<Flashcard>>;

    async fn insert_recipes(&self, recipes: Vec<NewRecipe>) -> Result<Vec<Recipe>>;

    async fn insert_payment(&self, payment: NewPayment) -> Result<PaymentRecord>;
}
