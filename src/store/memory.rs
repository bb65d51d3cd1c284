//! In-process repository.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;
use uuid::Uuid;

use super::{NewPayment, NewRecipe, Repository};
use crate::error::Result;
use crate::models::{Flashcard, JournalEntry, PaymentRecord, Recipe};

/// Repository that keeps every record in memory for the process lifetime.
///
/// Each table numbers its rows from 1, like an autoincrement column.
#[derive(Debug)]
pub struct MemoryStore {
    journal_ids: AtomicI64,
    flashcard_ids: AtomicI64,
    recipe_ids: AtomicI64,
    journal: RwLock<Vec<JournalEntry>>,
    flashcards: RwLock<Vec<Flashcard>>,
    recipes: RwLock<Vec<Recipe>>,
    payments: RwLock<Vec<PaymentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            journal_ids: AtomicI64::new(1),
            flashcard_ids: AtomicI64::new(1),
            recipe_ids: AtomicI64::new(1),
            journal: RwLock::new(Vec::new()),
            flashcards: RwLock::new(Vec::new()),
            recipes: RwLock::new(Vec::new()),
            payments: RwLock::new(Vec::new()),
        }
    }

    pub fn journal_entries(&self) -> Vec<JournalEntry> {
        self.journal.read().clone()
    }

    pub fn flashcards(&self) -> Vec<Flashcard> {
        self.flashcards.read().clone()
    }

    pub fn recipes(&self) -> Vec<Recipe> {
        self.recipes.read().clone()
    }

    pub fn payments(&self) -> Vec<PaymentRecord> {
        self.payments.read().clone()
    }
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::Relaxed)
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn insert_journal_entry(&self, text: &str, score: u8) -> Result<JournalEntry> {
        let entry = JournalEntry {
            id: next_id(&self.journal_ids),
            text: text.to_string(),
            score,
            created_at: Utc::now(),
        };
        self.journal.write().push(entry.clone());
        debug!(id = entry.id, score, "Stored journal entry");
        Ok(entry)
    }

    async fn insert_flashcards(&self, cards: &[(String, String)]) -> Result<Vec<Flashcard>> {
        let now = Utc::now();
        let stored: Vec<Flashcard> = cards
            .iter()
            .map(|(question, answer)| Flashcard {
                id: next_id(&self.flashcard_ids),
                question: question.clone(),
                answer: answer.clone(),
                created_at: now,
            })
            .collect();
        self.flashcards.write().extend(stored.iter().cloned());
        debug!(count = stored.len(), "Stored flashcards");
        Ok(stored)
    }

    async fn insert_recipes(&self, recipes: Vec<NewRecipe>) -> Result<Vec<Recipe>> {
        let now = Utc::now();
        let stored: Vec<Recipe> = recipes
            .into_iter()
            .map(|recipe| Recipe {
                id: next_id(&self.recipe_ids),
                title: recipe.title,
                content: recipe.content,
                ingredients: recipe.ingredients,
                created_at: now,
            })
            .collect();
        self.recipes.write().extend(stored.iter().cloned());
        debug!(count = stored.len(), "Stored recipes");
        Ok(stored)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<PaymentRecord> {
        let record = PaymentRecord {
            id: Uuid::new_v4(),
            reference: payment.reference,
            amount_minor: payment.amount_minor,
            currency: payment.currency,
            email: payment.email,
            created_at: Utc::now(),
        };
        self.payments.write().push(record.clone());
        debug!(id = %record.id, reference = %record.reference, "Stored payment session");
        Ok(record)
    }
}
