//! Local stand-ins used when an external service is unavailable.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::models::{FlashcardItem, RecipeItem};

/// Seed cards returned for any set of notes.
pub const SEED_FLASHCARDS: [(&str, &str); 5] = [
    ("What is the main idea?", "Summarize the core concept."),
    ("List two key terms.", "Term A, Term B."),
    ("Why is this important?", "It enables topic X."),
    ("Give one example.", "A concise, real-world example."),
    ("Define an important formula.", "F = m × a"),
];

/// Sentiment score in `50..=100` derived from a hash of the text.
pub fn sentiment_score(text: &str) -> u8 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    50 + (hasher.finish() % 51) as u8
}

pub fn seed_flashcards() -> Vec<FlashcardItem> {
    SEED_FLASHCARDS
        .iter()
        .map(|(question, answer)| FlashcardItem {
            question: question.to_string(),
            answer: answer.to_string(),
        })
        .collect()
}

/// Three template recipes built from the first few ingredients.
pub fn recipes(ingredients: &[String]) -> Vec<RecipeItem> {
    vec![
        RecipeItem {
            title: "Quick Bowl".to_string(),
            content: format!("Toss {} with herbs and serve warm.", leading(ingredients, 3).join(", ")),
        },
        RecipeItem {
            title: "One‑Pan Bake".to_string(),
            content: format!("Bake {} with cheese until golden.", leading(ingredients, 2).join(" + ")),
        },
        RecipeItem {
            title: "Skillet Stir‑Fry".to_string(),
            content: format!(
                "Stir‑fry {} with soy sauce and garlic.",
                leading(ingredients, 3).join(", ")
            ),
        },
    ]
}

fn leading(items: &[String], n: usize) -> &[String] {
    &items[..items.len().min(n)]
}
