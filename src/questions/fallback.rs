//! Static question pool used whenever the generation service fails.

use rand::seq::SliceRandom;
use serde::Deserialize;
use uuid::Uuid;

use crate::state::room::{Difficulty, OPTION_COUNT, Question};

/// One entry of the fallback pool. Entries without a difficulty belong to the
/// general pool and satisfy requests of any difficulty.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackEntry {
    /// Question text.
    pub text: String,
    /// The four answer options.
    pub options: [String; OPTION_COUNT],
    /// Index of the correct option.
    pub correct_index: usize,
    /// Difficulty bucket; `None` means general.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl FallbackEntry {
    fn to_question(&self, time_limit_secs: u32) -> Question {
        Question {
            id: Uuid::new_v4(),
            text: self.text.clone(),
            options: self.options.clone(),
            correct_index: self.correct_index,
            time_limit_secs,
        }
    }
}

/// Draw `count` questions from the pool, preferring entries matching the
/// requested difficulty and padding from the general pool. The pool is cycled
/// when it is smaller than `count` so callers always receive a full batch.
pub fn draw(
    pool: &[FallbackEntry],
    difficulty: Difficulty,
    count: usize,
    time_limit_secs: u32,
) -> Vec<Question> {
    let mut candidates: Vec<&FallbackEntry> = pool
        .iter()
        .filter(|entry| entry.difficulty.is_none_or(|d| d == difficulty))
        .collect();
    if candidates.is_empty() {
        candidates = pool.iter().collect();
    }

    let mut rng = rand::rng();
    candidates.shuffle(&mut rng);

    candidates
        .iter()
        .cycle()
        .take(count)
        .map(|entry| entry.to_question(time_limit_secs))
        .collect()
}

fn entry(
    text: &str,
    options: [&str; OPTION_COUNT],
    correct_index: usize,
    difficulty: Option<Difficulty>,
) -> FallbackEntry {
    FallbackEntry {
        text: text.to_string(),
        options: options.map(String::from),
        correct_index,
        difficulty,
    }
}

/// Built-in pool shipped with the binary, used when the configuration file
/// does not provide one.
pub fn default_pool() -> Vec<FallbackEntry> {
    vec![
        entry(
            "Which planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Mercury"],
            1,
            Some(Difficulty::Easy),
        ),
        entry(
            "How many continents are there on Earth?",
            ["Five", "Six", "Seven", "Eight"],
            2,
            Some(Difficulty::Easy),
        ),
        entry(
            "What is the largest ocean on Earth?",
            ["Atlantic", "Indian", "Arctic", "Pacific"],
            3,
            Some(Difficulty::Easy),
        ),
        entry(
            "Which gas do plants absorb from the atmosphere?",
            ["Oxygen", "Nitrogen", "Carbon dioxide", "Hydrogen"],
            2,
            Some(Difficulty::Easy),
        ),
        entry(
            "Who painted the Mona Lisa?",
            [
                "Leonardo da Vinci",
                "Michelangelo",
                "Raphael",
                "Claude Monet",
            ],
            0,
            None,
        ),
        entry(
            "What is the capital of Australia?",
            ["Sydney", "Melbourne", "Canberra", "Perth"],
            2,
            None,
        ),
        entry(
            "Which element has the chemical symbol Fe?",
            ["Fluorine", "Iron", "Lead", "Tin"],
            1,
            Some(Difficulty::Medium),
        ),
        entry(
            "In which year did the Berlin Wall fall?",
            ["1985", "1987", "1989", "1991"],
            2,
            Some(Difficulty::Medium),
        ),
        entry(
            "What data structure uses first-in, first-out ordering?",
            ["Stack", "Queue", "Tree", "Heap"],
            1,
            Some(Difficulty::Medium),
        ),
        entry(
            "Which composer wrote the Ninth Symphony while almost completely deaf?",
            ["Mozart", "Bach", "Beethoven", "Brahms"],
            2,
            Some(Difficulty::Medium),
        ),
        entry(
            "What is the smallest prime number greater than 100?",
            ["101", "103", "107", "109"],
            0,
            Some(Difficulty::Hard),
        ),
        entry(
            "Which particle carries the strong nuclear force?",
            ["Photon", "Gluon", "W boson", "Graviton"],
            1,
            Some(Difficulty::Hard),
        ),
        entry(
            "Who proved the incompleteness theorems?",
            ["Alan Turing", "Kurt Gödel", "David Hilbert", "Georg Cantor"],
            1,
            Some(Difficulty::Hard),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_entry_is_well_formed() {
        for entry in default_pool() {
            assert!(entry.correct_index < OPTION_COUNT, "{}", entry.text);
            assert!(!entry.text.is_empty());
        }
    }

    #[test]
    fn draw_returns_exactly_the_requested_count() {
        let pool = default_pool();
        let questions = draw(&pool, Difficulty::Medium, 5, 30);
        assert_eq!(questions.len(), 5);
        for question in &questions {
            assert!(question.correct_index < OPTION_COUNT);
            assert_eq!(question.time_limit_secs, 30);
        }
    }

    #[test]
    fn draw_cycles_a_small_pool() {
        let pool = vec![entry("only one", ["a", "b", "c", "d"], 0, None)];
        let questions = draw(&pool, Difficulty::Hard, 5, 20);
        assert_eq!(questions.len(), 5);
    }

    #[test]
    fn drawn_questions_get_fresh_ids() {
        let pool = default_pool();
        let first = draw(&pool, Difficulty::Easy, 5, 30);
        let second = draw(&pool, Difficulty::Easy, 5, 30);
        for question in &first {
            assert!(second.iter().all(|other| other.id != question.id));
        }
    }
}
