//! Instruction variation generator
//!
//! Produces the ordered phrasings tried for a concept: the primary prompt,
//! the content-supplied fallbacks, then the literal label. Phrasing register
//! follows the persona's proficiency; the concept itself never changes.

use crate::parser::types::{Concept, ConceptKind, PersonaProfile, Proficiency};
use regex::Regex;
use std::sync::OnceLock;

/// Upper bound of phrasings produced for one concept
pub const MAX_VARIATIONS: usize = 6;

fn link_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\blink\b").unwrap())
}

fn find_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bfind\b").unwrap())
}

/// Lazy, finite sequence of instruction phrasings for one concept
#[derive(Debug, Clone)]
pub struct Variations<'a> {
    concept: &'a Concept,
    persona: &'a PersonaProfile,
    cursor: usize,
    emitted: Vec<String>,
}

/// Start a fresh variation sequence; calling again restarts from the broadest phrasing
pub fn variations<'a>(concept: &'a Concept, persona: &'a PersonaProfile) -> Variations<'a> {
    Variations {
        concept,
        persona,
        cursor: 0,
        emitted: Vec::new(),
    }
}

impl<'a> Variations<'a> {
    /// Raw candidate at `index`, before persona adaptation
    fn candidate(&self, index: usize) -> Option<String> {
        let concept = self.concept;
        if index == 0 {
            return Some(concept.prompt.clone());
        }
        if let Some(fallback) = concept.fallbacks.get(index - 1) {
            return Some(fallback.clone());
        }
        if index == concept.fallbacks.len() + 1 {
            return concept
                .target
                .as_deref()
                .map(|label| literal_phrasing(concept.kind, label));
        }
        None
    }
}

impl<'a> Iterator for Variations<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.emitted.len() < MAX_VARIATIONS {
            let raw = self.candidate(self.cursor)?;
            self.cursor += 1;

            let adapted = adapt_for_persona(&raw, self.concept.kind, self.persona);
            if self.emitted.contains(&adapted) {
                continue;
            }
            self.emitted.push(adapted.clone());
            return Some(adapted);
        }
        None
    }
}

/// Most exact phrasing: names the element by its visible label
fn literal_phrasing(kind: ConceptKind, label: &str) -> String {
    match kind {
        ConceptKind::Query => format!(
            "Is there a link or button whose visible text is exactly \"{}\"?",
            label
        ),
        ConceptKind::Navigate => format!(
            "Click the link or button whose visible text is exactly \"{}\"",
            label
        ),
        ConceptKind::Scroll => format!("Scroll until \"{}\" is visible", label),
    }
}

/// Adapt wording to the persona without changing what is asked
pub fn adapt_for_persona(instruction: &str, kind: ConceptKind, persona: &PersonaProfile) -> String {
    let mut adapted = match persona.proficiency {
        Proficiency::Low => {
            let explicit = if link_word().is_match(instruction) {
                link_word()
                    .replace(instruction, "clearly labeled link or button")
                    .into_owned()
            } else {
                find_word().replace(instruction, "easily find").into_owned()
            };
            match kind {
                ConceptKind::Query => format!(
                    "Look at the page step by step, starting at the top. {}",
                    explicit
                ),
                ConceptKind::Navigate | ConceptKind::Scroll => {
                    format!("Step by step: {}", explicit)
                }
            }
        }
        Proficiency::Medium => instruction.to_string(),
        Proficiency::High => {
            let terse = instruction.trim_end_matches(['.', ' ']);
            match kind {
                ConceptKind::Query if instruction.to_lowercase().contains("documentation") => {
                    format!(
                        "{} Also note any keyboard shortcuts or advanced search features.",
                        terse
                    )
                }
                ConceptKind::Query => terse.to_string(),
                ConceptKind::Navigate | ConceptKind::Scroll => {
                    format!("{}, taking the most direct route", terse)
                }
            }
        }
    };

    if persona.is_archetype("business_professional")
        && kind == ConceptKind::Query
        && adapted.to_lowercase().contains("pricing")
    {
        adapted.push_str(" Note if there are enterprise options or 'contact sales' mentions.");
    }

    adapted
}
