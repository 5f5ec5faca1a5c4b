//! Default concept catalog
//!
//! Tasks written as plain sentences are decomposed into concepts by keyword
//! category. The persona only adds or removes category-specific concepts; the
//! wording itself is adapted later by the variation generator.

use super::types::{Concept, PersonaProfile, Proficiency};

/// Keyword category of a task description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    Documentation,
    Demo,
    Pricing,
    ValueProposition,
    Help,
    GettingStarted,
    Generic,
}

const CATEGORY_KEYWORDS: &[(TaskCategory, &[&str])] = &[
    (
        TaskCategory::Documentation,
        &["documentation", "docs", "api", "technical", "developer"],
    ),
    (
        TaskCategory::Demo,
        &["demo", "playground", "try", "interactive", "example"],
    ),
    (
        TaskCategory::Pricing,
        &["pricing", "price", "cost", "plan", "subscription", "fee"],
    ),
    (
        TaskCategory::ValueProposition,
        &["understand", "value", "what", "purpose", "does", "benefit"],
    ),
    (
        TaskCategory::Help,
        &["help", "support", "contact", "assistance", "faq"],
    ),
    (
        TaskCategory::GettingStarted,
        &["getting started", "get started", "onboard", "begin", "setup"],
    ),
];

/// Classify a task description; first matching category wins
pub fn categorize(description: &str) -> TaskCategory {
    let lower = description.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(TaskCategory::Generic)
}

/// Derive the ordered concepts to verify for a task
pub fn derive_concepts(description: &str, persona: &PersonaProfile) -> Vec<Concept> {
    let level = persona.proficiency;

    match categorize(description) {
        TaskCategory::Documentation => {
            let mut concepts = vec![
                Concept::query(
                    "docs_in_navigation",
                    "Is there a navigation link related to documentation, API, developer resources, or technical guides?",
                )
                .with_fallbacks(&[
                    "Do you see any link with 'Docs', 'API', 'Developer', 'Guide', or 'Reference'?",
                    "Is there a 'Resources' or 'Learn' section in the navigation?",
                ])
                .with_target("Docs"),
                Concept::query(
                    "docs_in_content",
                    "Looking at the main content area, is there any mention of documentation, getting started guides, or technical resources?",
                )
                .with_fallbacks(&[
                    "Are there any code snippets, API examples, or technical documentation visible?",
                    "Does this page explain how developers can use or integrate this?",
                ]),
            ];
            if level == Proficiency::High {
                concepts.push(Concept::query(
                    "advanced_docs",
                    "Are there links to GitHub, SDK downloads, or API reference documentation?",
                ));
            }
            concepts
        }

        TaskCategory::Demo => {
            let mut concepts = vec![
                Concept::query(
                    "interactive_element",
                    "Is there an input field, text box, or interactive area where you can try something out?",
                )
                .with_fallbacks(&[
                    "Do you see a 'Try it', 'Demo', or 'Playground' button or section?",
                    "Is there anywhere you can type or interact with a live example?",
                ]),
                Concept::query(
                    "demo_in_navigation",
                    "Is there a navigation link for 'Demo', 'Playground', 'Try', or 'Examples'?",
                )
                .with_fallbacks(&["Do you see 'Get Started', 'Live Demo', or 'Interactive' in the menu?"])
                .with_target("Demo"),
            ];
            if level == Proficiency::Low {
                concepts.push(Concept::query(
                    "prominent_call_to_action",
                    "Is there a large, obvious button near the top that invites you to try or start using the tool?",
                ));
            }
            concepts
        }

        TaskCategory::Pricing => {
            let mut concepts = vec![
                Concept::query(
                    "pricing_in_navigation",
                    "Is there a 'Pricing', 'Plans', or 'Cost' link in the navigation menu?",
                )
                .with_fallbacks(&[
                    "Do you see 'Subscribe', 'Buy', or 'Get Started' with pricing info?",
                    "Is there a 'Free' or 'Pro' tier mentioned in the navigation?",
                ])
                .with_target("Pricing"),
                Concept::query(
                    "pricing_visible",
                    "Is there any pricing information, cost, or subscription tiers visible on the current page?",
                )
                .with_fallbacks(&[
                    "Do you see dollar amounts, price tags, or cost comparisons?",
                    "Is there mention of 'free', 'premium', or different plan levels?",
                ]),
                Concept::scroll("scroll_for_pricing", "Scroll down to see more content")
                    .with_fallbacks(&["Scroll down one screen", "Press the Page Down key once"]),
                Concept::query(
                    "pricing_after_scroll",
                    "After scrolling, do you now see any pricing, cost, or subscription information?",
                ),
            ];
            if persona.is_archetype("business_professional") {
                concepts.push(Concept::query(
                    "pricing_transparency",
                    "If pricing is visible, are the actual dollar amounts clearly displayed, or is it 'contact us' / 'request quote'?",
                ));
            }
            concepts
        }

        TaskCategory::ValueProposition => {
            let mut concepts = vec![
                Concept::query(
                    "hero_tagline",
                    "Near the top of the page, is there a clear headline or tagline that explains what this tool/product does or what problem it solves?",
                )
                .with_fallbacks(&[
                    "Does this page have a sentence that tells you immediately what it's for?",
                    "Is the main benefit or use case explained prominently?",
                ]),
                Concept::query(
                    "supporting_copy",
                    "Below the main headline, is there supporting text that elaborates on features, benefits, or how it works?",
                )
                .with_fallbacks(&[
                    "Are there bullet points, feature lists, or use cases described?",
                    "Can you quickly understand what makes this different or useful?",
                ]),
            ];
            if level == Proficiency::Low {
                concepts.push(Concept::query(
                    "simple_language",
                    "Is the description written in simple, non-technical language that anyone could understand?",
                ));
            }
            concepts
        }

        TaskCategory::Help => {
            let mut concepts = vec![
                Concept::query(
                    "help_in_header",
                    "In the top navigation or header area, is there a 'Help', 'Support', 'Contact', or 'FAQ' link?",
                )
                .with_fallbacks(&[
                    "Do you see 'Get Help', 'Contact Us', 'Support Center', or similar?",
                    "Is there a question mark icon or help button visible?",
                ])
                .with_target("Help"),
                Concept::scroll("scroll_to_footer", "Scroll down to the footer of the page")
                    .with_fallbacks(&["Scroll to the bottom of the page", "Press the End key once"]),
                Concept::query(
                    "help_in_footer",
                    "In the footer area, is there a 'Help', 'Support', 'Contact', or 'FAQ' link?",
                )
                .with_fallbacks(&[
                    "Do you see contact email, phone number, or support links at the bottom?",
                    "Is there a 'Help Center' or 'Resources' section in the footer?",
                ]),
            ];
            if level == Proficiency::Low {
                concepts.push(Concept::query(
                    "chat_widget",
                    "Is there a chat widget, chatbot, or live support button visible anywhere on the page?",
                ));
            }
            concepts
        }

        TaskCategory::GettingStarted => vec![
            Concept::query(
                "getting_started_cta",
                "Is there a prominent 'Get Started', 'Sign Up', 'Try Now', or 'Start Free' button or call-to-action?",
            )
            .with_fallbacks(&[
                "Is there a main action button on this page that starts using the product?",
                "Is it clear how a new user would begin using this product?",
            ])
            .with_target("Get Started"),
            Concept::query(
                "onboarding_guide",
                "Is there a 'Getting Started Guide', 'Quick Start', or step-by-step tutorial linked or visible?",
            )
            .with_fallbacks(&[
                "Are there numbered steps or a 'how to get started' section?",
                "Does the page explain the first steps clearly?",
            ]),
        ],

        TaskCategory::Generic => {
            let who = persona.archetype.as_deref().unwrap_or("user");
            vec![
                Concept::query(
                    "task_feasible",
                    &format!(
                        "As a {} with {} technical skills, can you easily accomplish this task: '{}'?",
                        who, level, description
                    ),
                )
                .with_fallbacks(&[
                    format!("Is it obvious how to {} on this page?", description).as_str(),
                ]),
                Concept::query(
                    "related_navigation",
                    &format!(
                        "Looking at the navigation menu, is there any link that seems related to: {}?",
                        description
                    ),
                ),
            ]
        }
    }
}
