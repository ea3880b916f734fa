//! Prompt templates for the rewrite strategies.

use rag_core::{Context, CONVERSATION_HISTORY_KEY};

pub(crate) const EXPANSION_SYSTEM: &str = "You are a query expansion expert for document search. \
You write specific, keyword-rich search queries that find concrete information, never generalizations.";

pub(crate) const DECOMPOSITION_SYSTEM: &str = "You are a query decomposition expert for document search. \
You split compound questions into focused sub-queries built from concrete keywords.";

pub(crate) const REFINEMENT_SYSTEM: &str = "You are a query refinement expert for document search. \
You make a query MORE specific by adding concrete keywords, never by generalizing it.";

/// Render the conversation history from `context`, if any.
fn history_section(context: Option<&Context>) -> String {
    let history = context.and_then(|c| c.get(CONVERSATION_HISTORY_KEY));
    match history {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
            format!("\n\nConversation context:\n{}", s.trim())
        }
        Some(serde_json::Value::Null) | None => String::new(),
        Some(serde_json::Value::String(_)) => String::new(),
        Some(other) => format!("\n\nConversation context:\n{}", other),
    }
}

pub(crate) fn expansion_prompt(query: &str, context: Option<&Context>, max_variants: usize) -> String {
    format!(
        "Original query: {query}{history}\n\n\
         Write {max_variants} SPECIFIC versions of this query that:\n\
         1. Keep every proper noun, company, product and domain term EXACTLY as written\n\
         2. Add more specific terms related to what is being searched for\n\
         3. Focus on concrete details and keywords that would appear in real documents\n\
         4. Use technical or domain vocabulary where appropriate\n\
         5. Are never vaguer or more generic than the original\n\n\
         Do not use placeholders such as [Company] or [Plan].\n\n\
         Return ONLY the expanded queries, one per line, without numbering or explanation.",
        history = history_section(context),
    )
}

pub(crate) fn decomposition_prompt(
    query: &str,
    context: Option<&Context>,
    max_variants: usize,
) -> String {
    format!(
        "Original query: {query}{history}\n\n\
         If this query is complex and has several parts:\n\
         1. Identify the SPECIFIC sub-questions it is made of\n\
         2. Write {max_variants} or fewer sub-queries focused on concrete details\n\
         3. Keep every proper noun and specific term in each sub-query\n\
         4. Add keywords that would appear in the documents being searched\n\n\
         Bad decomposition of \"What are the differences between Plan A and Plan B?\":\n\
         - information about Plan A\n\
         - information about Plan B\n\n\
         Good decomposition:\n\
         - medical services hospitalization coverage Plan A\n\
         - medical services hospitalization coverage Plan B\n\
         - deductibles copays coverage limits Plan A vs Plan B\n\n\
         If the query is already simple and focused, return it unchanged.\n\n\
         Return ONLY the sub-queries, one per line, without numbering or explanation.",
        history = history_section(context),
    )
}

pub(crate) fn refinement_prompt(query: &str, context: Option<&Context>) -> String {
    format!(
        "Original query: {query}{history}\n\n\
         Refine this query to make it MORE SPECIFIC:\n\
         1. Keep every proper noun, company, product and domain term EXACTLY as written\n\
         2. Add keywords that help find the information in documents\n\
         3. Remove vague or generic words\n\
         4. Focus on concrete, measurable details\n\n\
         Example: \"What does the Northwind Health Plus plan cover?\" becomes\n\
         \"coverage medical services hospitalization prescriptions Northwind Health Plus\"\n\n\
         Return ONLY the refined query on a single line, without explanation or quotes.",
        history = history_section(context),
    )
}
