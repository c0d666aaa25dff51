//! Prompt Builder
//!
//! Assembles the query-generation instruction, the schema's format
//! instructions and the user's question into one completion prompt.

use crate::registry::CollectionName;
use crate::schema::ResponseSchema;

/// A previous question/answer pair carried into a conversational prompt
#[derive(Debug, Clone, Copy)]
pub struct PreviousExchange<'a> {
    pub question: &'a str,
    pub answer: &'a str,
}

/// Builds translation prompts. Pure: same input, same prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    schema: ResponseSchema,
}

impl PromptBuilder {
    pub fn new(schema: ResponseSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ResponseSchema {
        &self.schema
    }

    /// Single-shot translation prompt
    pub fn build(&self, user_text: &str) -> String {
        self.build_with_context(user_text, None)
    }

    /// Translation prompt that also shows the previous exchange
    pub fn build_with_context(
        &self,
        user_text: &str,
        previous: Option<PreviousExchange<'_>>,
    ) -> String {
        let collections: String = CollectionName::ALL
            .iter()
            .map(|c| format!("- {}\n", c))
            .collect();

        let context = match previous {
            Some(prev) => format!(
                "## Previous exchange (use it to resolve follow-up questions)\n\
                 Previous question: {}\n\
                 Previous answer: {}\n\n",
                prev.question, prev.answer
            ),
            None => String::new(),
        };

        format!(
            r#"You are a query generator for a financial document database. Given a natural language question, respond with ONLY the filter query in valid JSON.
Your response must be a single JSON object with exactly two keys:
- "collection": the name of the collection to query
- "query": the filter to apply, as a JSON object

Do NOT include extra questions, examples, markdown, triple backticks, labels such as "Answer:", or any explanation.

Valid collections:
{collections}
Dates must be plain ISO-8601 strings (for example "2024-01-31" or "2024-01-31T00:00:00Z"). Never use ISODate(...), new Date(...) or other database-native constructors.

{format_instructions}
{context}Question: {user_text}
"#,
            collections = collections,
            format_instructions = self.schema.format_instructions(),
            context = context,
            user_text = user_text.trim(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_constraints_and_question() {
        let prompt = PromptBuilder::default().build("Show me all transactions over $1000");
        assert!(prompt.starts_with("You are a query generator"));
        assert!(prompt.contains("\"collection\""));
        assert!(prompt.contains("\"query\""));
        for c in CollectionName::ALL {
            assert!(prompt.contains(&format!("- {}\n", c)));
        }
        assert!(prompt.contains("ISO-8601"));
        assert!(prompt.ends_with("Question: Show me all transactions over $1000\n"));
        assert!(!prompt.contains("Previous question"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let builder = PromptBuilder::default();
        assert_eq!(builder.build("etfs"), builder.build("etfs"));
    }

    #[test]
    fn test_context_is_embedded() {
        let prompt = PromptBuilder::default().build_with_context(
            "and the ones in Texas?",
            Some(PreviousExchange {
                question: "list customers",
                answer: "42 customers found",
            }),
        );
        assert!(prompt.contains("Previous question: list customers"));
        assert!(prompt.contains("Previous answer: 42 customers found"));
        assert!(prompt.contains("Question: and the ones in Texas?"));
    }
}
