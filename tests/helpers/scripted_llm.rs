//! Scripted LLM client and fixture helpers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use finquery::{Document, InMemoryStore, LlmClient};
use finquery_agent::llm_client::{ToolCallResult, ToolDefinition};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Replays canned completions in order and records every prompt it sees.
/// An exhausted script, or an `Err` entry, fails the call.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            script: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn next(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("script exhausted")),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str, _max_tokens: usize) -> anyhow::Result<String> {
        self.next(prompt)
    }

    async fn complete_with_tool(
        &self,
        prompt: &str,
        _max_tokens: usize,
        tool: &ToolDefinition,
    ) -> anyhow::Result<ToolCallResult> {
        let text = self.next(prompt)?;
        let arguments = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(ToolCallResult {
            tool_name: tool.name.clone(),
            arguments,
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn provider_name(&self) -> &str {
        "Test"
    }
}

pub fn doc(value: Value) -> Document {
    value
        .as_object()
        .cloned()
        .expect("fixture documents are objects")
}

/// Write `<collection>.json` fixture files into `dir`
pub fn write_fixture(dir: &Path, collection: &str, docs: &[Value]) {
    let content = serde_json::to_string_pretty(docs).unwrap();
    std::fs::write(dir.join(format!("{}.json", collection)), content).unwrap();
}

/// 35 transactions above $1000 and 5 below
pub fn transactions() -> Vec<Value> {
    (0..40)
        .map(|i| {
            let amount = if i < 35 { 1001 + i * 50 } else { 100 + i };
            serde_json::json!({
                "_id": {"$oid": format!("6650a1f0c2e4b0a1b2c3d9{:02x}", i)},
                "transaction_id": format!("T-{}", i),
                "amount": amount,
                "date": {"$date": format!("2024-03-{:02}T12:00:00Z", 1 + i % 28)}
            })
        })
        .collect()
}

pub fn accounts() -> Vec<Value> {
    vec![
        serde_json::json!({"account_id": "A-1", "type": "brokerage", "opened": {"$date": "2023-06-01T00:00:00Z"}}),
        serde_json::json!({"account_id": "A-2", "type": "savings", "opened": {"$date": "2024-01-10T00:00:00Z"}}),
        serde_json::json!({"account_id": "A-3", "type": "retirement", "opened": {"$date": "2024-02-01T00:00:00Z"}}),
    ]
}

pub fn stocks() -> Vec<Value> {
    vec![
        serde_json::json!({"ticker": "AAPL", "sector": "Technology", "price": 187.25}),
        serde_json::json!({"ticker": "JPM", "sector": "Financials", "price": 198.4}),
        serde_json::json!({"ticker": "NVDA", "sector": "Technology", "price": 903.6}),
    ]
}

/// A fixture directory holding transactions, accounts and stocks
pub async fn fixture_store() -> (tempfile::TempDir, Arc<InMemoryStore>) {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "transactions", &transactions());
    write_fixture(dir.path(), "accounts", &accounts());
    write_fixture(dir.path(), "stocks", &stocks());
    let store = InMemoryStore::load_dir(dir.path()).await.unwrap();
    (dir, Arc::new(store))
}
