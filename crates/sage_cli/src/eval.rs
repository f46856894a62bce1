//! Batch harness: answer a list of questions and record answers with the
//! source contexts they were grounded on.

use anyhow::{Context, Result};
use sage_reasoning::ReActEngine;
use sage_tools::sources_context;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub question: String,
    pub answer: String,
    pub contexts: Vec<String>,
}

/// One question per non-empty line. A line holding a JSON object contributes
/// its `query` or `question` field; any other line is taken verbatim.
pub fn parse_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<serde_json::Value>(line)
                .ok()
                .and_then(|v| {
                    v.get("query")
                        .or_else(|| v.get("question"))
                        .and_then(|q| q.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| line.to_string())
        })
        .collect()
}

/// Answer each question with a fresh engine, writing one JSON line per answer.
pub async fn run<F, W>(factory: &F, questions: &[String], out: &mut W) -> Result<usize>
where
    F: Fn() -> ReActEngine + ?Sized,
    W: Write,
{
    for (i, question) in questions.iter().enumerate() {
        tracing::info!("[{}/{}] {}", i + 1, questions.len(), question);
        let mut engine = factory();
        let result = engine.run(question).await;
        let record = EvalRecord {
            question: question.clone(),
            answer: result.response,
            contexts: sources_context(&result.sources),
        };
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)?;
        out.flush()?;
    }
    Ok(questions.len())
}

pub async fn run_file<F>(factory: &F, input: &Path, output: &Path) -> Result<()>
where
    F: Fn() -> ReActEngine + ?Sized,
{
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read questions from {}", input.display()))?;
    let questions = parse_questions(&text);
    let file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = std::io::BufWriter::new(file);

    let count = run(factory, &questions, &mut writer).await?;
    tracing::info!("Wrote {} result(s) to {}", count, output.display());
    Ok(())
}
