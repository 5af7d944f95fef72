//! Single-shot, batch and interactive drivers.
//!
//! Drivers only talk to an [`Ask`] and to the reader/writer they are
//! given, so the same code runs against stdin/stdout and in tests.

use std::future::Future;
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info};

use crate::error::Error;
use crate::prompts::PromptBatch;
use crate::session::{Answer, Ask};
use crate::ui;
use crate::Result;

/// How the program was asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    SingleShot(String),
    Batch(PromptBatch),
    Interactive,
}

impl Mode {
    /// `--prompt` wins over a prompt path; neither means interactive.
    /// A blank `--prompt` is a startup error.
    pub fn select(prompt: Option<String>, batch: Option<PromptBatch>) -> Result<Self> {
        match (prompt, batch) {
            (Some(text), _) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(Error::Prompt("Prompt cannot be empty".to_string()));
                }
                Ok(Mode::SingleShot(text.to_string()))
            }
            (None, Some(batch)) => Ok(Mode::Batch(batch)),
            (None, None) => Ok(Mode::Interactive),
        }
    }
}

/// Why the interactive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ExitKeyword,
    EndOfInput,
    Interrupted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: Vec<String>,
}

/// Ask one question. Its failure is the caller's failure.
pub async fn run_single<A, W>(asker: &mut A, prompt: &str, out: &mut W) -> Result<()>
where
    A: Ask + ?Sized,
    W: Write,
{
    let answer = asker.ask(prompt).await?;
    print_answer(out, &answer)?;
    Ok(())
}

/// Run every prompt in order. A failing prompt is reported and the batch
/// moves on.
pub async fn run_batch<A, W>(asker: &mut A, batch: &PromptBatch, out: &mut W) -> Result<BatchSummary>
where
    A: Ask + ?Sized,
    W: Write,
{
    let mut summary = BatchSummary::default();

    for (name, text) in batch.iter() {
        writeln!(out, "{}", ui::running_prompt(name))?;
        info!(prompt = name, "Running prompt");

        match asker.ask(text).await {
            Ok(answer) => {
                print_answer(out, &answer)?;
                summary.succeeded += 1;
            }
            Err(e) => {
                error!(prompt = name, "Error running prompt: {}", e);
                writeln!(out, "{}", ui::prompt_error(name, &e))?;
                summary.failed.push(name.to_string());
            }
        }
    }

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        "Batch finished"
    );
    Ok(summary)
}

/// Read queries line by line until `exit`/`quit`, end of input or
/// `interrupt` resolves. An interrupt also cancels a query in flight.
pub async fn run_interactive<A, R, W, I>(
    asker: &mut A,
    mut input: R,
    out: &mut W,
    interrupt: I,
) -> Result<StopReason>
where
    A: Ask + ?Sized,
    R: AsyncBufRead + Unpin,
    W: Write,
    I: Future<Output = ()>,
{
    let mut buf = Vec::new();
    tokio::pin!(interrupt);

    loop {
        write!(out, "\n{}", ui::user_prompt())?;
        out.flush()?;

        buf.clear();
        let read = tokio::select! {
            _ = &mut interrupt => {
                writeln!(out)?;
                return Ok(StopReason::Interrupted);
            }
            read = input.read_until(b'\n', &mut buf) => read?,
        };

        if read == 0 {
            writeln!(out)?;
            return Ok(StopReason::EndOfInput);
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            debug!("Skipping input line that is not valid UTF-8");
            writeln!(out, "{}", ui::hint(ui::INVALID_INPUT_HINT))?;
            continue;
        };

        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            writeln!(out, "{}", ui::goodbye())?;
            return Ok(StopReason::ExitKeyword);
        }
        if query.is_empty() {
            writeln!(out, "{}", ui::hint(ui::EMPTY_QUERY_HINT))?;
            continue;
        }

        let result = tokio::select! {
            _ = &mut interrupt => {
                debug!("Interrupted while a query was running");
                writeln!(out)?;
                return Ok(StopReason::Interrupted);
            }
            result = asker.ask(query) => result,
        };

        match result {
            Ok(answer) => print_answer(out, &answer)?,
            Err(e) => {
                error!("Query failed: {}", e);
                writeln!(out, "{}", ui::error_line(&e))?;
            }
        }
    }
}

fn print_answer<W: Write>(out: &mut W, answer: &Answer) -> std::io::Result<()> {
    writeln!(out, "{}", ui::completed(answer.duration))?;
    writeln!(out, "{}", answer.text)?;
    writeln!(out, "{}", ui::usage_line(&answer.usage))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::usage::Usage;

    /// Answers from a script and remembers every question.
    struct ScriptedAsk {
        replies: VecDeque<Result<String>>,
        asked: Vec<String>,
    }

    impl ScriptedAsk {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: replies.into(),
                asked: Vec::new(),
            }
        }

        fn always_ok() -> Self {
            Self::new((0..16).map(|i| Ok(format!("answer {i}"))).collect())
        }
    }

    #[async_trait]
    impl Ask for ScriptedAsk {
        async fn ask(&mut self, prompt: &str) -> Result<Answer> {
            self.asked.push(prompt.to_string());
            let text = self
                .replies
                .pop_front()
                .unwrap_or_else(|| Err(Error::Llm("script exhausted".to_string())))?;
            Ok(Answer {
                text,
                usage: Usage::request(3, 4, 0),
                duration: Duration::from_millis(250),
            })
        }
    }

    /// Never answers; used to check that interrupts cancel a query.
    struct HangingAsk;

    #[async_trait]
    impl Ask for HangingAsk {
        async fn ask(&mut self, _prompt: &str) -> Result<Answer> {
            std::future::pending().await
        }
    }

    fn batch(dir: &tempfile::TempDir, files: &[(&str, &str)]) -> PromptBatch {
        for (name, text) in files {
            std::fs::write(dir.path().join(name), text).unwrap();
        }
        crate::prompts::load_prompts(dir.path()).unwrap()
    }

    async fn interactive(asker: &mut ScriptedAsk, input: impl AsRef<[u8]>) -> (StopReason, String) {
        let mut out = Vec::new();
        let reason = run_interactive(asker, input.as_ref(), &mut out, std::future::pending())
            .await
            .unwrap();
        (reason, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(Mode::select(None, None).unwrap(), Mode::Interactive);
        assert_eq!(
            Mode::select(Some("q".to_string()), Some(PromptBatch::default())).unwrap(),
            Mode::SingleShot("q".to_string())
        );
        assert_eq!(
            Mode::select(None, Some(PromptBatch::default())).unwrap(),
            Mode::Batch(PromptBatch::default())
        );
    }

    #[test]
    fn test_single_shot_prompt_is_trimmed() {
        assert_eq!(
            Mode::select(Some("  count rows \n".to_string()), None).unwrap(),
            Mode::SingleShot("count rows".to_string())
        );

        let err = Mode::select(Some(" \t ".to_string()), None).unwrap_err();
        assert!(matches!(err, Error::Prompt(_)));
        assert!(err.is_startup());
    }

    #[tokio::test]
    async fn test_single_shot_prints_result() {
        let mut asker = ScriptedAsk::always_ok();
        let mut out = Vec::new();

        run_single(&mut asker, "count rows", &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Completed in 0.250 seconds"));
        assert!(out.contains("answer 0"));
        assert!(out.contains("total_tokens=7"));
        assert_eq!(asker.asked, vec!["count rows"]);
    }

    #[tokio::test]
    async fn test_single_shot_failure_propagates() {
        let mut asker = ScriptedAsk::new(vec![Err(Error::MaxIterations)]);
        let mut out = Vec::new();
        assert!(run_single(&mut asker, "q", &mut out).await.is_err());
    }

    #[tokio::test]
    async fn test_batch_runs_in_order_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let batch = batch(&dir, &[("b.txt", "list tables"), ("a.txt", "count rows"), ("c.txt", "top users")]);
        let mut asker = ScriptedAsk::new(vec![
            Ok("42".to_string()),
            Err(Error::Tool("Code: 60".to_string())),
            Ok("alice".to_string()),
        ]);
        let mut out = Vec::new();

        let summary = run_batch(&mut asker, &batch, &mut out).await.unwrap();

        assert_eq!(asker.asked, vec!["count rows", "list tables", "top users"]);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, vec!["b.txt"]);

        let out = String::from_utf8(out).unwrap();
        let a = out.find("Running prompt 'a.txt'").unwrap();
        let b = out.find("Running prompt 'b.txt'").unwrap();
        let c = out.find("Running prompt 'c.txt'").unwrap();
        assert!(a < b && b < c);
        assert!(out.contains("Error running prompt 'b.txt'"));
        assert!(out.contains("alice"));
    }

    #[tokio::test]
    async fn test_exit_keywords_any_case() {
        for word in ["exit", "QUIT", "  Exit  ", "quIt"] {
            let mut asker = ScriptedAsk::always_ok();
            let (reason, _) = interactive(&mut asker, &format!("{word}\nnever asked\n")).await;
            assert_eq!(reason, StopReason::ExitKeyword);
            assert!(asker.asked.is_empty());
        }
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let mut asker = ScriptedAsk::always_ok();
        let (reason, out) = interactive(&mut asker, "\n   \ncount rows\nexit\n").await;

        assert_eq!(reason, StopReason::ExitKeyword);
        assert_eq!(asker.asked, vec!["count rows"]);
        assert_eq!(out.matches(ui::EMPTY_QUERY_HINT).count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let mut asker = ScriptedAsk::always_ok();
        let (reason, out) = interactive(&mut asker, b"\xff\xfe\ncount rows\nexit\n").await;

        assert_eq!(reason, StopReason::ExitKeyword);
        assert_eq!(asker.asked, vec!["count rows"]);
        assert!(out.contains(ui::INVALID_INPUT_HINT));
    }

    #[tokio::test]
    async fn test_end_of_input_stops() {
        let mut asker = ScriptedAsk::always_ok();
        let (reason, _) = interactive(&mut asker, "count rows\nlist tables").await;

        assert_eq!(reason, StopReason::EndOfInput);
        assert_eq!(asker.asked, vec!["count rows", "list tables"]);
    }

    #[tokio::test]
    async fn test_query_error_keeps_loop_running() {
        let mut asker = ScriptedAsk::new(vec![
            Err(Error::Llm("500".to_string())),
            Ok("fine".to_string()),
        ]);
        let (reason, out) = interactive(&mut asker, "first\nsecond\n").await;

        assert_eq!(reason, StopReason::EndOfInput);
        assert_eq!(asker.asked.len(), 2);
        assert!(out.contains("500"));
        assert!(out.contains("fine"));
    }

    #[tokio::test]
    async fn test_interrupt_while_waiting_for_input() {
        let mut asker = ScriptedAsk::always_ok();
        let (_client, server) = tokio::io::duplex(64);
        let mut out = Vec::new();

        let reason = run_interactive(
            &mut asker,
            tokio::io::BufReader::new(server),
            &mut out,
            std::future::ready(()),
        )
        .await
        .unwrap();

        assert_eq!(reason, StopReason::Interrupted);
        assert!(asker.asked.is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_cancels_query_in_flight() {
        let mut asker = HangingAsk;
        let mut out = Vec::new();

        let reason = run_interactive(
            &mut asker,
            "slow query\n".as_bytes(),
            &mut out,
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert_eq!(reason, StopReason::Interrupted);
    }
}
