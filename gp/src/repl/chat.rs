//! Chat REPL over the streaming session

use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread;

use chrono::{Local, Utc};
use colored::Colorize;
use eyre::{Result, eyre};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing::debug;

use super::{SlashResult, output_path, print_error, write_export};
use crate::codec::{ChatDocument, chat_file_name, decode_chat};
use crate::domain::{FragmentMerge, Role};
use crate::service::PlanService;
use crate::session::{ChannelError, ChannelUpdate, SessionChannel};

/// Line input from the terminal thread
enum Input {
    Line(String),
    Interrupted,
    Eof,
    Failed(String),
}

/// Line reader on a dedicated thread, so streamed answers can print while
/// the prompt waits
///
/// The thread reads one line, then waits for `next()` before prompting again.
/// Dropping the reader stops it without leaving the terminal in raw mode.
struct LineReader {
    lines: mpsc::UnboundedReceiver<Input>,
    resume: std_mpsc::Sender<()>,
}

impl LineReader {
    fn spawn() -> Self {
        let (tx, lines) = mpsc::unbounded_channel();
        let (resume, resume_rx) = std_mpsc::channel::<()>();
        thread::spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    let _ = tx.send(Input::Failed(format!("Failed to initialize readline: {}", e)));
                    return;
                }
            };
            loop {
                let input = match rl.readline(&format!("{} ", ">".bright_green())) {
                    Ok(line) => {
                        let _ = rl.add_history_entry(line.as_str());
                        Input::Line(line)
                    }
                    Err(ReadlineError::Interrupted) => Input::Interrupted,
                    Err(ReadlineError::Eof) => Input::Eof,
                    Err(e) => Input::Failed(e.to_string()),
                };
                let last = matches!(input, Input::Eof | Input::Failed(_));
                if tx.send(input).is_err() || last {
                    break;
                }
                if resume_rx.recv().is_err() {
                    break;
                }
            }
        });
        Self { lines, resume }
    }

    async fn recv(&mut self) -> Option<Input> {
        self.lines.recv().await
    }

    /// Let the thread prompt for the next line
    fn next(&self) {
        let _ = self.resume.send(());
    }
}

/// Swap the conversation for an exported chat and adopt its session
///
/// A file that fails to decode leaves the channel untouched. Returns the
/// number of restored messages.
fn load_chat_export(channel: &mut SessionChannel, raw: &str) -> Result<usize> {
    let document = decode_chat(raw)?;
    channel.reset_identity();
    channel.restore_transcript(&document)?;
    Ok(document.messages.len())
}

/// Interactive chat session
pub struct ChatRepl {
    channel: SessionChannel,
    service: Arc<dyn PlanService>,
    answering: bool,
}

impl ChatRepl {
    pub fn new(channel: SessionChannel, service: Arc<dyn PlanService>) -> Self {
        Self {
            channel,
            service,
            answering: false,
        }
    }

    /// Run until `/quit` or end of input; the channel is closed on every exit path
    pub async fn run(&mut self, fresh: bool) -> Result<()> {
        debug!(fresh, "ChatRepl::run: called");
        let result = self.run_inner(fresh).await;
        self.channel.close();
        result
    }

    async fn run_inner(&mut self, fresh: bool) -> Result<()> {
        self.print_welcome();
        if fresh {
            self.channel.reset_identity();
        }
        let update = self.channel.resume().await?;
        self.render(update);

        let mut lines = LineReader::spawn();
        loop {
            tokio::select! {
                input = lines.recv() => match input {
                    Some(Input::Line(line)) => {
                        if self.handle_line(line.trim()).await? == SlashResult::Quit {
                            break;
                        }
                        lines.next();
                    }
                    Some(Input::Interrupted) => {
                        println!("^C");
                        lines.next();
                    }
                    Some(Input::Eof) | None => {
                        println!();
                        break;
                    }
                    Some(Input::Failed(e)) => return Err(eyre!("Readline error: {}", e)),
                },
                Some(update) = self.channel.next_update(), if self.channel.is_open() => {
                    self.render(update);
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Workout Assistant Chat".bright_cyan().bold());
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:18} Show this help", "/help".yellow());
        println!("  {:18} Exit the chat", "/quit".yellow());
        println!("  {:18} Clear history on the service and start a new session", "/reset".yellow());
        println!("  {:18} Save the conversation as JSON", "/export [path]".yellow());
        println!("  {:18} Continue a saved conversation", "/import <path>".yellow());
        println!("  {:18} Show the conversation so far", "/history".yellow());
        println!("  {:18} Reconnect, resuming this session", "/reconnect".yellow());
        println!();
    }

    async fn handle_line(&mut self, input: &str) -> Result<SlashResult> {
        if input.is_empty() {
            return Ok(SlashResult::Continue);
        }
        if !input.starts_with('/') {
            self.answering = false;
            match self.channel.send(input).await {
                Ok(()) => {}
                Err(ChannelError::NotOpen) => {
                    println!("{}", "Not connected. Use /reconnect to try again.".yellow());
                }
                Err(e) => print_error(&e.to_string()),
            }
            return Ok(SlashResult::Continue);
        }

        let (cmd, rest) = input.split_once(' ').unwrap_or((input, ""));
        match cmd {
            "/help" | "/h" => self.print_help(),
            "/quit" | "/q" | "/exit" => return Ok(SlashResult::Quit),
            "/history" => self.print_history(),
            "/export" => {
                if let Err(e) = self.export(rest) {
                    print_error(&format!("{:#}", e));
                }
            }
            "/import" => match fs::read_to_string(rest) {
                Ok(raw) => match load_chat_export(&mut self.channel, &raw) {
                    Ok(count) => {
                        println!("{}", format!("Imported {} messages", count).dimmed());
                        self.print_history();
                        let update = self.channel.resume().await?;
                        self.render(update);
                    }
                    Err(e) => print_error(&format!("{:#}", e)),
                },
                Err(e) => print_error(&format!("Failed to read {}: {}", rest, e)),
            },
            "/reset" => {
                match self.channel.reset_remote(self.service.as_ref()).await {
                    Ok(()) => {
                        println!("{}", "Chat reset.".dimmed());
                        let update = self.channel.open(None).await?;
                        self.render(update);
                    }
                    Err(e) => print_error(&e.user_message()),
                }
            }
            "/reconnect" => {
                self.channel.close();
                let update = self.channel.resume().await?;
                self.render(update);
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        Ok(SlashResult::Continue)
    }

    fn export(&self, path: &str) -> Result<()> {
        let transcript = self.channel.transcript();
        if transcript.is_empty() {
            println!("{}", "No chat history to export".yellow());
            return Ok(());
        }
        let document = ChatDocument::from_session(self.channel.session_id(), transcript, Utc::now());
        let path = output_path(Some(path), &chat_file_name(Local::now().date_naive()));
        write_export(&path, &document.to_json()?)?;
        println!("Saved {}", path.display().to_string().bright_white());
        Ok(())
    }

    fn print_history(&self) {
        let transcript = self.channel.transcript();
        if transcript.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }
        println!();
        for entry in transcript.entries() {
            let speaker = match entry.role {
                Role::User => entry.role.speaker().bright_green(),
                Role::Assistant => entry.role.speaker().bright_blue(),
            };
            println!("{}: {}", speaker, entry.message);
        }
        println!();
    }

    fn render(&mut self, update: ChannelUpdate) {
        match update {
            ChannelUpdate::Connected { session_id } => match session_id {
                Some(id) => println!("{} {}", "Connected, resuming session".dimmed(), id.dimmed()),
                None => println!("{}", "Connected".dimmed()),
            },
            ChannelUpdate::SessionAssigned { session_id } => {
                debug!(%session_id, "ChatRepl: session assigned");
            }
            ChannelUpdate::HistoryReplaced { count } => {
                println!("{}", format!("Restored {} messages", count).dimmed());
                self.print_history();
            }
            ChannelUpdate::Answer { fragment, merge } => {
                if !self.answering || merge == FragmentMerge::NewEntry {
                    print!("\n{} ", "Assistant:".bright_blue());
                    self.answering = true;
                }
                print!("{}", fragment);
                let _ = io::stdout().flush();
            }
            ChannelUpdate::Document(_) => {}
            ChannelUpdate::ServerError(message) => print_error(&message),
            ChannelUpdate::Ignored => {}
            ChannelUpdate::Disconnected { reason } => {
                println!();
                println!("{} {}", "Disconnected:".yellow(), reason);
                println!("Use {} to try again", "/reconnect".yellow());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TranscriptEntry;
    use crate::session::{IdentityStore, MemoryIdentityStore};
    use crate::session::transport::mock::MockConnector;

    fn idle_channel(store: Arc<MemoryIdentityStore>) -> SessionChannel {
        SessionChannel::new("ws://localhost:8000/ws/chat", Arc::new(MockConnector::default()), store)
    }

    #[test]
    fn test_load_chat_export_adopts_session() {
        let store = Arc::new(MemoryIdentityStore::with_id("old"));
        let mut channel = idle_channel(store.clone());
        let raw = r#"{"sessionId": "s-9", "messages": [
            {"role": "user", "message": "hi"},
            {"role": "assistant", "message": "hello"}
        ]}"#;

        assert_eq!(load_chat_export(&mut channel, raw).unwrap(), 2);
        assert_eq!(channel.session_id(), Some("s-9"));
        assert_eq!(store.get().as_deref(), Some("s-9"));
        assert_eq!(
            channel.transcript().entries(),
            &[TranscriptEntry::user("hi"), TranscriptEntry::assistant("hello")]
        );
    }

    #[test]
    fn test_load_chat_export_without_session_starts_fresh() {
        let store = Arc::new(MemoryIdentityStore::with_id("old"));
        let mut channel = idle_channel(store.clone());

        let raw = r#"{"messages": [{"role": "user", "message": "hi"}]}"#;
        assert_eq!(load_chat_export(&mut channel, raw).unwrap(), 1);
        assert_eq!(channel.session_id(), None);
        assert_eq!(store.get(), None);
        assert_eq!(channel.transcript().len(), 1);
    }

    #[test]
    fn test_load_chat_export_rejects_bad_file() {
        let store = Arc::new(MemoryIdentityStore::with_id("old"));
        let mut channel = idle_channel(store);

        assert!(load_chat_export(&mut channel, r#"{"sessionId": "x"}"#).is_err());
        assert_eq!(channel.session_id(), Some("old"));
    }
}
