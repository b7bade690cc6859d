//! Plan builder REPL

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use super::{SlashResult, output_path, print_error, print_plan, write_export};
use crate::codec::{calendar_file_name, decode_plan, encode_calendar, plan_file_name};
use crate::domain::{Plan, Profile, TrainingEnvironment};
use crate::import::InsightsOutcome;
use crate::session::IdentityStore;
use crate::workflow::{PlanWorkflow, WorkflowError, WorkflowPhase};

/// Split `/explain <day> <n>` arguments; the day may contain spaces
fn parse_explain_args(args: &str) -> Option<(&str, usize)> {
    let (day, n) = args.trim().rsplit_once(' ')?;
    let n: usize = n.parse().ok()?;
    if n == 0 || day.trim().is_empty() {
        return None;
    }
    Some((day.trim(), n - 1))
}

/// Day label as written in the plan, matching case-insensitively
fn resolve_day<'a>(plan: &'a Plan, day: &str) -> Option<&'a str> {
    plan.days()
        .map(|(label, _)| label)
        .find(|label| label.eq_ignore_ascii_case(day))
}

/// Interactive walk through profile, assessment, refinement and plan
pub struct PlanRepl {
    workflow: PlanWorkflow,
    identity: Arc<dyn IdentityStore>,
    rl: DefaultEditor,
}

impl PlanRepl {
    pub fn new(workflow: PlanWorkflow, identity: Arc<dyn IdentityStore>) -> Result<Self> {
        let rl = DefaultEditor::new().map_err(|e| eyre!("Failed to initialize readline: {}", e))?;
        Ok(Self { workflow, identity, rl })
    }

    /// Run the workflow until `/quit` or end of input
    pub async fn run(&mut self, import: Option<&Path>) -> Result<()> {
        debug!(?import, "PlanRepl::run: called");
        println!();
        println!("{}", "Workout Plan Builder".bright_cyan().bold());
        println!("Type {} on any step for commands, {} to quit", "/help".yellow(), "/quit".yellow());

        if let Some(path) = import {
            let raw = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
            let document = decode_plan(&raw).context("Failed to import workout plan")?;
            self.workflow.restore(document.into()).await?;
            println!("Imported {}", path.display().to_string().bright_white());
        }

        loop {
            let flow = match self.workflow.phase().await {
                WorkflowPhase::CollectingProfile | WorkflowPhase::Assessing => self.collect_profile().await?,
                WorkflowPhase::RefiningInputs | WorkflowPhase::Generating => self.refine().await?,
                WorkflowPhase::PlanReady => self.plan_ready().await?,
            };
            if flow == SlashResult::Quit {
                break;
            }
        }
        println!("Goodbye!");
        Ok(())
    }

    /// `None` on end of input
    fn read_line(&mut self, prompt: &str, initial: &str) -> Result<Option<String>> {
        loop {
            match self.rl.readline_with_initial(prompt, (initial, "")) {
                Ok(line) => {
                    let _ = self.rl.add_history_entry(line.as_str());
                    return Ok(Some(line.trim().to_string()));
                }
                Err(ReadlineError::Interrupted) => println!("^C"),
                Err(ReadlineError::Eof) => return Ok(None),
                Err(e) => return Err(eyre!("Readline error: {}", e)),
            }
        }
    }

    /// Prompt until the value parses; `None` on end of input or `/quit`
    fn read_field<T: FromStr>(&mut self, label: &str, initial: &str, default: Option<&str>) -> Result<Option<T>> {
        loop {
            let Some(line) = self.read_line(&format!("{}: ", label.bright_green()), initial)? else {
                return Ok(None);
            };
            if line == "/quit" {
                return Ok(None);
            }
            let value = if line.is_empty() { default.unwrap_or("") } else { line.as_str() };
            if value.is_empty() {
                println!("{}", format!("{} is required", label).yellow());
                continue;
            }
            match value.parse() {
                Ok(parsed) => return Ok(Some(parsed)),
                Err(_) => println!("{}", format!("'{}' is not a valid {}", value, label.to_lowercase()).yellow()),
            }
        }
    }

    fn prompt_profile(&mut self, previous: Option<&Profile>) -> Result<Option<Profile>> {
        let text = |f: fn(&Profile) -> String| previous.map(f).unwrap_or_default();
        let name_init = text(|p| p.name.clone());
        let age_init = text(|p| p.age.to_string());
        let gender_init = text(|p| p.gender.clone());
        let height_init = text(|p| p.height.to_string());
        let weight_init = text(|p| p.weight.to_string());
        let occupation_init = text(|p| p.occupation.clone());
        let level_init = text(|p| p.experience_level.clone());

        let Some(name) = self.read_field::<String>("Name", &name_init, None)? else { return Ok(None) };
        let Some(age) = self.read_field::<u32>("Age", &age_init, None)? else { return Ok(None) };
        let Some(gender) = self.read_field::<String>("Gender", &gender_init, None)? else { return Ok(None) };
        let Some(height) = self.read_field::<f64>("Height (cm)", &height_init, None)? else { return Ok(None) };
        let Some(weight) = self.read_field::<f64>("Weight (kg)", &weight_init, None)? else { return Ok(None) };
        let Some(occupation) = self.read_field::<String>("Occupation", &occupation_init, None)? else {
            return Ok(None);
        };
        let Some(experience_level) =
            self.read_field::<String>("Experience level [Beginner]", &level_init, Some("Beginner"))?
        else {
            return Ok(None);
        };

        Ok(Some(Profile {
            name,
            age,
            gender,
            height,
            weight,
            occupation,
            experience_level,
        }))
    }

    async fn collect_profile(&mut self) -> Result<SlashResult> {
        println!();
        println!("{}", "Your profile".bright_cyan());
        let previous = self.workflow.snapshot().await.profile;
        let Some(profile) = self.prompt_profile(previous.as_ref())? else {
            return Ok(SlashResult::Quit);
        };
        println!("{}", format!("BMI {:.1}. Requesting assessment...", profile.bmi()).dimmed());

        match self.workflow.submit_profile(profile).await {
            Ok(assessment) => {
                println!();
                println!("{}", "Your Physical Assessment".bright_cyan().bold());
                println!("{}", assessment);
            }
            Err(e) => print_error(&e.user_message()),
        }
        Ok(SlashResult::Continue)
    }

    fn print_refine_help(&self) {
        println!();
        println!("{}", "Refine your plan:".bright_cyan());
        println!("  {:24} Training environment (gym, home_light, bodyweight)", "/env <environment>".yellow());
        println!("  {:24} Replace the additional information", "/info <text>".yellow());
        println!("  {:24} Show the current refinement", "/show".yellow());
        println!("  {:24} Import the current chat session", "/import-session".yellow());
        println!("  {:24} Import a chat export file", "/import-file <path>".yellow());
        println!("  {:24} Hide the insights notice", "/dismiss".yellow());
        println!("  {:24} Generate the workout plan", "/generate".yellow());
        println!("  {:24} Back to the profile", "/back".yellow());
        println!("  {:24} Exit", "/quit".yellow());
        println!();
    }

    async fn show_notice(&self) {
        if let Some(notice) = self.workflow.active_notice(Instant::now()).await {
            println!();
            println!("{}", "Insights from Your Conversation".bright_cyan());
            println!("{}", notice);
            println!("{}", "These insights will be considered when creating your workout plan.".dimmed());
        }
    }

    fn report_import(&self, result: Result<InsightsOutcome, WorkflowError>) {
        match result {
            Ok(_) => println!("{}", "Chat history added to additional information.".dimmed()),
            Err(e) => print_error(&e.user_message()),
        }
    }

    async fn refine(&mut self) -> Result<SlashResult> {
        self.show_notice().await;
        let Some(line) = self.read_line(&format!("{} ", "refine>".bright_green()), "")? else {
            return Ok(SlashResult::Quit);
        };
        let (cmd, rest) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        let rest = rest.trim();

        match cmd {
            "" => {}
            "/help" | "/h" => self.print_refine_help(),
            "/quit" | "/q" | "/exit" => return Ok(SlashResult::Quit),
            "/env" => match rest.parse::<TrainingEnvironment>() {
                Ok(env) => {
                    self.workflow.set_training_environment(env).await?;
                    println!("Training environment: {}", env.label().bright_white());
                }
                Err(msg) => print_error(&msg),
            },
            "/info" => {
                self.workflow.set_additional_info(rest).await?;
                println!("{}", "Additional information updated.".dimmed());
            }
            "/show" => {
                let refinement = self.workflow.snapshot().await.refinement;
                println!("Environment: {}", refinement.training_environment.label());
                if refinement.additional_info.is_empty() {
                    println!("{}", "No additional information.".dimmed());
                } else {
                    println!("{}", refinement.additional_info);
                }
            }
            "/import-session" => {
                let session_id = self.identity.get();
                let result = self.workflow.import_from_session(session_id.as_deref()).await;
                self.report_import(result);
            }
            "/import-file" => match fs::read_to_string(rest) {
                Ok(raw) => {
                    let result = self.workflow.import_from_export(&raw).await;
                    self.report_import(result);
                }
                Err(e) => print_error(&format!("Failed to read {}: {}", rest, e)),
            },
            "/dismiss" => self.workflow.dismiss_notice().await,
            "/generate" => {
                println!("{}", "Generating plan...".dimmed());
                match self.workflow.generate().await {
                    Ok(plan) => print_plan(&plan),
                    Err(e) => print_error(&e.user_message()),
                }
            }
            "/back" => self.workflow.back_to_profile().await?,
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        Ok(SlashResult::Continue)
    }

    fn print_plan_help(&self) {
        println!();
        println!("{}", "Plan commands:".bright_cyan());
        println!("  {:24} Show the plan", "/plan".yellow());
        println!("  {:24} Ask for changes", "/adjust <text>".yellow());
        println!("  {:24} Explain exercise n of a day", "/explain <day> <n>".yellow());
        println!("  {:24} Save the plan as JSON", "/export [path]".yellow());
        println!("  {:24} Save the plan as iCalendar", "/calendar [path]".yellow());
        println!("  {:24} Start over", "/new".yellow());
        println!("  {:24} Exit", "/quit".yellow());
        println!();
    }

    async fn plan_ready(&mut self) -> Result<SlashResult> {
        let Some(line) = self.read_line(&format!("{} ", "plan>".bright_green()), "")? else {
            return Ok(SlashResult::Quit);
        };
        let (cmd, rest) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        let rest = rest.trim();

        match cmd {
            "" => {}
            "/help" | "/h" => self.print_plan_help(),
            "/quit" | "/q" | "/exit" => return Ok(SlashResult::Quit),
            "/plan" => {
                if let Some(plan) = self.workflow.snapshot().await.plan {
                    print_plan(&plan);
                }
            }
            "/adjust" => match self.workflow.adjust(rest).await {
                Ok(plan) => print_plan(&plan),
                Err(WorkflowError::Validation(msg)) => println!("{}", msg.yellow()),
                Err(e) => print_error(&e.user_message()),
            },
            "/explain" => self.explain(rest).await,
            "/export" => {
                if let Err(e) = self.export(rest).await {
                    print_error(&format!("{:#}", e));
                }
            }
            "/calendar" => {
                if let Err(e) = self.calendar(rest).await {
                    print_error(&format!("{:#}", e));
                }
            }
            "/new" => {
                self.workflow.new_plan().await?;
                println!("{}", "Starting a new plan.".dimmed());
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        Ok(SlashResult::Continue)
    }

    async fn explain(&self, args: &str) {
        let Some((day, index)) = parse_explain_args(args) else {
            println!("{}", "Usage: /explain <day> <n>".yellow());
            return;
        };
        let Some(plan) = self.workflow.snapshot().await.plan else {
            return;
        };
        let Some(day) = resolve_day(&plan, day) else {
            print_error(&format!("No day '{}' in the plan", day));
            return;
        };
        let Some(exercise) = plan.exercise(day, index) else {
            print_error(&format!("{} has no exercise {}", day, index + 1));
            return;
        };

        println!("{}", exercise.summary().bright_white());
        match self.workflow.explain(day, &exercise.identity()).await {
            Ok(explanation) => {
                debug!(cached = explanation.cached, "PlanRepl::explain: answered");
                println!("{}", explanation.text);
            }
            Err(e) => print_error(&e.user_message()),
        }
    }

    async fn export(&self, path: &str) -> Result<()> {
        let session_id = self.identity.get();
        let document = self.workflow.export_document(session_id.as_deref()).await?;
        let path = output_path(Some(path), &plan_file_name(&document.profile.name));
        write_export(&path, &document.to_json()?)?;
        println!("Saved {}", path.display().to_string().bright_white());
        Ok(())
    }

    async fn calendar(&self, path: &str) -> Result<()> {
        let snapshot = self.workflow.snapshot().await;
        let (Some(profile), Some(plan)) = (snapshot.profile, snapshot.plan) else {
            return Err(eyre!("No plan to export"));
        };
        let ics = encode_calendar(&plan, &profile.name, Local::now().date_naive());
        let path = output_path(Some(path), &calendar_file_name(&profile.name));
        write_export(&path, &ics)?;
        println!("Saved {}", path.display().to_string().bright_white());
        Ok(())
    }
}
