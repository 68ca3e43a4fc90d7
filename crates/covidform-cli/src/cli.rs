use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use covidform_core::auth::LogoutOptions;
use covidform_core::models::{slot_capacities, DailyOverride};
use covidform_core::services::{
    daily_registration_limit, load_settings, save_setting, DailyOverrideService, ExamTypeService,
    SettingService, TimeSlotService,
};
use serde_json::Value;
use tracing::info;

use crate::console::{prompt_line, prompt_password, Console};

#[derive(Debug, Parser)]
#[command(version, about = "Admin console for the covidform registration backend")]
pub(crate) struct CliOpts {
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    subcmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and store the session on disk.
    Login(LoginCommand),

    /// Forget the stored session.
    Logout,

    /// Show backend and session details.
    Status,

    /// Exam types offered at registration.
    #[command(subcommand)]
    ExamTypes(ExamTypesCommand),

    /// Time slots and their share of the daily limit.
    #[command(subcommand)]
    TimeSlots(TimeSlotsCommand),

    /// General settings.
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Per-day registration limits.
    #[command(subcommand)]
    DailyOverrides(DailyOverridesCommand),
}

#[derive(Debug, Args)]
struct LoginCommand {
    #[arg(long)]
    email: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ExamTypesCommand {
    List,
}

#[derive(Debug, Subcommand)]
enum TimeSlotsCommand {
    List,
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    List,
    /// Set a value; JSON is accepted, anything else is stored as a string.
    Set { key: String, value: String },
}

#[derive(Debug, Subcommand)]
enum DailyOverridesCommand {
    List,
    Delete {
        id: i64,
    },
    /// Create an override, or update it when --id is given.
    Set {
        /// Day in YYYY-MM-DD form
        date: NaiveDate,
        limit: i64,
        #[arg(long)]
        id: Option<i64>,
    },
}

impl CliOpts {
    pub(crate) fn verbose(&self) -> u8 {
        self.verbose
    }

    pub(crate) async fn run(&self) -> Result<()> {
        let mut console = Console::open()?;

        match &self.subcmd {
            Command::Login(cmd) => cmd.run(&mut console).await,
            Command::Logout => logout(&console),
            Command::Status => status(&console),
            Command::ExamTypes(cmd) => cmd.run(&console).await,
            Command::TimeSlots(cmd) => cmd.run(&console).await,
            Command::Settings(cmd) => cmd.run(&console).await,
            Command::DailyOverrides(cmd) => cmd.run(&console).await,
        }
    }
}

impl LoginCommand {
    async fn run(&self, console: &mut Console) -> Result<()> {
        let email = match &self.email {
            Some(email) => email.clone(),
            None => prompt_line("Email", console.config.last_email.as_deref())?,
        };
        if email.is_empty() {
            bail!("email is required");
        }
        let password = prompt_password()?;

        println!("Authenticating...");
        let response = console.auth.log_in(&email, &password).await?;

        if !response.is_success() {
            let data = response.data();
            let reason = data.error_message().map(str::to_string).unwrap_or_else(|| data.to_string());
            bail!("login failed ({}): {}", response.status(), reason);
        }

        console.config.last_email = Some(email);
        console.config.save()?;

        println!("Login successful!");
        Ok(())
    }
}

fn logout(console: &Console) -> Result<()> {
    console
        .auth
        .log_out(Some(&console.navigator), LogoutOptions::default())?;
    println!("Logged out.");
    Ok(())
}

fn status(console: &Console) -> Result<()> {
    println!("Backend:   {}", console.config.base_url);
    println!("App type:  {:?}", console.config.app_type);
    println!(
        "Session:   {}",
        if console.auth.is_logged_in() { "logged in" } else { "logged out" }
    );
    if let Some(email) = &console.config.last_email {
        println!("Last user: {}", email);
    }
    Ok(())
}

impl ExamTypesCommand {
    async fn run(&self, console: &Console) -> Result<()> {
        match self {
            ExamTypesCommand::List => {
                let service = ExamTypeService::new(&console.auth, &console.navigator);
                let exam_types = console.settle(service.load_all(None).await)?;

                for exam_type in exam_types {
                    println!("{:>5}  {}", display_id(exam_type.id), exam_type.description);
                }
                Ok(())
            }
        }
    }
}

impl TimeSlotsCommand {
    async fn run(&self, console: &Console) -> Result<()> {
        match self {
            TimeSlotsCommand::List => {
                let slots = TimeSlotService::new(&console.auth, &console.navigator);
                let time_slots = console.settle(slots.load_all(Some("exam_types")).await)?;

                let settings = SettingService::new(&console.auth, &console.navigator);
                let settings = console.settle(load_settings(&settings).await)?;
                let capacities = daily_registration_limit(&settings)
                    .map(|limit| slot_capacities(&time_slots, limit));

                for (index, slot) in time_slots.iter().enumerate() {
                    let capacity = capacities
                        .as_ref()
                        .and_then(|c| c.get(index))
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    let exam_types = slot
                        .exam_types
                        .iter()
                        .flatten()
                        .map(|exam_type| exam_type.description.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");

                    println!(
                        "{:>5}  {}-{}  {:<20} x{:<3} {:>5}  {}",
                        display_id(slot.id),
                        slot.formatted_start_time(),
                        slot.formatted_end_time(),
                        slot.name,
                        slot.limit_coefficient,
                        capacity,
                        exam_types
                    );
                }
                Ok(())
            }
        }
    }
}

impl SettingsCommand {
    async fn run(&self, console: &Console) -> Result<()> {
        let service = SettingService::new(&console.auth, &console.navigator);

        match self {
            SettingsCommand::List => {
                let settings = console.settle(load_settings(&service).await)?;
                for (key, value) in &settings {
                    println!("{} = {}", key, value);
                }
            }
            SettingsCommand::Set { key, value } => {
                let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone()));
                let saved = console.settle(save_setting(&service, key, value).await)?;
                info!(key = %saved.key, "Setting saved");
                println!("{} = {}", saved.key, saved.value);
            }
        }
        Ok(())
    }
}

impl DailyOverridesCommand {
    async fn run(&self, console: &Console) -> Result<()> {
        let service = DailyOverrideService::new(&console.auth, &console.navigator);

        match self {
            DailyOverridesCommand::List => {
                let mut overrides = console.settle(service.load_all(None).await)?;
                overrides.sort_by_key(|o| o.date);
                for daily_override in overrides {
                    println!(
                        "{:>5}  {:<12} {}",
                        display_id(daily_override.id),
                        daily_override.display_date(),
                        daily_override.registration_limit
                    );
                }
            }
            DailyOverridesCommand::Delete { id } => {
                console.settle(service.delete(id).await)?;
                println!("Deleted override {}.", id);
            }
            DailyOverridesCommand::Set { date, limit, id } => {
                let entity = DailyOverride::new(*date, *limit);
                let saved = match id {
                    Some(id) => console.settle(service.update(id, &entity).await)?,
                    None => console.settle(service.create(&entity).await)?,
                };
                println!(
                    "{}: limit {} (id {})",
                    saved.display_date(),
                    saved.registration_limit,
                    display_id(saved.id)
                );
            }
        }
        Ok(())
    }
}

fn display_id(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}
