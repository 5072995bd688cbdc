use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, CommandFactory, Parser, Subcommand};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

pub fn styled_command() -> clap::Command {
    Cli::command()
}

#[derive(Debug, Parser)]
#[command(name = "leadtrack")]
#[command(bin_name = "leadtrack")]
#[command(version)]
#[command(about = "A local sales pipeline tracker for client leads")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        env = "LEADTRACK_DB_PATH",
        default_value = ".leadtrack/state.sqlite",
        help = "Path to the SQLite database."
    )]
    pub db: String,

    #[arg(
        long,
        env = "LEADTRACK_CONFIG",
        default_value = ".leadtrack/config.toml",
        help = "Path to the TOML configuration file."
    )]
    pub config: PathBuf,

    #[arg(
        long = "as",
        env = "LEADTRACK_USER",
        help = "User id to act as for notes, files, and user management."
    )]
    pub as_user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Search, filter, and sort clients.", alias = "query")]
    Ls(ListArgs),
    #[command(about = "Show one client with notes and files.")]
    Show(ShowArgs),
    #[command(about = "Show a client's activity, newest first.")]
    Timeline(ShowArgs),
    #[command(about = "Move a client to a pipeline stage (1-5 or name).")]
    Move(MoveArgs),
    #[command(about = "Drop a client from the pipeline with a reason.")]
    Drop(DropArgs),
    #[command(about = "Return a dropped client to First Contact.")]
    Reactivate(ShowArgs),
    #[command(about = "Show the stage board or drag a card.")]
    Board(BoardArgs),
    #[command(about = "Create a client at First Contact.", alias = "create")]
    New(NewArgs),
    #[command(about = "Edit client fields.", alias = "edit")]
    Update(UpdateArgs),
    #[command(about = "Summarize the pipeline by stage.")]
    Stats(JsonArgs),
    #[command(about = "Add or migrate client notes.")]
    Note(NoteArgs),
    #[command(about = "Attach a file to a client or one of its notes.")]
    Attach(AttachArgs),
    #[command(about = "List files attached to a client or one of its notes.")]
    Files(FilesArgs),
    #[command(about = "Import a JSON backup of users and clients.")]
    Import(ImportArgs),
    #[command(about = "Manage users.")]
    User(UserArgs),
    #[command(about = "Generate or install shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Generate or install shell completions.")]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish). Auto-detected if omitted.")]
    pub shell: Option<String>,

    #[arg(
        short = 'i',
        long = "install",
        help = "Write completions to the canonical path for the shell."
    )]
    pub install: bool,
}

#[derive(Debug, Args)]
#[command(about = "List clients.")]
pub struct ListArgs {
    #[arg(
        short = 'q',
        long,
        help = "Text search over company, contact, email, and requirements."
    )]
    pub query: Option<String>,

    #[arg(short = 's', long, help = "Filter by stage (1-5 or name).")]
    pub stage: Option<String>,

    #[arg(short = 'i', long, help = "Filter by industry.")]
    pub industry: Option<String>,

    #[arg(long = "size", help = "Filter by company size.")]
    pub company_size: Option<String>,

    #[arg(short = 'b', long = "bde", help = "Filter by assigned BDE id.")]
    pub assigned_bde: Option<String>,

    #[arg(
        long = "budget",
        help = "Budget bucket, e.g. 10000-50000 or 500000+."
    )]
    pub budget_range: Option<String>,

    #[arg(
        long = "date",
        help = "Created within: today, this_week, this_month, this_quarter, this_year."
    )]
    pub date_range: Option<String>,

    #[arg(long, help = "Only dropped (true) or only active (false) clients.")]
    pub dropped: Option<String>,

    #[arg(long = "sort-by", help = "Sort key (defaults to configuration).")]
    pub sort_by: Option<String>,

    #[arg(long = "order", help = "Sort order: asc or desc.")]
    pub sort_order: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Client id.")]
    pub id: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    #[arg(help = "Client id.")]
    pub id: String,

    #[arg(help = "Target stage number (1-5) or name.")]
    pub stage: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DropArgs {
    #[arg(help = "Client id.")]
    pub id: String,

    #[arg(short = 'r', long, help = "Why the client left the pipeline.")]
    pub reason: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct BoardArgs {
    #[command(subcommand)]
    pub command: Option<BoardSubcommands>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum BoardSubcommands {
    #[command(about = "Drop a card on a stage column; omit the stage to cancel.")]
    Move(BoardMoveArgs),
}

#[derive(Debug, Args)]
pub struct BoardMoveArgs {
    #[arg(help = "Client id.")]
    pub id: String,

    #[arg(help = "Target column (1-5 or name).")]
    pub stage: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct NewArgs {
    #[arg(help = "Company name.")]
    pub company: String,

    #[arg(short = 'c', long, help = "Primary contact person.")]
    pub contact: String,

    #[arg(short = 'e', long, help = "Contact email.")]
    pub email: Option<String>,

    #[arg(short = 'p', long, help = "Contact phone.")]
    pub phone: Option<String>,

    #[arg(short = 'i', long, help = "Industry.")]
    pub industry: Option<String>,

    #[arg(long = "size", help = "Company size, e.g. 11-50.")]
    pub company_size: Option<String>,

    #[arg(long, help = "Budget amount.")]
    pub budget: Option<f64>,

    #[arg(long, help = "Budget currency code (defaults to configuration).")]
    pub currency: Option<String>,

    #[arg(short = 'r', long, help = "Requirements summary.")]
    pub requirements: Option<String>,

    #[arg(long, help = "Lead source.")]
    pub source: Option<String>,

    #[arg(long, help = "Referrer name.")]
    pub referrer: Option<String>,

    #[arg(short = 'b', long = "bde", help = "Assigned BDE user id.")]
    pub assigned_bde: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(help = "Client id.")]
    pub id: String,

    #[arg(long, help = "Set company name.")]
    pub company: Option<String>,

    #[arg(short = 'c', long, help = "Set contact person.")]
    pub contact: Option<String>,

    #[arg(short = 'e', long, help = "Set email (empty clears).")]
    pub email: Option<String>,

    #[arg(short = 'p', long, help = "Set phone (empty clears).")]
    pub phone: Option<String>,

    #[arg(short = 'i', long, help = "Set industry (empty clears).")]
    pub industry: Option<String>,

    #[arg(long = "size", help = "Set company size (empty clears).")]
    pub company_size: Option<String>,

    #[arg(long, help = "Set budget amount.")]
    pub budget: Option<f64>,

    #[arg(long, requires = "budget", help = "Budget currency code.")]
    pub currency: Option<String>,

    #[arg(long = "clear-budget", conflicts_with = "budget", help = "Remove the budget.")]
    pub clear_budget: bool,

    #[arg(short = 'r', long, help = "Set requirements (empty clears).")]
    pub requirements: Option<String>,

    #[arg(long, help = "Set lead source (empty clears).")]
    pub source: Option<String>,

    #[arg(long, help = "Set referrer name (empty clears).")]
    pub referrer: Option<String>,

    #[arg(short = 'b', long = "bde", help = "Reassign to a BDE user id (empty clears).")]
    pub assigned_bde: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct NoteArgs {
    #[command(subcommand)]
    pub command: NoteSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum NoteSubcommands {
    #[command(about = "Add a note as the signed-in user.")]
    Add(NoteAddArgs),
    #[command(about = "List a client's notes in the order they were written.", alias = "list")]
    Ls(ShowArgs),
    #[command(about = "Give legacy text notes an id, author, and timestamp.")]
    Migrate(NoteMigrateArgs),
}

#[derive(Debug, Args)]
pub struct NoteAddArgs {
    #[arg(help = "Client id.")]
    pub id: String,

    #[arg(help = "Note text.")]
    pub text: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct NoteMigrateArgs {
    #[arg(help = "Client id.")]
    pub id: String,

    #[arg(long, help = "Author user id (defaults to the signed-in user).")]
    pub author: Option<String>,

    #[arg(long, help = "Timestamp to assign (RFC3339; defaults to now).")]
    pub at: Option<String>,
}

#[derive(Debug, Args)]
pub struct AttachArgs {
    #[arg(help = "Client id.")]
    pub id: String,

    #[arg(help = "File to attach.")]
    pub file: PathBuf,

    #[arg(short = 'n', long, help = "Attach to this note instead of the client.")]
    pub note: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct FilesArgs {
    #[arg(help = "Client id.")]
    pub id: String,

    #[arg(short = 'n', long, help = "List the files of this note instead.")]
    pub note: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[arg(help = "Backup JSON file.")]
    pub file: PathBuf,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum UserSubcommands {
    #[command(about = "Create a user (the first user must be a super_admin).")]
    Add(UserAddArgs),
    #[command(about = "List all users.", alias = "list")]
    Ls(JsonArgs),
    #[command(about = "List active users who can own clients.")]
    Bdes(JsonArgs),
}

#[derive(Debug, Args)]
pub struct UserAddArgs {
    #[arg(help = "Display name.")]
    pub name: String,

    #[arg(help = "Email address.")]
    pub email: String,

    #[arg(
        short = 'r',
        long,
        default_value = "bde",
        help = "Role: bde, admin, or super_admin."
    )]
    pub role: String,

    #[arg(short = 's', long, help = "Status: active or inactive.")]
    pub status: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
