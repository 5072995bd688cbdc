mod app;
mod board;
mod cli;
mod clock;
mod completions;
mod config;
mod db;
mod domain;
mod import;
mod lifecycle;
mod logging;
mod query;
mod repository;
mod stats;
mod store;
mod timeline;
mod ui;

use app::{AppError, BoardMoveStatus, ClientView};
use domain::client::{Budget, ClientPatch, NewClient};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        if err.is_recoverable() {
            eprintln!("hint: the store was busy or unreachable; retrying may succeed");
        }
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run() -> Result<(), AppError> {
    use clap::Parser;
    use cli::{BoardSubcommands, Commands, NoteSubcommands, UserSubcommands};

    let cli = cli::Cli::parse();
    if let Commands::Completions(args) = &cli.command {
        return completions::run_completions_command(args.shell.as_deref(), args.install);
    }

    let config = config::Config::load(Some(&cli.config))?;
    logging::init(config.log_level());

    let mut app = app::App::open(&cli.db, config)?;
    if let Some(user_id) = cli.as_user.as_deref().filter(|id| !id.trim().is_empty()) {
        app.sign_in(user_id)?;
    }
    let palette = ui::Palette::auto();

    match cli.command {
        Commands::Ls(args) => {
            let filter = query::ClientListFilter {
                stage: args.stage,
                industry: args.industry,
                company_size: args.company_size,
                assigned_bde: args.assigned_bde,
                budget_range: args.budget_range,
                date_range: args.date_range,
                dropped: args.dropped,
            };
            let clients = app.query(
                args.query.as_deref(),
                filter.clone(),
                args.sort_by.as_deref(),
                args.sort_order.as_deref(),
            )?;
            if args.json {
                print_json(&clients)?;
            } else {
                ui::print_client_list(&clients, args.query.as_deref(), &filter);
            }
        }
        Commands::Show(args) => {
            let client = app.show(&args.id)?;
            if args.json {
                print_json(&client)?;
            } else {
                ui::print_client_show(&client);
            }
        }
        Commands::Timeline(args) => {
            let entries = app.timeline(&args.id)?;
            if args.json {
                print_json(&entries)?;
            } else {
                ui::print_timeline(&app.show(&args.id)?, &entries);
            }
        }
        Commands::Move(args) => {
            let client = app.move_stage(&args.id, &args.stage)?;
            if args.json {
                print_json(&client)?;
            } else {
                println!(
                    "moved {} -> {}",
                    palette.id(&client.id),
                    palette.stage(client.stage, client.is_dropped)
                );
            }
        }
        Commands::Drop(args) => {
            let client = app.drop_client(&args.id, &args.reason)?;
            if args.json {
                print_json(&client)?;
            } else {
                println!("dropped {} ({})", palette.id(&client.id), client.status);
            }
        }
        Commands::Reactivate(args) => {
            let client = app.reactivate(&args.id)?;
            if args.json {
                print_json(&client)?;
            } else {
                println!("reactivated {} -> {}", palette.id(&client.id), client.status);
            }
        }
        Commands::Board(args) => match args.command {
            None => {
                let columns = app.board();
                if args.json {
                    print_json(&columns)?;
                } else {
                    ui::print_board(&columns);
                }
            }
            Some(BoardSubcommands::Move(move_args)) => {
                let report = app.board_move(&move_args.id, move_args.stage.as_deref())?;
                if move_args.json {
                    print_json(&report)?;
                } else {
                    println!("{}", board_move_line(&report.status, &report.client));
                    if let Some(error) = report.error.as_deref() {
                        eprintln!("warning: {}", error);
                    }
                }
            }
        },
        Commands::New(args) => {
            let budget = args
                .budget
                .map(|amount| app.budget(amount, args.currency.as_deref()));
            let client = app.create_client(NewClient {
                company_name: args.company,
                contact_person: args.contact,
                email: args.email,
                phone: args.phone,
                industry: args.industry,
                company_size: args.company_size,
                budget,
                requirements: args.requirements,
                source: args.source,
                referrer_name: args.referrer,
                assigned_bde: args.assigned_bde,
            })?;
            if args.json {
                print_json(&client)?;
            } else {
                println!("created {}", client_ref(&client, &palette));
            }
        }
        Commands::Update(args) => {
            let budget = args
                .budget
                .map(|amount| app.budget(amount, args.currency.as_deref()));
            let json = args.json;
            let id = args.id.clone();
            let client = app.update_client(&id, client_patch(args, budget))?;
            if json {
                print_json(&client)?;
            } else {
                println!("updated {}", client_ref(&client, &palette));
            }
        }
        Commands::Stats(args) => {
            let stats = app.stats();
            if args.json {
                print_json(&stats)?;
            } else {
                ui::print_stats(&stats);
            }
        }
        Commands::Note(args) => match args.command {
            NoteSubcommands::Add(add) => {
                let note = app.add_note(&add.id, &add.text)?;
                if add.json {
                    print_json(&note)?;
                } else {
                    println!(
                        "note {} added to {}",
                        palette.id(note.id.as_deref().unwrap_or_default()),
                        add.id
                    );
                }
            }
            NoteSubcommands::Ls(list) => {
                let notes = app.notes(&list.id)?;
                if list.json {
                    print_json(&notes)?;
                } else {
                    ui::print_notes(&notes);
                }
            }
            NoteSubcommands::Migrate(migrate) => {
                let count =
                    app.migrate_notes(&migrate.id, migrate.author.as_deref(), migrate.at.as_deref())?;
                println!("migrated {} legacy note(s) on {}", count, migrate.id);
            }
        },
        Commands::Attach(args) => {
            let attachment = app.attach(&args.id, &args.file, args.note.as_deref())?;
            if args.json {
                print_json(&attachment)?;
            } else {
                println!(
                    "attached {} {} ({}, {} bytes)",
                    palette.id(&attachment.id),
                    attachment.original_filename,
                    attachment.media_type,
                    attachment.size_bytes
                );
            }
        }
        Commands::Files(args) => {
            let files = app.attachments(&args.id, args.note.as_deref())?;
            if args.json {
                print_json(&files)?;
            } else {
                ui::print_attachments(&files);
            }
        }
        Commands::Import(args) => {
            let summary = app.import(&args.file)?;
            if args.json {
                print_json(&summary)?;
            } else {
                println!(
                    "import users_imported={} users_skipped={} clients_imported={} clients_skipped={}",
                    summary.users_imported,
                    summary.users_skipped,
                    summary.clients_imported,
                    summary.clients_skipped
                );
            }
        }
        Commands::User(args) => match args.command {
            UserSubcommands::Add(add) => {
                let user = app.add_user(&add.name, &add.email, &add.role, add.status.as_deref())?;
                if add.json {
                    print_json(&user)?;
                } else {
                    println!(
                        "created user {} {} ({})",
                        palette.id(&user.id),
                        user.name,
                        user.role.as_str()
                    );
                }
            }
            UserSubcommands::Ls(list) => {
                let users = app.list_users()?;
                if list.json {
                    print_json(&users)?;
                } else {
                    ui::print_users(&users);
                }
            }
            UserSubcommands::Bdes(list) => {
                let users = app.list_bdes()?;
                if list.json {
                    print_json(&users)?;
                } else {
                    ui::print_users(&users);
                }
            }
        },
        Commands::Completions(_) => unreachable!("completions return before the app opens"),
    }

    Ok(())
}

fn client_ref(client: &ClientView, palette: &ui::Palette) -> String {
    format!(
        "{} {} {}",
        palette.id(&client.id),
        palette.stage(client.stage, client.is_dropped),
        client.company_name
    )
}

fn board_move_line(status: &BoardMoveStatus, client: &ClientView) -> String {
    match status {
        BoardMoveStatus::Cancelled => format!(
            "drag cancelled; {} stays in stage {}",
            client.id,
            client.stage.number()
        ),
        BoardMoveStatus::Unchanged => {
            format!("{} already in stage {}", client.id, client.stage.number())
        }
        BoardMoveStatus::Confirmed => {
            format!("moved {} -> stage {}", client.id, client.stage.number())
        }
        BoardMoveStatus::RolledBack => format!(
            "move failed; {} restored to stage {}",
            client.id,
            client.stage.number()
        ),
        BoardMoveStatus::Superseded => format!("{} has a newer move in flight", client.id),
    }
}

fn client_patch(args: cli::UpdateArgs, budget: Option<Budget>) -> ClientPatch {
    let budget = if args.clear_budget {
        Some(None)
    } else {
        budget.map(Some)
    };
    ClientPatch {
        company_name: args.company,
        contact_person: args.contact,
        email: args.email,
        phone: args.phone,
        industry: args.industry,
        company_size: args.company_size,
        budget,
        requirements: args.requirements,
        source: args.source,
        referrer_name: args.referrer,
        assigned_bde: args.assigned_bde,
        ..ClientPatch::default()
    }
}
