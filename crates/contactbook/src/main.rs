//! `cbook` - CLI for contactbook
//!
//! This binary provides the command-line interface for adding, editing,
//! listing and deleting contacts, and for watching the database for changes.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::debug;

use contactbook::cli::{
    AddCommand, Cli, Command, ConfigCommand, DeleteCommand, EditCommand, OutputFormat,
    ShowCommand,
};
use contactbook::notify::{ChangeNotifier, ExternalChangeFeed};
use contactbook::render::{
    render_contact, render_errors, render_notice, render_plain, render_table,
};
use contactbook::{
    init_logging, photo, store, Config, ContactForm, ContactStore, Error, NoticeLevel,
    SqliteStore, StorageBackend,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let path = cli.config;
    match cli.command {
        Command::List(cmd) => with_form(path, |form, _| handle_list(form, cmd.format)),
        Command::Add(cmd) => with_form(path, |form, config| handle_add(form, config, &cmd)),
        Command::Edit(cmd) => with_form(path, |form, config| handle_edit(form, config, &cmd)),
        Command::Delete(cmd) => with_form(path, |form, _| Ok(handle_delete(form, &cmd))),
        Command::Show(cmd) => with_form(path, |form, _| handle_show(form, &cmd)),
        Command::Watch => handle_watch(&load_config(path)?),
        // Config commands report on the file themselves
        Command::Config(cmd) => handle_config(path, cmd),
    }
}

type Form = ContactForm<Box<dyn ContactStore>>;

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(path).context("failed to load configuration")
}

/// Open the configured store, run `f` on a form over it, then print notices.
fn with_form<F>(path: Option<PathBuf>, f: F) -> anyhow::Result<ExitCode>
where
    F: FnOnce(&mut Form, &Config) -> anyhow::Result<ExitCode>,
{
    let config = load_config(path)?;
    let store = store::open(&config).context("failed to open contact store")?;
    let mut form = ContactForm::new(store);
    let result = f(&mut form, &config);
    flush_notices(&mut form);
    result
}

/// Print queued notices: successes to stdout, errors to stderr.
fn flush_notices<S: ContactStore>(form: &mut ContactForm<S>) {
    for notice in form.take_notices() {
        match notice.level {
            NoticeLevel::Success => println!("{}", render_notice(&notice)),
            NoticeLevel::Error => eprintln!("{}", render_notice(&notice)),
        }
    }
}

fn handle_list(form: &Form, format: OutputFormat) -> anyhow::Result<ExitCode> {
    // A failed initial load has queued an error notice
    if form.notices().iter().any(|n| n.level == NoticeLevel::Error) {
        return Ok(ExitCode::FAILURE);
    }

    match format {
        OutputFormat::Table => print!("{}", render_table(form.rows())),
        OutputFormat::Plain => print!("{}", render_plain(form.rows())),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(form.rows())?),
    }
    Ok(ExitCode::SUCCESS)
}

fn load_photo(config: &Config, path: Option<&Path>) -> anyhow::Result<Option<String>> {
    path.map(|p| photo::load_data_url(p, config.photo.max_bytes))
        .transpose()
        .context("failed to load photo")
}

fn submit(form: &mut Form) -> ExitCode {
    match form.submit() {
        Ok(contact) => {
            debug!("Stored contact {}", contact.id);
            println!("{}", contact.id);
            ExitCode::SUCCESS
        }
        Err(Error::Validation(errors)) => {
            eprintln!("Contact not saved:");
            eprint!("{}", render_errors(&errors));
            ExitCode::FAILURE
        }
        // Reported through a notice
        Err(_) => ExitCode::FAILURE,
    }
}

fn handle_add(form: &mut Form, config: &Config, cmd: &AddCommand) -> anyhow::Result<ExitCode> {
    let photo = load_photo(config, cmd.photo.as_deref())?;
    form.set_draft(cmd.to_fields(photo));
    Ok(submit(form))
}

fn handle_edit(form: &mut Form, config: &Config, cmd: &EditCommand) -> anyhow::Result<ExitCode> {
    let photo = load_photo(config, cmd.photo.as_deref())?;
    let patch = cmd.to_patch(photo);
    if patch.is_empty() {
        bail!("nothing to change; pass at least one field to edit");
    }

    if form.begin_edit(&cmd.id).is_err() {
        return Ok(ExitCode::FAILURE);
    }
    form.edit_draft(&patch);
    Ok(submit(form))
}

fn handle_delete(form: &mut Form, cmd: &DeleteCommand) -> ExitCode {
    if !cmd.yes {
        eprintln!("This will permanently delete contact {}.", cmd.id);
        eprintln!("Use --yes to confirm.");
        return ExitCode::FAILURE;
    }
    match form.delete(&cmd.id) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn handle_show(form: &Form, cmd: &ShowCommand) -> anyhow::Result<ExitCode> {
    let Some(contact) = form.store().get(&cmd.id)? else {
        eprintln!("Contact not found: {}", cmd.id);
        return Ok(ExitCode::FAILURE);
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&contact)?);
    } else {
        print!("{}", render_contact(&contact));
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_watch(config: &Config) -> anyhow::Result<ExitCode> {
    if config.storage.backend != StorageBackend::Sqlite {
        bail!(
            "watch needs storage.backend = \"sqlite\" (current: {})",
            config.storage.backend
        );
    }
    if !config.notify.enabled {
        bail!("change notifications are disabled (notify.enabled = false)");
    }

    let store = SqliteStore::open(config.database_path(), config.notify.channel_capacity)
        .context("failed to open contact store")?;
    let feed = ExternalChangeFeed::new(
        store.path(),
        config.poll_interval(),
        config.notify.channel_capacity,
    );
    let mut form = ContactForm::new(store);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    Ok(runtime.block_on(async move {
        let (tx, mut changes) = mpsc::unbounded_channel();
        let handle = ChangeNotifier::start(&feed, move |event| {
            let _ = tx.send(event.clone());
        });

        print!("{}", render_table(form.rows()));
        flush_notices(&mut form);
        if !handle.is_active() {
            eprintln!("Live updates unavailable for {}", feed.path().display());
            return ExitCode::FAILURE;
        }

        loop {
            tokio::select! {
                event = changes.recv() => {
                    let Some(event) = event else {
                        eprintln!("Change feed ended");
                        return ExitCode::FAILURE;
                    };
                    debug!(kind = %event.kind, "Refreshing after change");
                    if form.reload().is_ok() {
                        println!();
                        print!("{}", render_table(form.rows()));
                    }
                    flush_notices(&mut form);
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        handle.stop();
        ExitCode::SUCCESS
    }))
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path).context("failed to load configuration")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Backend:            {}", config.storage.backend);
                println!("  Local slot:         {}", config.local_path().display());
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Notify]");
                println!("  Enabled:            {}", config.notify.enabled);
                println!("  Poll interval (ms): {}", config.notify.poll_interval_ms);
                println!("  Channel capacity:   {}", config.notify.channel_capacity);
                println!();
                println!("[Photo]");
                println!("  Max bytes:          {}", config.photo.max_bytes);
            }
        }
        ConfigCommand::Path => {
            println!("{}", path.unwrap_or_else(Config::default_config_path).display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
