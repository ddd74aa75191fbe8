//! Notesync - inspect and edit notes the way the editor core sees them.
//!
//! # Usage
//!
//! ```bash
//! notesync detect note.txt
//! notesync markdown note.json
//! notesync promote --block 1 table.md
//! notesync shell notes/*.md
//! ```

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use notesync::app::{Message, Notification, Outcome, Session, Surface};
use notesync::autosave::{AutosaveConfig, SystemClock};
use notesync::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path, save_config_flags,
};
use notesync::document::{self, ContentFormat, Node};
use notesync::editor::{EditorHandle, MemoryEngine};
use notesync::store::{FolderStore, MemoryStore, NoteId, NoteStore};
use notesync::table;
use notesync::tree::TreeItem;

/// Inspect and edit notes through the note editor's sync core
#[derive(Parser, Debug)]
#[command(name = "notesync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quiet period before an edit is saved, in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// How long the save indicator lingers, in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    cooldown_ms: Option<u64>,

    /// Open notes read-only
    #[arg(long, global = true)]
    read_only: bool,

    /// Print Markdown instead of the JSON tree
    #[arg(long, global = true)]
    markdown: bool,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether a note is structured JSON or legacy Markdown
    Detect { file: PathBuf },
    /// Print a note as Markdown
    Markdown { file: PathBuf },
    /// Print a note as a structured JSON tree
    Json { file: PathBuf },
    /// Promote the pipe table around a text block
    Promote {
        file: PathBuf,
        /// Index of the text block holding the cursor
        #[arg(long, default_value_t = 0)]
        block: usize,
        /// Convert the whole note instead of the run around the cursor
        #[arg(long)]
        whole: bool,
    },
    /// Edit notes interactively against an in-memory store
    Shell { files: Vec<PathBuf> },
}

fn read_note(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn render(handle: &EditorHandle, flags: &ConfigFlags) -> Result<String> {
    if flags.markdown_only {
        return Ok(handle.get_markdown().unwrap_or_default());
    }
    let doc = handle.get_structured().unwrap_or_else(Node::empty_doc);
    serde_json::to_string_pretty(&doc).context("Failed to encode document")
}

fn load_handle(path: &Path) -> Result<(EditorHandle, MemoryEngine)> {
    let content = read_note(path)?;
    let engine = MemoryEngine::new();
    let mut handle = EditorHandle::new();
    handle.mount(Box::new(engine.clone()));
    handle.set_structured(document::decode_content(&content))?;
    Ok((handle, engine))
}

fn promote(path: &Path, block: usize, whole: bool, flags: &ConfigFlags) -> Result<()> {
    let (mut handle, engine) = load_handle(path)?;
    handle.set_editable(!flags.read_only)?;
    engine.select_block(block);
    let result = if whole {
        table::promote_document(&mut handle)
    } else {
        table::promote_at_cursor(&mut handle)
    };
    match result {
        Ok(parsed) => eprintln!("Promoted {} columns, {} rows", parsed.columns(), parsed.rows.len()),
        Err(err) if err.is_decline() => eprintln!("No table promoted: {err}"),
        Err(err) => return Err(anyhow::Error::new(err).context("Table promotion failed")),
    }
    println!("{}", render(&handle, flags)?);
    Ok(())
}

/// Prints notifications and types non-table pastes as plain paragraphs.
struct Console {
    engine: MemoryEngine,
}

impl Surface for Console {
    fn notify(&mut self, notification: &Notification) {
        match notification {
            Notification::StatusChanged(status) => println!("[{status}]"),
            Notification::MetricsChanged(m) => println!(
                "  {} words, {} chars, {} lines, {} bytes",
                m.word_count, m.char_count, m.line_count, m.size_bytes
            ),
            Notification::NoteSelected(id) => println!("Opened note {id}"),
            Notification::TreeReloaded => {}
            Notification::Blocking(message) => eprintln!("error: {message}"),
        }
    }

    fn outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::PastePlain(text) => {
                if !self.engine.type_paragraph(&text) {
                    eprintln!("Read-only");
                }
            }
            Outcome::Exported(bytes) => println!("Exported {} bytes", bytes.len()),
            Outcome::Done => {}
        }
    }
}

/// Translate one shell line into a session message.
fn parse_line(line: &str) -> Option<Message> {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let id = || rest.trim().parse().ok().map(NoteId);
    match cmd {
        ":open" => id().map(Message::SelectNote),
        ":close" => Some(Message::CloseNote),
        ":flush" => Some(Message::Flush),
        ":table" => Some(Message::PromoteTable),
        ":convert" => Some(Message::ConvertDocumentToTable),
        ":ro" => Some(Message::SetEditable(false)),
        ":rw" => Some(Message::SetEditable(true)),
        ":pdf" => id().map(Message::ExportPdf),
        ":zip" => Some(Message::ExportZip),
        ":new" => Some(Message::CreateNote {
            folder: None,
            title: rest.trim().to_string(),
        }),
        ":rm" => id().map(Message::DeleteNote),
        ":link" => id().map(|note| Message::InsertMention { note, range: None }),
        _ if cmd.starts_with(':') => None,
        _ => Some(Message::Paste(line.replace("\\n", "\n"))),
    }
}

fn shell(files: &[PathBuf], flags: &ConfigFlags) -> Result<()> {
    let store = MemoryStore::new();
    let root = store.root_folder_id()?;
    for path in files {
        let title = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
        let id = store.insert_note(root, &title, &read_note(path)?);
        println!("{id}\t{title}");
    }

    let engine = MemoryEngine::new();
    let mut session = Session::new(store, SystemClock::new(), AutosaveConfig::from(flags));
    session.mount(Box::new(engine.clone()))?;
    session.load_tree()?;
    session.set_editable(!flags.read_only)?;

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(std::result::Result::ok) {
            let line = line.trim_end();
            if line == ":quit" {
                break;
            }
            match parse_line(line) {
                Some(msg) => {
                    if tx.send(msg).is_err() {
                        break;
                    }
                }
                None => eprintln!("Unknown command: {line}"),
            }
        }
    });

    let mut console = Console { engine };
    session.run(&rx, &mut console);

    for row in session.visible_rows() {
        if let TreeItem::Note(id) = row.item {
            let format = session
                .store()
                .get_note(id)
                .map(|note| document::detect_format(&note.content))
                .unwrap_or(ContentFormat::Markdown);
            println!("{}{id}\t{}\t{format:?}", "  ".repeat(row.depth), row.label);
        }
    }
    if flags.markdown_only
        && let Some(markdown) = session.editor().get_markdown()
    {
        println!("{markdown}");
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = ConfigFlags {
        debounce_ms: cli.debounce_ms,
        cooldown_ms: cli.cooldown_ms,
        read_only: cli.read_only,
        markdown_only: cli.markdown,
    };

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);
    tracing::debug!(?effective, "Effective flags");

    match cli.command {
        None => Ok(()),
        Some(Command::Detect { file }) => {
            let format = document::detect_format(&read_note(&file)?);
            println!("{}", if format == ContentFormat::Json { "json" } else { "markdown" });
            Ok(())
        }
        Some(Command::Markdown { file }) => {
            let (handle, _engine) = load_handle(&file)?;
            println!("{}", handle.get_markdown().unwrap_or_default());
            Ok(())
        }
        Some(Command::Json { file }) => {
            let (handle, _engine) = load_handle(&file)?;
            let flags = ConfigFlags {
                markdown_only: false,
                ..effective
            };
            println!("{}", render(&handle, &flags)?);
            Ok(())
        }
        Some(Command::Promote { file, block, whole }) => promote(&file, block, whole, &effective),
        Some(Command::Shell { files }) => shell(&files, &effective).context("Shell error"),
    }
}
