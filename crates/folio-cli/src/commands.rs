use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use folio_engine::{
    AppendRequest, DocChunk, DocMeta, DocumentEngine, EditOutcome, EngineConfig, SectionContent,
    SectionMeta,
};
use serde::Serialize;
use tracing::debug;

use crate::cli::*;

const DEFAULT_CONFIG_FILE: &str = "folio.toml";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let out = Output(cli.format);
    let engine = DocumentEngine::from_config(&config);

    match cli.command {
        Command::Append(args) => cmd_append(&engine, args, out),
        Command::Rebuild(args) => {
            let meta = engine.rebuild(&args.key.to_key()?)?;
            out.meta("Rebuilt", &meta)
        }
        Command::Delete(args) => {
            let meta = engine.delete_chunk(&args.key.to_key()?, args.sequence)?;
            out.meta(&format!("Deleted chunk {}", args.sequence), &meta)
        }
        Command::Toggle(args) => {
            let meta = engine.toggle_chunk(&args.key.to_key()?, args.sequence)?;
            out.meta(&format!("Toggled chunk {}", args.sequence), &meta)
        }
        Command::Squash(args) => {
            let meta = engine.squash(
                &args.key.to_key()?,
                &args.user,
                args.source.as_deref(),
                args.expect_version,
            )?;
            out.meta("Squashed", &meta)
        }
        Command::Chunks(args) => {
            let (chunks, meta) = engine.list_chunks(&args.key.to_key()?)?;
            cmd_chunks(&chunks, &meta, out)
        }
        Command::Export(args) => cmd_export(&engine, args, out),
        Command::Meta(args) => {
            let meta = engine.doc_meta(&args.key.to_key()?)?;
            out.meta("Document", &meta)
        }
        Command::Sections(args) => {
            let meta = engine.get_sections(&args.key.to_key()?)?;
            out.sections(&meta)
        }
        Command::Section(args) => cmd_section(&engine, args, out),
        Command::Sync(args) => {
            let key = args.key.to_key()?;
            match args.direction {
                Some(direction) => {
                    let meta = engine.sync_sections(&key, direction.into())?;
                    out.sections(&meta)
                }
                None => {
                    let ran = engine.auto_sync(&key)?;
                    if out.is_json() {
                        return out.json(&ran);
                    }
                    match ran {
                        Some(direction) => {
                            println!("{} Synced {}", "✓".green(), direction.to_string().cyan())
                        }
                        None => println!("Sections and compiled document agree."),
                    }
                    Ok(())
                }
            }
        }
        Command::Validate(args) => {
            let meta = engine.validate_sections(&args.key.to_key()?)?;
            if out.is_json() {
                return out.json(&meta);
            }
            println!(
                "{} {} sections match their hashes",
                "✓".green().bold(),
                meta.sections.len().to_string().bold()
            );
            Ok(())
        }
        Command::Config => cmd_config(&config, out),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            EngineConfig::load(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("loading config {DEFAULT_CONFIG_FILE}"))?
        }
        None => EngineConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.projects_root = root.clone();
    }
    if cli.no_fsync {
        config.fsync = false;
    }
    config.validate()?;
    debug!(root = %config.projects_root.display(), fsync = config.fsync, "config loaded");
    Ok(config)
}

fn read_body(body: &ContentArgs) -> anyhow::Result<String> {
    if let Some(path) = &body.file {
        return fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }
    if let Some(content) = &body.content {
        return Ok(content.clone());
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf).context("reading stdin")?;
    Ok(buf)
}

fn cmd_append(engine: &DocumentEngine, args: AppendArgs, out: Output) -> anyhow::Result<()> {
    let mut req = AppendRequest::new(read_body(&args.body)?)
        .op(args.op.as_str())
        .user(args.user);
    if let Some(source) = args.source {
        req = req.source(source);
    }
    if let Some(version) = args.expect_version {
        req = req.expect_version(version);
    }
    let outcome = engine.append(&args.key.to_key()?, req)?;
    if out.is_json() {
        return out.json(&outcome);
    }
    if outcome.duplicate {
        println!("{} Duplicate content, nothing appended", "=".yellow());
    } else if let Some(chunk) = &outcome.chunk {
        println!(
            "{} Appended chunk {} ({})",
            "✓".green().bold(),
            chunk.sequence.to_string().yellow(),
            chunk.op.as_str().cyan()
        );
    }
    print_meta(&outcome.meta);
    Ok(())
}

fn cmd_chunks(chunks: &[DocChunk], meta: &DocMeta, out: Output) -> anyhow::Result<()> {
    if out.is_json() {
        return out.json(&serde_json::json!({ "chunks": chunks, "meta": meta }));
    }
    for chunk in chunks {
        let marker = if chunk.active { "●".green() } else { "○".dimmed() };
        let preview: String = chunk.content.lines().next().unwrap_or("").chars().take(60).collect();
        println!(
            "{} {:>4}  {}  {}  {}  {}",
            marker,
            chunk.sequence.to_string().yellow(),
            chunk.timestamp.format("%Y-%m-%d %H:%M:%S"),
            chunk.op.as_str().cyan(),
            chunk.user.dimmed(),
            preview
        );
    }
    print_meta(meta);
    Ok(())
}

fn cmd_export(engine: &DocumentEngine, args: ExportArgs, out: Output) -> anyhow::Result<()> {
    let (text, meta) = engine.export(&args.key.to_key()?)?;
    if let Some(path) = &args.output {
        fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
        return out.meta(&format!("Exported to {}", path.display()), &meta);
    }
    if out.is_json() {
        return out.json(&serde_json::json!({ "content": text, "meta": meta }));
    }
    println!("{text}");
    Ok(())
}

fn cmd_section(engine: &DocumentEngine, args: SectionArgs, out: Output) -> anyhow::Result<()> {
    let key = args.key.to_key()?;
    let outcome = match args.action {
        SectionAction::Show { id, children } => {
            let content = engine.get_section(&key, &id, children)?;
            if out.is_json() {
                return out.json(&content);
            }
            print_section(&content);
            return Ok(());
        }
        SectionAction::Update {
            id,
            body,
            expect_version,
        } => engine.update_section(&key, &id, &read_body(&body)?, expect_version)?,
        SectionAction::Insert {
            title,
            body,
            after,
            expect_version,
        } => engine.insert_section(
            &key,
            &title,
            &read_body(&body)?,
            after.as_deref(),
            expect_version,
        )?,
        SectionAction::Remove {
            id,
            cascade,
            expect_version,
        } => engine.delete_section(&key, &id, cascade, expect_version)?,
        SectionAction::Replace {
            id,
            body,
            expect_version,
        } => engine.update_section_full(&key, &id, &read_body(&body)?, expect_version)?,
        SectionAction::Move {
            id,
            after,
            expect_version,
        } => engine.reorder_section(&key, &id, after.as_deref(), expect_version)?,
    };
    out.edit(&outcome)
}

fn cmd_config(config: &EngineConfig, out: Output) -> anyhow::Result<()> {
    if out.is_json() {
        return out.json(config);
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn print_meta(meta: &DocMeta) {
    println!(
        "  version {}  chunks {} ({} deleted)  etag {}",
        meta.version.to_string().bold(),
        meta.chunk_count,
        meta.deleted_count,
        meta.etag.dimmed()
    );
}

fn print_section(content: &SectionContent) {
    println!("{}", content.section.title.bold());
    if !content.content.is_empty() {
        println!("\n{}\n", content.content);
    }
    for child in &content.children_content {
        print_section(child);
    }
}

#[derive(Clone, Copy)]
struct Output(OutputFormat);

impl Output {
    fn is_json(&self) -> bool {
        self.0 == OutputFormat::Json
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn meta(&self, label: &str, meta: &DocMeta) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(meta);
        }
        println!("{} {}", "✓".green().bold(), label);
        print_meta(meta);
        Ok(())
    }

    fn sections(&self, meta: &SectionMeta) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(meta);
        }
        println!(
            "Sections v{}  root level {}  etag {}",
            meta.version.to_string().bold(),
            meta.root_level,
            meta.etag.dimmed()
        );
        for section in &meta.sections {
            let indent = "  ".repeat(usize::from(section.level.saturating_sub(meta.root_level)));
            println!("{}{}  {}", indent, section.id.yellow(), section.title);
        }
        Ok(())
    }

    fn edit(&self, outcome: &EditOutcome) -> anyhow::Result<()> {
        if self.is_json() {
            return self.json(outcome);
        }
        match &outcome.section {
            Some(section) => println!("{} {}  {}", "✓".green().bold(), section.id.yellow(), section.title),
            None => println!("{} Sections updated", "✓".green().bold()),
        }
        println!(
            "  sections v{}  document v{}",
            outcome.sections.version.to_string().bold(),
            outcome.doc.version.to_string().bold()
        );
        Ok(())
    }
}
