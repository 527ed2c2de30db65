use std::path::PathBuf;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use folio_engine::{DocKey, SyncDirection};

#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio: incremental documents with section-level editing",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Engine config file (TOML); `folio.toml` in the working directory
    /// is used when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the projects root
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Skip fsync on writes
    #[arg(long, global = true)]
    pub no_fsync: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Append content to a document's change log
    Append(AppendArgs),
    /// Rebuild the compiled document from the change log
    Rebuild(DocArgs),
    /// Soft-delete a chunk
    Delete(SeqArgs),
    /// Flip a chunk between active and deleted
    Toggle(SeqArgs),
    /// Collapse the change log into one chunk
    Squash(SquashArgs),
    /// List change-log chunks
    Chunks(DocArgs),
    /// Print the compiled document
    Export(ExportArgs),
    /// Show document metadata
    Meta(DocArgs),
    /// List the section tree
    Sections(DocArgs),
    /// Read or edit one section
    Section(SectionArgs),
    /// Synchronize sections and the compiled document
    Sync(SyncArgs),
    /// Check section files against their recorded hashes
    Validate(DocArgs),
    /// Print the effective configuration
    Config,
}

/// Document selection; exactly one form is required.
#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
pub struct KeyArgs {
    /// Task document as PROJECT/TASK/SLOT
    #[arg(long, value_name = "PROJECT/TASK/SLOT")]
    pub task: Option<String>,
    /// Project document as PROJECT/SLOT
    #[arg(long, value_name = "PROJECT/SLOT")]
    pub project: Option<String>,
    /// Meeting document as MEETING/SLOT
    #[arg(long, value_name = "MEETING/SLOT")]
    pub meeting: Option<String>,
    /// Explicit document directory
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,
}

impl KeyArgs {
    pub fn to_key(&self) -> anyhow::Result<DocKey> {
        if let Some(spec) = &self.task {
            let [project, task, slot] = split::<3>(spec, "PROJECT/TASK/SLOT")?;
            return Ok(DocKey::task(project, task, slot)?);
        }
        if let Some(spec) = &self.project {
            let [project, slot] = split::<2>(spec, "PROJECT/SLOT")?;
            return Ok(DocKey::project(project, slot)?);
        }
        if let Some(spec) = &self.meeting {
            let [meeting, slot] = split::<2>(spec, "MEETING/SLOT")?;
            return Ok(DocKey::meeting(meeting, slot)?);
        }
        if let Some(path) = &self.path {
            let key = DocKey::path(path.clone());
            key.validate()?;
            return Ok(key);
        }
        bail!("one of --task, --project, --meeting or --path is required")
    }
}

fn split<'a, const N: usize>(spec: &'a str, shape: &str) -> anyhow::Result<[&'a str; N]> {
    let parts: Vec<&str> = spec.split('/').collect();
    match <[&str; N]>::try_from(parts) {
        Ok(parts) => Ok(parts),
        Err(_) => bail!("expected {shape}, got '{spec}'"),
    }
}

#[derive(Args)]
pub struct DocArgs {
    #[command(flatten)]
    pub key: KeyArgs,
}

/// Body text, inline or from a file; stdin when neither is given.
#[derive(Args)]
pub struct ContentArgs {
    pub content: Option<String>,
    #[arg(long, conflicts_with = "content")]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct AppendArgs {
    #[command(flatten)]
    pub key: KeyArgs,
    #[command(flatten)]
    pub body: ContentArgs,
    /// Operation tag: add_full, replace_full, ...
    #[arg(long, default_value = "add_full")]
    pub op: String,
    #[arg(long, default_value = "")]
    pub user: String,
    #[arg(long)]
    pub source: Option<String>,
    #[arg(long)]
    pub expect_version: Option<u64>,
}

#[derive(Args)]
pub struct SeqArgs {
    #[command(flatten)]
    pub key: KeyArgs,
    pub sequence: u64,
}

#[derive(Args)]
pub struct SquashArgs {
    #[command(flatten)]
    pub key: KeyArgs,
    #[arg(long, default_value = "")]
    pub user: String,
    #[arg(long)]
    pub source: Option<String>,
    #[arg(long)]
    pub expect_version: Option<u64>,
}

#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub key: KeyArgs,
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct SectionArgs {
    #[command(flatten)]
    pub key: KeyArgs,
    #[command(subcommand)]
    pub action: SectionAction,
}

#[derive(Subcommand)]
pub enum SectionAction {
    /// Print one section's body
    Show {
        id: String,
        #[arg(long)]
        children: bool,
    },
    /// Replace one section's body
    Update {
        id: String,
        #[command(flatten)]
        body: ContentArgs,
        #[arg(long)]
        expect_version: Option<u64>,
    },
    /// Insert a new section
    Insert {
        /// Heading line, e.g. "## Storage"
        title: String,
        #[command(flatten)]
        body: ContentArgs,
        #[arg(long)]
        after: Option<String>,
        #[arg(long)]
        expect_version: Option<u64>,
    },
    /// Delete a section
    Remove {
        id: String,
        /// Also delete every descendant
        #[arg(long)]
        cascade: bool,
        #[arg(long)]
        expect_version: Option<u64>,
    },
    /// Replace a section and its subtree with heading-bearing text
    Replace {
        id: String,
        #[command(flatten)]
        body: ContentArgs,
        #[arg(long)]
        expect_version: Option<u64>,
    },
    /// Move a section after another, or to the end
    Move {
        id: String,
        #[arg(long)]
        after: Option<String>,
        #[arg(long)]
        expect_version: Option<u64>,
    },
}

#[derive(Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub key: KeyArgs,
    /// Direction to sync in; omitted means whichever side is stale
    #[arg(long, value_enum)]
    pub direction: Option<Direction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Direction {
    FromCompiled,
    ToCompiled,
}

impl From<Direction> for SyncDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::FromCompiled => SyncDirection::FromCompiled,
            Direction::ToCompiled => SyncDirection::ToCompiled,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn task_key_from_flag() {
        let cli = Cli::parse_from(["folio", "meta", "--task", "p1/t1/design"]);
        let Command::Meta(args) = cli.command else {
            panic!("expected meta");
        };
        assert_eq!(args.key.to_key().unwrap(), DocKey::task("p1", "t1", "design").unwrap());
    }

    #[test]
    fn malformed_key_rejected() {
        let cli = Cli::parse_from(["folio", "meta", "--project", "p1/feature_list/extra"]);
        let Command::Meta(args) = cli.command else {
            panic!("expected meta");
        };
        assert!(args.key.to_key().is_err());
    }

    #[test]
    fn two_key_forms_conflict() {
        let parsed = Cli::try_parse_from([
            "folio", "meta", "--meeting", "m1/summary", "--path", "/tmp/doc",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn section_subcommand_parses() {
        let cli = Cli::parse_from([
            "folio", "--format", "json", "section", "--task", "p/t/test", "remove",
            "section_002", "--cascade", "--expect-version", "3",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        let Command::Section(args) = cli.command else {
            panic!("expected section");
        };
        assert!(matches!(
            args.action,
            SectionAction::Remove { cascade: true, expect_version: Some(3), .. }
        ));
    }
}
