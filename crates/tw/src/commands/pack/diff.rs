use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};
use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    fs::File,
    io::{Read, Seek},
    path::PathBuf,
};
use tracing::{debug, warn};
use tw_db::{DataTable, SchemaRegistry, TableCodec, TableRow};
use tw_pack::PackReader;

use crate::commands::SchemaArgs;

const TEXT_EXTENSIONS: [&str; 6] = [".txt", ".xml", ".lua", ".csv", ".tsv", ".json"];

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Mode {
    /// Entries and decoded table rows
    #[default]
    Semantic,
    /// Also header fields and inline text differences
    Full,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Change {
    Added(String, String),
    Removed(String, String),
    Comparison(String, String, String),
    Context(Vec<String>),
    Modified(String, String, Vec<Change>, Vec<Change>),
}

impl Change {
    fn modified(section: &str, name: &str) -> Self {
        Change::Modified(section.into(), name.into(), Vec::new(), Vec::new())
    }

    fn with_children(&mut self, children: Vec<Change>) {
        if let Change::Modified(_, _, vec, _) = self {
            vec.extend(children);
            vec.sort();
        }
    }

    fn with_related(&mut self, related: Vec<Change>) {
        if let Change::Modified(_, _, _, vec) = self {
            vec.extend(related);
        }
    }

    fn section(&self) -> Option<String> {
        match self {
            Change::Added(key, _) => Some(format!("* {} added:", key)),
            Change::Removed(key, _) => Some(format!("* {} removed:", key)),
            Change::Modified(key, _, _, _) => Some(format!("* {} modified:", key)),
            _ => None,
        }
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| format!("  {l}"))
        .join("\n")
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Added(_, v) => writeln!(f, "✅ {}", v.green()),
            Change::Removed(_, v) => writeln!(f, "❌ {}", v.red()),
            Change::Comparison(key, old, new) => {
                writeln!(f, "* {}: {} vs {}", key, old.red(), new.green())
            }
            Change::Context(lines) => writeln!(f, "{}", lines.iter().map(|l| format!(" {l}")).join("\n")),
            Change::Modified(_, v, children, related) => {
                let mut body = related.iter().map(|c| c.to_string()).join("");

                for (section, group) in &children.iter().chunk_by(|c| c.section()) {
                    if let Some(section) = section {
                        body.push_str(&section);
                        body.push('\n');
                    }
                    body.push_str(&indent(&group.map(|c| c.to_string()).join("")));
                    body.push('\n');
                }

                writeln!(f, "🔃 {}", v.blue())?;
                writeln!(f, "{}", indent(&body))
            }
        }
    }
}

fn inline_diff(old: &str, new: &str) -> Vec<String> {
    let diff = TextDiff::from_lines(old, new);
    let mut lines = Vec::new();
    for op in diff.ops() {
        for change in diff.iter_inline_changes(op) {
            if change.tag() == ChangeTag::Equal {
                continue;
            }
            let mut line = String::new();
            for (emphasized, value) in change.iter_strings_lossy() {
                let value = value.trim_end_matches('\n');
                if !emphasized {
                    line.push_str(&format!("{}", value.dimmed()));
                } else if change.tag() == ChangeTag::Insert {
                    line.push_str(&format!("{}", value.green().underline()));
                } else {
                    line.push_str(&format!("{}", value.red().underline()));
                }
            }
            lines.push(line);
        }
    }
    lines
}

/// Key identifying a row across versions of a table, its primary key or its position
fn row_key(row: &TableRow, index: usize) -> String {
    let key = row
        .fields()
        .filter(|(field, _)| field.primary_key)
        .map(|(field, value)| value.text(&field.kind))
        .join("|");
    if key.is_empty() {
        format!("#{index}")
    } else {
        key
    }
}

#[derive(Args)]
pub struct DiffArgs {
    /// An input PACK file
    #[arg(short, long, value_name = "FILE")]
    left: PathBuf,

    /// An input PACK file
    #[arg(short, long, value_name = "FILE")]
    right: PathBuf,

    /// Comparison mode
    #[arg(short, long, value_enum, default_value_t = Mode::Semantic)]
    mode: Mode,

    #[command(flatten)]
    schema: SchemaArgs,
}

impl DiffArgs {
    fn handle_table(&self, left: &DataTable, right: &DataTable) -> Vec<Change> {
        let mut result = Vec::new();

        if left.info().version != right.info().version {
            result.push(Change::Comparison(
                "version".into(),
                left.info().version.to_string(),
                right.info().version.to_string(),
            ));
        }

        let left_rows: HashMap<String, &TableRow> = left
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| (row_key(row, i), row))
            .collect();
        let right_rows: HashMap<String, &TableRow> = right
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| (row_key(row, i), row))
            .collect();

        right_rows
            .keys()
            .filter(|k| !left_rows.contains_key(*k))
            .map(|k| Change::Added("rows".into(), k.to_string()))
            .for_each(|c| result.push(c));

        left_rows
            .keys()
            .filter(|k| !right_rows.contains_key(*k))
            .map(|k| Change::Removed("rows".into(), k.to_string()))
            .for_each(|c| result.push(c));

        for key in left_rows.keys().filter(|k| right_rows.contains_key(*k)).sorted() {
            let (old, new) = (left_rows[key], right_rows[key]);
            let fields = old
                .fields()
                .filter_map(|(field, value)| {
                    let before = value.text(&field.kind);
                    let after = new.text(&field.name).ok()?;
                    (before != after).then(|| {
                        Change::Comparison(field.name.clone(), before, after)
                    })
                })
                .collect::<Vec<_>>();

            if !fields.is_empty() {
                let mut change = Change::modified("rows", key);
                change.with_related(fields);
                result.push(change);
            }
        }

        result
    }

    fn handle_file(
        &self,
        registry: &SchemaRegistry,
        name: &str,
        left: &[u8],
        right: &[u8],
    ) -> Option<Change> {
        if left == right {
            return None;
        }
        let mut result = Change::modified("files", name);

        if left.len() != right.len() {
            result.with_related(vec![Change::Comparison(
                "size".into(),
                left.len().to_string(),
                right.len().to_string(),
            )]);
        }

        if name.starts_with("db/") {
            let decoded = TableCodec::for_path(registry, name).and_then(|codec| {
                Ok((codec.decode(left)?, codec.decode(right)?))
            });
            match decoded {
                Ok((left, right)) => {
                    result.with_children(self.handle_table(&left, &right));
                    return Some(result);
                }
                Err(e) => debug!("comparing {} as bytes: {}", name, e),
            }
        }

        if self.mode == Mode::Full && TEXT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            let lines = inline_diff(&String::from_utf8_lossy(left), &String::from_utf8_lossy(right));
            result.with_related(vec![Change::Context(lines)]);
        }

        Some(result)
    }

    fn handle_pack<R: Read + Seek>(
        &self,
        registry: &SchemaRegistry,
        name: &str,
        left: &mut PackReader<R>,
        right: &mut PackReader<R>,
    ) -> Result<Option<Change>> {
        let mut result = Change::modified("pack", name);
        let mut related = Vec::new();

        if left.len() != right.len() {
            related.push(Change::Comparison(
                "entries".into(),
                left.len().to_string(),
                right.len().to_string(),
            ));
        }

        if self.mode == Mode::Full {
            let (l, r) = (left.header(), right.header());
            let fields = [
                ("tag", l.tag.to_string(), r.tag.to_string()),
                ("type", l.pack_type().to_string(), r.pack_type().to_string()),
                (
                    "replaced packs",
                    l.replaced_pack_names.join(", "),
                    r.replaced_pack_names.join(", "),
                ),
            ];
            for (key, old, new) in fields {
                if old != new {
                    related.push(Change::Comparison(key.into(), old, new));
                }
            }
        }
        result.with_related(related);

        let left_names = left.file_names().map(str::to_owned).collect::<HashSet<_>>();
        let right_names = right.file_names().map(str::to_owned).collect::<HashSet<_>>();
        let all_names = left_names.union(&right_names).sorted().collect::<Vec<_>>();

        let mut children = Vec::new();
        for file in all_names {
            match (left_names.contains(file), right_names.contains(file)) {
                (false, true) => children.push(Change::Added("files".into(), file.clone())),
                (true, false) => children.push(Change::Removed("files".into(), file.clone())),
                _ => {
                    let data_left = left.by_name(file).context(format!("reading {file}"))?;
                    let data_right = right.by_name(file).context(format!("reading {file}"))?;
                    if let Some(c) = self.handle_file(registry, file, &data_left, &data_right) {
                        children.push(c);
                    }
                }
            }
        }
        result.with_children(children);

        match &result {
            Change::Modified(_, _, children, related) if children.is_empty() && related.is_empty() => {
                Ok(None)
            }
            _ => Ok(Some(result)),
        }
    }

    pub fn handle(&self) -> Result<()> {
        let registry = self.schema.load()?;
        if registry.is_empty() {
            warn!("tables are compared as bytes");
        }

        let l = File::open(&self.left)
            .into_diagnostic()
            .context(format!("path: {}", &self.left.display()))?;
        let mut left = PackReader::new(l)?;

        let r = File::open(&self.right)
            .into_diagnostic()
            .context(format!("path: {}", &self.right.display()))?;
        let mut right = PackReader::new(r)?;

        let difference =
            self.handle_pack(&registry, &self.left.to_string_lossy(), &mut left, &mut right)?;

        if let Some(d) = difference {
            println!("{}", d);
        }

        Ok(())
    }
}
