//! Hierarchical summary of a flat path listing.
//!
//! ```text
//! total: 3
//! prefix: /data/
//!
//! github/ 2
//!     a.wasm
//!     b.wasm
//! npm/ 1
//!     c.wasm
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::adapters::run_tool;

const INDENT: &str = "    ";

#[derive(Debug, Default)]
struct Node {
    /// Children in first-seen order
    children: Vec<(String, Node)>,
    /// A listed path ends here
    file: bool,
}

impl Node {
    fn insert(&mut self, segments: &[&str]) {
        let Some((first, rest)) = segments.split_first() else {
            self.file = true;
            return;
        };

        let position = match self.children.iter().position(|(name, _)| name == first) {
            Some(position) => position,
            None => {
                self.children.push((first.to_string(), Node::default()));
                self.children.len() - 1
            }
        };
        self.children[position].1.insert(rest);
    }

    fn count(&self) -> usize {
        if self.file {
            1
        } else {
            self.children.iter().map(|(_, child)| child.count()).sum()
        }
    }

    fn render(&self, depth: usize, out: &mut String) {
        for (name, child) in &self.children {
            out.push_str(&INDENT.repeat(depth));
            if child.file {
                out.push_str(name);
                out.push('\n');
            } else {
                out.push_str(&format!("{}/ {}\n", name, child.count()));
                child.render(depth + 1, out);
            }
        }
    }
}

/// Longest common character prefix
fn common_prefix<'a>(lines: &BTreeSet<&'a str>) -> &'a str {
    let mut iter = lines.iter();
    let Some(first) = iter.next() else {
        return "";
    };

    let mut end = first.len();
    for line in iter {
        end = first[..end]
            .char_indices()
            .zip(line.chars())
            .find(|((_, a), b)| a != b)
            .map(|((i, _), _)| i)
            .unwrap_or_else(|| end.min(line.len()));
    }
    &first[..end]
}

/// Summarize a listing: unique sorted paths, common prefix stripped, tree of
/// directories with file counts.
pub fn summarize_paths(listing: &str) -> String {
    let lines: BTreeSet<&str> = listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let prefix = common_prefix(&lines);

    let mut root = Node::default();
    for line in &lines {
        let segments: Vec<&str> = line[prefix.len()..]
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        if !segments.is_empty() {
            root.insert(&segments);
        }
    }

    let mut out = format!("total: {}\nprefix: {}\n\n", lines.len(), prefix);
    root.render(0, &mut out);
    out
}

/// How the summary is produced
#[derive(Debug, Clone)]
pub enum PathSummarizer {
    Native,
    /// External command, given the listing file as its last argument
    External {
        program: String,
        args: Vec<String>,
        timeout: Duration,
    },
}

impl PathSummarizer {
    /// `command` is the program followed by its arguments; none (or empty) means native
    pub fn from_settings(command: Option<&[String]>, timeout: Duration) -> Self {
        match command.and_then(<[String]>::split_first) {
            Some((program, args)) => PathSummarizer::External {
                program: program.clone(),
                args: args.to_vec(),
                timeout,
            },
            None => PathSummarizer::Native,
        }
    }

    pub async fn summarize(&self, listing_path: &Path) -> Result<String> {
        match self {
            PathSummarizer::Native => {
                let listing = tokio::fs::read_to_string(listing_path)
                    .await
                    .with_context(|| format!("Failed to read {}", listing_path.display()))?;
                Ok(summarize_paths(&listing))
            }
            PathSummarizer::External {
                program,
                args,
                timeout,
            } => {
                let mut args = args.clone();
                args.push(listing_path.to_string_lossy().into_owned());

                let output = run_tool(program, &args, *timeout).await?;
                Ok(output.into_stdout()?)
            }
        }
    }
}
