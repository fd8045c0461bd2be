//! # Shell Completion Module
//!
//! Static completion scripts come from `clap_complete`. Dynamic completion of
//! playlist and user names goes through the hidden `complete-names`
//! subcommand, which prints one candidate per line.
//!
//! ## Usage
//!
//! ```bash
//! dotify completion bash > ~/.local/share/bash-completion/completions/dotify
//! dotify completion zsh > ~/.config/zsh/completions/_dotify
//! ```

use crate::cli::{NameKind, Shell};
use crate::db::Store;
use crate::error::Result;
use crate::provider::{OrderedResultProvider, PlaylistListing};
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
pub const fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Names of the given kind, sorted. Playlists are those owned by `username`.
pub fn name_completions(store: &Store, kind: NameKind, username: &str) -> Result<Vec<String>> {
    let mut names = match kind {
        NameKind::Playlists => {
            let listing = PlaylistListing::new(store, username, username);
            listing
                .fetch_range(0, listing.count()?)?
                .into_iter()
                .map(|playlist| playlist.name)
                .collect()
        }
        NameKind::Users => store.usernames()?,
    };
    names.sort();
    Ok(names)
}

/// Print one candidate per line, quoting anything with whitespace unless the
/// shell is fish.
pub fn write_completions(out: &mut impl Write, names: &[String], shell: Option<Shell>) -> io::Result<()> {
    for name in names {
        if shell != Some(Shell::Fish) && name.contains(char::is_whitespace) {
            writeln!(out, "\"{}\"", name.replace('"', "\\\""))?;
        } else {
            writeln!(out, "{name}")?;
        }
    }
    Ok(())
}
