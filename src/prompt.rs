//! Line-oriented paging prompt used by the browse subcommands.
//!
//! ```text
//! n            next page
//! p            previous page
//! g <row>      page containing absolute row
//! <verb> <i>   act on row i of the page (verbs depend on the listing)
//! q            quit
//! ```

use crate::browser::{Browser, Direction, Page};
use crate::error::DotifyError;
use crate::provider::OrderedResultProvider;
use anyhow::Result;
use log::warn;
use std::fmt::Display;
use std::io::{BufRead, Write};

/// An action on a row of the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Act {
    pub verb: String,
    pub index: usize,
    /// Everything after the index, trimmed.
    pub arg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptCommand {
    Navigate(Direction),
    Act(Act),
    Quit,
}

/// `None` for anything that does not parse; the caller re-prompts.
#[must_use]
pub fn parse(line: &str) -> Option<PromptCommand> {
    let line = line.trim();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match (head, rest.is_empty()) {
        ("q" | "quit", true) => Some(PromptCommand::Quit),
        ("n" | "next", true) => Some(PromptCommand::Navigate(Direction::Next)),
        ("p" | "prev", true) => Some(PromptCommand::Navigate(Direction::Previous)),
        ("g", false) => rest.parse().ok().map(|row| PromptCommand::Navigate(Direction::Absolute(row))),
        (verb, false) if !verb.is_empty() => {
            let (index, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let arg = arg.trim();
            Some(PromptCommand::Act(Act {
                verb: verb.to_string(),
                index: index.parse().ok()?,
                arg: (!arg.is_empty()).then(|| arg.to_string()),
            }))
        }
        _ => None,
    }
}

pub fn render_page<R: Display>(out: &mut impl Write, page: &Page<R>) -> std::io::Result<()> {
    for (index, absolute, row) in page.positioned() {
        writeln!(out, "{index:>3}. [{absolute}] {row}")?;
    }
    writeln!(out, "-- page {}/{} --", page.number, page.count)
}

/// Drive `browser` from `input` until `q` or end of input.
///
/// `act` handles row actions and returns a line to print. Recoverable errors
/// (bad index, unknown name) are printed and the prompt continues; store
/// failures end the session.
pub fn run<P, F>(
    browser: &mut Browser<P>,
    input: &mut impl BufRead,
    out: &mut impl Write,
    help: &str,
    mut act: F,
) -> Result<()>
where
    P: OrderedResultProvider,
    P::Row: Display,
    F: FnMut(&Browser<P>, &Act) -> crate::Result<String>,
{
    render_page(out, &browser.render_current_page()?)?;
    writeln!(out, "{help}")?;

    let mut line = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }

        let outcome: std::result::Result<(), DotifyError> = match parse(&line) {
            Some(PromptCommand::Quit) => return Ok(()),
            Some(PromptCommand::Navigate(direction)) => match browser.navigate(direction) {
                Ok(page) => {
                    render_page(out, &page)?;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Some(PromptCommand::Act(action)) => match act(browser, &action) {
                Ok(message) => {
                    writeln!(out, "{message}")?;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            None => {
                writeln!(out, "unrecognised input; {help}")?;
                continue;
            }
        };

        if let Err(e) = outcome {
            if e.is_fatal() {
                return Err(e.into());
            }
            warn!("{e}");
            writeln!(out, "{e}")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::library;
    use crate::provider::{SongAction, SongFilter, SongOrdering, SongSearch};
    use std::io::Cursor;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("n\n"), Some(PromptCommand::Navigate(Direction::Next)));
        assert_eq!(parse(" p "), Some(PromptCommand::Navigate(Direction::Previous)));
        assert_eq!(parse("g 41"), Some(PromptCommand::Navigate(Direction::Absolute(41))));
        assert_eq!(parse("q"), Some(PromptCommand::Quit));
        assert_eq!(
            parse("a 3 late night"),
            Some(PromptCommand::Act(Act { verb: "a".into(), index: 3, arg: Some("late night".into()) }))
        );
        assert_eq!(parse("s 2"), Some(PromptCommand::Act(Act { verb: "s".into(), index: 2, arg: None })));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse("g x"), None);
        assert_eq!(parse("s"), None);
        assert_eq!(parse("s two"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_run_listens_and_reports_out_of_range() -> Result<()> {
        let store = library();
        let search = SongSearch::new(&store, SongFilter::Genre("Jazz".into()), SongOrdering::Default);
        let mut browser = Browser::open(search, 20)?;
        let mut input = Cursor::new("s 1\ns 9\nbogus\nq\n");
        let mut out = Vec::new();

        run(&mut browser, &mut input, &mut out, "s <i> to listen", |browser, action| {
            let song = browser.apply(action.index, &SongAction::Listen { username: "ann".into() })?.row;
            Ok(format!("listened to {}", song.title))
        })?;

        let printed = String::from_utf8(out)?;
        assert!(printed.contains("  1. [1] All Blues by Miles Davis"));
        assert!(printed.contains("listened to All Blues"));
        assert!(printed.contains("selection 9 is out of range (valid: 1..=4)"));
        assert!(printed.contains("unrecognised input"));
        assert_eq!(store.listen_history("ann")?, vec![3]);
        Ok(())
    }
}
