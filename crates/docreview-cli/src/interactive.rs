//! Interactive review loop over stdin.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use docreview_store::{DocumentStore, InsertOutcome};
use docreview_viewer::PageRenderer;
use docreview_workflow::{Notice, ReviewError, ReviewEvent, ReviewState, ReviewWorkflow};

use crate::display;

const HELP: &str = "\
commands:
  list                 show the documents needing review
  select <name|#>      load a document (number from the list)
  approve <field|#>    toggle the approval check of a flagged field
  next | prev          move through the document pages
  page [out.png]       show the page position, or save the current page
  show                 print the field card again
  submit               record the verification once every check is ticked
  clear                drop the current document
  help                 this text
  quit                 leave";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    List,
    Select(String),
    Approve(String),
    Next,
    Prev,
    Page(Option<PathBuf>),
    Show,
    Submit,
    Clear,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let argument = |what: &str| -> Result<String, String> {
        match rest.as_slice() {
            [] => Err(format!("{head}: expected {what}")),
            parts => Ok(parts.join(" ")),
        }
    };
    let command = match head.to_ascii_lowercase().as_str() {
        "list" | "ls" => Command::List,
        "select" | "s" => Command::Select(argument("a file name or number")?),
        "approve" | "a" => Command::Approve(argument("a field name or number")?),
        "next" | "n" => Command::Next,
        "prev" | "p" => Command::Prev,
        "page" => Command::Page(rest.first().map(PathBuf::from)),
        "show" => Command::Show,
        "submit" => Command::Submit,
        "clear" => Command::Clear,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };
    Ok(Some(command))
}

/// Run the loop until `quit` or end of input.
pub fn run<'r, S, R>(
    workflow: &ReviewWorkflow<'r, S, R>,
    render_scale: f32,
    input: impl BufRead,
) -> Result<()>
where
    S: DocumentStore + ?Sized,
    R: PageRenderer + ?Sized,
{
    let mut worklist = workflow.worklist()?;
    display::print_worklist(&worklist);
    println!("Type `help` for commands.");

    let mut state: ReviewState<'r> = ReviewState::Idle;
    let mut lines = input.lines();
    loop {
        print!("{}> ", state.loaded().map_or("review", |r| r.file_name()));
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let command = match parse_command(&line?) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };

        let event = match command {
            Command::Quit => break,
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::List => {
                worklist = workflow.worklist()?;
                display::print_worklist(&worklist);
                continue;
            }
            Command::Show => {
                match state.loaded() {
                    Some(review) => display::print_review_card(review),
                    None => println!("{}", ReviewError::NoDocumentSelected),
                }
                continue;
            }
            Command::Page(out) => {
                show_page(&state, out, render_scale);
                continue;
            }
            Command::Select(target) => ReviewEvent::Select(resolve_document(&worklist, &target)),
            Command::Approve(target) => {
                let field = state
                    .loaded()
                    .and_then(|r| target.parse().ok().and_then(|n| r.flagged_field_at(n)))
                    .map_or(target.clone(), str::to_string);
                ReviewEvent::ToggleApproval(field)
            }
            Command::Next => ReviewEvent::NextPage,
            Command::Prev => ReviewEvent::PreviousPage,
            Command::Submit => ReviewEvent::Submit,
            Command::Clear => ReviewEvent::Clear,
        };

        let step = workflow.apply(state, event);
        state = step.state;
        match step.result {
            Ok(Notice::Selected { .. }) => {
                if let Some(review) = state.loaded() {
                    display::print_review_card(review);
                }
            }
            Ok(Notice::ApprovalToggled { field, approved }) => {
                println!("{field}: {}", if approved { "approved" } else { "not approved" });
            }
            Ok(Notice::PageChanged { page, page_count }) => {
                println!("{}", docreview_viewer::page_label(page, page_count));
            }
            Ok(Notice::Committed { file_name, outcome }) => {
                match outcome {
                    InsertOutcome::Inserted => println!("Saved {file_name}."),
                    InsertOutcome::AlreadyVerified => {
                        println!("{file_name} was already verified elsewhere.")
                    }
                }
                worklist = workflow.worklist()?;
                display::print_worklist(&worklist);
            }
            Ok(Notice::Cleared) => println!("Selection cleared."),
            Ok(Notice::Unchanged) => {}
            Err(e) => println!("error: {e}"),
        }
    }
    Ok(())
}

/// A 1-based worklist number, or the name as typed.
fn resolve_document(worklist: &[String], target: &str) -> String {
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| worklist.get(i))
        .cloned()
        .unwrap_or_else(|| target.to_string())
}

fn show_page(state: &ReviewState<'_>, out: Option<PathBuf>, scale: f32) {
    let Some(review) = state.loaded() else {
        println!("{}", ReviewError::NoDocumentSelected);
        return;
    };
    println!("{}", review.page_label());
    let Some(path) = out else {
        return;
    };
    let saved = review
        .render_current_page(scale)
        .and_then(|page| Ok(page.save_png(&path)?));
    match saved {
        Ok(()) => println!("wrote {}", path.display()),
        Err(ReviewError::ViewerUnavailable(cause)) => {
            println!("error: document viewer unavailable: {cause}")
        }
        Err(e) => println!("error: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command("list"), Ok(Some(Command::List)));
        assert_eq!(
            parse_command("select A.pdf"),
            Ok(Some(Command::Select("A.pdf".into())))
        );
        assert_eq!(
            parse_command("select my contract.pdf"),
            Ok(Some(Command::Select("my contract.pdf".into())))
        );
        assert_eq!(parse_command("a 2"), Ok(Some(Command::Approve("2".into()))));
        assert_eq!(parse_command("page"), Ok(Some(Command::Page(None))));
        assert_eq!(
            parse_command("page out.png"),
            Ok(Some(Command::Page(Some(PathBuf::from("out.png")))))
        );
        assert_eq!(parse_command("QUIT"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(parse_command("select").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[test]
    fn resolves_worklist_numbers() {
        let worklist = vec!["A.pdf".to_string(), "B.pdf".to_string()];
        assert_eq!(resolve_document(&worklist, "2"), "B.pdf");
        assert_eq!(resolve_document(&worklist, "0"), "0");
        assert_eq!(resolve_document(&worklist, "9"), "9");
        assert_eq!(resolve_document(&worklist, "C.pdf"), "C.pdf");
    }
}
