//! Line-based console I/O: prompts, choices and colored status lines.

use anyhow::Result;
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Typed by the user to leave a sub-menu.
pub const BACK: &str = "back";

pub struct Console {
    editor: DefaultEditor,
}

impl Console {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }

    /// Reads one line. `None` means the user pressed Ctrl-C or Ctrl-D.
    pub fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        match self.editor.readline(&format!("{} ", format!("{message}:").bold())) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line.trim().to_string()))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Asks until the answer is one of `choices` (case-insensitive).
    pub fn choose(&mut self, message: &str, choices: &[&str]) -> Result<Option<String>> {
        let question = format!("{message} [{}]", choices.join("/"));
        loop {
            let Some(answer) = self.prompt(&question)? else {
                return Ok(None);
            };
            match match_choice(&answer, choices) {
                Some(choice) => return Ok(Some(choice.to_string())),
                None => self.error("Please select one of the available options."),
            }
        }
    }

    /// Asks for a 1-based entry number out of `count`, or `back`.
    pub fn select(&mut self, message: &str, count: usize) -> Result<Option<usize>> {
        loop {
            let Some(answer) = self.prompt(&format!("{message} (1-{count}, or {BACK})"))? else {
                return Ok(None);
            };
            if answer.eq_ignore_ascii_case(BACK) {
                return Ok(None);
            }
            match parse_selection(&answer, count) {
                Some(index) => return Ok(Some(index)),
                None => self.error(&format!("Please enter a number between 1 and {count}.")),
            }
        }
    }

    pub fn confirm(&mut self, message: &str) -> Result<bool> {
        Ok(self
            .choose(message, &["y", "n"])?
            .is_some_and(|answer| answer == "y"))
    }

    pub fn pause(&mut self) -> Result<()> {
        self.prompt("Press enter to continue")?;
        Ok(())
    }

    pub fn clear(&self) {
        print!("\x1B[2J\x1B[1;1H");
    }

    pub fn title(&self, text: &str) {
        println!("{}", text.bright_magenta().bold());
        println!();
    }

    pub fn info(&self, text: &str) {
        println!("{text}");
    }

    pub fn success(&self, text: &str) {
        println!("{}", text.bright_green());
    }

    pub fn warning(&self, text: &str) {
        println!("{}", text.yellow());
    }

    pub fn error(&self, text: &str) {
        eprintln!("{}", text.red());
    }

    pub fn debug(&self, text: &str) {
        println!("{}", text.bright_black());
    }

    /// Prints a numbered list.
    pub fn numbered<I, S>(&self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, item) in items.into_iter().enumerate() {
            println!("  {} {}", format!("{:>2}.", i + 1).cyan(), item.as_ref());
        }
        println!();
    }
}

fn match_choice<'a>(answer: &str, choices: &[&'a str]) -> Option<&'a str> {
    choices
        .iter()
        .copied()
        .find(|choice| choice.eq_ignore_ascii_case(answer.trim()))
}

/// Parses a 1-based selection into a 0-based index.
fn parse_selection(answer: &str, count: usize) -> Option<usize> {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_choice_ignores_case() {
        assert_eq!(match_choice(" Generate ", &["generate", "quit"]), Some("generate"));
        assert_eq!(match_choice("gen", &["generate", "quit"]), None);
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("1", 3), Some(0));
        assert_eq!(parse_selection("3", 3), Some(2));
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("two", 3), None);
    }
}
