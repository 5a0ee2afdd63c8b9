use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

#[derive(Debug)]
pub struct TextCleaner {
    line_numbers: Regex,
    footers: Regex,
    bare_numbers: Regex,
    stray_letters: Regex,
    blank_runs: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            line_numbers: RegexBuilder::new(r"^\d+\s+")
                .multi_line(true)
                .build()
                .context("failed to compile line number regex")?,
            footers: RegexBuilder::new(r"H\.B\.\s+No\.\s+\d+\s*\n\d+")
                .case_insensitive(true)
                .build()
                .context("failed to compile bill footer regex")?,
            bare_numbers: RegexBuilder::new(r"^\d+$")
                .multi_line(true)
                .build()
                .context("failed to compile bare number regex")?,
            stray_letters: Regex::new(r"\s+(?:A|AA)\s+")
                .context("failed to compile stray letter regex")?,
            blank_runs: Regex::new(r"\n{2,}").context("failed to compile blank line regex")?,
        })
    }

    /// Runs the rewrite passes until the text stops changing. Every pass only
    /// removes or shrinks text, so this terminates.
    pub fn clean(&self, text: &str) -> String {
        let mut current = self.clean_once(text);
        loop {
            let next = self.clean_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    // Order matters: footers and line numbers must be gone before blank runs
    // are collapsed.
    fn clean_once(&self, text: &str) -> String {
        let text = self.line_numbers.replace_all(text, "");
        let text = self.footers.replace_all(&text, "");
        let text = self.bare_numbers.replace_all(&text, "");
        let text = self.stray_letters.replace_all(&text, " ");
        let text = self.blank_runs.replace_all(&text, "\n");
        text.trim().to_string()
    }
}
