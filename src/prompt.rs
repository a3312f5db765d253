use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::error::PromptError;

// --- Terminal seam ---

/// Line-oriented operator I/O. Everything the import pipeline shows or asks goes through here.
pub trait Terminal {
    /// Print one line of output.
    fn say(&mut self, line: &str);

    /// Show `prompt` and read one line of input without the trailing newline.
    ///
    /// End of input is an `UnexpectedEof` error.
    fn ask(&mut self, prompt: &str) -> io::Result<String>;
}

/// Terminal backed by the process's stdin and stdout.
#[derive(Debug, Default)]
pub struct StdTerminal;

impl StdTerminal {
    pub fn new() -> Self {
        Self
    }
}

impl Terminal for StdTerminal {
    fn say(&mut self, line: &str) {
        println!("{}", line);
    }

    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{} ", prompt)?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected end of input",
            ));
        }
        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
    }
}

/// Scripted terminal for tests.
///
/// Answers are returned in order; output and prompts are captured.
#[derive(Debug, Default)]
pub struct ScriptedTerminal {
    answers: VecDeque<String>,
    output: Vec<String>,
    prompts: Vec<String>,
}

impl ScriptedTerminal {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            output: Vec::new(),
            prompts: Vec::new(),
        }
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    /// True if any captured output line contains `needle`.
    pub fn printed(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }
}

impl Terminal for ScriptedTerminal {
    fn say(&mut self, line: &str) {
        self.output.push(line.to_string());
    }

    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "ScriptedTerminal: no more answers in script",
            )
        })
    }
}

// --- Option menus ---

struct MenuEntry<A> {
    label: String,
    letter: char,
    action: A,
}

/// A fixed set of options, each bound to a unique case-insensitive letter.
///
/// Letter assignment per label: an uppercase letter in the label wins if it is
/// still free, otherwise the first free letter of the label. Enter with no
/// input picks the default, which is the first option unless set explicitly.
pub struct Menu<A> {
    entries: Vec<MenuEntry<A>>,
    default: usize,
}

impl<A: Copy> Menu<A> {
    pub fn new(options: &[(&str, A)]) -> Result<Self, PromptError> {
        if options.is_empty() {
            return Err(PromptError::Empty);
        }

        let mut entries: Vec<MenuEntry<A>> = Vec::with_capacity(options.len());
        for (label, action) in options {
            let taken = |c: char| entries.iter().any(|e| e.letter == c);
            let letter = assign_letter(label, taken)
                .ok_or_else(|| PromptError::NoUnambiguousLetter(label.to_string()))?;
            entries.push(MenuEntry {
                label: label.to_string(),
                letter,
                action: *action,
            });
        }

        Ok(Self {
            entries,
            default: 0,
        })
    }

    /// Make the option labelled `label` the Enter default.
    pub fn with_default(mut self, label: &str) -> Result<Self, PromptError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.label == label)
            .ok_or_else(|| PromptError::UnknownDefault(label.to_string()))?;
        self.default = index;
        Ok(self)
    }

    pub fn letters(&self) -> Vec<char> {
        self.entries.iter().map(|e| e.letter).collect()
    }

    fn action_for(&self, letter: char) -> Option<A> {
        self.entries
            .iter()
            .find(|e| e.letter == letter)
            .map(|e| e.action)
    }

    /// `Label` text with the shortcut letter uppercased; the default's letter is bracketed.
    fn render_options(&self, highlight_default: bool) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let is_default = highlight_default && self.default == index;
                render_label(&entry.label, entry.letter, is_default)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn fallback_letters(&self) -> String {
        self.letters()
            .iter()
            .map(|c| c.to_ascii_uppercase().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Ask until the operator picks one of the options.
    pub fn ask(&self, terminal: &mut dyn Terminal) -> io::Result<A> {
        let prompt = format!("> {}?", self.render_options(true));
        let fallback = format!("Enter one of {}:", self.fallback_letters());

        let mut response = terminal.ask(&prompt)?;
        loop {
            let trimmed = response.trim().to_lowercase();
            if trimmed.is_empty() {
                return Ok(self.entries[self.default].action);
            } else if let Some(action) = trimmed.chars().next().and_then(|c| self.action_for(c)) {
                return Ok(action);
            }
            response = terminal.ask(&fallback)?;
        }
    }

    /// Ask for a number in `1..=count` or one of the options.
    ///
    /// `default_number` (1-based) overrides the menu default for Enter when set.
    pub fn ask_with_numbers(
        &self,
        terminal: &mut dyn Terminal,
        count: usize,
        default_number: Option<usize>,
    ) -> io::Result<Picked<A>> {
        let default_number = default_number.filter(|n| (1..=count).contains(n));
        let number_hint = match default_number {
            Some(n) => format!("Select 1-{} [{}] or", count, n),
            None => format!("Select 1-{} or", count),
        };
        let prompt = format!(
            "> {} {}?",
            number_hint,
            self.render_options(default_number.is_none())
        );
        let fallback = format!("Enter 1-{} or one of {}:", count, self.fallback_letters());

        let mut response = terminal.ask(&prompt)?;
        loop {
            let trimmed = response.trim().to_lowercase();
            if trimmed.is_empty() {
                return Ok(match default_number {
                    Some(n) => Picked::Number(n - 1),
                    None => Picked::Option(self.entries[self.default].action),
                });
            } else if trimmed.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = trimmed.parse::<usize>() {
                    if (1..=count).contains(&n) {
                        return Ok(Picked::Number(n - 1));
                    }
                }
            } else if let Some(action) = trimmed.chars().next().and_then(|c| self.action_for(c)) {
                return Ok(Picked::Option(action));
            }
            response = terminal.ask(&fallback)?;
        }
    }
}

/// Result of a numbered pick: a zero-based index or one of the menu options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Picked<A> {
    Number(usize),
    Option(A),
}

/// Yes/no question. Enter answers `default_yes`.
pub fn confirm(terminal: &mut dyn Terminal, question: &str, default_yes: bool) -> io::Result<bool> {
    let fallback = "> Enter Y or N:";
    let mut response = terminal.ask(question)?;
    loop {
        match response.trim().to_lowercase().chars().next() {
            None => return Ok(default_yes),
            Some('y') => return Ok(true),
            Some('n') => return Ok(false),
            Some(_) => response = terminal.ask(fallback)?,
        }
    }
}

fn assign_letter(label: &str, taken: impl Fn(char) -> bool) -> Option<char> {
    let explicit = label
        .chars()
        .filter(|c| c.is_alphabetic() && c.is_uppercase())
        .map(|c| c.to_ascii_lowercase())
        .find(|c| !taken(*c));
    explicit.or_else(|| {
        label
            .chars()
            .filter(|c| c.is_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .find(|c| !taken(*c))
    })
}

fn render_label(label: &str, letter: char, is_default: bool) -> String {
    // Prefer the explicit uppercase occurrence, then the first occurrence in any case.
    let position = label
        .char_indices()
        .find(|(_, c)| c.is_uppercase() && c.to_ascii_lowercase() == letter)
        .or_else(|| {
            label
                .char_indices()
                .find(|(_, c)| c.to_ascii_lowercase() == letter)
        });

    let Some((index, c)) = position else {
        return label.to_string();
    };
    let shown = c.to_ascii_uppercase();
    let shown = if is_default {
        format!("[{}]", shown)
    } else {
        shown.to_string()
    };
    format!("{}{}{}", &label[..index], shown, &label[index + c.len_utf8()..])
}
