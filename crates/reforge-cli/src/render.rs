use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

/// Progress output for the upgrade run. `Plain` keeps to unstyled status
/// lines; `Rich` adds color and a spinner around long external commands.
/// `silent` suppresses everything except warnings and fatal errors.
#[derive(Copy, Clone, Debug)]
pub struct Renderer {
    style: OutputStyle,
    silent: bool,
}

impl Renderer {
    pub fn detect(silent: bool) -> Self {
        let style = if !silent && std::io::stdout().is_terminal() {
            OutputStyle::Rich
        } else {
            OutputStyle::Plain
        };
        Self::with_style(style, silent)
    }

    pub fn with_style(style: OutputStyle, silent: bool) -> Self {
        Self { style, silent }
    }

    pub fn ok(&self, message: &str) {
        if self.silent {
            return;
        }
        println!("{} {message}", self.colorize(ok_style(), "ok"));
    }

    pub fn info(&self, message: &str) {
        if self.silent {
            return;
        }
        println!("{message}");
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{} {message}", self.colorize(warn_style(), "warning:"));
    }

    pub fn fatal(&self, message: &str) {
        eprintln!("{} {message}", self.colorize(fatal_style(), "error:"));
    }

    /// Spinner shown while a long external process runs; `None` in plain or
    /// silent mode.
    pub fn start_spinner(&self, label: &str) -> Option<ProgressBar> {
        if self.silent || self.style != OutputStyle::Rich {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(label.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        Some(spinner)
    }

    pub fn finish_spinner(&self, spinner: Option<ProgressBar>) {
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
    }

    fn colorize(&self, style: Style, text: &str) -> String {
        match self.style {
            OutputStyle::Plain => text.to_string(),
            OutputStyle::Rich => format!("{}{}{}", style.render(), text, style.render_reset()),
        }
    }
}

fn ok_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Green.into()))
        .effects(Effects::BOLD)
}

fn warn_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Yellow.into()))
        .effects(Effects::BOLD)
}

fn fatal_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Red.into()))
        .effects(Effects::BOLD)
}
