//! Printers: text and markdown (termimad).

use owo_colors::OwoColorize;
use termimad::MadSkin;

use crate::agent::ChatResponse;

pub struct TextPrinter {
    pub color: Option<&'static str>,
}

impl TextPrinter {
    pub fn print(&self, text: &str) {
        if let Some(c) = self.color {
            match c {
                "green" => println!("{}", text.green()),
                "cyan" => println!("{}", text.cyan()),
                "magenta" => println!("{}", text.magenta()),
                "yellow" => println!("{}", text.yellow()),
                "red" => println!("{}", text.red()),
                _ => println!("{}", text),
            }
        } else {
            println!("{}", text);
        }
    }
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self { skin: MadSkin::default() }
    }
}

impl MarkdownPrinter {
    pub fn print(&self, text: &str) {
        self.skin.print_text(text);
        println!();
    }
}

/// What to show besides the answer itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowOptions {
    pub markdown: bool,
    pub show_code: bool,
    pub show_result: bool,
}

pub fn print_response(resp: &ChatResponse, display: ShowOptions) {
    if display.show_code {
        TextPrinter { color: Some("cyan") }.print(&format!("--- program (attempt {}) ---", resp.attempts));
        println!("{}", resp.generated_code);
    }
    if display.show_result {
        TextPrinter { color: Some("cyan") }.print("--- result ---");
        println!("{}", resp.execution_result);
    }
    if display.show_code || display.show_result {
        TextPrinter { color: Some("cyan") }.print("--- answer ---");
    }
    if display.markdown {
        MarkdownPrinter::default().print(&resp.answer);
    } else if resp.execution_result.success {
        println!("{}", resp.answer);
    } else {
        TextPrinter { color: Some("red") }.print(&resp.answer);
    }
}
