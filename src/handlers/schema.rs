use anyhow::Result;

use crate::printer::MarkdownPrinter;

pub fn run(schema: &str, markdown: bool) -> Result<()> {
    if markdown {
        MarkdownPrinter::default().print(schema);
    } else {
        println!("{}", schema);
    }
    Ok(())
}
