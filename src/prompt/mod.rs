//! Prompt text for program generation and answer formatting.

use std::{collections::BTreeSet, fmt::Write as _};

use crate::{
    data::{DataContext, Scalar, Table},
    execution::allowed_functions,
    llm::ChatMessage,
};

/// String columns with at most this many distinct values list them inline.
const MAX_LISTED_VALUES: usize = 12;

const RELATIONSHIPS: &str = "\
## Relationships
- clients (1) -> (many) invoices, joined on client_id
- invoices (1) -> (many) line_items, joined on invoice_id
- merged is clients LEFT JOIN invoices LEFT JOIN line_items, plus line_total

## Calculation rules
1. Line total (with tax): quantity * unit_price * (1 + tax_rate). Use the precomputed `line_total` column of `merged`.
2. Invoice total: sum of line_total per invoice_id.
3. Client total: sum of line_total per client_id.
";

const ALGEBRA: &str = r#"## Program format
Output a JSON array of statements `{"let": "<name>", "expr": <expr>}`, evaluated in order.
Later statements may `ref` names bound earlier. The final answer MUST be bound to `result`.

Expressions (`"op"` selects the operation):
- {"op": "ref", "name": N}: a table or an earlier binding
- {"op": "literal", "value": V}: a JSON scalar
- {"op": "filter", "input": E, "where": R}
- {"op": "select", "input": E, "columns": [..]}
- {"op": "derive", "input": E, "column": C, "value": R}
- {"op": "rename", "input": E, "columns": {"old": "new"}}
- {"op": "sort", "input": E, "by": [{"column": C, "descending": true}]}
- {"op": "head", "input": E, "n": 3}
- {"op": "distinct", "input": E, "columns": [..]}
- {"op": "join", "left": E, "right": E, "on": [..], "how": "inner" | "left"}
- {"op": "group", "input": E, "by": [..], "aggregates": [{"column": C, "func": F, "alias": A}]}
- {"op": "aggregate", "input": E, "column": C, "func": F}: a single value
- {"op": "column", "input": E, "name": C}: a series
- {"op": "group_series", "input": E, "by": [..], "column": C, "func": F}: a series labeled by group
- {"op": "value_counts", "input": E, "column": C}
- {"op": "mapping", "entries": {"key": E, ..}}: a dict of single values
- {"op": "call", "func": NAME, "args": [E, ..]}

Aggregate functions F: sum, mean, min, max, count, nunique, first.

Row expressions R are single-key objects:
{"col": C}, {"lit": V}, {"eq": [R, R]}, {"ne": [R, R]}, {"lt": [R, R]}, {"le": [R, R]},
{"gt": [R, R]}, {"ge": [R, R]}, {"and": [R, ..]}, {"or": [R, ..]}, {"not": R},
{"is_null": R}, {"in": [R, [V, ..]]}, {"contains": [R, "text"]},
{"add": [R, R]}, {"sub": [R, R]}, {"mul": [R, R]}, {"div": [R, R]}, {"year": R}, {"month": R}.
Dates compare against "YYYY-MM-DD" strings.
"#;

const RULES: &str = "\
## Rules
1. ONLY output the JSON program, no explanations.
2. Bind the final answer to `result`: a table for lists, a mapping for a few named values, a single value for counts and sums.
3. For money, ALWAYS include tax; use `line_total` from `merged`.
4. Use `merged` when you need data from more than one table.
5. invoice_date and due_date are dates already.
";

const EXAMPLES: &str = r#"## Examples

Question: "List all clients with their industries"
[{"let": "result", "expr": {"op": "select", "input": {"op": "ref", "name": "clients"}, "columns": ["client_name", "industry"]}}]

Question: "Which clients are based in the UK?"
[{"let": "result", "expr": {"op": "select",
  "input": {"op": "filter", "input": {"op": "ref", "name": "clients"}, "where": {"eq": [{"col": "country"}, {"lit": "UK"}]}},
  "columns": ["client_name", "country"]}}]

Question: "For each client, compute the total amount billed in 2024"
[{"let": "y2024", "expr": {"op": "filter", "input": {"op": "ref", "name": "merged"}, "where": {"eq": [{"year": {"col": "invoice_date"}}, {"lit": 2024}]}}},
 {"let": "totals", "expr": {"op": "group", "input": {"op": "ref", "name": "y2024"}, "by": ["client_name"],
   "aggregates": [{"column": "line_total", "func": "sum", "alias": "total_billed"}]}},
 {"let": "result", "expr": {"op": "sort", "input": {"op": "ref", "name": "totals"}, "by": [{"column": "total_billed", "descending": true}]}}]

Question: "Which client has the highest total billed amount?"
[{"let": "totals", "expr": {"op": "group_series", "input": {"op": "ref", "name": "merged"}, "by": ["client_name"], "column": "line_total", "func": "sum"}},
 {"let": "result", "expr": {"op": "mapping", "entries": {
   "client": {"op": "call", "func": "idxmax", "args": [{"op": "ref", "name": "totals"}]},
   "total": {"op": "call", "func": "max", "args": [{"op": "ref", "name": "totals"}]}}}}]
"#;

const FORMATTING_SYSTEM_PROMPT: &str = "\
You are a helpful assistant that formats data query results into clear, natural language responses.

## Rules
1. Answer the user's question directly using ONLY the provided data
2. NEVER invent or hallucinate numbers - use ONLY what's in the data
3. Format numbers nicely (currency with 2 decimals, percentages, etc.)
4. For tables/lists, present them in a readable format
5. Be concise but complete
6. If the data is empty or None, say \"No results found\" or similar

## Response Format
- Start with a direct answer to the question
- Present data clearly (bullet points for lists, tables for multiple columns)
- Round monetary values to 2 decimal places
";

fn describe_table(out: &mut String, name: &str, table: &Table) {
    let _ = writeln!(out, "## Table: {} ({} rows)", name, table.len());
    for column in table.columns() {
        let kind = table.column_kind(column);
        let _ = write!(out, "- {} ({})", column, kind);
        if kind == "str" {
            let distinct: BTreeSet<&str> = table
                .column_values(column)
                .into_iter()
                .flatten()
                .filter_map(|v| match v {
                    Scalar::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            if distinct.len() <= MAX_LISTED_VALUES && distinct.len() < table.len() {
                let values: Vec<&str> = distinct.into_iter().collect();
                let _ = write!(out, ": one of [{}]", values.join(", "));
            }
        }
        out.push('\n');
    }
    out.push('\n');
}

/// Schema of the loaded tables, derived from the data itself.
pub fn schema_description(ctx: &DataContext) -> String {
    let mut out = String::from("# Data schema\n\n");
    for (name, table) in ctx.bindings() {
        describe_table(&mut out, &name, &table);
    }
    out.push_str(RELATIONSHIPS);
    out
}

pub fn code_generation_system_prompt(schema: &str) -> String {
    let functions: Vec<&str> = allowed_functions().collect();
    format!(
        "You are a query program generator. Given a question about invoice data, write a program that \
         computes the answer and binds it to `result`.\n\n{}\n{}\nCallable functions: {}.\n\n{}\n{}",
        schema,
        ALGEBRA,
        functions.join(", "),
        RULES,
        EXAMPLES
    )
}

pub fn code_generation_prompt(question: &str, previous_error: Option<&str>) -> String {
    let mut prompt = format!(
        "Write a program to answer this question:\n\nQuestion: {}\n\n\
         Remember: bind your answer to `result`. Only output the JSON program, no explanations.",
        question
    );
    if let Some(err) = previous_error {
        let _ = write!(
            prompt,
            "\n\nYour previous program for this question failed with:\n{}\nFix the problem.",
            err
        );
    }
    prompt
}

pub fn response_formatting_prompt(question: &str, data_result: &str) -> String {
    format!(
        "User Question: {}\n\nQuery Result:\n{}\n\n\
         Please provide a clear, natural language answer to the user's question based on this data.",
        question, data_result
    )
}

pub fn code_generation_messages(schema: &str, question: &str, previous_error: Option<&str>) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(code_generation_system_prompt(schema)),
        ChatMessage::user(code_generation_prompt(question, previous_error)),
    ]
}

pub fn formatting_messages(question: &str, data_result: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(FORMATTING_SYSTEM_PROMPT),
        ChatMessage::user(response_formatting_prompt(question, data_result)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Program;

    fn s(v: &str) -> Scalar {
        Scalar::Str(v.to_string())
    }

    #[test]
    fn test_examples_are_valid_programs() {
        let mut programs: Vec<String> = Vec::new();
        for line in EXAMPLES.lines() {
            if line.starts_with('[') {
                programs.push(line.to_string());
            } else if line.starts_with(' ') {
                if let Some(last) = programs.last_mut() {
                    last.push_str(line);
                }
            }
        }
        assert_eq!(programs.len(), 4);
        for p in &programs {
            Program::parse(p).unwrap();
        }
    }

    #[test]
    fn test_describe_table_lists_small_domains() {
        let t = Table::new(
            vec!["invoice_id".into(), "status".into(), "fx_rate_to_usd".into()],
            vec![
                vec![s("I1"), s("Paid"), Scalar::Float(1.0)],
                vec![s("I2"), s("Overdue"), Scalar::Float(1.1)],
                vec![s("I3"), s("Paid"), Scalar::Float(1.0)],
            ],
        );
        let mut out = String::new();
        describe_table(&mut out, "invoices", &t);
        assert!(out.starts_with("## Table: invoices (3 rows)\n"));
        assert!(out.contains("- status (str): one of [Overdue, Paid]\n"));
        assert!(out.contains("- invoice_id (str)\n"));
        assert!(out.contains("- fx_rate_to_usd (float)\n"));
    }

    #[test]
    fn test_previous_error_is_appended() {
        let plain = code_generation_prompt("How many clients?", None);
        assert!(!plain.contains("failed"));
        let retry = code_generation_prompt("How many clients?", Some("KeyError: column 'x'"));
        assert!(retry.ends_with("KeyError: column 'x'\nFix the problem."));
    }

    #[test]
    fn test_system_prompt_lists_functions() {
        let p = code_generation_system_prompt("# Data schema\n");
        assert!(p.contains("Callable functions: len, sum, min, max"));
        assert!(p.contains("\"op\": \"group_series\""));
    }
}
