// src/evaluator/diagnostics.rs — Compile-error categorization
//
// Categories are prepended to the verbatim compiler output in feedback so the
// model sees what kind of mistake it made before the raw text.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileIssue {
    UndeclaredIdentifier,
    InvalidAssignmentTarget,
    SyntaxError(String),
    MissingEndmodule,
    UndefinedMacro(String),
    UnnamedMacro,
    Timescale,
}

impl fmt::Display for CompileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileIssue::UndeclaredIdentifier => {
                write!(f, "Port/Signal Issues: Ensure all signals are properly declared")
            }
            CompileIssue::InvalidAssignmentTarget => {
                write!(f, "Assignment Issues: Check assignment types and target signals")
            }
            CompileIssue::SyntaxError(line) => {
                write!(f, "Syntax Issues: Verify Verilog syntax and statements ({})", line)
            }
            CompileIssue::MissingEndmodule => {
                write!(f, "Structure Issues: Every module needs a matching endmodule")
            }
            CompileIssue::UndefinedMacro(name) => {
                write!(f, "Macro Issues: Macro {} is used but never defined", name)
            }
            CompileIssue::UnnamedMacro => {
                write!(f, "Macro Issues: A `define is missing its macro name")
            }
            CompileIssue::Timescale => {
                write!(f, "Timing Issues: Check the `timescale directive and its placement")
            }
        }
    }
}

/// Scan compiler output line by line. Each kind is reported once, except
/// syntax errors, which keep their source line.
pub fn categorize(compile_text: &str) -> Vec<CompileIssue> {
    let mut issues: Vec<CompileIssue> = Vec::new();
    let mut push = |issue: CompileIssue| {
        if !issues.contains(&issue) {
            issues.push(issue);
        }
    };

    for line in compile_text.lines() {
        if line.contains("undeclared identifier") {
            push(CompileIssue::UndeclaredIdentifier);
        } else if line.contains("not a valid left-hand side") {
            push(CompileIssue::InvalidAssignmentTarget);
        } else if line.contains("module/macromodule...endmodule pair(s) mismatch") {
            push(CompileIssue::MissingEndmodule);
        } else if let Some(name) = undefined_macro(line) {
            push(CompileIssue::UndefinedMacro(name));
        } else if line.contains("Name of macro is not specified") {
            push(CompileIssue::UnnamedMacro);
        } else if line.contains("Syntax error") {
            push(CompileIssue::SyntaxError(line.trim().to_string()));
        } else if line.contains("timescale") {
            push(CompileIssue::Timescale);
        }
    }
    issues
}

fn undefined_macro(line: &str) -> Option<String> {
    let (_, rest) = line.split_once("Macro")?;
    let (name, _) = rest.split_once("is not defined")?;
    let name = name.trim().trim_matches(|c| c == '\'' || c == '`' || c == '"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Bullet list of categories, or `None` when nothing was recognized.
pub fn describe(issues: &[CompileIssue]) -> Option<String> {
    if issues.is_empty() {
        return None;
    }
    Some(
        issues
            .iter()
            .map(|i| format!("- {}", i))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}
