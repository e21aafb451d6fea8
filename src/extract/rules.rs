// src/extract/rules.rs — Individual text rules used by the extraction pipeline
//
// Each rule is a pure `&str -> String` (or query) so it can be tested on its own.

use regex::Regex;
use std::sync::LazyLock;

/// Timing directive added when a design carries none.
pub const TIMESCALE_DIRECTIVE: &str = "`timescale 1ns / 1ps";

/// Reset-value macro added when a design carries none.
pub const RESET_DIRECTIVE: &str = "`define RESET_VAL 4'b0000";

/// Lines containing any of these (case-insensitive) are conversational noise.
const NOISE_MARKERS: &[&str] = &[
    "i apologize",
    "sorry",
    "here is",
    "here's",
    "this code",
    "explanation:",
    "note:",
    "begin by",
];

/// Directives that are file-scoped and safe to hoist above the design.
/// Conditional-compilation directives stay where they are.
const HOISTED_DIRECTIVES: &[&str] = &[
    "`timescale",
    "`define",
    "`include",
    "`default_nettype",
    "`resetall",
];

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\w+-]*").expect("fence pattern is valid"));

static PREAMBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*Here(?:'s| is) [^\n]*?:[ \t]*\n?").expect("preamble pattern is valid")
});

static MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\bmodule\s+[A-Za-z_\\][\w$\\]*\s*(?:#\s*\(.*?\)\s*)?(?:\(.*?\)\s*)?;.*?\bendmodule\b",
    )
    .expect("module pattern is valid")
});

static MODULE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\bmodule\s+[A-Za-z_\\][\w$\\]*\s*(?:#\s*\(.*?\)\s*)?(?:\(.*?\)\s*)?;")
        .expect("module header pattern is valid")
});

static ENDMODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bendmodule\b").expect("endmodule pattern is valid"));

static INLINE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"`(?:timescale|define|include|default_nettype|resetall)\b")
        .expect("inline directive pattern is valid")
});

static FRAGMENT_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:assign|always(?:_comb|_ff|_latch)?)\b").expect("keyword pattern is valid")
});

/// Remove markdown code fences (```verilog, ```systemverilog, ```).
pub fn strip_fences(text: &str) -> String {
    FENCE.replace_all(text, "").into_owned()
}

/// Remove "Here is ...:" / "Here's ...:" lead-ins at the start of a line.
pub fn strip_preambles(text: &str) -> String {
    PREAMBLE.replace_all(text, "").into_owned()
}

pub fn is_noise_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    NOISE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Drop apology/explanation lines wherever they appear.
pub fn strip_noise_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !is_noise_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Move a hoistable directive that follows code on the same line onto its
/// own line. Directives inside a `//` comment are left alone.
pub fn split_inline_directives(text: &str) -> String {
    text.lines()
        .map(split_directive_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_directive_line(line: &str) -> String {
    let comment = line.find("//").unwrap_or(line.len());
    let mut out = String::with_capacity(line.len() + 1);
    let mut last = 0;
    for m in INLINE_DIRECTIVE.find_iter(line) {
        if m.start() >= comment {
            break;
        }
        let before = &line[last..m.start()];
        if before.trim().is_empty() {
            continue;
        }
        out.push_str(before.trim_end());
        out.push('\n');
        last = m.start();
    }
    out.push_str(&line[last..]);
    out
}

/// Fences, preambles and noise lines removed, in that order, with inline
/// directives split onto their own lines.
pub fn clean(text: &str) -> String {
    strip_noise_lines(&split_inline_directives(&strip_preambles(&strip_fences(text))))
}

/// Blank out `//` and `/* */` comments, keeping newlines and byte offsets.
/// String literals are skipped so `"//"` inside `$display` survives.
pub fn mask_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    let mut in_string = false;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' | b'\n' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }
        match (b, bytes.get(i + 1).copied()) {
            (b'"', _) => {
                in_string = true;
                i += 1;
            }
            (b'/', Some(b'/')) => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            (b'/', Some(b'*')) => {
                let end = text[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |p| i + 2 + p + 2);
                for byte in &mut out[i..end] {
                    if *byte != b'\n' {
                        *byte = b' ';
                    }
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    // Whole characters are blanked, so the result is still valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

/// Every complete `module ... endmodule` block outside comments, in source order.
pub fn find_modules(text: &str) -> Vec<String> {
    let masked = mask_comments(text);
    MODULE
        .find_iter(&masked)
        .map(|m| text[m.range()].trim().to_string())
        .collect()
}

/// True when code outside comments looks like a module body without its wrapper.
pub fn has_fragment(text: &str) -> bool {
    FRAGMENT_KEYWORD.is_match(&mask_comments(text))
}

pub fn is_hoisted_directive(line: &str) -> bool {
    let trimmed = line.trim_start();
    HOISTED_DIRECTIVES.iter().any(|d| {
        trimmed
            .strip_prefix(d)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

/// Hoistable directive lines in order of first appearance, de-duplicated.
pub fn collect_directives(text: &str) -> Vec<String> {
    let mut directives: Vec<String> = Vec::new();
    for line in text.lines().filter(|l| is_hoisted_directive(l)) {
        let line = line.trim().to_string();
        if !directives.contains(&line) {
            directives.push(line);
        }
    }
    directives
}

/// Strip stray module headers, `endmodule` and directives, leaving the body lines.
pub fn fragment_body(text: &str) -> String {
    let without_header = MODULE_HEADER.replace_all(text, "");
    let without_end = ENDMODULE.replace_all(&without_header, "");
    without_end
        .lines()
        .filter(|l| !is_hoisted_directive(l))
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prepend the default timing directive and reset macro when missing.
pub fn ensure_default_directives(directives: &mut Vec<String>) {
    let has_reset = directives
        .iter()
        .any(|d| d.starts_with("`define RESET_VAL"));
    if !has_reset {
        directives.insert(0, RESET_DIRECTIVE.to_string());
    }
    let has_timescale = directives.iter().any(|d| d.starts_with("`timescale"));
    if !has_timescale {
        directives.insert(0, TIMESCALE_DIRECTIVE.to_string());
    }
}

/// Module text with hoisted directives removed, trailing whitespace trimmed and
/// blank lines dropped.
pub fn tidy_module(module: &str) -> String {
    module
        .lines()
        .filter(|l| !is_hoisted_directive(l))
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
