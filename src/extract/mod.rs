// src/extract/mod.rs — Candidate extraction: free-form model text to a design file
//
// Pipeline:
//   1. clean    : fences, "Here is ...:" lead-ins and apology/explanation lines go
//   2. modules  : every complete `module ... endmodule` block outside comments, in order
//   3. wrapper  : no module but assign/always fragments: wrap them in the prompt's interface
//   4. assemble : hoist file-scoped directives (de-duplicated, defaults added) above the body
//
// `extract` is idempotent on its own output.

pub mod interface;
pub mod rules;

pub use interface::ModuleInterface;

/// Normalize raw model text into a compilable source file.
///
/// Returns `None` when no module can be found or synthesized; that is a
/// failure of this candidate only.
pub fn extract(raw: &str, interface: Option<&ModuleInterface>) -> Option<String> {
    let cleaned = rules::clean(raw);
    let directives = rules::collect_directives(&cleaned);

    let modules = rules::find_modules(&cleaned);
    if !modules.is_empty() {
        return Some(assemble(directives, &modules));
    }

    if !rules::has_fragment(&cleaned) {
        return None;
    }
    let Some(interface) = interface else {
        tracing::debug!("fragment found but no interface to wrap it in");
        return None;
    };

    let body = rules::fragment_body(&cleaned);
    if body.is_empty() {
        return None;
    }
    tracing::debug!(module = %interface.name, "wrapping fragment in prompt interface");
    let wrapped = interface.wrap(&body);
    Some(assemble(directives, &[wrapped]))
}

/// Directives first, then each module separated by a blank line.
fn assemble(mut directives: Vec<String>, modules: &[String]) -> String {
    for module in modules {
        for d in rules::collect_directives(module) {
            if !directives.contains(&d) {
                directives.push(d);
            }
        }
    }
    rules::ensure_default_directives(&mut directives);

    let body = modules
        .iter()
        .map(|m| rules::tidy_module(m))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{}\n\n{}\n", directives.join("\n"), body)
}

#[cfg(test)]
mod tests {
    use super::rules::{RESET_DIRECTIVE, TIMESCALE_DIRECTIVE};
    use super::*;
    use pretty_assertions::assert_eq;

    fn and_gate() -> ModuleInterface {
        ModuleInterface {
            name: "top_module".into(),
            ports: "input a, input b, output c".into(),
        }
    }

    #[test]
    fn test_extract_fragment_uses_interface() {
        let out = extract("assign c = a & b;", Some(&and_gate())).unwrap();
        assert_eq!(
            out,
            format!(
                "{}\n{}\n\nmodule top_module(\ninput a, input b, output c\n);\nassign c = a & b;\nendmodule\n",
                TIMESCALE_DIRECTIVE, RESET_DIRECTIVE
            )
        );
    }

    #[test]
    fn test_extract_fragment_without_interface_is_empty() {
        assert!(extract("assign c = a & b;", None).is_none());
    }

    #[test]
    fn test_extract_prose_only_is_empty() {
        assert!(extract("I apologize, I cannot help with that.", Some(&and_gate())).is_none());
        assert!(extract("", Some(&and_gate())).is_none());
    }

    #[test]
    fn test_extract_complete_module_from_chatty_reply() {
        let raw = "Here is the corrected implementation:\n```verilog\n`timescale 1ns/1ps\nmodule top_module(input a, input b, output c);\n    assign c = a & b;\nendmodule\n```\nNote: this uses a continuous assignment.";
        let out = extract(raw, Some(&and_gate())).unwrap();
        assert_eq!(
            out,
            format!(
                "{}\n`timescale 1ns/1ps\n\nmodule top_module(input a, input b, output c);\n    assign c = a & b;\nendmodule\n",
                RESET_DIRECTIVE
            )
        );
    }

    #[test]
    fn test_extract_multiple_modules_blank_separated() {
        let raw = "module half(input a, output y); assign y = a; endmodule\nmodule top_module(input a, output y);\nhalf h(.a(a), .y(y));\nendmodule";
        let out = extract(raw, None).unwrap();
        assert!(out.contains("endmodule\n\nmodule top_module"));
        assert!(out.find("module half").unwrap() < out.find("module top_module").unwrap());
    }

    #[test]
    fn test_directives_hoisted_and_deduplicated() {
        let raw = "module a;\n`define W 8\nwire [`W-1:0] x;\nendmodule\n`define W 8\nmodule b;\n`timescale 1ns / 1ps\nendmodule";
        let out = extract(raw, None).unwrap();
        assert_eq!(out.matches("`define W 8").count(), 1);
        assert_eq!(out.matches("`timescale").count(), 1);
        let first_body = out.find("module a").unwrap();
        for line in out.lines().filter(|l| l.starts_with('`')) {
            assert!(out.find(line).unwrap() < first_body, "{line} after body");
        }
    }

    #[test]
    fn test_conditional_directives_stay_in_place() {
        let raw = "module a;\n`ifdef SIM\ninitial $display(\"sim\");\n`endif\nendmodule";
        let out = extract(raw, None).unwrap();
        assert!(out.contains("module a;\n`ifdef SIM\n"));
    }

    #[test]
    fn test_extract_is_idempotent() {
        let iface = and_gate();
        let inputs = [
            "assign c = a & b;",
            "Here's the design:\n```verilog\nmodule top_module(input a, input b, output c);\n\n  assign c = a & b;   \n\nendmodule\n```",
            "`define W 4\nmodule x(input [`W-1:0] d); `timescale 1ns/1ps\nendmodule\n\n\nmodule y; endmodule",
            "module top_module(input a, input b, output c);\n  always @(*) begin\n    c = a & b; // Note: blocking\n  end\nendmodule",
        ];
        for input in inputs {
            let once = extract(input, Some(&iface)).unwrap();
            let twice = extract(&once, Some(&iface)).unwrap();
            assert_eq!(twice, once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_idempotent_with_noisy_interface() {
        let iface = ModuleInterface {
            name: "top_module".into(),
            ports: "input clk,\n    // Note: active-high reset\n    input reset,\n    output reg q".into(),
        };
        let once = extract("always @(posedge clk) q <= reset ? 0 : ~q;", Some(&iface)).unwrap();
        assert!(!once.contains("Note"));
        assert_eq!(extract(&once, Some(&iface)).unwrap(), once);
    }

    #[test]
    fn test_lead_in_comment_keeps_register_logic() {
        let raw = "module top_module(input clk, input d, output reg q);\n  // Here is the register:\n  always @(posedge clk) q <= d;\nendmodule";
        let out = extract(raw, None).unwrap();
        assert!(out.contains("\n  always @(posedge clk) q <= d;\nendmodule"));
        assert!(!out.contains("// always"));
    }

    #[test]
    fn test_commented_echo_of_previous_design_ignored() {
        let raw = "// module top_module(input a, input b, output c);\n//   assign c = a | b;\n// endmodule\n\nmodule top_module(input a, input b, output c);\n  assign c = a & b;\nendmodule";
        let out = extract(raw, Some(&and_gate())).unwrap();
        assert_eq!(out.matches("module top_module").count(), 1);
        assert_eq!(out.matches("endmodule").count(), 1);
        assert!(!out.contains("a | b"));
    }

    #[test]
    fn test_inline_timescale_hoisted_once() {
        let raw = "module x(input d); `timescale 1ns/1ps\nendmodule";
        let out = extract(raw, None).unwrap();
        assert_eq!(out.matches("`timescale").count(), 1);
        assert_eq!(
            out,
            format!("{}\n`timescale 1ns/1ps\n\nmodule x(input d);\nendmodule\n", RESET_DIRECTIVE)
        );
    }

    #[test]
    fn test_output_always_has_module_boundary() {
        let out = extract("assign c = a | b;", Some(&and_gate())).unwrap();
        assert!(out.contains("module top_module("));
        assert!(out.trim_end().ends_with("endmodule"));
    }
}
