// src/core/system_prompt.rs — Seed system instruction for a generation run

use crate::extract::ModuleInterface;

/// Build the system message that opens every conversation.
///
/// Sections (in order):
///   1. Role: what the model is
///   2. Rules: interface and requirement discipline
///   3. Interface: the exact port list, when the prompt declares one
///   4. Output: how the answer must be shaped so extraction can find it
pub fn build_system_prompt(interface: Option<&ModuleInterface>) -> String {
    let mut prompt = String::with_capacity(1024);

    append_role_section(&mut prompt);
    append_rules_section(&mut prompt);
    if let Some(interface) = interface {
        append_interface_section(&mut prompt, interface);
    }
    append_output_section(&mut prompt);

    prompt
}

// ─── Section builders ───────────────────────────────────────────────────────

fn append_role_section(prompt: &mut String) {
    prompt.push_str(
        "You are a Verilog code generator that learns from compilation and simulation \
         feedback.\n\n",
    );
}

fn append_rules_section(prompt: &mut String) {
    prompt.push_str("Follow these rules:\n");
    prompt.push_str("1. Only use signals/ports defined in the module interface\n");
    prompt.push_str("2. Follow the design requirements exactly as specified in the prompt\n");
    prompt.push_str("3. Learn from any compilation errors\n");
    prompt.push_str("4. Maintain the exact module interface as given\n");
    prompt.push_str("5. Keep working parts from previous attempts and fix only what the feedback identifies\n\n");
}

fn append_interface_section(prompt: &mut String, interface: &ModuleInterface) {
    prompt.push_str("Module interface:\n");
    prompt.push_str(&format!("module {}({});\n\n", interface.name, interface.ports));
}

fn append_output_section(prompt: &mut String) {
    prompt.push_str(
        "Reply with the complete module, from `module` to `endmodule`, in a single \
         code block. Do not include explanations.\n",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_interface() {
        let p = build_system_prompt(None);
        assert!(p.starts_with("You are a Verilog code generator"));
        assert!(p.contains("4. Maintain the exact module interface"));
        assert!(!p.contains("Module interface:"));
    }

    #[test]
    fn test_prompt_with_interface() {
        let iface = ModuleInterface {
            name: "top_module".into(),
            ports: "input a, output b".into(),
        };
        let p = build_system_prompt(Some(&iface));
        assert!(p.contains("module top_module(input a, output b);"));
        let rules = p.find("Follow these rules").unwrap();
        let ports = p.find("Module interface").unwrap();
        let output = p.find("Reply with").unwrap();
        assert!(rules < ports && ports < output);
    }
}
