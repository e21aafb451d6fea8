// src/extract/interface.rs — Target module interface taken from the design prompt

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::rules;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\bmodule\s+([A-Za-z_][\w$]*)\s*(?:#\s*\(.*?\)\s*)?\((.*?)\)\s*;")
        .expect("declaration pattern is valid")
});

/// Name and port list of the module the prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInterface {
    pub name: String,
    /// Port list exactly as written between the declaration's parentheses.
    pub ports: String,
}

impl ModuleInterface {
    /// Locate the first module declaration in the prompt and take its port list.
    pub fn from_prompt(prompt: &str) -> Option<Self> {
        let caps = DECLARATION.captures(prompt)?;
        Some(Self {
            name: caps[1].to_string(),
            ports: caps[2].trim().to_string(),
        })
    }

    pub fn from_prompt_file(path: &Path) -> Option<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_prompt(&text),
            Err(e) => {
                tracing::warn!("Could not read interface from {}: {}", path.display(), e);
                None
            }
        }
    }

    /// A complete module around `body` using this interface.
    pub fn wrap(&self, body: &str) -> String {
        // Port text goes through the same cleaning as model output so the wrapped
        // module survives a second extraction unchanged.
        let ports = rules::clean(&self.ports)
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        format!("module {}(\n{}\n);\n{}\nendmodule", self.name, ports, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_prompt() {
        let prompt = "Implement an AND gate.\n\nmodule top_module(\n    input a,\n    input b,\n    output c\n);\n";
        let iface = ModuleInterface::from_prompt(prompt).unwrap();
        assert_eq!(iface.name, "top_module");
        assert_eq!(iface.ports, "input a,\n    input b,\n    output c");
    }

    #[test]
    fn test_from_prompt_vectors() {
        let prompt = "module top_module (input [2:0] vec, output [2:0] outv, output o0);";
        let iface = ModuleInterface::from_prompt(prompt).unwrap();
        assert_eq!(iface.ports, "input [2:0] vec, output [2:0] outv, output o0");
    }

    #[test]
    fn test_from_prompt_without_declaration() {
        assert!(ModuleInterface::from_prompt("Build a 4-bit counter.").is_none());
    }

    #[test]
    fn test_wrap() {
        let iface = ModuleInterface {
            name: "top_module".into(),
            ports: "input a, input b, output c".into(),
        };
        assert_eq!(
            iface.wrap("assign c = a & b;"),
            "module top_module(\ninput a, input b, output c\n);\nassign c = a & b;\nendmodule"
        );
    }

    #[test]
    fn test_from_missing_file() {
        assert!(ModuleInterface::from_prompt_file(Path::new("/nonexistent/prompt.v")).is_none());
    }
}
