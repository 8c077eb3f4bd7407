pub const SYSTEM_INSTRUCTIONS: &str = include_str!("../data/prompts/system.txt");
pub const OCR_LABEL: &str = include_str!("../data/prompts/ocr_label.txt");
pub const OCR_INSTRUCTION: &str = include_str!("../data/prompts/ocr_instruction.txt");
pub const SEARCH_CONTEXT: &str = include_str!("../data/prompts/search_context.txt");

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_var() {
        assert_eq!(
            render("Results: {{results}}", &[("results", "none")]),
            "Results: none"
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{{a}} and {{b}}", &[("a", "cats")]), "cats and {{b}}");
    }

    #[test]
    fn test_prompts_are_non_empty() {
        assert!(!SYSTEM_INSTRUCTIONS.is_empty());
        assert!(!OCR_LABEL.is_empty());
        assert!(!OCR_INSTRUCTION.is_empty());
        assert!(!SEARCH_CONTEXT.is_empty());
    }

    #[test]
    fn test_system_instructions_require_fenced_code() {
        assert!(SYSTEM_INSTRUCTIONS.contains("fenced code blocks"));
        assert!(SYSTEM_INSTRUCTIONS.contains("language tag"));
    }

    #[test]
    fn test_search_context_has_placeholder_and_citation_rule() {
        assert!(SEARCH_CONTEXT.contains("{{results}}"));
        assert!(SEARCH_CONTEXT.contains("[source: url]"));
    }
}
