//! The operating procedure that seeds every transcript.

use dossier_core::model::ToolDefinition;

/// Builds the instruction message from the domain, the advertised tools
/// and the caller's request.
///
/// Built once at startup and shared immutably across runs.
#[derive(Debug, Clone)]
pub struct InstructionTemplate {
    subject: String,
    domain: String,
    tools: Vec<ToolDefinition>,
}

impl InstructionTemplate {
    pub fn new(
        subject: impl Into<String>,
        domain: impl Into<String>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            subject: subject.into(),
            domain: domain.into(),
            tools,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// `name(param: str, ...)`: description, one line per tool.
    fn tool_lines(&self) -> String {
        self.tools
            .iter()
            .map(|t| {
                let params = t.parameters["properties"]
                    .as_object()
                    .map(|props| {
                        props
                            .keys()
                            .map(|k| format!("{k}: str"))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                format!("- `{}({params})`: {}", t.name, t.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render the instruction for `request`.
    pub fn render(&self, request: &str) -> String {
        let domain = &self.domain;
        let subject = &self.subject;
        let tools = self.tool_lines();

        format!(
            r#"You are a meticulous report generation assistant specializing in {domain}. Your task is to create a structured report in JSON format based on the provided internal documents (research papers, guidelines etc.) and the user's specific request: '{request}'.

Available tools and their usage:
{tools}

Your Process:
1.  **Analyze Request:** Carefully examine the user request: '{request}'. Identify *all* specific sections, figures, tables, or topics mentioned.
2.  **Determine Sections:** Decide the final list of sections for the report. If the request is generic (e.g., "generate a report on {subject}"), use a comprehensive set of default sections relevant to the documents, such as: "Executive Summary" (use generate_summary), "Introduction & Definitions", "Epidemiology: Prevalence and Incidence", "Risk Factors", "Natural History and Progression", "Diagnosis and Assessment Methods", "Key Figures and Tables" (use extract_figures_tables multiple times), "Conclusion".
3.  **Plan Tool Calls:** Plan the tool calls needed to gather content for *each* required section.
4.  **Execute Tools:** Call the tools you need and wait for their results before continuing, until you have gathered content for all planned sections.
5.  **Compile Final JSON:** After ALL necessary tool calls are complete, assemble the final report data. Your ABSOLUTE FINAL output message MUST be ONLY the structured JSON object representing the complete report. It MUST follow this format precisely:
    ```json
    {{
        "Section Title 1": [{{"type": "text", "content": "..."}}],
        "Section Title 2": [
            {{"type": "image", "path": "...", "caption": "..."}},
            {{"type": "table", "data": [[...], [...]], "caption": "..."}}
        ],
        "Section Title 3": [{{"type": "text", "content": "..."}}]
    }}
    ```
    - Ensure correct JSON syntax (double quotes for keys and strings, commas between elements).
    - Map the content from the tool responses into the `content`, `path`, `data`, and `caption` fields of each block.
    - Do NOT include any conversational text, explanations, apologies, status updates, or raw tool responses in your final output message. Only the report JSON object."#
        )
    }
}
