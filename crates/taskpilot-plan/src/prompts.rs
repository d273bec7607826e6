use crate::{Feedback, PlatformFamily, PlatformProfile, Task};

const WINDOWS_GUIDANCE: &str = r#"You are generating commands for a Windows system. Use Windows-specific commands:
- Use 'echo.' or 'type nul >' to create empty files (NOT 'touch')
- Use 'dir' instead of 'ls'
- Use 'copy' instead of 'cp'
- Use 'move' instead of 'mv'
- Use 'del' instead of 'rm'
- Use 'md' or 'mkdir' for directory creation
- For PowerShell commands, be explicit by prefixing with 'powershell -Command'"#;

const LINUX_GUIDANCE: &str = "You are generating commands for a Linux system.";

const MACOS_GUIDANCE: &str = "You are generating commands for a macOS system.";

/// Prompt templates for plan generation
pub struct PlanPrompts;

impl PlanPrompts {
    /// Build the plan request sent to the model
    ///
    /// Feedback from the previous attempt, when present, leads the prompt verbatim.
    pub fn build(task: &Task, feedback: Option<&Feedback>, platform: &PlatformProfile) -> String {
        let mut prompt = String::new();

        if let Some(feedback) = feedback {
            prompt.push_str("Previous feedback: ");
            prompt.push_str(feedback.as_str());
            prompt.push('\n');
        }

        if let Some(guidance) = Self::platform_guidance(platform.family) {
            prompt.push_str(guidance);
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            r#"
You are an AI assistant that helps automate tasks on a {os} computer.
The user has requested the following task: "{task}"

Provide a detailed plan with these components:
1. A list of steps that need to be taken
2. The exact commands to run for each step (appropriate for {os})
3. Any file contents that need to be created

Respond with valid JSON in the following format, using exactly these keys:
{{
  "plan": [
    "Step 1: Description of first step",
    "Step 2: Description of second step"
  ],
  "commands": [
    "command_1",
    "command_2"
  ],
  "files": [
    {{
      "path": "filename.ext",
      "content": "The file content here"
    }}
  ]
}}

Every value in "plan" and "commands" must be a string. Every entry in "files" must be an object with string fields "path" and "content".
Ensure all commands are specifically compatible with {os} and are safe to execute.
Do not use commands that don't exist on {os}.
"#,
            os = platform.os_name,
            task = task.as_str(),
        ));

        prompt
    }

    /// Dialect guidance for the target platform, if the family is recognized
    pub fn platform_guidance(family: PlatformFamily) -> Option<&'static str> {
        match family {
            PlatformFamily::Windows => Some(WINDOWS_GUIDANCE),
            PlatformFamily::Linux => Some(LINUX_GUIDANCE),
            PlatformFamily::MacOs => Some(MACOS_GUIDANCE),
            PlatformFamily::Other => None,
        }
    }
}
