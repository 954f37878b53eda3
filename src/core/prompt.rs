use serde::{Deserialize, Serialize};

use crate::core::{Conversation, DiffBundle, PullRequestInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub system_prompt: String,
    /// `{title}` and `{description}` are substituted.
    pub description_template: String,
    /// `{diff}` is substituted.
    pub diff_template: String,
    pub final_instruction: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: r#"As a tech reviewer, please provide an in-depth review of the following pull request git diff data. Your task is to carefully analyze the title, body, and changes made in the pull request and identify any problems that need addressing including security issues. Please provide clear descriptions of each problem and offer constructive suggestions for how to address them. Additionally, please consider ways to optimize the changes made in the pull request. You should focus on providing feedback that will help improve the quality of the codebase while also remaining concise and clear in your explanations. Please note that unnecessary explanations or summaries should be avoided as they may delay the review process. Your feedback should be provided in a timely manner, using language that is easy to understand and follow.

You are provided with the code changes (diffs) in a unidiff format.

Your output should be a short summary of the changes and then a more detailed in a table format with the following columns:
- Problem category: Bug, Security, Optimization, etc.
- File name
- Line number(s)
- Description of the problem - where code can be included
- Suggestion for improvement - where code can be included
- Example code/solution"#
                .to_string(),
            description_template: r#"A description was given to help you assist in understand why these changes were made.
The description was provided in a markdown format.

Title: {title}
Description: {description}"#
                .to_string(),
            diff_template: "Diff in unidiff format:\n\n{diff}".to_string(),
            final_instruction: r#"All code changes have been provided.
Please provide me with your concise code review based on all the changes, context & title provided"#
                .to_string(),
        }
    }
}

pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Seed the review conversation: system, description, diff, final instruction.
    pub fn build(&self, info: &PullRequestInfo, diff: &DiffBundle) -> Conversation {
        let description = fill_template(
            &self.config.description_template,
            &[
                ("{title}", info.title.as_str()),
                ("{description}", info.description.as_str()),
            ],
        );
        let diff_message = fill_template(
            &self.config.diff_template,
            &[("{diff}", self.format_diff(diff).as_str())],
        );

        Conversation::seeded(
            self.config.system_prompt.clone(),
            description,
            diff_message,
            self.config.final_instruction.clone(),
        )
    }

    // Any size limiting of the diff text belongs here so message order stays fixed.
    fn format_diff(&self, diff: &DiffBundle) -> String {
        diff.render()
    }
}

/// Substitute placeholders in a single left-to-right pass.
///
/// Substituted text is never scanned again, so a title containing
/// `{description}` stays as written.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::git::parse_name_status;
    use crate::core::conversation::Role;

    fn info() -> PullRequestInfo {
        PullRequestInfo {
            title: "Add retry to uploader".to_string(),
            description: String::new(),
            link: "http://stash/pr/1".to_string(),
        }
    }

    fn bundle() -> DiffBundle {
        DiffBundle {
            name_status: parse_name_status("M\0file.py\0").unwrap(),
            body: "@@ -1,2 +1,3 @@\n a\n-b\n+c\n+d\n".to_string(),
        }
    }

    #[test]
    fn builds_four_seed_messages_in_order() {
        let conversation = PromptBuilder::new(PromptConfig::default()).build(&info(), &bundle());
        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::User, Role::User]);
        assert!(conversation.messages()[3].content.starts_with("All code changes"));
    }

    #[test]
    fn diff_message_holds_listing_blank_line_and_body() {
        let conversation = PromptBuilder::new(PromptConfig::default()).build(&info(), &bundle());
        let diff_message = &conversation.messages()[2].content;
        assert!(diff_message.contains("M\tfile.py\n\n@@ -1,2 +1,3 @@"));
    }

    #[test]
    fn description_includes_title_and_empty_description() {
        let conversation = PromptBuilder::new(PromptConfig::default()).build(&info(), &bundle());
        let description = &conversation.messages()[1].content;
        assert!(description.contains("Title: Add retry to uploader"));
        assert!(description.ends_with("Description: "));
    }

    #[test]
    fn empty_diff_still_yields_four_messages() {
        let conversation =
            PromptBuilder::new(PromptConfig::default()).build(&info(), &DiffBundle::default());
        assert_eq!(conversation.len(), 4);
    }

    #[test]
    fn custom_system_prompt_is_used() {
        let config = PromptConfig {
            system_prompt: "Be terse.".to_string(),
            ..PromptConfig::default()
        };
        let conversation = PromptBuilder::new(config).build(&info(), &bundle());
        assert_eq!(conversation.messages()[0].content, "Be terse.");
    }

    #[test]
    fn placeholders_inside_the_title_are_left_alone() {
        let info = PullRequestInfo {
            title: "Render {description} field".to_string(),
            description: "SECRET BODY".to_string(),
            link: "http://stash/pr/1".to_string(),
        };
        let conversation = PromptBuilder::new(PromptConfig::default()).build(&info, &bundle());
        let description = &conversation.messages()[1].content;
        assert!(description.contains("Title: Render {description} field\n"));
        assert_eq!(description.matches("SECRET BODY").count(), 1);
    }

    #[test]
    fn diff_text_with_braces_is_kept_verbatim() {
        let bundle = DiffBundle {
            name_status: Vec::new(),
            body: "+let s = \"{title} {diff}\";\n".to_string(),
        };
        let conversation = PromptBuilder::new(PromptConfig::default()).build(&info(), &bundle);
        assert!(conversation.messages()[2]
            .content
            .ends_with("+let s = \"{title} {diff}\";\n"));
    }

    #[test]
    fn fill_template_keeps_unknown_braces() {
        assert_eq!(
            fill_template("{a} {b} {", &[("{a}", "x{b}")]),
            "x{b} {b} {"
        );
    }
}
