//! Prompt templates for the three agent requests.

use autodev_core::{ChangeSet, FileChange};

const OUTPUT_FORMAT: &str = r#"Return only a JSON array of objects, each shaped:
[
  { "filePath": "/path/to/file", "content": "full file content..." },
  ...
]
Do not wrap the array in any other object and do not add markdown or commentary."#;

fn render_files(files: &[FileChange]) -> String {
    files
        .iter()
        .map(|f| {
            format!(
                "File: {path}\nContent:\n{content}\nEND of {path}\n",
                path = f.path,
                content = f.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The repository is empty or has no buildable project: ask for a minimal
/// bootstrap plus the requested feature.
pub(crate) fn bootstrap(story_text: &str) -> String {
    format!(
        "The target repository is empty or has no valid buildable project.\n\n\
         Create the minimal project structure for a small, production-quality service, \
         including its build configuration, then implement the work item below on top of it. \
         Include basic tests and make sure the project builds and its tests pass. \
         Keep the code minimal: no empty methods, no generic placeholder examples.\n\n\
         Work item:\n{story_text}\n\n\
         {OUTPUT_FORMAT}"
    )
}

/// The repository already holds a project: ask for the smallest change that
/// implements the work item.
pub(crate) fn feature(story_text: &str, existing_files: &[FileChange]) -> String {
    format!(
        "You are changing a system that is already in use. The current repository \
         content follows.\n\n{files}\n\
         Implement only what the work item below requires.\n\
         Rules:\n\
         - Do not rewrite whole files unnecessarily; modify existing files only when essential.\n\
         - Create new files where needed, keeping the current organization.\n\
         - Add or adjust tests for the new behavior.\n\n\
         Work item:\n{story_text}\n\n\
         {OUTPUT_FORMAT}",
        files = render_files(existing_files)
    )
}

/// A build of the prior change set failed: ask for a corrective change set,
/// preceded by a short explanation of the fix.
pub(crate) fn fix(
    diagnostic_summary: &str,
    prior_change_set: &ChangeSet,
    current_branch_files: &[FileChange],
) -> String {
    format!(
        "The last build of the change below failed in the pipeline.\n\n\
         BUILD ERROR LOG:\n{diagnostic_summary}\n\n\
         CHANGE SET THAT WAS BUILT:\n{prior}\n\
         CURRENT FILES ON THE BRANCH:\n{current}\n\
         Instructions:\n\
         - Fix only the errors present in the log above; do not add unrelated code.\n\
         - When changing a file, merge your fix into its current branch content shown above.\n\
         - Avoid creating or deleting files unless an error explicitly requires it.\n\
         - If a previous fix did not work, consider undoing it and taking another approach.\n\n\
         Before the JSON, explain each fix in at most three lines, naming the corrected file(s). \
         Then return the corrected files.\n\n\
         {OUTPUT_FORMAT}",
        prior = render_files(prior_change_set.files()),
        current = render_files(current_branch_files)
    )
}
