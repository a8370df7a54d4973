use crate::models::{ChatMessage, ChatRequest, Role};
use crate::schema::schema_json;

const SCHEMA_PLACEHOLDER: &str = "{schema_json}";

const SYSTEM_PROMPT: &str = "You are the code-generation backend of an IDE (CodeOps Agent).

Output ONLY a single JSON object: no Markdown, no code fences, no explanation. It must conform strictly to the JSON Schema below.
The object must contain the fields: reply, code_tree, ops.

Mandatory rules:
1) Output JSON only (one object). No prose, prefixes, suffixes, Markdown, comments or stray characters.
2) ops may only contain these operations:
   - create_dir: create a directory (language/content must be null)
   - create_file: create a file, overwriting if present (language is the file language, content is the full file content)
   - update_file: update a file by overwriting it (language is the file language, content is the full file content)
   - delete_path: delete a file or directory (language/content must be null)
3) Every path is relative to project_root (or the workspace root), uses forward slashes /, never contains .., and is never absolute.
4) code_tree reflects the final file tree as plain text, using \\n line breaks and two-space indentation.
5) reply is one very short status sentence (no implementation details).

JSON Schema:
{schema_json}

Produce executable code and file contents only; no explanations.";

pub const PATH_SAFETY_REMINDER: &str =
  "Note: every ops.path must be relative to project_root (or the workspace root), use /, and never contain .. or be absolute.";

pub fn system_prompt() -> String {
  SYSTEM_PROMPT.replace(SCHEMA_PLACEHOLDER, &schema_json())
}

fn workspace_hint(project_root: &str) -> String {
  format!("workspace_hint:\nproject_root={project_root}\n\n{PATH_SAFETY_REMINDER}\nOutput JSON only.\n")
}

pub fn compose(req: &ChatRequest) -> Vec<ChatMessage> {
  let mut messages = Vec::with_capacity(req.messages.len() + 2);
  messages.push(ChatMessage::new(Role::System, system_prompt()));
  messages.extend(req.messages.iter().map(ChatMessage::from));

  // The root is context for the model only; nothing here resolves it on disk.
  if let Some(root) = req.project_root.as_deref().filter(|r| !r.is_empty()) {
    messages.push(ChatMessage::new(Role::User, workspace_hint(root)));
  }

  messages
}
