//! Workspace file abilities.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::ability::{string_argument, Ability, AbilityInit, AbilityOutput};
use crate::context::Context;
use crate::error::{PilotError, PilotResult};
use crate::types::{ContentItem, Message};
use crate::workspace::Workspace;

/// Reads a text file from the workspace.
pub struct ReadFile {
    name: String,
    description: String,
    workspace: Arc<dyn Workspace>,
}

impl ReadFile {
    pub const DESCRIPTION: &'static str = "Read and return the contents of a file in the workspace.";

    pub fn from_init(init: AbilityInit) -> PilotResult<Self> {
        Ok(Self {
            workspace: init.require_workspace()?,
            description: init.description_or(Self::DESCRIPTION),
            name: init.name,
        })
    }
}

#[async_trait]
impl Ability for ReadFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn arguments(&self) -> serde_json::Value {
        json!({
            "filename": {
                "type": "string",
                "description": "Path of the file to read, relative to the workspace root."
            }
        })
    }

    fn required_arguments(&self) -> Vec<String> {
        vec!["filename".into()]
    }

    async fn invoke(&self, arguments: serde_json::Value) -> PilotResult<AbilityOutput> {
        let filename = string_argument(&self.name, &arguments, "filename")?;
        match self.workspace.read_text(filename).await {
            Ok(contents) => {
                debug!(file = %filename, bytes = contents.len(), "read workspace file");
                let mut result = Context::new();
                result.add_message(
                    Message::ability("")
                        .with_item(ContentItem::file(filename))
                        .with_item(ContentItem::text(contents)),
                );
                Ok(AbilityOutput::success(format!("Read {filename}"), result))
            }
            // A missing file is something the model can react to
            Err(PilotError::Io(e)) => Ok(AbilityOutput::failure(format!(
                "Could not read {filename}: {e}"
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Writes a text file into the workspace, creating parent directories.
pub struct WriteFile {
    name: String,
    description: String,
    workspace: Arc<dyn Workspace>,
}

impl WriteFile {
    pub const DESCRIPTION: &'static str = "Write text to a file in the workspace, replacing any existing contents.";

    pub fn from_init(init: AbilityInit) -> PilotResult<Self> {
        Ok(Self {
            workspace: init.require_workspace()?,
            description: init.description_or(Self::DESCRIPTION),
            name: init.name,
        })
    }
}

#[async_trait]
impl Ability for WriteFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn arguments(&self) -> serde_json::Value {
        json!({
            "filename": {
                "type": "string",
                "description": "Path of the file to write, relative to the workspace root."
            },
            "contents": {
                "type": "string",
                "description": "Text to write."
            }
        })
    }

    fn required_arguments(&self) -> Vec<String> {
        vec!["filename".into(), "contents".into()]
    }

    async fn invoke(&self, arguments: serde_json::Value) -> PilotResult<AbilityOutput> {
        let filename = string_argument(&self.name, &arguments, "filename")?;
        let contents = string_argument(&self.name, &arguments, "contents")?;
        self.workspace.write_text(filename, contents).await?;
        debug!(file = %filename, bytes = contents.len(), "wrote workspace file");

        let mut result = Context::new();
        result.add_message(Message::ability("").with_item(ContentItem::File {
            path: filename.to_string(),
            description: Some(format!("{} bytes written", contents.len())),
        }));
        Ok(AbilityOutput::success(format!("Wrote {filename}"), result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::{result_text, AbilityConfiguration, AbilityKind};
    use crate::workspace::MemoryWorkspace;

    fn init(name: &str, kind: AbilityKind, workspace: Arc<MemoryWorkspace>) -> AbilityInit {
        AbilityInit {
            name: name.into(),
            configuration: AbilityConfiguration::new(kind).with_workspace(),
            language_model: None,
            memory: None,
            workspace: Some(workspace),
        }
    }

    #[tokio::test]
    async fn write_then_read() {
        let ws = Arc::new(MemoryWorkspace::new());
        let write = WriteFile::from_init(init("write_file", AbilityKind::WriteFile, ws.clone())).unwrap();
        let read = ReadFile::from_init(init("read_file", AbilityKind::ReadFile, ws.clone())).unwrap();

        let output = write
            .invoke(json!({"filename": "out/summary.md", "contents": "X in brief"}))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.message, "Wrote out/summary.md");

        let output = read.invoke(json!({"filename": "out/summary.md"})).await.unwrap();
        assert!(output.success);
        assert_eq!(result_text(&output.result), "X in brief");
        assert_eq!(output.result.items().count(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_reported_not_raised() {
        let ws = Arc::new(MemoryWorkspace::new());
        let read = ReadFile::from_init(init("read_file", AbilityKind::ReadFile, ws)).unwrap();
        let output = read.invoke(json!({"filename": "absent.txt"})).await.unwrap();
        assert!(!output.success);
        assert!(output.message.contains("absent.txt"));
    }

    #[tokio::test]
    async fn escaping_path_is_an_error() {
        let ws = Arc::new(MemoryWorkspace::new());
        let read = ReadFile::from_init(init("read_file", AbilityKind::ReadFile, ws)).unwrap();
        let err = read.invoke(json!({"filename": "../../etc/passwd"})).await.unwrap_err();
        assert!(matches!(err, PilotError::WorkspacePath(_)));
    }

    #[tokio::test]
    async fn write_requires_contents() {
        let ws = Arc::new(MemoryWorkspace::new());
        let write = WriteFile::from_init(init("write_file", AbilityKind::WriteFile, ws)).unwrap();
        let err = write.invoke(json!({"filename": "a.txt"})).await.unwrap_err();
        assert!(matches!(err, PilotError::InvalidArguments { .. }));
    }

    #[test]
    fn requires_workspace() {
        let init = AbilityInit {
            name: "read_file".into(),
            configuration: AbilityConfiguration::new(AbilityKind::ReadFile),
            language_model: None,
            memory: None,
            workspace: None,
        };
        assert!(matches!(
            ReadFile::from_init(init),
            Err(PilotError::ResourceUnavailable { .. })
        ));
    }
}
