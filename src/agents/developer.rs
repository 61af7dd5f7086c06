//! File-generation pipeline
//!
//! Generates a small static web project (HTML, CSS, JavaScript) with three
//! sequential LLM calls, each seeded with the files produced before it, and
//! reports the result as a file browser listing.

use crate::{
    llm::LLMClient,
    research::{
        events::{EventSink, EventStream, StreamClosed, spawn_stream},
        stage::{RunAbort, StageOutcome, ToolInvocation},
    },
    types::AppError,
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

const HTML_SYSTEM_PROMPT: &str = "You are a professional front-end engineer. \
Write a complete, semantic HTML5 document for the project described by the user. \
Link the stylesheet as style.css and the script as script.js. \
Reply with the HTML only, without explanations.";

const CSS_SYSTEM_PROMPT: &str = "You are a professional CSS engineer. \
Write a modern, responsive stylesheet for the HTML document provided. \
Reply with the CSS only, without explanations.";

const JS_SYSTEM_PROMPT: &str = "You are a professional JavaScript engineer. \
Write the interaction logic for the page provided, using plain JavaScript without frameworks. \
Reply with the JavaScript only, without explanations.";

const FALLBACK_CSS: &str =
    "/* Stylesheet generation failed, using basic styles */\nbody { font-family: Arial, sans-serif; }\n";
const FALLBACK_JS: &str = "// Script generation failed\nconsole.log('Page loaded');\n";

/// One generated project file.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub id: &'static str,
    pub name: &'static str,
    pub extension: &'static str,
    pub content: String,
}

impl GeneratedFile {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "path": self.name,
            "type": "file",
            "content": self.content,
            "modified": Utc::now().to_rfc3339(),
            "extension": self.extension,
            "isReadOnly": false,
        })
    }
}

/// Strip a surrounding Markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // Drop the info string (e.g. ```html) on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

/// Generates HTML, CSS and JavaScript files for a project description.
pub struct GenerationPipeline {
    llm: Arc<dyn LLMClient>,
    event_buffer: usize,
}

impl GenerationPipeline {
    pub fn new(llm: Arc<dyn LLMClient>, event_buffer: usize) -> Self {
        Self { llm, event_buffer }
    }

    /// Start a run on its own task and return its event stream.
    pub fn start(self: Arc<Self>, query: impl Into<String>, session_id: impl Into<String>) -> EventStream {
        let query = query.into();
        let session_id = session_id.into();
        let span = info_span!(
            "generation_run",
            run_id = %Uuid::new_v4(),
            session_id = %session_id,
            pipeline = "generation"
        );

        spawn_stream(self.event_buffer, move |sink| {
            async move {
                match self.drive(&sink, &query, &session_id).await {
                    Ok(()) => info!("Generation completed"),
                    Err(RunAbort::Closed(_)) => info!("Generation cancelled by consumer"),
                    Err(RunAbort::Failed(err)) => info!(code = err.code(), "Generation failed"),
                }
            }
            .instrument(span)
        })
    }

    pub async fn drive(&self, sink: &EventSink, query: &str, session_id: &str) -> Result<(), RunAbort> {
        info!(query = %query, "Generation run started");

        let invocation = ToolInvocation::open(sink, "generate_html", "Generating index.html").await?;
        let html = match self.llm.generate_with_system(HTML_SYSTEM_PROMPT, query).await {
            Ok(raw) => strip_code_fences(&raw),
            Err(err) => {
                let err = AppError::Generation(format!("HTML generation failed: {}", err));
                invocation.fail_run(sink, &err).await?;
                return Err(RunAbort::Failed(err));
            }
        };
        let html = GeneratedFile {
            id: "1",
            name: "index.html",
            extension: "html",
            content: html,
        };
        invocation
            .finish(sink, &file_outcome(&html, "index.html generated"))
            .await?;

        let css_prompt = format!("Project: {}\n\nHTML:\n{}", query, html.content);
        let css = self
            .generate_with_fallback(
                sink,
                "generate_css",
                "Generating style.css",
                CSS_SYSTEM_PROMPT,
                &css_prompt,
                ("2", "style.css", "css"),
                FALLBACK_CSS,
            )
            .await?;

        let js_prompt = format!(
            "Project: {}\n\nHTML:\n{}\n\nCSS:\n{}",
            query, html.content, css.content
        );
        let js = self
            .generate_with_fallback(
                sink,
                "generate_js",
                "Generating script.js",
                JS_SYSTEM_PROMPT,
                &js_prompt,
                ("3", "script.js", "js"),
                FALLBACK_JS,
            )
            .await?;

        let files = [html, css, js];
        let invocation = ToolInvocation::open(sink, "file_browser", "Preparing the project preview").await?;
        let metadata = json!({
            "fileSystemData": {
                "files": files.iter().map(GeneratedFile::to_json).collect::<Vec<_>>(),
                "selectedPath": "index.html",
            },
            "activeFile": "index.html",
            "projectInfo": {
                "name": "Generated Project",
                "description": query,
                "createdAt": Utc::now().to_rfc3339(),
                "totalFiles": files.len(),
            },
        });
        invocation
            .finish(
                sink,
                &StageOutcome::success(())
                    .with_result("Project files ready")
                    .with_metadata(metadata),
            )
            .await?;

        let message_id = format!("msg_{}", Uuid::new_v4().simple());
        let summary = completion_message(&files);
        sink.text_chunk(&message_id, summary.as_str()).await?;
        sink.message_complete(&message_id, summary.as_str()).await?;
        sink.pipeline_end(session_id).await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn generate_with_fallback(
        &self,
        sink: &EventSink,
        stage: &str,
        message: &str,
        system: &str,
        prompt: &str,
        (id, name, extension): (&'static str, &'static str, &'static str),
        fallback: &str,
    ) -> Result<GeneratedFile, StreamClosed> {
        let invocation = ToolInvocation::open(sink, stage, message).await?;

        let (file, outcome) = match self.llm.generate_with_system(system, prompt).await {
            Ok(raw) => {
                let file = GeneratedFile {
                    id,
                    name,
                    extension,
                    content: strip_code_fences(&raw),
                };
                let outcome = file_outcome(&file, &format!("{} generated", name));
                (file, outcome)
            }
            Err(err) => {
                warn!(stage, error = %err, "Generation failed, using fallback file");
                let file = GeneratedFile {
                    id,
                    name,
                    extension,
                    content: fallback.to_string(),
                };
                let outcome = StageOutcome::degraded((), err.to_string())
                    .with_result(format!("{} replaced by a placeholder", name))
                    .with_metadata(json!({ "file": file.to_json(), "fallback": true }));
                (file, outcome)
            }
        };

        invocation.finish(sink, &outcome).await?;
        Ok(file)
    }
}

fn file_outcome(file: &GeneratedFile, result: &str) -> StageOutcome<()> {
    StageOutcome::success(())
        .with_result(result)
        .with_metadata(json!({ "file": file.to_json() }))
}

fn completion_message(files: &[GeneratedFile]) -> String {
    let mut message = String::from("**Project generated**\n\n");
    for file in files {
        message.push_str(&format!(
            "- **{}** ({} lines)\n",
            file.name,
            file.content.lines().count()
        ));
    }
    message.push_str("\nOpen the file browser to review, preview and edit the generated code.");
    message
}
