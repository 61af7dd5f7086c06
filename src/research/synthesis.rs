//! Synthesis prompt construction and token stream consumption

use crate::llm::TokenStream;
use crate::research::events::{EventSink, StreamClosed};
use crate::types::{AppError, PageContent, Result, SearchHit};
use futures::StreamExt;
use std::fmt::Write;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const SYSTEM_PROMPT: &str = r#"You are a professional research analyst who extracts the key information from several sources and turns it into a comprehensive analysis.

Using the search results and page contents provided, write a structured research report with these sections:

1. **Executive Summary** - a concise overview of the main findings
2. **Source Assessment** - reliability and relevance of each source
3. **Key Findings** - evidence-based findings citing specific sources
4. **Cross-Validation** - where sources agree and where they differ
5. **Insights** - analysis and inferences grounded in the data
6. **Conclusions and Recommendations** - overall conclusions and directions for further research
7. **References** - every source used

Requirements:
- Use Markdown with a clear structure
- Stick to facts and avoid speculation
- Cite specific sources to support each claim
- Keep the language professional but easy to follow
- State clearly when information is missing or contradictory
- Stay objective and neutral"#;

/// Notice appended when the generator stops producing tokens.
pub const IDLE_TIMEOUT_NOTICE: &str =
    "\n\n> **Note:** the response was cut short because generation stalled. The report above may be incomplete.";

/// Limits applied while building the synthesis context.
#[derive(Debug, Clone, Copy)]
pub struct PromptLimits {
    pub max_results: usize,
    pub max_sources: usize,
    pub excerpt_chars: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_results: 5,
            max_sources: 3,
            excerpt_chars: 1500,
        }
    }
}

/// Build the user prompt from the query, search results and fetched pages.
pub fn build_context(
    query: &str,
    results: &[SearchHit],
    sources: &[&PageContent],
    attempted: usize,
    limits: PromptLimits,
) -> String {
    let mut context = String::new();

    let _ = writeln!(
        context,
        "Write a detailed research report for the user query using the information below.\n"
    );
    let _ = writeln!(context, "## User Query\n{}\n", query);
    let _ = writeln!(context, "## Search Results ({} results)", results.len());

    for (i, hit) in results.iter().take(limits.max_results).enumerate() {
        let _ = writeln!(
            context,
            "\n### Result {}: {}\n- **URL**: {}\n- **Summary**: {}\n- **Source**: {}",
            i + 1,
            hit.title,
            hit.url,
            hit.summary,
            hit.source_domain
        );
    }

    let _ = writeln!(context, "\n## Page Content ({} pages attempted)", attempted);

    if sources.is_empty() {
        let _ = writeln!(
            context,
            "\nNo page content could be retrieved. Base the report on the search result \
             summaries above and say that the sources could not be read in full."
        );
        return context;
    }

    for (i, page) in sources.iter().take(limits.max_sources).enumerate() {
        let _ = writeln!(
            context,
            "\n### Source {}: {}\n- **URL**: {}",
            i + 1,
            page.title,
            page.url
        );
        if !page.summary.is_empty() {
            let _ = writeln!(context, "- **Summary**: {}", page.summary);
        }
        if let Some(author) = &page.metadata.author {
            let _ = writeln!(context, "- **Author**: {}", author);
        }
        if let Some(date) = &page.metadata.publish_date {
            let _ = writeln!(context, "- **Published**: {}", date);
        }
        if let Some(description) = &page.metadata.description {
            let _ = writeln!(context, "- **Description**: {}", description);
        }
        if !page.content.is_empty() {
            let excerpt: String = page.content.chars().take(limits.excerpt_chars).collect();
            let _ = writeln!(context, "- **Excerpt**: {}...", excerpt);
        }
    }

    context
}

/// Notice appended when the generator fails.
pub fn failure_notice(err: &AppError) -> String {
    format!(
        "\n\n> **Report generation failed:** {}\n\nPlease try again later.",
        err
    )
}

/// A closed message and, if generation did not finish cleanly, the cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    pub content: String,
    pub failure: Option<String>,
}

impl ConsumedMessage {
    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

/// How the upstream stopped producing tokens.
enum StreamEnd {
    Finished,
    Failed(AppError),
    Stalled,
}

/// Forwards generated tokens as `text_chunk`s and closes the message.
#[derive(Debug, Clone, Copy)]
pub struct TokenStreamConsumer {
    idle_timeout: Duration,
}

impl TokenStreamConsumer {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }

    /// Open the upstream with `open` and drain it into the sink under
    /// `message_id`.
    ///
    /// Opening the stream and every following token share the idle timeout.
    /// Always ends with exactly one `message_complete` carrying the full
    /// concatenation of the chunks sent. A stalled or failing generator is
    /// reported by a final notice chunk and in [`ConsumedMessage::failure`].
    pub async fn consume<F>(
        &self,
        open: F,
        sink: &EventSink,
        message_id: &str,
    ) -> std::result::Result<ConsumedMessage, StreamClosed>
    where
        F: Future<Output = Result<TokenStream>>,
    {
        let mut full = String::new();

        let end = match tokio::time::timeout(self.idle_timeout, open).await {
            Ok(Ok(mut tokens)) => self.forward(&mut tokens, sink, message_id, &mut full).await?,
            Ok(Err(err)) => {
                warn!(message_id, error = %err, "Generation could not start");
                StreamEnd::Failed(err)
            }
            Err(_) => StreamEnd::Stalled,
        };

        let failure = match end {
            StreamEnd::Finished => None,
            StreamEnd::Failed(err) => {
                let notice = failure_notice(&err);
                sink.text_chunk(message_id, notice.as_str()).await?;
                full.push_str(&notice);
                Some(err.to_string())
            }
            StreamEnd::Stalled => {
                let secs = self.idle_timeout.as_secs();
                warn!(message_id, timeout_secs = secs, "Generation stalled");
                sink.text_chunk(message_id, IDLE_TIMEOUT_NOTICE).await?;
                full.push_str(IDLE_TIMEOUT_NOTICE);
                Some(format!("no output from the model for {}s", secs))
            }
        };

        sink.message_complete(message_id, full.as_str()).await?;
        Ok(ConsumedMessage {
            content: full,
            failure,
        })
    }

    async fn forward(
        &self,
        tokens: &mut TokenStream,
        sink: &EventSink,
        message_id: &str,
        full: &mut String,
    ) -> std::result::Result<StreamEnd, StreamClosed> {
        loop {
            match tokio::time::timeout(self.idle_timeout, tokens.next()).await {
                Ok(Some(Ok(token))) => {
                    if token.is_empty() {
                        continue;
                    }
                    debug!(message_id, len = token.len(), "Token chunk");
                    sink.text_chunk(message_id, token.as_str()).await?;
                    full.push_str(&token);
                }
                Ok(Some(Err(err))) => {
                    warn!(message_id, error = %err, "Generation failed mid-stream");
                    return Ok(StreamEnd::Failed(err));
                }
                Ok(None) => return Ok(StreamEnd::Finished),
                Err(_) => return Ok(StreamEnd::Stalled),
            }
        }
    }
}
