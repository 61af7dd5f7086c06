use crate::utils::toml_config::PipelinesConfig;
use serde::{Deserialize, Serialize};

/// Keywords that route a query to the generation pipeline
const GENERATION_KEYWORDS: &[&str] = &[
    "生成", "创建", "开发", "网页", "html", "css", "javascript", "js", "前端", "页面", "项目", "代码",
    "编程", "generate", "create", "develop", "webpage", "frontend", "project", "code",
];

/// Keywords that route a query to the research pipeline
const RESEARCH_KEYWORDS: &[&str] = &[
    "搜索", "查找", "了解", "研究", "信息", "资料", "search", "find", "research", "information",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Research,
    Generation,
}

impl PipelineKind {
    /// Parse a pipeline name, accepting the historical agent aliases
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "research" | "deepresearch" | "deep_research" => Some(PipelineKind::Research),
            "generation" | "ai_developer" | "aideveloper" | "developer" => {
                Some(PipelineKind::Generation)
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::Research => "research",
            PipelineKind::Generation => "generation",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the pipeline for a query using the built-in keyword lists.
///
/// An explicit, recognized override wins. Otherwise generation keywords are
/// checked before research keywords, and research is the default.
pub fn select(query: &str, override_name: Option<&str>) -> PipelineKind {
    PipelineSelector::default().select(query, override_name)
}

/// Stateless research-vs-generation dispatch, extensible from config.
#[derive(Debug, Clone)]
pub struct PipelineSelector {
    generation_keywords: Vec<String>,
    research_keywords: Vec<String>,
    default: PipelineKind,
}

impl Default for PipelineSelector {
    fn default() -> Self {
        Self {
            generation_keywords: GENERATION_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            research_keywords: RESEARCH_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            default: PipelineKind::Research,
        }
    }
}

impl PipelineSelector {
    /// Built-in keywords plus any extras from `[pipelines]`.
    pub fn from_config(config: &PipelinesConfig) -> Self {
        let mut selector = Self::default();
        selector.generation_keywords.extend(
            config
                .generation_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        selector.research_keywords.extend(
            config
                .research_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        if let Some(default) = PipelineKind::parse(&config.default) {
            selector.default = default;
        }
        selector
    }

    pub fn select(&self, query: &str, override_name: Option<&str>) -> PipelineKind {
        if let Some(name) = override_name.filter(|n| !n.trim().is_empty()) {
            match PipelineKind::parse(name) {
                Some(kind) => return kind,
                None => tracing::warn!("Ignoring unknown pipeline override '{}'", name),
            }
        }

        let query = query.to_lowercase();

        if self.generation_keywords.iter().any(|k| query.contains(k.as_str())) {
            return PipelineKind::Generation;
        }

        if self.research_keywords.iter().any(|k| query.contains(k.as_str())) {
            return PipelineKind::Research;
        }

        self.default
    }
}
