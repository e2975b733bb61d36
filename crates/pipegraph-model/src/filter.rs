//! Step selection by name prefix and labels

use pipegraph_core::FilterConfig;

use crate::graph::{GraphData, Label, MetaStep, PipelineStep, TransformStep};

/// Selects transforms by name prefix and required labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepFilter {
    /// Required name prefix (empty matches everything)
    pub name_prefix: String,

    /// Labels a step must carry, all of them
    pub labels: Vec<Label>,
}

impl StepFilter {
    /// Filter keeping every step
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[filter]` config section
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            name_prefix: config.name_prefix.clone(),
            labels: config.labels.clone(),
        }
    }

    /// Require a name prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Require a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// True when the filter keeps every step
    pub fn is_empty(&self) -> bool {
        self.name_prefix.is_empty() && self.labels.is_empty()
    }

    /// Check a single transform
    pub fn matches(&self, step: &TransformStep) -> bool {
        self.labels.iter().all(|(k, v)| step.has_label(k, v))
            && step.name.starts_with(&self.name_prefix)
    }

    /// Copy of `graph` with non-matching transforms removed
    ///
    /// Catalogs are left untouched at every level, so a meta step with a
    /// nested catalog survives even when none of its steps do. Only a meta
    /// step left with no tables and no steps is dropped.
    pub fn apply(&self, graph: &GraphData) -> GraphData {
        if self.is_empty() {
            return graph.clone();
        }

        let pipeline = graph
            .pipeline
            .iter()
            .filter_map(|step| match step {
                PipelineStep::Transform(transform) => self
                    .matches(transform)
                    .then(|| step.clone()),
                PipelineStep::Meta(meta) => {
                    let nested = self.apply(&meta.graph);
                    (!nested.is_empty()).then(|| {
                        PipelineStep::Meta(MetaStep {
                            name: meta.name.clone(),
                            id: meta.id.clone(),
                            graph: nested,
                        })
                    })
                }
            })
            .collect();

        GraphData {
            catalog: graph.catalog.clone(),
            pipeline,
        }
    }
}
