//! Types produced by the line parser and consumed by the execution engine.

/// One command invocation within a `|`-chained pipeline.
///
/// Stages form a singly linked chain through `next`: the output of this
/// stage becomes the input of the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStage {
    /// Command name (first word).
    pub name: String,
    /// Remaining words, quotes removed and escapes resolved.
    pub args: Vec<String>,
    /// The stage this one feeds, if any.
    pub next: Option<Box<PipelineStage>>,
}

impl PipelineStage {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
            next: None,
        }
    }

    /// Build a chain from stages in execution order. Returns `None` for an
    /// empty input.
    pub fn chain(stages: Vec<PipelineStage>) -> Option<Self> {
        stages.into_iter().rev().fold(None, |next, mut stage| {
            stage.next = next.map(Box::new);
            Some(stage)
        })
    }

    /// Iterate over this stage and every stage after it.
    pub fn iter(&self) -> Stages<'_> {
        Stages { cur: Some(self) }
    }

    /// Number of stages in the chain starting here. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.iter().count()
    }
}

/// Iterator over a stage chain.
pub struct Stages<'a> {
    cur: Option<&'a PipelineStage>,
}

impl<'a> Iterator for Stages<'a> {
    type Item = &'a PipelineStage;

    fn next(&mut self) -> Option<Self::Item> {
        let stage = self.cur?;
        self.cur = stage.next.as_deref();
        Some(stage)
    }
}

/// Result of parsing one input: an optional redirect target plus the
/// `;`-separated command groups in order, each the head of a stage chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    pub redirect: Option<String>,
    pub groups: Vec<PipelineStage>,
}

impl ParseResult {
    /// True when the input held no commands (blank or comment-only).
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
