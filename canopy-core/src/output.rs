//! Output descriptions.
//!
//! Evaluating an instance produces an [`Output`]: a small serializable tree
//! the rendering host turns into whatever it draws. Child instances appear
//! as `Child` placeholders; [`Runtime::render_tree`](crate::reactive::Runtime::render_tree)
//! splices in each child's latest output.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::graph::InstanceId;

/// Output of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    /// Renders nothing.
    Empty,

    Text {
        text: String,
    },

    Element {
        tag: String,
        #[serde(skip_serializing_if = "IndexMap::is_empty")]
        attrs: IndexMap<String, String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<Output>,
    },

    /// Several siblings without a wrapper.
    Fragment {
        children: Vec<Output>,
    },

    /// Placeholder for a child instance's output.
    Child {
        instance: InstanceId,
    },
}

impl Output {
    pub fn text(text: impl Into<String>) -> Self {
        Output::Text { text: text.into() }
    }

    /// Start an element with no attributes or children.
    pub fn element(tag: impl Into<String>) -> Self {
        Output::Element {
            tag: tag.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn fragment(children: impl IntoIterator<Item = Output>) -> Self {
        Output::Fragment {
            children: children.into_iter().collect(),
        }
    }

    pub fn child(instance: InstanceId) -> Self {
        Output::Child { instance }
    }

    /// Add an attribute. No-op on anything but an element.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Output::Element { attrs, .. } = &mut self {
            attrs.insert(name.into(), value.into());
        }
        self
    }

    /// Append a child output. No-op on leaves.
    pub fn with(mut self, child: Output) -> Self {
        match &mut self {
            Output::Element { children, .. } | Output::Fragment { children } => children.push(child),
            _ => {}
        }
        self
    }

    /// Append several children.
    pub fn with_all(self, children: impl IntoIterator<Item = Output>) -> Self {
        children.into_iter().fold(self, Output::with)
    }

    /// Concatenated text of the whole tree, depth first.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Output::Text { text } => out.push_str(text),
            Output::Element { children, .. } | Output::Fragment { children } => {
                for child in children {
                    child.collect_text(out);
                }
            }
            Output::Empty | Output::Child { .. } => {}
        }
    }

    /// Replace every `Child` placeholder using `lookup`.
    ///
    /// Placeholders for which `lookup` returns `None` become `Empty`, as do
    /// placeholders naming an instance already being expanded on the current
    /// path.
    pub fn expand(&self, lookup: &mut impl FnMut(InstanceId) -> Option<Output>) -> Output {
        self.expand_within(lookup, &mut Vec::new())
    }

    fn expand_within(
        &self,
        lookup: &mut impl FnMut(InstanceId) -> Option<Output>,
        path: &mut Vec<InstanceId>,
    ) -> Output {
        match self {
            Output::Child { instance } => {
                if path.contains(instance) {
                    return Output::Empty;
                }
                let Some(output) = lookup(*instance) else {
                    return Output::Empty;
                };
                path.push(*instance);
                let expanded = output.expand_within(lookup, path);
                path.pop();
                expanded
            }
            Output::Element {
                tag,
                attrs,
                children,
            } => Output::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                children: children.iter().map(|c| c.expand_within(lookup, path)).collect(),
            },
            Output::Fragment { children } => Output::Fragment {
                children: children.iter().map(|c| c.expand_within(lookup, path)).collect(),
            },
            leaf => leaf.clone(),
        }
    }

    /// Serialize to JSON for the host.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(CoreError::Serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_nests_children() {
        let output = Output::element("div")
            .attr("class", "card")
            .with(Output::element("h1").with(Output::text("Person Information")))
            .with(Output::element("p").with(Output::text("Name: Unknown")));

        assert_eq!(output.text_content(), "Person InformationName: Unknown");
    }

    #[test]
    fn attr_on_text_is_ignored() {
        assert_eq!(Output::text("x").attr("id", "y"), Output::text("x"));
    }

    #[test]
    fn expand_splices_children() {
        let child = InstanceId::new();
        let missing = InstanceId::new();
        let output = Output::element("ol").with_all([Output::child(child), Output::child(missing)]);

        let expanded = output.expand(&mut |id| {
            (id == child).then(|| Output::element("li").with(Output::text("Apple")))
        });

        assert_eq!(
            expanded,
            Output::element("ol").with_all([
                Output::element("li").with(Output::text("Apple")),
                Output::Empty,
            ])
        );
    }

    #[test]
    fn expand_stops_at_placeholders_that_point_back_up() {
        let root = InstanceId::new();
        let child = InstanceId::new();
        let outputs: IndexMap<InstanceId, Output> = IndexMap::from([
            (root, Output::element("div").with(Output::child(child))),
            (child, Output::element("span").with_all([Output::text("leaf"), Output::child(root)])),
        ]);

        let expanded = Output::child(root).expand(&mut |id| outputs.get(&id).cloned());

        assert_eq!(
            expanded,
            Output::element("div").with(
                Output::element("span").with_all([Output::text("leaf"), Output::Empty])
            )
        );
    }

    #[test]
    fn expand_allows_the_same_instance_in_sibling_positions() {
        let shared = InstanceId::new();
        let output = Output::fragment([Output::child(shared), Output::child(shared)]);

        let expanded = output.expand(&mut |id| (id == shared).then(|| Output::text("x")));

        assert_eq!(expanded.text_content(), "xx");
    }

    #[test]
    fn serializes_with_type_tags() {
        let output = Output::element("p").with(Output::text("hi"));
        assert_eq!(
            output.to_json().unwrap(),
            serde_json::json!({
                "type": "element",
                "tag": "p",
                "children": [{"type": "text", "text": "hi"}]
            })
        );
    }
}
