use log::debug;
use wasm_bindgen::JsCast;

use crate::collaborators::LayoutBatch;
use crate::registry::{ComponentContext, ComponentRegistry};
use crate::{PaneConfig, PaneError, dom};

struct Parsed {
    name: String,
    content: web_sys::DocumentFragment,
}

/// Swaps fragment markup into the live document.
#[derive(Debug)]
pub struct FragmentReplacer<'a> {
    document: &'a web_sys::Document,
    config: &'a PaneConfig,
    registry: &'a ComponentRegistry,
    context: &'a ComponentContext,
    layout: &'a LayoutBatch,
}

impl<'a> FragmentReplacer<'a> {
    pub fn new(
        document: &'a web_sys::Document,
        config: &'a PaneConfig,
        registry: &'a ComponentRegistry,
        context: &'a ComponentContext,
        layout: &'a LayoutBatch,
    ) -> Self {
        Self {
            document,
            config,
            registry,
            context,
            layout,
        }
    }

    pub fn apply(&self, fragments: &[(String, String)]) -> Result<Vec<web_sys::Element>, PaneError> {
        self.apply_with(fragments, || Ok(()))
    }

    /// Replace every fragment, run `before_reflow`, then reflow once. Nothing
    /// is touched when any fragment would nest the container.
    pub fn apply_with<F>(
        &self,
        fragments: &[(String, String)],
        before_reflow: F,
    ) -> Result<Vec<web_sys::Element>, PaneError>
    where
        F: FnOnce() -> Result<(), PaneError>,
    {
        let parsed = fragments
            .iter()
            .map(|(name, markup)| self.parse(name, markup))
            .collect::<Result<Vec<_>, _>>()?;

        let _reflow = self.layout.suppress();
        let mut inserted = Vec::new();

        for fragment in parsed {
            inserted.extend(self.replace(fragment)?);
        }

        before_reflow()?;
        self.layout.request();

        Ok(inserted)
    }

    fn parse(&self, name: &str, markup: &str) -> Result<Parsed, PaneError> {
        let template = self
            .document
            .create_element("template")?
            .dyn_into::<web_sys::HtmlTemplateElement>()
            .map_err(|_| PaneError::Dom("template element unsupported".to_owned()))?;
        template.set_inner_html(markup);
        let content = template.content();

        let marker = format!(".{}", self.config.container_class);
        if content.query_selector(&marker)?.is_some() {
            return Err(PaneError::CyclicFragment {
                fragment: name.to_owned(),
                marker: self.config.container_class.clone(),
            });
        }

        Ok(Parsed {
            name: name.to_owned(),
            content,
        })
    }

    fn relocate_styles(&self, content: &web_sys::DocumentFragment) -> Result<(), PaneError> {
        let styles = dom::elements(&content.query_selector_all("style")?);
        if styles.is_empty() {
            return Ok(());
        }

        let Some(head) = self.document.head() else {
            debug!("document has no head; leaving styles inline");
            return Ok(());
        };

        for style in styles {
            head.append_child(&style)?;
        }
        Ok(())
    }

    /// Layout classes and the inline style of `old` onto `new`.
    fn carry_layout(&self, old: &web_sys::Element, new: &web_sys::Element) -> Result<(), PaneError> {
        let old_classes = old.class_list();
        let new_classes = new.class_list();

        for class in &self.config.layout_classes {
            if old_classes.contains(class) {
                new_classes.add_1(class)?;
            }
        }

        if let Some(style) = old.get_attribute("style") {
            new.set_attribute("style", &style)?;
        }
        Ok(())
    }

    fn replace(&self, fragment: Parsed) -> Result<Vec<web_sys::Element>, PaneError> {
        let targets = dom::fragment_targets(self.document, self.config, &fragment.name)?;
        if targets.is_empty() {
            debug!("no element declares fragment {}; skipping", fragment.name);
            return Ok(Vec::new());
        }

        self.relocate_styles(&fragment.content)?;

        let last = targets.len() - 1;
        let mut inserted = Vec::new();

        for (index, target) in targets.into_iter().enumerate() {
            let content = if index == last {
                fragment.content.clone()
            } else {
                fragment
                    .content
                    .clone_node_with_deep(true)?
                    .dyn_into::<web_sys::DocumentFragment>()
                    .map_err(|_| PaneError::Dom("fragment clone failed".to_owned()))?
            };

            let roots: Vec<web_sys::Element> = (0..content.child_element_count())
                .filter_map(|i| content.children().item(i))
                .collect();

            if let Some(first) = roots.first() {
                self.carry_layout(&target, first)?;
            }

            self.registry.detach_within(&target, self.context)?;
            target.replace_with_with_node_1(&content)?;

            for root in &roots {
                self.registry.attach_within(root, self.context)?;
            }
            inserted.extend(roots);
        }

        Ok(inserted)
    }
}
