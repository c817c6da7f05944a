use log::{debug, error};
use pane_router::NavigationGuard;

use crate::registry::{ComponentRegistry, DirtyRegion};
use crate::{PaneConfig, dom};

/// Asks every dirty region inside the addressed fragments whether its
/// changes may be discarded.
#[derive(Debug)]
pub struct DomGuard<'a> {
    document: &'a web_sys::Document,
    config: &'a PaneConfig,
    registry: &'a ComponentRegistry,
}

impl<'a> DomGuard<'a> {
    pub fn new(
        document: &'a web_sys::Document,
        config: &'a PaneConfig,
        registry: &'a ComponentRegistry,
    ) -> Self {
        Self {
            document,
            config,
            registry,
        }
    }

    fn dirty_regions(&self, fragments: &[String]) -> Vec<DirtyRegion> {
        let default = [self.config.default_fragment.clone()];
        let fragments = if fragments.is_empty() { &default[..] } else { fragments };

        let mut regions: Vec<DirtyRegion> = Vec::new();

        for name in fragments {
            let targets = match dom::fragment_targets(self.document, self.config, name) {
                Ok(targets) => targets,
                Err(e) => {
                    error!("could not look up fragment {name}: {e}");
                    continue;
                }
            };

            for target in targets {
                let found = match self.registry.dirty_regions(&target) {
                    Ok(found) => found,
                    Err(e) => {
                        error!("could not look up dirty regions: {e}");
                        continue;
                    }
                };

                for (element, component) in found {
                    if !regions.iter().any(|(seen, _)| dom::is_same(seen, &element)) {
                        regions.push((element, component));
                    }
                }
            }
        }

        regions
    }
}

impl NavigationGuard for DomGuard<'_> {
    fn can_navigate(&self, fragments: &[String]) -> bool {
        let mut safe = true;

        for (element, component) in self.dirty_regions(fragments) {
            let Some(tracker) = component.unsaved_changes() else {
                continue;
            };
            if !tracker.confirm_unsaved(&element) {
                debug!("{} refused to discard its changes", dom::describe(&element));
                safe = false;
            }
        }

        safe
    }
}
