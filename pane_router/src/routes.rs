use matchit::Router;
use std::{collections::HashMap, fmt, rc::Rc};

use crate::{NavigationError, NavigationState};

/// How a state reached the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Push,
    Replace,
    Pop,
}

#[derive(Debug, Clone)]
pub struct RouteContext {
    pub state: NavigationState,
    pub params: HashMap<String, String>,
    pub trigger: Trigger,
}

/// One step of a route's handler chain. A middleware continues the chain by
/// calling [`Next::run`]; returning without doing so ends it.
pub trait Middleware {
    fn handle(&self, ctx: &mut RouteContext, next: Next<'_>);
}

impl<F> Middleware for F
where
    F: Fn(&mut RouteContext, Next<'_>),
{
    fn handle(&self, ctx: &mut RouteContext, next: Next<'_>) {
        self(ctx, next)
    }
}

/// Pin a closure to the middleware signature so its argument lifetimes are
/// inferred as higher-ranked.
pub fn middleware<F>(handler: F) -> F
where
    F: Fn(&mut RouteContext, Next<'_>),
{
    handler
}

/// Remaining handlers of a chain.
pub struct Next<'a> {
    chain: &'a [Rc<dyn Middleware>],
}

impl Next<'_> {
    pub fn run(self, ctx: &mut RouteContext) {
        if let Some((head, tail)) = self.chain.split_first() {
            head.handle(ctx, Next { chain: tail });
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.chain.len())
            .finish()
    }
}

/// Path patterns mapped to ordered handler chains. Handlers registered with
/// [`RouteTable::fallback`] run after the matched chain for every path.
pub struct RouteTable {
    router: Router<usize>,
    chains: Vec<(String, Vec<Rc<dyn Middleware>>)>,
    fallback: Vec<Rc<dyn Middleware>>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            router: Router::new(),
            chains: Vec::new(),
            fallback: Vec::new(),
        }
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `middleware` to the chain for `pattern` (`matchit` syntax,
    /// e.g. `/admin/pages/edit/show/{id}`).
    pub fn route(
        &mut self,
        pattern: &str,
        middleware: impl Middleware + 'static,
    ) -> Result<&mut Self, NavigationError> {
        let handler: Rc<dyn Middleware> = Rc::new(middleware);

        if let Some((_, chain)) = self.chains.iter_mut().find(|(p, _)| p == pattern) {
            chain.push(handler);
            return Ok(self);
        }

        self.router
            .insert(pattern, self.chains.len())
            .map_err(|e| NavigationError::Route {
                pattern: pattern.to_owned(),
                message: e.to_string(),
            })?;
        self.chains.push((pattern.to_owned(), vec![handler]));

        Ok(self)
    }

    pub fn fallback(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.fallback.push(Rc::new(middleware));
        self
    }

    /// Run the chain for `state` and hand back the context the handlers saw.
    pub fn handle(&self, state: NavigationState, trigger: Trigger) -> RouteContext {
        let path = pane_utils::request_path(&state.path);
        let mut chain: Vec<Rc<dyn Middleware>> = Vec::new();
        let mut params = HashMap::new();

        if let Ok(matched) = self.router.at(&path) {
            params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            chain.extend(self.chains[*matched.value].1.iter().cloned());
        }

        chain.extend(self.fallback.iter().cloned());

        let mut ctx = RouteContext {
            state,
            params,
            trigger,
        };
        Next { chain: &chain }.run(&mut ctx);

        ctx
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field(
                "patterns",
                &self.chains.iter().map(|(p, _)| p).collect::<Vec<_>>(),
            )
            .field("fallback", &self.fallback.len())
            .finish()
    }
}
