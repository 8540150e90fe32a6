//! Route tree compiler.
//!
//! Flattens the declared [`Route`] trees into one radix tree per HTTP method.
//! Every registered value is an [`Endpoint`]: the handler, its absolute path
//! and the interceptor chains of all its ancestors, root first. The chains
//! are shared (`Arc`) between all endpoints below the same node and are
//! read-only once compiled.
//!
//! ```text
//! Route("/")                            GET  /user       → [/, /user]
//!  └─ Route("/user")       GET          GET  /user/{id}  → [/, /user, /{id}]
//!      └─ Route("/{id}")   GET
//! ```

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::dispatch::Endpoint;
use crate::error::Error;
use crate::interceptor::Interceptors;
use crate::route::Route;

/// One flattened `(method, path)` pair, in registration order.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Registration {
    pub method: Method,
    pub path: String,
}

/// The compiled, immutable routing table.
#[derive(Default)]
pub(crate) struct RouteTable {
    trees: HashMap<Method, MatchitRouter<Arc<Endpoint>>>,
    registrations: Vec<Registration>,
}

impl RouteTable {
    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<Endpoint>, HashMap<String, String>)> {
        let tree = self.trees.get(method)?;
        let matched = tree.at(path).ok()?;
        let endpoint = Arc::clone(matched.value);
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((endpoint, params))
    }

    pub(crate) fn registrations(&self) -> &[Registration] {
        &self.registrations
    }
}

/// Compiles `roots` into a [`RouteTable`].
///
/// Roots with more `/` in their own segment go first so that deeper routes
/// win when templates overlap; equal counts keep declaration order.
pub(crate) fn compile(roots: &[Route]) -> Result<RouteTable, Error> {
    let mut ordered: Vec<&Route> = roots.iter().collect();
    ordered.sort_by_key(|root| Reverse(root.separator_count()));

    let mut table = RouteTable::default();
    let mut chain = Vec::new();
    for root in ordered {
        visit(&mut table, root, "", &mut chain)?;
    }
    Ok(table)
}

/// Depth-first: children are registered before the node's own handlers.
fn visit(
    table: &mut RouteTable,
    node: &Route,
    parent_path: &str,
    chain: &mut Vec<Arc<Interceptors>>,
) -> Result<(), Error> {
    let raw_path = format!("{parent_path}{}", node.segment);
    chain.push(Arc::new(node.interceptors.clone()));

    for child in &node.children {
        visit(table, child, &raw_path, chain)?;
    }

    if !node.methods.is_empty() {
        let path = absolute_path(&raw_path);
        let route_path: Arc<str> = Arc::from(path.as_str());
        let ancestors: Arc<[Arc<Interceptors>]> = Arc::from(chain.as_slice());

        for (method, handler) in &node.methods {
            let endpoint = Endpoint::new(
                Arc::clone(handler),
                Arc::clone(&route_path),
                Arc::clone(&ancestors),
            );
            table
                .trees
                .entry(method.clone())
                .or_default()
                .insert(path.clone(), Arc::new(endpoint))
                .map_err(|source| Error::Route {
                    method: method.clone(),
                    path: path.clone(),
                    source,
                })?;
            debug!(%method, %path, depth = ancestors.len(), "route registered");
            table.registrations.push(Registration { method: method.clone(), path: path.clone() });
        }
    }

    chain.pop();
    Ok(())
}

/// Collapses the doubled leading separator produced by nesting `/`-prefixed
/// segments under a `/` root. An empty path is the root.
pub(crate) fn absolute_path(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('/');
    if trimmed.len() == raw.len() && !raw.is_empty() {
        return raw.to_owned();
    }
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use futures::FutureExt;

    use super::*;

    fn ok_route(segment: &str) -> Route {
        Route::new(segment).get(|_| async { Ok(()) }.boxed())
    }

    fn paths(table: &RouteTable) -> Vec<&str> {
        table.registrations().iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn absolute_path_normalization() {
        assert_eq!(absolute_path("//user/{id}"), "/user/{id}");
        assert_eq!(absolute_path("///user"), "/user");
        assert_eq!(absolute_path("//"), "/");
        assert_eq!(absolute_path(""), "/");
        assert_eq!(absolute_path("/api/v1"), "/api/v1");
        assert_eq!(absolute_path("api"), "api");
    }

    #[test]
    fn nested_segments_concatenate() {
        let root = Route::new("/").child(ok_route("/user").child(ok_route("/{id}")));
        let table = compile(&[root]).unwrap();
        assert_eq!(paths(&table), ["/user/{id}", "/user"]);
    }

    #[test]
    fn children_register_before_parents() {
        let root = ok_route("/a").child(ok_route("/b").child(ok_route("/c"))).child(ok_route("/d"));
        let table = compile(&[root]).unwrap();
        assert_eq!(paths(&table), ["/a/b/c", "/a/b", "/a/d", "/a"]);
    }

    #[test]
    fn deeper_roots_compile_first_with_stable_ties() {
        let roots = [ok_route("/files"), ok_route("/x"), ok_route("/files/{name}")];
        let table = compile(&roots).unwrap();
        assert_eq!(paths(&table), ["/files/{name}", "/files", "/x"]);
    }

    #[test]
    fn empty_nodes_compile_to_nothing() {
        let table = compile(&[Route::new("/nothing").child(Route::new("/here"))]).unwrap();
        assert!(table.registrations().is_empty());
        assert!(table.lookup(&Method::GET, "/nothing").is_none());
    }

    #[test]
    fn compiling_twice_is_idempotent() {
        let roots = [
            Route::new("/").child(ok_route("/user").child(ok_route("/{id}").post(|_| async { Ok(()) }.boxed()))),
            ok_route("/health"),
        ];
        let first: HashSet<_> = compile(&roots).unwrap().registrations().iter().cloned().collect();
        let second: HashSet<_> = compile(&roots).unwrap().registrations().iter().cloned().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn duplicate_routes_are_reported() {
        let err = compile(&[ok_route("/dup"), ok_route("/dup")]).err().unwrap();
        assert!(matches!(err, Error::Route { ref path, .. } if path == "/dup"));
    }

    #[test]
    fn lookup_extracts_params_and_ancestors() {
        let root = Route::new("/").child(ok_route("/user").child(ok_route("/{id}")));
        let table = compile(&[root]).unwrap();

        let (endpoint, params) = table.lookup(&Method::GET, "/user/42").unwrap();
        assert_eq!(&**endpoint.route_path(), "/user/{id}");
        assert_eq!(endpoint.depth(), 3);
        assert_eq!(params["id"], "42");

        assert!(table.lookup(&Method::POST, "/user/42").is_none());
    }
}
