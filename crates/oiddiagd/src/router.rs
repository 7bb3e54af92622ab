//! Request router: path segment to test, `action` field to handler.
//!
//! Tests are registered as factories and built on first access, so each
//! name gets exactly one ledger for the life of the process. The empty path
//! is the harness root: it lists tests, or runs a diagnosis when the request
//! carries an identifier.

use oiddiag_shared::render::render_listing;
use oiddiag_shared::rpc::TestInfo;
use oiddiag_shared::{DiagError, DiagRequest, ACTION_FIELD, IDENTIFIER_FIELD};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::diagnostician::Diagnostician;
use crate::test_case::{TestCase, SHOW_ACTION};

/// Builds a test the first time its name is requested
pub type TestFactory = Box<dyn Fn() -> TestCase + Send + Sync>;

/// Where a request goes
pub enum Route {
    /// Root without an identifier: list every test
    Listing,
    /// Root with an identifier: one diagnostic run
    Diagnose,
    Test { test: Arc<TestCase>, action: String },
}

/// Split `Name/rest` into `("Name", "rest")`, ignoring leading slashes.
pub fn split_path(path: &str) -> (&str, &str) {
    let path = path.trim_start_matches('/');
    path.split_once('/').unwrap_or((path, ""))
}

pub struct RequestRouter {
    diagnostician: Arc<Diagnostician>,
    factories: BTreeMap<String, TestFactory>,
    live: RwLock<HashMap<String, Arc<TestCase>>>,
}

impl RequestRouter {
    pub fn new(diagnostician: Arc<Diagnostician>) -> Self {
        Self {
            diagnostician,
            factories: BTreeMap::new(),
            live: RwLock::new(HashMap::new()),
        }
    }

    /// Register a test under `name`; a later registration replaces it.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> TestCase + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn diagnostician(&self) -> &Arc<Diagnostician> {
        &self.diagnostician
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.factories.len()
    }

    /// Test for `name`, built on first access.
    pub fn get(&self, name: &str) -> Result<Arc<TestCase>, DiagError> {
        if let Some(test) = self
            .live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(test));
        }

        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DiagError::NotFound(format!("test '{}'", name)))?;
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        let test = live.entry(name.to_string()).or_insert_with(|| {
            debug!("Creating test {}", name);
            Arc::new(factory())
        });
        Ok(Arc::clone(test))
    }

    /// Summary of every registered test, in name order.
    pub fn list(&self) -> Result<Vec<TestInfo>, DiagError> {
        self.factories
            .keys()
            .map(|name| self.get(name).map(|test| test.info()))
            .collect()
    }

    pub fn route(&self, req: &dyn DiagRequest) -> Result<Route, DiagError> {
        let (name, _) = split_path(req.path_info());
        if name.is_empty() {
            return Ok(if req.field(IDENTIFIER_FIELD).is_some() {
                Route::Diagnose
            } else {
                Route::Listing
            });
        }
        let test = self.get(name)?;
        let action = req.field(ACTION_FIELD).unwrap_or(SHOW_ACTION).to_string();
        Ok(Route::Test { test, action })
    }

    /// Route the request and let the target write the response.
    pub async fn dispatch(&self, req: &mut (dyn DiagRequest + Send)) -> Result<(), DiagError> {
        match self.route(&*req)? {
            Route::Listing => {
                let tests = self.list()?;
                req.write(render_listing(&tests).as_bytes());
                Ok(())
            }
            Route::Diagnose => self.diagnostician.diagnose_request(req).await.map(|_| ()),
            Route::Test { test, action } => {
                debug!("Dispatching {} action {}", test.name(), action);
                test.handle_request(req).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("SomeTest/"), ("SomeTest", ""));
        assert_eq!(split_path("/SomeTest/extra/bits"), ("SomeTest", "extra/bits"));
        assert_eq!(split_path("SomeTest"), ("SomeTest", ""));
        assert_eq!(split_path(""), ("", ""));
        assert_eq!(split_path("/"), ("", ""));
    }
}
