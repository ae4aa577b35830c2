pub mod mesh;
pub mod system;

use anyhow::Result;
use lmtest_core::{BringUp, ShellSession};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Test context passed to all test functions
pub struct TestContext<'a> {
    pub shell: &'a ShellSession,
    pub bringup: &'a BringUp,
    #[allow(dead_code)]
    pub verbose: bool,
}

impl<'a> TestContext<'a> {
    pub fn new(shell: &'a ShellSession, bringup: &'a BringUp, verbose: bool) -> Self {
        Self {
            shell,
            bringup,
            verbose,
        }
    }
}

/// A single test definition
pub struct Test {
    pub name: &'static str,
    #[allow(dead_code)]
    pub description: &'static str,
    pub run_fn: Box<
        dyn for<'a> Fn(&'a mut TestContext<'_>) -> Pin<Box<dyn Future<Output = Result<Value>> + 'a>>
            + Send
            + Sync,
    >,
}

/// Test categories
#[derive(Debug, Clone, Copy)]
pub enum TestCategory {
    System,
    Mesh,
    SharedState,
}

impl TestCategory {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "system" | "board" => Some(Self::System),
            "mesh" | "network" => Some(Self::Mesh),
            "sharedstate" | "shared-state" | "shared_state" => Some(Self::SharedState),
            _ => None,
        }
    }

    /// Whether the category needs the virtual mesh brought up first.
    pub fn requires_mesh(&self) -> bool {
        match self {
            Self::System => false,
            Self::Mesh | Self::SharedState => true,
        }
    }

    pub fn get_tests(&self) -> Vec<Test> {
        match self {
            Self::System => system::get_tests(),
            Self::Mesh => mesh::get_tests(),
            Self::SharedState => shared_state::get_tests(),
        }
    }
}

/// Helper macro for defining tests
#[macro_export]
macro_rules! define_test {
    ($name:expr, $desc:expr, $func:expr) => {
        Test {
            name: $name,
            description: $desc,
            run_fn: Box::new(move |ctx| Box::pin($func(ctx))),
        }
    };
}
