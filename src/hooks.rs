use std::fmt;
use std::sync::Arc;

pub type ResponseHook = Arc<dyn Fn(&reqwest::Response) + Send + Sync>;

/// Callbacks run against every HTTP response before its body is read.
#[derive(Clone, Default)]
pub struct Hooks {
    response: Vec<ResponseHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&reqwest::Response) + Send + Sync + 'static,
    {
        self.response.push(Arc::new(hook));
        self
    }

    pub(crate) fn run_response(&self, response: &reqwest::Response) {
        for hook in &self.response {
            hook(response);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("response", &self.response.len())
            .finish()
    }
}
