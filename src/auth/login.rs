//! User-interactive part of the login

use async_trait::async_trait;
use std::time::Duration;
use url::Url;
use crate::Result;
use crate::interrupt::Interrupt;
use super::callback_server::CallbackServer;

/// Shows an authorization URL to the user and reports where the flow ended
#[async_trait]
pub trait LoginFlow: Send + Sync {
    /// Returns the redirect URL the flow terminated on, or `None` if the user
    /// abandoned it (closed the window, pressed Ctrl+C, timed out).
    async fn run(&self, authorization_url: &Url) -> Result<Option<Url>>;
}

/// Opens the system browser and listens on the loopback redirect URI
#[derive(Debug, Clone)]
pub struct BrowserLoginFlow {
    port: u16,
    timeout: Duration,
    interrupt: Interrupt,
    open_browser: bool,
}

impl BrowserLoginFlow {
    /// `interrupt` ends the wait when the user presses Ctrl+C
    pub fn new(port: u16, timeout: Duration, interrupt: Interrupt) -> Self {
        Self {
            port,
            timeout,
            interrupt,
            open_browser: true,
        }
    }

    /// Only print the authorization URL
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }
}

#[async_trait]
impl LoginFlow for BrowserLoginFlow {
    async fn run(&self, authorization_url: &Url) -> Result<Option<Url>> {
        // Bind first so the redirect always finds a listener
        let server = CallbackServer::bind(self.port).await?;

        if self.open_browser {
            crate::ui::print_step("Opening browser for Microsoft sign-in...");
            println!("\n  If the browser doesn't open, visit this URL:\n  {}\n", authorization_url);
            if let Err(e) = open::that(authorization_url.as_str()) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        } else {
            crate::ui::print_step("Open this URL in a browser to sign in:");
            println!("\n  {}\n", authorization_url);
        }

        crate::ui::print_thinking("Waiting for sign-in (Ctrl+C to cancel)");

        tokio::select! {
            redirect = server.next_redirect() => redirect.map(Some),
            _ = tokio::time::sleep(self.timeout) => {
                tracing::warn!("Login timed out after {:?}", self.timeout);
                Ok(None)
            }
            _ = self.interrupt.triggered() => {
                tracing::info!("Login cancelled by user");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Login flow stand-in that never touches a browser

    use super::*;
    use std::sync::Mutex;

    pub struct ScriptedLoginFlow {
        outcome: Mutex<Option<Box<dyn FnOnce(&Url) -> Option<Url> + Send>>>,
        seen: Mutex<Vec<Url>>,
    }

    impl ScriptedLoginFlow {
        /// Redirect to `redirect_uri` with the given query, echoing back the request's `state`
        pub fn redirect_with(redirect_uri: &str, query: &str) -> Self {
            let redirect_uri = redirect_uri.to_string();
            let query = query.to_string();
            Self::with(move |auth_url: &Url| {
                let state = auth_url
                    .query_pairs()
                    .find(|(k, _)| k == "state")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default();
                let mut url = Url::parse(&redirect_uri).ok()?;
                url.set_query(Some(&query));
                url.query_pairs_mut().append_pair("state", &state);
                Some(url)
            })
        }

        pub fn cancelled() -> Self {
            Self::with(|_| None)
        }

        pub fn with(f: impl FnOnce(&Url) -> Option<Url> + Send + 'static) -> Self {
            let outcome: Box<dyn FnOnce(&Url) -> Option<Url> + Send> = Box::new(f);
            Self {
                outcome: Mutex::new(Some(outcome)),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn runs(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        pub fn last_authorization_url(&self) -> Option<Url> {
            self.seen.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl LoginFlow for ScriptedLoginFlow {
        async fn run(&self, authorization_url: &Url) -> Result<Option<Url>> {
            self.seen.lock().unwrap().push(authorization_url.clone());
            let outcome = self.outcome.lock().unwrap().take();
            Ok(outcome.and_then(|f| f(authorization_url)))
        }
    }
}
