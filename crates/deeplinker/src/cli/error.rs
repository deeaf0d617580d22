//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use std::path::Path;

use deeplinker_store::LinkValidationError;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions
            .extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Rejected `add-link` input
    pub fn invalid_link(err: &LinkValidationError) -> Self {
        let base = Self::new(err.to_string());
        match err {
            LinkValidationError::EmptySlug | LinkValidationError::InvalidSlug(_) => base
                .with_context("Slugs appear in URLs as /l/<slug> and must be URL-safe")
                .with_suggestions([
                    "TRY: Use letters, numbers, hyphens and underscores only".to_string(),
                    "TRY: deeplinker add-link --slug summer-sale --web https://example.com/sale"
                        .to_string(),
                ]),
            LinkValidationError::NoDestination(_) => base
                .with_context("A link without any destination can never resolve")
                .with_suggestions([
                    "TRY: Pass at least one of --ios, --android, --web, --fallback".to_string(),
                ]),
        }
    }

    /// Config file could not be loaded or is invalid
    pub fn bad_config(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid configuration: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Show the effective configuration: deeplinker config show".to_string(),
                format!("TRY: Move the file aside to fall back to defaults: mv {0} {0}.bak", path.display()),
            ])
    }

    /// Server could not bind its listen address
    pub fn bind_failed(addr: &str, details: &str) -> Self {
        Self::new(format!("Cannot listen on {}", addr))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Pick another address: deeplinker serve --bind 127.0.0.1:3001".to_string(),
                "TRY: Check whether another server already uses the port".to_string(),
            ])
    }

    /// Smart redirect URL did not carry the required parameters
    pub fn invalid_handoff_url(url: &str, details: &str) -> Self {
        Self::new(format!("Not a usable smart redirect URL: {}", url))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Copy the Location header of a smart redirect: curl -sI 'http://127.0.0.1:3000/l/hello?platform=ios'".to_string(),
                "TRY: Configure a store URL ([stores] ios/android) so mobile requests hand off".to_string(),
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as JSON for commands running with `--json`.
pub fn print_json_error(err: &anyhow::Error) {
    let body = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "error": helpful.message,
            "context": helpful.context,
            "suggestions": helpful.suggestions,
        }),
        None => serde_json::json!({ "error": format!("{:#}", err) }),
    };
    eprintln!("{}", body);
}
