//! Rendering boundary between the content pipeline and a markdown engine

use thiserror::Error;

/// The rendering capability failed for one document
#[derive(Error, Debug, Clone, PartialEq)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Turns a post body into a finished HTML fragment.
///
/// The loader only ever talks to this trait, so the markdown engine can be
/// swapped for a canned implementation in tests.
pub trait Render: Send + Sync {
    fn render(&self, body: &str) -> Result<String, RenderError>;
}

impl<F> Render for F
where
    F: Fn(&str) -> Result<String, RenderError> + Send + Sync,
{
    fn render(&self, body: &str) -> Result<String, RenderError> {
        self(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_renderer() {
        let upper = |body: &str| Ok::<_, RenderError>(body.to_uppercase());
        assert_eq!(upper.render("hi").unwrap(), "HI");

        let failing = |_: &str| Err::<String, _>(RenderError("boom".to_string()));
        assert_eq!(
            failing.render("hi").unwrap_err().to_string(),
            "render failed: boom"
        );
    }
}
