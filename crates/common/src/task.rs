use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use futures::FutureExt;

/// A unit of work panicked instead of returning.
#[derive(Debug, thiserror::Error)]
#[error("task panicked: {message}")]
pub struct Panicked {
    pub message: String,
}

/// Run `future` to completion, turning a panic into [`Panicked`].
///
/// Used as the per-item error boundary of long-lived loops: one bad message
/// must not take down the loop that receives the next one.
pub async fn catch_panic<F: Future>(future: F) -> Result<F::Output, Panicked> {
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| Panicked {
            message: panic_message(payload.as_ref()),
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn explode(message: String) -> u32 {
        panic!("{message}")
    }

    async fn explode_literal() -> u32 {
        panic!("boom")
    }

    #[tokio::test]
    async fn passes_output_through() {
        assert_eq!(catch_panic(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn captures_str_panic() {
        let err = catch_panic(explode_literal()).await.unwrap_err();
        assert_eq!(err.message, "boom");
    }

    #[tokio::test]
    async fn captures_formatted_panic() {
        let err = catch_panic(explode(format!("lane {} exploded", 3)))
            .await
            .unwrap_err();
        assert_eq!(err.message, "lane 3 exploded");
    }
}
